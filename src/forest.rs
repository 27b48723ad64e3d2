use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Fraction of features considered at each split; at least one is always tried.
    pub max_features: f64,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 64,
            max_depth: 6,
            min_samples_split: 4,
            min_samples_leaf: 2,
            max_features: 1.0 / 3.0,
            bootstrap: true,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    root: Node,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
}

struct Grow<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    cfg: &'a ForestConfig,
    n_try: usize,
}

impl RegressionTree {
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf(v) => return *v,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let v = row.get(*feature).copied().unwrap_or(0.0);
                    node = if v <= *threshold { left } else { right };
                }
            }
        }
    }

    #[cfg(test)]
    fn depth(&self) -> usize {
        fn walk(n: &Node) -> usize {
            match n {
                Node::Leaf(_) => 0,
                Node::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        walk(&self.root)
    }
}

impl RandomForest {
    /// Fit on rows `x` with targets `y`. `None` when there are no samples or the
    /// shapes disagree.
    pub fn fit(x: &[Vec<f64>], y: &[f64], cfg: &ForestConfig) -> Option<Self> {
        if x.is_empty() || x.len() != y.len() {
            return None;
        }
        let n_features = x[0].len();
        if x.iter().any(|r| r.len() != n_features) {
            return None;
        }
        let n_try = ((n_features as f64 * cfg.max_features) as usize).clamp(1, n_features.max(1));
        let grow = Grow { x, y, cfg, n_try };

        let trees: Vec<RegressionTree> = (0..cfg.n_trees.max(1))
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(tree_seed(cfg.seed, t as u64));
                let idx: Vec<usize> = if cfg.bootstrap {
                    (0..x.len()).map(|_| rng.gen_range(0..x.len())).collect()
                } else {
                    (0..x.len()).collect()
                };
                RegressionTree {
                    root: grow.node(idx, 0, &mut rng),
                }
            })
            .collect();

        Some(Self { trees })
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.predict(row)).sum::<f64>() / self.trees.len() as f64
    }

    #[cfg(test)]
    fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }
}

// SplitMix64 step so neighbouring tree indices get unrelated streams.
pub fn tree_seed(base: u64, index: u64) -> u64 {
    let mut z = base
        .wrapping_add(index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

impl Grow<'_> {
    fn node(&self, idx: Vec<usize>, depth: usize, rng: &mut StdRng) -> Node {
        let mean = idx.iter().map(|&i| self.y[i]).sum::<f64>() / idx.len().max(1) as f64;
        if depth >= self.cfg.max_depth
            || idx.len() < self.cfg.min_samples_split.max(2)
            || idx.iter().all(|&i| self.y[i] == self.y[idx[0]])
        {
            return Node::Leaf(mean);
        }

        let n_features = self.x[0].len();
        if n_features == 0 {
            return Node::Leaf(mean);
        }
        let candidates = sample(rng, n_features, self.n_try.min(n_features));
        let mut best: Option<(f64, usize, f64)> = None;
        for feature in candidates.iter() {
            if let Some((gain, threshold)) = self.best_split(&idx, feature) {
                if best.is_none_or(|(g, _, _)| gain > g) {
                    best = Some((gain, feature, threshold));
                }
            }
        }

        let Some((_, feature, threshold)) = best else {
            return Node::Leaf(mean);
        };
        let (left, right): (Vec<usize>, Vec<usize>) =
            idx.into_iter().partition(|&i| self.x[i][feature] <= threshold);
        Node::Split {
            feature,
            threshold,
            left: Box::new(self.node(left, depth + 1, rng)),
            right: Box::new(self.node(right, depth + 1, rng)),
        }
    }

    /// Largest reduction in summed squared error over thresholds on one feature that
    /// leaves at least `min_samples_leaf` on each side.
    fn best_split(&self, idx: &[usize], feature: usize) -> Option<(f64, f64)> {
        let mut order: Vec<(f64, f64)> = idx.iter().map(|&i| (self.x[i][feature], self.y[i])).collect();
        order.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = order.len();
        let total: f64 = order.iter().map(|p| p.1).sum();
        let total_sq: f64 = order.iter().map(|p| p.1 * p.1).sum();
        let parent_sse = total_sq - total * total / n as f64;
        let min_leaf = self.cfg.min_samples_leaf.max(1);

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        let mut best: Option<(f64, f64)> = None;
        for i in 0..n - 1 {
            left_sum += order[i].1;
            left_sq += order[i].1 * order[i].1;
            let n_left = i + 1;
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf || order[i].0 == order[i + 1].0 {
                continue;
            }
            let right_sum = total - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / n_left as f64)
                + (right_sq - right_sum * right_sum / n_right as f64);
            let gain = parent_sse - sse;
            if gain > 1e-12 && best.is_none_or(|(g, _)| gain > g) {
                best = Some((gain, 0.5 * (order[i].0 + order[i + 1].0)));
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let y: Vec<f64> = (0..40).map(|i| if i < 20 { 10.0 } else { 30.0 }).collect();
        (x, y)
    }

    #[test]
    fn learns_a_step() {
        let (x, y) = step_data();
        let forest = RandomForest::fit(&x, &y, &ForestConfig::default()).unwrap();
        assert!(forest.predict(&[2.0, 0.0]) < 15.0);
        assert!(forest.predict(&[37.0, 0.0]) > 25.0);
    }

    #[test]
    fn refit_is_identical() {
        let (x, y) = step_data();
        let a = RandomForest::fit(&x, &y, &ForestConfig::default()).unwrap();
        let b = RandomForest::fit(&x, &y, &ForestConfig::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn depth_is_bounded() {
        let x: Vec<Vec<f64>> = (0..200).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..200).map(|i| ((i * 37) % 11) as f64).collect();
        let cfg = ForestConfig {
            n_trees: 4,
            max_depth: 3,
            ..ForestConfig::default()
        };
        let forest = RandomForest::fit(&x, &y, &cfg).unwrap();
        assert!(forest.trees().iter().all(|t| t.depth() <= 3));
    }

    #[test]
    fn empty_training_set_does_not_fit() {
        assert!(RandomForest::fit(&[], &[], &ForestConfig::default()).is_none());
    }
}
