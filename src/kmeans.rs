use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub k: usize,
    pub seed: u64,
    pub n_init: usize,
    pub max_iter: usize,
    pub tolerance: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            k: 5,
            seed: 42,
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    pub centroids: Vec<Vec<f64>>,
    pub assignments: Vec<usize>,
    pub inertia: f64,
}

/// Lloyd's k-means with k-means++ seeding, best of `n_init` restarts by inertia.
/// `k` is clamped to the number of points. Returns `None` for an empty input.
pub fn fit(points: &[Vec<f64>], cfg: &ClusterConfig) -> Option<KMeansFit> {
    if points.is_empty() {
        return None;
    }
    let k = cfg.k.clamp(1, points.len());
    let mut rng = StdRng::seed_from_u64(cfg.seed);

    let mut best: Option<KMeansFit> = None;
    for _ in 0..cfg.n_init.max(1) {
        let centroids = plus_plus_init(points, k, &mut rng);
        let run = lloyd(points, centroids, cfg);
        let better = best.as_ref().is_none_or(|b| run.inertia < b.inertia);
        if better {
            best = Some(run);
        }
    }
    best
}

fn plus_plus_init(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..points.len())].clone());

    while centroids.len() < k {
        let d2: Vec<f64> = points
            .iter()
            .map(|p| nearest(p, &centroids).1)
            .collect();
        let total: f64 = d2.iter().sum();
        let next = if total <= 0.0 {
            // Every point sits on a centroid already; take the first unused one.
            points
                .iter()
                .position(|p| !centroids.contains(p))
                .unwrap_or(0)
        } else {
            let mut target = rng.r#gen::<f64>() * total;
            let mut chosen = d2.len() - 1;
            for (i, d) in d2.iter().enumerate() {
                if target < *d {
                    chosen = i;
                    break;
                }
                target -= d;
            }
            chosen
        };
        centroids.push(points[next].clone());
    }
    centroids
}

fn lloyd(points: &[Vec<f64>], mut centroids: Vec<Vec<f64>>, cfg: &ClusterConfig) -> KMeansFit {
    let k = centroids.len();
    let dims = points[0].len();
    let mut assignments = vec![0usize; points.len()];

    for _ in 0..cfg.max_iter.max(1) {
        for (a, p) in assignments.iter_mut().zip(points) {
            *a = nearest(p, &centroids).0;
        }

        let mut sums = vec![vec![0.0; dims]; k];
        let mut counts = vec![0usize; k];
        for (p, &c) in points.iter().zip(&assignments) {
            counts[c] += 1;
            for (s, v) in sums[c].iter_mut().zip(p) {
                *s += v;
            }
        }

        let mut shift = 0.0_f64;
        for c in 0..k {
            let next = if counts[c] == 0 {
                farthest_point(points, &assignments, &centroids)
            } else {
                sums[c].iter().map(|s| s / counts[c] as f64).collect()
            };
            shift = shift.max(sq_dist(&next, &centroids[c]).sqrt());
            centroids[c] = next;
        }
        if shift <= cfg.tolerance {
            break;
        }
    }

    for (a, p) in assignments.iter_mut().zip(points) {
        *a = nearest(p, &centroids).0;
    }
    let inertia = points
        .iter()
        .zip(&assignments)
        .map(|(p, &c)| sq_dist(p, &centroids[c]))
        .sum();

    KMeansFit {
        centroids,
        assignments,
        inertia,
    }
}

fn farthest_point(points: &[Vec<f64>], assignments: &[usize], centroids: &[Vec<f64>]) -> Vec<f64> {
    let mut best = 0usize;
    let mut best_d = f64::NEG_INFINITY;
    for (i, (p, &c)) in points.iter().zip(assignments).enumerate() {
        let d = sq_dist(p, &centroids[c]);
        if d > best_d {
            best_d = d;
            best = i;
        }
    }
    points[best].clone()
}

/// Index of the closest centroid (lowest index on ties) and its squared distance.
pub fn nearest(p: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    let mut best = (0usize, f64::INFINITY);
    for (i, c) in centroids.iter().enumerate() {
        let d = sq_dist(p, c);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

fn sq_dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separates_obvious_groups() {
        let mut points = Vec::new();
        for i in 0..5 {
            points.push(vec![i as f64 * 0.01, 0.0]);
            points.push(vec![10.0 + i as f64 * 0.01, 10.0]);
        }
        let cfg = ClusterConfig {
            k: 2,
            ..ClusterConfig::default()
        };
        let fit = fit(&points, &cfg).unwrap();
        for pair in points.chunks(2).zip(fit.assignments.chunks(2)) {
            assert_ne!(pair.1[0], pair.1[1]);
        }
        let first = fit.assignments[0];
        assert!(fit.assignments.iter().step_by(2).all(|a| *a == first));
    }

    #[test]
    fn k_clamps_to_point_count() {
        let points = vec![vec![1.0], vec![2.0]];
        let fit = fit(&points, &ClusterConfig::default()).unwrap();
        assert_eq!(fit.centroids.len(), 2);
        assert!(fit.inertia < 1e-12);
    }
}
