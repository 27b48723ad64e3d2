use serde::{Deserialize, Serialize};

pub const DEFAULT_LABELS: [&str; 4] = ["low", "mid", "high", "elite"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinningConfig {
    pub n_bins: usize,
    /// Ordered low to high. `None` picks `DEFAULT_LABELS` for four bins, `q1..qN` otherwise.
    #[serde(default)]
    pub labels: Option<Vec<String>>,
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self {
            n_bins: DEFAULT_LABELS.len(),
            labels: None,
        }
    }
}

impl BinningConfig {
    pub fn resolved_labels(&self) -> Vec<String> {
        match &self.labels {
            Some(labels) => labels.clone(),
            None if self.n_bins == DEFAULT_LABELS.len() => {
                DEFAULT_LABELS.iter().map(|s| s.to_string()).collect()
            }
            None => (1..=self.n_bins).map(|i| format!("q{i}")).collect(),
        }
    }
}

pub struct QuantileBinner<T> {
    axis: String,
    extract: fn(&T) -> Option<f64>,
    boundaries: Vec<f64>,
    labels: Vec<String>,
    requested_bins: usize,
}

impl<T> QuantileBinner<T> {
    pub fn fit<'a, I>(
        axis: &str,
        population: I,
        extract: fn(&T) -> Option<f64>,
        cfg: &BinningConfig,
    ) -> Self
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        let mut values: Vec<f64> = population
            .into_iter()
            .filter_map(extract)
            .filter(|v| v.is_finite())
            .collect();
        values.sort_by(f64::total_cmp);

        let n_bins = cfg.n_bins.max(1);
        let mut boundaries = Vec::with_capacity(n_bins + 1);
        if !values.is_empty() {
            for i in 0..=n_bins {
                boundaries.push(quantile_sorted(&values, i as f64 / n_bins as f64));
            }
            boundaries.dedup();
        }

        let binner = Self {
            axis: axis.to_string(),
            extract,
            boundaries,
            labels: cfg.resolved_labels(),
            requested_bins: n_bins,
        };
        if binner.is_degenerate() {
            log::debug!(
                "axis {axis}: {} of {} bins survive boundary collapse",
                binner.bins(),
                n_bins
            );
        }
        binner
    }

    pub fn bins(&self) -> usize {
        self.boundaries.len().saturating_sub(1)
    }

    pub fn is_degenerate(&self) -> bool {
        self.bins() < self.requested_bins
    }

    /// Ordinal bin of a raw value; `None` for non-finite values, values outside the
    /// fitted range, or bins that have no label.
    pub fn bin_index(&self, value: f64) -> Option<usize> {
        if !value.is_finite() || self.bins() == 0 {
            return None;
        }
        let first = *self.boundaries.first()?;
        let last = *self.boundaries.last()?;
        if value < first || value > last {
            return None;
        }
        let idx = self.boundaries[1..]
            .iter()
            .position(|upper| value <= *upper)?;
        (idx < self.labels.len()).then_some(idx)
    }

    pub fn label_for(&self, value: f64) -> Option<String> {
        let idx = self.bin_index(value)?;
        Some(format!("{}_{}", self.axis, self.labels[idx]))
    }

    /// Zero or one tag for an item.
    pub fn tag(&self, item: &T) -> Vec<String> {
        (self.extract)(item)
            .and_then(|v| self.label_for(v))
            .into_iter()
            .collect()
    }
}

/// Linear-interpolated quantile of an ascending slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(v: &f64) -> Option<f64> {
        Some(*v)
    }

    #[test]
    fn constant_population_has_no_bins() {
        let values = vec![5.0; 10];
        let b = QuantileBinner::fit("auto", &values, ident, &BinningConfig::default());
        assert_eq!(b.bins(), 0);
        assert!(b.is_degenerate());
        assert!(b.tag(&5.0).is_empty());
    }

    #[test]
    fn collapsed_boundaries_use_low_labels() {
        let values = vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 3.0, 10.0];
        let b = QuantileBinner::fit("algae", &values, ident, &BinningConfig::default());
        assert!(b.bins() < 4);
        assert_eq!(b.tag(&0.0), vec!["algae_low".to_string()]);
        assert!(b.tag(&11.0).is_empty());
        assert!(b.tag(&f64::NAN).is_empty());
    }

    #[test]
    fn quartiles_of_uniform_range() {
        let values: Vec<f64> = (1..=100).map(f64::from).collect();
        let b = QuantileBinner::fit("coral", &values, ident, &BinningConfig::default());
        assert_eq!(b.bins(), 4);
        assert_eq!(b.label_for(1.0).as_deref(), Some("coral_low"));
        assert_eq!(b.label_for(100.0).as_deref(), Some("coral_elite"));
    }
}
