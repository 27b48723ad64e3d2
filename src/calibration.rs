use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Red,
    Tie,
    Blue,
}

/// Scoring quality of red-win probabilities against realised outcomes.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Metrics {
    pub samples: usize,
    pub brier: f64,
    pub log_loss: f64,
    pub accuracy: f64,
}

/// Error of predicted alliance totals against realised heuristic totals.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PredictionMetrics {
    pub samples: usize,
    pub mae: f64,
    pub rmse: f64,
    pub winner_accuracy: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CalibrationBin {
    pub bucket_start: f64,
    pub bucket_end: f64,
    pub count: usize,
    pub avg_pred: f64,
    pub actual_rate: f64,
}

/// Predicted vs realised totals for one match.
#[derive(Debug, Clone, Copy)]
pub struct AllianceTotalsPair {
    pub predicted_red: f64,
    pub predicted_blue: f64,
    pub actual_red: f64,
    pub actual_blue: f64,
}

pub fn classify_outcome(red_total: f64, blue_total: f64) -> Outcome {
    if red_total > blue_total {
        Outcome::Red
    } else if red_total < blue_total {
        Outcome::Blue
    } else {
        Outcome::Tie
    }
}

fn target(outcome: Outcome) -> f64 {
    match outcome {
        Outcome::Red => 1.0,
        Outcome::Tie => 0.5,
        Outcome::Blue => 0.0,
    }
}

pub fn evaluate_win_probs(red_win: &[f64], outcomes: &[Outcome]) -> Metrics {
    if red_win.is_empty() || red_win.len() != outcomes.len() {
        return Metrics::default();
    }

    let mut brier_sum = 0.0_f64;
    let mut log_loss_sum = 0.0_f64;
    let mut correct = 0.0_f64;

    for (p, outcome) in red_win.iter().zip(outcomes) {
        let p = p.clamp(1e-12, 1.0 - 1e-12);
        let y = target(*outcome);
        brier_sum += (p - y).powi(2);
        log_loss_sum += -(y * p.ln() + (1.0 - y) * (1.0 - p).ln());

        correct += match outcome {
            Outcome::Tie => 0.5,
            Outcome::Red if p > 0.5 => 1.0,
            Outcome::Blue if p < 0.5 => 1.0,
            _ if p == 0.5 => 0.5,
            _ => 0.0,
        };
    }

    let n = red_win.len() as f64;
    Metrics {
        samples: red_win.len(),
        brier: brier_sum / n,
        log_loss: log_loss_sum / n,
        accuracy: correct / n,
    }
}

pub fn evaluate_alliance_predictions(pairs: &[AllianceTotalsPair]) -> PredictionMetrics {
    if pairs.is_empty() {
        return PredictionMetrics::default();
    }

    let mut abs_sum = 0.0_f64;
    let mut sq_sum = 0.0_f64;
    let mut correct = 0.0_f64;

    for p in pairs {
        for (pred, actual) in [
            (p.predicted_red, p.actual_red),
            (p.predicted_blue, p.actual_blue),
        ] {
            let err = pred - actual;
            abs_sum += err.abs();
            sq_sum += err * err;
        }
        let predicted = classify_outcome(p.predicted_red, p.predicted_blue);
        let actual = classify_outcome(p.actual_red, p.actual_blue);
        correct += if actual == Outcome::Tie || predicted == Outcome::Tie {
            if predicted == actual { 1.0 } else { 0.5 }
        } else if predicted == actual {
            1.0
        } else {
            0.0
        };
    }

    let sides = (pairs.len() * 2) as f64;
    PredictionMetrics {
        samples: pairs.len(),
        mae: abs_sum / sides,
        rmse: (sq_sum / sides).sqrt(),
        winner_accuracy: correct / pairs.len() as f64,
    }
}

pub fn calibration_bins(red_win: &[f64], outcomes: &[Outcome], bins: usize) -> Vec<CalibrationBin> {
    let bins = bins.max(2);
    let mut counts = vec![0usize; bins];
    let mut pred_sum = vec![0.0_f64; bins];
    let mut actual_sum = vec![0.0_f64; bins];

    for (p, outcome) in red_win.iter().zip(outcomes) {
        let p = p.clamp(0.0, 1.0);
        let idx = ((p * bins as f64).floor() as usize).min(bins - 1);
        counts[idx] += 1;
        pred_sum[idx] += p;
        actual_sum[idx] += target(*outcome);
    }

    let mut out = Vec::with_capacity(bins);
    for i in 0..bins {
        let count = counts[i];
        let (avg_pred, actual_rate) = if count > 0 {
            (pred_sum[i] / count as f64, actual_sum[i] / count as f64)
        } else {
            (0.0, 0.0)
        };
        out.push(CalibrationBin {
            bucket_start: i as f64 / bins as f64,
            bucket_end: (i + 1) as f64 / bins as f64,
            count,
            avg_pred,
            actual_rate,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_predictions_have_zero_brier() {
        let m = evaluate_win_probs(&[1.0, 0.0], &[Outcome::Red, Outcome::Blue]);
        assert_eq!(m.samples, 2);
        assert!(m.brier < 1e-12);
        assert_eq!(m.accuracy, 1.0);
    }

    #[test]
    fn alliance_errors_average_over_both_sides() {
        let m = evaluate_alliance_predictions(&[AllianceTotalsPair {
            predicted_red: 100.0,
            predicted_blue: 80.0,
            actual_red: 90.0,
            actual_blue: 90.0,
        }]);
        assert_eq!(m.samples, 1);
        assert!((m.mae - 10.0).abs() < 1e-12);
        assert!((m.rmse - 10.0).abs() < 1e-12);
        assert_eq!(m.winner_accuracy, 0.5);
    }

    #[test]
    fn bins_cover_unit_interval() {
        let bins = calibration_bins(&[0.05, 0.95, 0.99], &[Outcome::Blue, Outcome::Red, Outcome::Red], 10);
        assert_eq!(bins.len(), 10);
        assert_eq!(bins[0].count, 1);
        assert_eq!(bins[9].count, 2);
        assert_eq!(bins[9].actual_rate, 1.0);
    }
}
