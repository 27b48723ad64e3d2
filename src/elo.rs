use std::collections::{BTreeMap, HashMap};

use rayon::ThreadPool;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::alliance::{CompleteMatch, ScoredObservation, alliance_outcomes, red_result};
use crate::binning::{BinningConfig, QuantileBinner};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EloConfig {
    pub base_rating: f64,
    pub k_max: f64,
    pub k_min: f64,
    /// Games played below which `k_max` applies.
    pub k_decay_start: f64,
    /// Games played above which `k_min` applies.
    pub k_decay_end: f64,
    /// Each tag starts with `2 * virtual_games` games on its counter.
    pub virtual_games: f64,
    pub iterations: usize,
}

impl Default for EloConfig {
    fn default() -> Self {
        Self {
            base_rating: 1000.0,
            k_max: 32.0,
            k_min: 8.0,
            k_decay_start: 30.0,
            k_decay_end: 200.0,
            virtual_games: 10.0,
            iterations: 3,
        }
    }
}

/// One alliance-vs-alliance result expressed in tags. `outcome` is red's score.
#[derive(Debug, Clone, PartialEq)]
pub struct EloGame {
    pub red: Vec<String>,
    pub blue: Vec<String>,
    pub outcome: f64,
}

#[derive(Clone, Copy)]
pub struct EloAxis {
    pub name: &'static str,
    pub extract: fn(&ScoredObservation) -> Option<f64>,
}

pub struct AxisRatings {
    pub axis: String,
    pub binner: QuantileBinner<ScoredObservation>,
    pub ratings: BTreeMap<String, f64>,
    pub games: usize,
}

pub struct FeatureEloOutput {
    pub base_rating: f64,
    pub axes: Vec<AxisRatings>,
}

pub fn expected_score(r_a: f64, r_b: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf(-(r_a - r_b) / 400.0))
}

pub fn k_factor(games_played: f64, cfg: &EloConfig) -> f64 {
    if games_played <= cfg.k_decay_start {
        return cfg.k_max;
    }
    if games_played >= cfg.k_decay_end {
        return cfg.k_min;
    }
    let span = (cfg.k_decay_end - cfg.k_decay_start).max(1e-9);
    let t = (games_played - cfg.k_decay_start) / span;
    cfg.k_max + (cfg.k_min - cfg.k_max) * t
}

pub fn train_feature_elo(games: &[EloGame], cfg: &EloConfig) -> BTreeMap<String, f64> {
    let mut ratings: HashMap<&str, f64> = HashMap::new();
    let mut played: HashMap<&str, f64> = HashMap::new();
    for g in games {
        for tag in g.red.iter().chain(g.blue.iter()) {
            ratings.entry(tag.as_str()).or_insert(cfg.base_rating);
            played
                .entry(tag.as_str())
                .or_insert(2.0 * cfg.virtual_games);
        }
    }

    for _ in 0..cfg.iterations {
        for g in games {
            if g.red.is_empty() || g.blue.is_empty() {
                continue;
            }
            let red_avg = side_average(&g.red, &ratings);
            let blue_avg = side_average(&g.blue, &ratings);
            let delta = g.outcome - expected_score(red_avg, blue_avg);

            let k_red: Vec<f64> = g.red.iter().map(|t| k_of(t, &played, cfg)).collect();
            let k_blue: Vec<f64> = g.blue.iter().map(|t| k_of(t, &played, cfg)).collect();
            let n_red = g.red.len() as f64;
            let n_blue = g.blue.len() as f64;

            for (tag, k) in g.red.iter().zip(k_red) {
                *ratings.entry(tag.as_str()).or_insert(cfg.base_rating) += k * delta / n_red;
                *played.entry(tag.as_str()).or_insert(0.0) += 1.0;
            }
            for (tag, k) in g.blue.iter().zip(k_blue) {
                *ratings.entry(tag.as_str()).or_insert(cfg.base_rating) -= k * delta / n_blue;
                *played.entry(tag.as_str()).or_insert(0.0) += 1.0;
            }
        }
    }

    ratings
        .into_iter()
        .map(|(tag, r)| (tag.to_string(), r))
        .collect()
}

fn side_average(tags: &[String], ratings: &HashMap<&str, f64>) -> f64 {
    let sum: f64 = tags
        .iter()
        .map(|t| ratings.get(t.as_str()).copied().unwrap_or_default())
        .sum();
    sum / tags.len() as f64
}

fn k_of(tag: &str, played: &HashMap<&str, f64>, cfg: &EloConfig) -> f64 {
    k_factor(played.get(tag).copied().unwrap_or(0.0), cfg)
}

/// Bin every axis over the complete-match population and train one rating table per
/// axis. Axes are independent and train in parallel on `pool`.
pub fn run_feature_elo(
    observations: &[ScoredObservation],
    matches: &[CompleteMatch],
    axes: &[EloAxis],
    binning: &BinningConfig,
    cfg: &EloConfig,
    pool: &ThreadPool,
) -> FeatureEloOutput {
    let population: Vec<&ScoredObservation> = matches
        .iter()
        .flat_map(|m| m.members())
        .map(|i| &observations[i])
        .collect();
    let results: Vec<f64> = matches
        .iter()
        .map(|m| {
            let (red, blue) = alliance_outcomes(observations, m);
            red_result(&red, &blue)
        })
        .collect();

    let axes_out: Vec<AxisRatings> = pool.install(|| {
        axes.par_iter()
            .map(|axis| {
                let binner = QuantileBinner::fit(
                    axis.name,
                    population.iter().copied(),
                    axis.extract,
                    binning,
                );
                let games: Vec<EloGame> = matches
                    .iter()
                    .zip(&results)
                    .map(|(m, outcome)| EloGame {
                        red: side_tags(observations, &m.red, &binner),
                        blue: side_tags(observations, &m.blue, &binner),
                        outcome: *outcome,
                    })
                    .filter(|g| !g.red.is_empty() && !g.blue.is_empty())
                    .collect();
                let ratings = train_feature_elo(&games, cfg);
                log::debug!(
                    "axis {}: {} games, {} tags",
                    axis.name,
                    games.len(),
                    ratings.len()
                );
                AxisRatings {
                    axis: axis.name.to_string(),
                    binner,
                    ratings,
                    games: games.len(),
                }
            })
            .collect()
    });

    FeatureEloOutput {
        base_rating: cfg.base_rating,
        axes: axes_out,
    }
}

fn side_tags(
    observations: &[ScoredObservation],
    side: &[usize],
    binner: &QuantileBinner<ScoredObservation>,
) -> Vec<String> {
    side.iter()
        .flat_map(|&i| binner.tag(&observations[i]))
        .collect()
}

impl AxisRatings {
    /// Mean over matches of the mean rating of the team's tags in that match. `None`
    /// when no match yields a rated tag.
    pub fn team_score(&self, team_obs: &[&ScoredObservation]) -> Option<f64> {
        let per_match: Vec<f64> = team_obs
            .iter()
            .filter_map(|obs| {
                let rated: Vec<f64> = self
                    .binner
                    .tag(obs)
                    .iter()
                    .filter_map(|t| self.ratings.get(t).copied())
                    .collect();
                (!rated.is_empty()).then(|| rated.iter().sum::<f64>() / rated.len() as f64)
            })
            .collect();
        if per_match.is_empty() {
            return None;
        }
        Some(per_match.iter().sum::<f64>() / per_match.len() as f64)
    }

    fn side_rating(&self, side: &[&ScoredObservation]) -> Option<f64> {
        let rated: Vec<f64> = side
            .iter()
            .flat_map(|obs| self.binner.tag(obs))
            .filter_map(|t| self.ratings.get(&t).copied())
            .collect();
        (!rated.is_empty()).then(|| rated.iter().sum::<f64>() / rated.len() as f64)
    }
}

impl FeatureEloOutput {
    pub fn team_scores(&self, team_obs: &[&ScoredObservation]) -> BTreeMap<String, Option<f64>> {
        self.axes
            .iter()
            .map(|a| (a.axis.clone(), a.team_score(team_obs)))
            .collect()
    }

    /// Red's expected score averaged over the axes that can rate both sides.
    pub fn red_win_probability(
        &self,
        red: &[&ScoredObservation],
        blue: &[&ScoredObservation],
    ) -> Option<f64> {
        let probs: Vec<f64> = self
            .axes
            .iter()
            .filter_map(|a| Some(expected_score(a.side_rating(red)?, a.side_rating(blue)?)))
            .collect();
        (!probs.is_empty()).then(|| probs.iter().sum::<f64>() / probs.len() as f64)
    }

    pub fn degenerate_axes(&self) -> Vec<String> {
        self.axes
            .iter()
            .filter(|a| a.binner.is_degenerate())
            .map(|a| a.axis.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn k_factor_decays_linearly_between_thresholds() {
        let cfg = EloConfig::default();
        assert_eq!(k_factor(0.0, &cfg), 32.0);
        assert_eq!(k_factor(30.0, &cfg), 32.0);
        assert_eq!(k_factor(115.0, &cfg), 20.0);
        assert_eq!(k_factor(200.0, &cfg), 8.0);
        assert_eq!(k_factor(5000.0, &cfg), 8.0);
    }

    #[test]
    fn stronger_tag_rises() {
        let games: Vec<EloGame> = (0..20)
            .map(|_| EloGame {
                red: vec!["auto_elite".to_string()],
                blue: vec!["auto_low".to_string()],
                outcome: 1.0,
            })
            .collect();
        let r = train_feature_elo(&games, &EloConfig::default());
        assert!(r["auto_elite"] > 1000.0);
        assert!(r["auto_low"] < 1000.0);
        assert!((r["auto_elite"] + r["auto_low"] - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn ties_leave_ratings_at_base() {
        let games = vec![EloGame {
            red: vec!["a".to_string(), "b".to_string()],
            blue: vec!["c".to_string()],
            outcome: 0.5,
        }];
        let r = train_feature_elo(&games, &EloConfig::default());
        assert!(r.values().all(|v| (*v - 1000.0).abs() < 1e-12));
    }
}
