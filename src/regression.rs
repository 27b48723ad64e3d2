//! Per-match contribution forecasts from history-only features.

use std::collections::{BTreeMap, BTreeSet};

use rayon::ThreadPool;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::alliance::{CompleteMatch, ScoredObservation, alliance_outcomes};
use crate::clustering::RowTable;
use crate::forest::{ForestConfig, RandomForest, tree_seed};
use crate::observation::{MatchKey, ScheduledMatch, TeamId};

pub const PRIOR_MATCHES: &str = "prior_matches";

/// A predicted quantity. Aspects of one observation sum to its contribution.
#[derive(Clone, Copy)]
pub struct Aspect {
    pub name: &'static str,
    pub value: fn(&ScoredObservation) -> Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceMatch {
    pub key: MatchKey,
    pub red: Vec<TeamId>,
    pub blue: Vec<TeamId>,
    pub actual_red: f64,
    pub actual_blue: f64,
}

impl SequenceMatch {
    pub fn teams(&self) -> impl Iterator<Item = TeamId> + '_ {
        self.red.iter().chain(self.blue.iter()).copied()
    }
}

/// One training sample: a team's history-only features and what it then scored.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamMatchSample {
    pub key: MatchKey,
    pub team: TeamId,
    pub features: Vec<f64>,
    pub aspects: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default)]
pub struct RegressionInput {
    pub feature_names: Vec<String>,
    pub aspect_names: Vec<String>,
    pub matches: Vec<SequenceMatch>,
    pub samples: Vec<TeamMatchSample>,
    history: BTreeMap<TeamId, Vec<(MatchKey, Vec<f64>)>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamPrediction {
    pub aspects: BTreeMap<String, f64>,
    pub total: f64,
    /// Set when the model output was unusable and zeros were substituted.
    pub fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPrediction {
    pub key: MatchKey,
    pub red: BTreeMap<TeamId, TeamPrediction>,
    pub blue: BTreeMap<TeamId, TeamPrediction>,
    pub red_total: f64,
    pub blue_total: f64,
    pub training_samples: usize,
}

impl MatchPrediction {
    pub fn team(&self, team: TeamId) -> Option<&TeamPrediction> {
        self.red.get(&team).or_else(|| self.blue.get(&team))
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegressionOutput {
    pub predictions: Vec<MatchPrediction>,
    pub upcoming: Vec<MatchPrediction>,
    pub cold_start: Vec<MatchKey>,
    pub empty_training: Vec<MatchKey>,
    pub fallbacks: Vec<(MatchKey, TeamId)>,
}

impl RegressionOutput {
    pub fn prediction(&self, key: MatchKey) -> Option<&MatchPrediction> {
        self.predictions
            .iter()
            .chain(self.upcoming.iter())
            .find(|p| p.key == key)
    }
}

pub fn build_regression_input(
    observations: &[ScoredObservation],
    matches: &[CompleteMatch],
    table: &RowTable,
    aspects: &[Aspect],
) -> RegressionInput {
    let columns = table.columns();
    let mut history: BTreeMap<TeamId, Vec<(MatchKey, Vec<f64>)>> = BTreeMap::new();
    for row in &table.rows {
        let values = columns
            .iter()
            .map(|c| row.value(c).unwrap_or(f64::NAN))
            .collect();
        history.entry(row.team).or_default().push((row.key, values));
    }
    for rows in history.values_mut() {
        rows.sort_by(|a, b| a.0.cmp(&b.0));
    }

    let mut feature_names = columns;
    feature_names.push(PRIOR_MATCHES.to_string());
    let mut input = RegressionInput {
        feature_names,
        aspect_names: aspects.iter().map(|a| a.name.to_string()).collect(),
        matches: Vec::with_capacity(matches.len()),
        samples: Vec::new(),
        history,
    };

    for m in matches {
        let (red, blue) = alliance_outcomes(observations, m);
        input.matches.push(SequenceMatch {
            key: m.key,
            red: m.red.iter().map(|&i| observations[i].team()).collect(),
            blue: m.blue.iter().map(|&i| observations[i].team()).collect(),
            actual_red: red.total,
            actual_blue: blue.total,
        });
        for idx in m.members() {
            let obs = &observations[idx];
            let sample = TeamMatchSample {
                key: m.key,
                team: obs.team(),
                features: input.history_features(obs.team(), m.key),
                aspects: aspects
                    .iter()
                    .map(|a| (a.value)(obs).filter(|v| v.is_finite()))
                    .collect(),
            };
            input.samples.push(sample);
        }
    }
    input
}

impl RegressionInput {
    /// Column means over the team's rows strictly before `before`, then the count of
    /// those rows. A team with no history gets all zeros.
    pub fn history_features(&self, team: TeamId, before: MatchKey) -> Vec<f64> {
        let width = self.feature_names.len().saturating_sub(1);
        let mut sums = vec![0.0; width];
        let mut counts = vec![0usize; width];
        let mut prior = 0usize;
        if let Some(rows) = self.history.get(&team) {
            for (_, values) in rows.iter().take_while(|(k, _)| *k < before) {
                prior += 1;
                for (j, v) in values.iter().enumerate() {
                    if v.is_finite() {
                        sums[j] += v;
                        counts[j] += 1;
                    }
                }
            }
        }
        let mut features: Vec<f64> = sums
            .iter()
            .zip(&counts)
            .map(|(s, &n)| if n == 0 { 0.0 } else { s / n as f64 })
            .collect();
        features.push(prior as f64);
        features
    }
}

pub fn training_set(input: &RegressionInput, key: MatchKey) -> Vec<&TeamMatchSample> {
    input.samples.iter().filter(|s| s.key < key).collect()
}

pub fn run_sequential_regression(
    input: &RegressionInput,
    upcoming: &[ScheduledMatch],
    cfg: &ForestConfig,
    pool: &ThreadPool,
) -> RegressionOutput {
    let mut out = RegressionOutput::default();
    let mut seen: BTreeSet<TeamId> = BTreeSet::new();

    for m in &input.matches {
        let newcomers: Vec<TeamId> = m.teams().filter(|t| !seen.contains(t)).collect();
        seen.extend(m.teams());
        if !newcomers.is_empty() {
            log::debug!("match {} skipped: first appearance of {:?}", m.key, newcomers);
            out.cold_start.push(m.key);
            continue;
        }
        match predict_match(input, m.key, &m.red, &m.blue, cfg, pool) {
            Some(p) => {
                collect_fallbacks(&p, &mut out.fallbacks);
                out.predictions.push(p);
            }
            None => out.empty_training.push(m.key),
        }
    }

    let last_scouted = input.matches.last().map(|m| m.key);
    for s in upcoming {
        if last_scouted.is_some_and(|last| s.key <= last) {
            continue;
        }
        if s.red.iter().chain(&s.blue).any(|t| !seen.contains(t)) {
            log::debug!("upcoming match {} skipped: unseen team", s.key);
            out.cold_start.push(s.key);
            continue;
        }
        match predict_match(input, s.key, &s.red, &s.blue, cfg, pool) {
            Some(p) => {
                collect_fallbacks(&p, &mut out.fallbacks);
                out.upcoming.push(p);
            }
            None => out.empty_training.push(s.key),
        }
    }

    log::info!(
        "regression: {} matches predicted, {} upcoming, {} cold start, {} without training data",
        out.predictions.len(),
        out.upcoming.len(),
        out.cold_start.len(),
        out.empty_training.len()
    );
    out
}

fn collect_fallbacks(p: &MatchPrediction, sink: &mut Vec<(MatchKey, TeamId)>) {
    for (team, tp) in p.red.iter().chain(p.blue.iter()) {
        if tp.fallback {
            sink.push((p.key, *team));
        }
    }
}

/// Fit one forest per aspect on everything before `key` and predict each side.
/// `None` when no aspect has a single training row.
fn predict_match(
    input: &RegressionInput,
    key: MatchKey,
    red: &[TeamId],
    blue: &[TeamId],
    cfg: &ForestConfig,
    pool: &ThreadPool,
) -> Option<MatchPrediction> {
    let train = training_set(input, key);
    if train.is_empty() {
        return None;
    }

    let forests: Vec<Option<RandomForest>> = pool.install(|| {
        (0..input.aspect_names.len())
            .into_par_iter()
            .map(|a| {
                let (x, y): (Vec<Vec<f64>>, Vec<f64>) = train
                    .iter()
                    .filter_map(|s| s.aspects[a].map(|v| (s.features.clone(), v)))
                    .unzip();
                let aspect_cfg = ForestConfig {
                    seed: tree_seed(cfg.seed, a as u64),
                    ..*cfg
                };
                RandomForest::fit(&x, &y, &aspect_cfg)
            })
            .collect()
    });
    if forests.iter().all(Option::is_none) {
        return None;
    }

    let side = |teams: &[TeamId]| -> BTreeMap<TeamId, TeamPrediction> {
        teams
            .iter()
            .map(|&team| (team, predict_team(input, &forests, team, key)))
            .collect()
    };
    let red = side(red);
    let blue = side(blue);
    let red_total = red.values().map(|p| p.total).sum();
    let blue_total = blue.values().map(|p| p.total).sum();

    Some(MatchPrediction {
        key,
        red,
        blue,
        red_total,
        blue_total,
        training_samples: train.len(),
    })
}

fn predict_team(
    input: &RegressionInput,
    forests: &[Option<RandomForest>],
    team: TeamId,
    key: MatchKey,
) -> TeamPrediction {
    let features = input.history_features(team, key);
    let mut aspects = BTreeMap::new();
    let mut usable = features.iter().all(|v| v.is_finite());
    if usable {
        for (name, forest) in input.aspect_names.iter().zip(forests) {
            let Some(forest) = forest else { continue };
            let v = forest.predict(&features);
            if !v.is_finite() {
                usable = false;
                break;
            }
            aspects.insert(name.clone(), v);
        }
    }

    if !usable {
        log::warn!("prediction for team {team} in {key} unusable; using zeros");
        let aspects: BTreeMap<String, f64> = input
            .aspect_names
            .iter()
            .zip(forests)
            .filter(|(_, f)| f.is_some())
            .map(|(name, _)| (name.clone(), 0.0))
            .collect();
        return TeamPrediction {
            aspects,
            total: 0.0,
            fallback: true,
        };
    }

    let total = aspects.values().sum();
    TeamPrediction {
        aspects,
        total,
        fallback: false,
    }
}
