use std::collections::BTreeMap;

use serde::Serialize;

use crate::alliance::{CompleteMatch, ScoredObservation};
use crate::kmeans::{self, ClusterConfig};
use crate::observation::{Alliance, MatchKey, TeamId};

const STDEV_EPSILON: f64 = 1e-9;

/// Context an extractor sees for one (match, alliance, team) triple.
pub struct RowContext<'a> {
    pub key: MatchKey,
    pub alliance: Alliance,
    pub team: TeamId,
    pub scored: &'a ScoredObservation,
}

pub struct FieldExtractor {
    pub name: &'static str,
    pub extract: fn(&RowContext<'_>) -> Vec<(&'static str, f64)>,
}

/// Adds computed columns to every row; may read columns written by earlier passes.
pub struct DerivedFeature {
    pub name: &'static str,
    pub derive: fn(&mut RowTable),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryScore {
    pub name: String,
    pub weights: Vec<(String, f64)>,
}

impl CategoryScore {
    pub fn new(name: &str, weights: &[(&str, f64)]) -> Self {
        Self {
            name: name.to_string(),
            weights: weights.iter().map(|(c, w)| (c.to_string(), *w)).collect(),
        }
    }

    pub fn score(&self, row: &FeatureRow) -> f64 {
        self.weights
            .iter()
            .map(|(col, w)| row.value(col).unwrap_or(0.0) * w)
            .sum()
    }
}

pub struct ClusterStrategies {
    pub extractors: Vec<FieldExtractor>,
    pub derived: Vec<DerivedFeature>,
    pub categories: Vec<CategoryScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    pub key: MatchKey,
    pub alliance: Alliance,
    pub team: TeamId,
    pub values: BTreeMap<String, f64>,
}

impl FeatureRow {
    pub fn value(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied()
    }

    pub fn set(&mut self, column: &str, value: f64) {
        self.values.insert(column.to_string(), value);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowTable {
    pub rows: Vec<FeatureRow>,
}

impl RowTable {
    pub fn columns(&self) -> Vec<String> {
        let mut cols: Vec<String> = self
            .rows
            .iter()
            .flat_map(|r| r.values.keys().cloned())
            .collect();
        cols.sort();
        cols.dedup();
        cols
    }

    pub fn row(&self, key: MatchKey, team: TeamId) -> Option<&FeatureRow> {
        self.rows.iter().find(|r| r.key == key && r.team == team)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamClusterProfile {
    pub cluster: usize,
    pub rank: usize,
    pub score: f64,
    pub categories: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default)]
pub struct ClusterOutput {
    pub teams: BTreeMap<TeamId, TeamClusterProfile>,
    pub clusters: BTreeMap<usize, BTreeMap<String, f64>>,
    pub table: RowTable,
}

pub fn build_row_table(
    observations: &[ScoredObservation],
    matches: &[CompleteMatch],
    strategies: &ClusterStrategies,
) -> RowTable {
    let mut table = RowTable::default();
    for m in matches {
        for alliance in [Alliance::Red, Alliance::Blue] {
            for &idx in m.side(alliance) {
                let scored = &observations[idx];
                let ctx = RowContext {
                    key: m.key,
                    alliance,
                    team: scored.team(),
                    scored,
                };
                let mut values = BTreeMap::new();
                for ex in &strategies.extractors {
                    for (col, v) in (ex.extract)(&ctx) {
                        values.insert(col.to_string(), v);
                    }
                }
                table.rows.push(FeatureRow {
                    key: m.key,
                    alliance,
                    team: scored.team(),
                    values,
                });
            }
        }
    }

    for d in &strategies.derived {
        log::trace!("derived feature pass {}", d.name);
        (d.derive)(&mut table);
    }
    for row in &mut table.rows {
        for cat in &strategies.categories {
            let v = cat.score(row);
            row.set(&cat.name, v);
        }
    }
    table
}

pub fn team_means(table: &RowTable) -> BTreeMap<TeamId, BTreeMap<String, f64>> {
    let mut acc: BTreeMap<TeamId, BTreeMap<String, (f64, usize)>> = BTreeMap::new();
    for row in &table.rows {
        let team = acc.entry(row.team).or_default();
        for (col, v) in &row.values {
            if !v.is_finite() {
                continue;
            }
            let slot = team.entry(col.clone()).or_insert((0.0, 0));
            slot.0 += v;
            slot.1 += 1;
        }
    }
    acc.into_iter()
        .map(|(team, cols)| {
            let means = cols
                .into_iter()
                .map(|(col, (sum, n))| (col, sum / n as f64))
                .collect();
            (team, means)
        })
        .collect()
}

pub fn run_cluster_rating(
    observations: &[ScoredObservation],
    matches: &[CompleteMatch],
    strategies: &ClusterStrategies,
    cfg: &ClusterConfig,
) -> ClusterOutput {
    let table = build_row_table(observations, matches, strategies);
    let means = team_means(&table);
    let categories: Vec<&str> = strategies.categories.iter().map(|c| c.name.as_str()).collect();

    let teams: Vec<TeamId> = means.keys().copied().collect();
    let raw: Vec<Vec<f64>> = teams
        .iter()
        .map(|t| {
            categories
                .iter()
                .map(|c| means[t].get(*c).copied().unwrap_or(0.0))
                .collect()
        })
        .collect();
    let standardized = standardize_columns(&raw);

    let Some(fit) = kmeans::fit(&standardized, cfg) else {
        log::info!("clustering skipped: no complete matches");
        return ClusterOutput {
            table,
            ..ClusterOutput::default()
        };
    };

    let scores: Vec<f64> = standardized
        .iter()
        .zip(&fit.assignments)
        .map(|(x, &c)| intra_cluster_score(x, &fit.centroids[c]))
        .collect();
    let ranks = rank_within_clusters(&teams, &fit.assignments, &scores);

    let mut out = ClusterOutput::default();
    for (i, team) in teams.iter().enumerate() {
        let cats = categories
            .iter()
            .zip(&raw[i])
            .map(|(c, v)| (c.to_string(), round2(*v)))
            .collect();
        out.teams.insert(
            *team,
            TeamClusterProfile {
                cluster: fit.assignments[i],
                rank: ranks[i],
                score: scores[i],
                categories: cats,
            },
        );
    }

    for c in 0..fit.centroids.len() {
        let members: Vec<usize> = (0..teams.len()).filter(|&i| fit.assignments[i] == c).collect();
        if members.is_empty() {
            continue;
        }
        let summary = categories
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let mean = members.iter().map(|&i| raw[i][j]).sum::<f64>() / members.len() as f64;
                (name.to_string(), round2(mean))
            })
            .collect();
        out.clusters.insert(c, summary);
    }

    log::info!(
        "clustered {} teams into {} clusters (inertia {:.3})",
        teams.len(),
        out.clusters.len(),
        fit.inertia
    );
    out.table = table;
    out
}

/// Zero-mean, unit-variance columns (population std). Constant columns become zero.
pub fn standardize_columns(raw: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let Some(first) = raw.first() else {
        return Vec::new();
    };
    let n = raw.len() as f64;
    let dims = first.len();
    let mut out = raw.to_vec();
    for j in 0..dims {
        let mean = raw.iter().map(|r| r[j]).sum::<f64>() / n;
        let var = raw.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        for row in &mut out {
            row[j] = if std < STDEV_EPSILON {
                0.0
            } else {
                (row[j] - mean) / std
            };
        }
    }
    out
}

/// Dot product of a standardized row with the cluster's |centroid| normalized to sum 1.
/// An all-zero centroid weighs every column equally.
pub fn intra_cluster_score(x: &[f64], centroid: &[f64]) -> f64 {
    let abs: Vec<f64> = centroid.iter().map(|c| c.abs()).collect();
    let total: f64 = abs.iter().sum();
    let weights: Vec<f64> = if total <= STDEV_EPSILON {
        vec![1.0 / abs.len().max(1) as f64; abs.len()]
    } else {
        abs.iter().map(|a| a / total).collect()
    };
    x.iter().zip(&weights).map(|(v, w)| v * w).sum()
}

/// 1-based rank within each cluster, score descending, team number ascending on ties.
pub fn rank_within_clusters(teams: &[TeamId], assignments: &[usize], scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..teams.len()).collect();
    order.sort_by(|&a, &b| {
        assignments[a]
            .cmp(&assignments[b])
            .then(scores[b].total_cmp(&scores[a]))
            .then(teams[a].cmp(&teams[b]))
    });
    let mut ranks = vec![0usize; teams.len()];
    let mut current: Option<usize> = None;
    let mut rank = 0usize;
    for i in order {
        if current != Some(assignments[i]) {
            current = Some(assignments[i]);
            rank = 0;
        }
        rank += 1;
        ranks[i] = rank;
    }
    ranks
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_restart_per_cluster_and_break_ties_by_team() {
        let teams = vec![TeamId(30), TeamId(10), TeamId(20), TeamId(40)];
        let assignments = vec![0, 0, 1, 0];
        let scores = vec![0.5, 0.5, -1.0, 2.0];
        let ranks = rank_within_clusters(&teams, &assignments, &scores);
        assert_eq!(ranks, vec![3, 2, 1, 1]);
    }

    #[test]
    fn score_uses_absolute_centroid_weights() {
        let s = intra_cluster_score(&[1.0, 2.0], &[-3.0, 1.0]);
        assert!((s - (0.75 + 0.5)).abs() < 1e-12);
    }

    #[test]
    fn constant_columns_standardize_to_zero() {
        let out = standardize_columns(&[vec![1.0, 5.0], vec![3.0, 5.0]]);
        assert_eq!(out, vec![vec![-1.0, 0.0], vec![1.0, 0.0]]);
    }
}
