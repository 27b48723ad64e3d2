use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::calibration::{AllianceTotalsPair, Outcome, classify_outcome};
use crate::heuristic::HeuristicScore;
use crate::observation::{Alliance, MatchKey, SkippedRow, TeamId};
use crate::regression::TeamPrediction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpcomingContribution {
    pub key: MatchKey,
    pub alliance: Alliance,
    pub prediction: TeamPrediction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRating {
    pub team: TeamId,
    pub matches: Vec<MatchKey>,
    pub elo_featured: BTreeMap<String, Option<f64>>,
    pub ai_cluster: Option<usize>,
    pub ai_cluster_rank: Option<usize>,
    pub ai_cluster_score: Option<f64>,
    pub ai_features: Option<BTreeMap<String, f64>>,
    pub upcoming: Vec<UpcomingContribution>,
}

impl TeamRating {
    pub fn new(team: TeamId) -> Self {
        Self {
            team,
            matches: Vec::new(),
            elo_featured: BTreeMap::new(),
            ai_cluster: None,
            ai_cluster_rank: None,
            ai_cluster_score: None,
            ai_features: None,
            upcoming: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMatchEntry {
    pub heuristic: HeuristicScore,
    pub ai_prediction: Option<TeamPrediction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllianceTotals {
    pub red: f64,
    pub blue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPredictionRecord {
    pub red: BTreeMap<TeamId, TeamMatchEntry>,
    pub blue: BTreeMap<TeamId, TeamMatchEntry>,
    /// `false` when fewer than three robots per side were scouted.
    pub complete: bool,
    pub ai_alliance_totals: Option<AllianceTotals>,
    pub elo_red_win: Option<f64>,
}

impl MatchPredictionRecord {
    pub fn side(&self, alliance: Alliance) -> &BTreeMap<TeamId, TeamMatchEntry> {
        match alliance {
            Alliance::Red => &self.red,
            Alliance::Blue => &self.blue,
        }
    }

    pub fn actual_total(&self, alliance: Alliance) -> f64 {
        self.side(alliance).values().map(|e| e.heuristic.total).sum()
    }

    pub fn outcome(&self) -> Outcome {
        classify_outcome(self.actual_total(Alliance::Red), self.actual_total(Alliance::Blue))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub skipped_observations: Vec<SkippedRow>,
    pub skipped_schedule_rows: Vec<SkippedRow>,
    pub resubmitted: usize,
    pub incomplete_matches: Vec<MatchKey>,
    pub cold_start_matches: Vec<MatchKey>,
    pub empty_training_matches: Vec<MatchKey>,
    pub degenerate_axes: Vec<String>,
    pub fallback_predictions: Vec<(MatchKey, TeamId)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineIndex {
    pub generated_at: String,
    pub teams: BTreeMap<TeamId, TeamRating>,
    pub matches: BTreeMap<MatchKey, MatchPredictionRecord>,
    /// Mean category scores per cluster id.
    pub clusters: BTreeMap<usize, BTreeMap<String, f64>>,
    pub unscouted: Vec<MatchKey>,
    pub diagnostics: Diagnostics,
}

impl PipelineIndex {
    pub fn team(&self, team: TeamId) -> Option<&TeamRating> {
        self.teams.get(&team)
    }

    pub fn match_record(&self, key: MatchKey) -> Option<&MatchPredictionRecord> {
        self.matches.get(&key)
    }

    /// Teams with a score on `axis`, best first. Ties go to the lower team number.
    pub fn rank_by_axis(&self, axis: &str) -> Vec<(TeamId, f64)> {
        let mut ranked: Vec<(TeamId, f64)> = self
            .teams
            .values()
            .filter_map(|t| Some((t.team, (*t.elo_featured.get(axis)?)?)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
    }

    /// Members of `cluster` in intra-cluster rank order.
    pub fn cluster_members(&self, cluster: usize) -> Vec<TeamId> {
        let mut members: Vec<(usize, TeamId)> = self
            .teams
            .values()
            .filter(|t| t.ai_cluster == Some(cluster))
            .map(|t| (t.ai_cluster_rank.unwrap_or(usize::MAX), t.team))
            .collect();
        members.sort();
        members.into_iter().map(|(_, team)| team).collect()
    }

    pub fn unscouted(&self) -> &[MatchKey] {
        &self.unscouted
    }

    /// Predicted against scouted alliance totals for every complete, predicted match.
    pub fn prediction_pairs(&self) -> Vec<AllianceTotalsPair> {
        self.matches
            .values()
            .filter(|m| m.complete)
            .filter_map(|m| {
                let predicted = m.ai_alliance_totals?;
                Some(AllianceTotalsPair {
                    predicted_red: predicted.red,
                    predicted_blue: predicted.blue,
                    actual_red: m.actual_total(Alliance::Red),
                    actual_blue: m.actual_total(Alliance::Blue),
                })
            })
            .collect()
    }

    /// Elo red-win probability and realised outcome for every complete match Elo could rate.
    pub fn elo_forecasts(&self) -> (Vec<f64>, Vec<Outcome>) {
        self.matches
            .values()
            .filter(|m| m.complete)
            .filter_map(|m| Some((m.elo_red_win?, m.outcome())))
            .unzip()
    }

    pub fn team_index_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.teams)
    }
}
