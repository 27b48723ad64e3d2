use std::collections::{BTreeMap, BTreeSet};

use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::alliance::{CompleteMatch, ScoredObservation, completeness_filter};
use crate::clustering::{ClusterOutput, ClusterStrategies, run_cluster_rating};
use crate::config::PipelineConfig;
use crate::elo::{EloAxis, FeatureEloOutput, run_feature_elo};
use crate::errors::PipelineError;
use crate::game_fields;
use crate::index::{
    AllianceTotals, Diagnostics, MatchPredictionRecord, PipelineIndex, TeamMatchEntry,
    TeamRating, UpcomingContribution,
};
use crate::observation::{
    Alliance, MatchKey, Observation, ScheduledMatch, TeamId, ingest_observations, parse_schedule,
    reconcile,
};
use crate::parallel::build_pool;
use crate::regression::{
    Aspect, RegressionOutput, build_regression_input, run_sequential_regression,
};

/// The game-specific pieces the engines are parameterised with.
pub struct Strategies {
    pub axes: Vec<EloAxis>,
    pub cluster: ClusterStrategies,
    pub aspects: Vec<Aspect>,
}

impl Default for Strategies {
    fn default() -> Self {
        Self {
            axes: game_fields::default_axes(),
            cluster: game_fields::default_strategies(),
            aspects: game_fields::default_aspects(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFile {
    #[serde(default)]
    pub observations: Vec<Value>,
    #[serde(default)]
    pub schedule: Vec<Value>,
}

/// Run every stage over raw JSON rows.
///
/// Malformed observation or schedule rows are skipped and listed in the diagnostics.
/// Fails only when there is nothing to rate.
pub fn run_pipeline(
    observations: &[Value],
    schedule: &[Value],
    cfg: &PipelineConfig,
) -> Result<PipelineIndex, PipelineError> {
    if observations.is_empty() {
        return Err(PipelineError::NoObservations);
    }
    let ingested = ingest_observations(observations);
    let (scheduled, schedule_skipped) = parse_schedule(schedule);
    log::info!(
        "ingested {} observations ({} skipped, {} resubmitted), {} scheduled matches",
        ingested.observations.len(),
        ingested.skipped.len(),
        ingested.resubmitted,
        scheduled.len()
    );
    if ingested.observations.is_empty() {
        return Err(PipelineError::NoValidObservations {
            skipped: ingested.skipped.len(),
        });
    }

    let diagnostics = Diagnostics {
        skipped_observations: ingested.skipped,
        skipped_schedule_rows: schedule_skipped,
        resubmitted: ingested.resubmitted,
        ..Diagnostics::default()
    };
    run_stages(
        ingested.observations,
        scheduled,
        cfg,
        &Strategies::default(),
        diagnostics,
    )
}

pub fn run_typed(
    observations: Vec<Observation>,
    schedule: Vec<ScheduledMatch>,
    cfg: &PipelineConfig,
) -> Result<PipelineIndex, PipelineError> {
    run_typed_with(observations, schedule, cfg, &Strategies::default())
}

/// Typed rows still go through duplicate and conflict resolution; row indices in the
/// diagnostics refer to positions in `observations`.
pub fn run_typed_with(
    observations: Vec<Observation>,
    schedule: Vec<ScheduledMatch>,
    cfg: &PipelineConfig,
    strategies: &Strategies,
) -> Result<PipelineIndex, PipelineError> {
    if observations.is_empty() {
        return Err(PipelineError::NoObservations);
    }
    let reconciled = reconcile(observations.into_iter().enumerate());
    if reconciled.observations.is_empty() {
        return Err(PipelineError::NoValidObservations {
            skipped: reconciled.skipped.len(),
        });
    }
    let diagnostics = Diagnostics {
        skipped_observations: reconciled.skipped,
        resubmitted: reconciled.resubmitted,
        ..Diagnostics::default()
    };
    run_stages(reconciled.observations, schedule, cfg, strategies, diagnostics)
}

fn run_stages(
    observations: Vec<Observation>,
    schedule: Vec<ScheduledMatch>,
    cfg: &PipelineConfig,
    strategies: &Strategies,
    mut diagnostics: Diagnostics,
) -> Result<PipelineIndex, PipelineError> {
    let scored: Vec<ScoredObservation> = observations.into_iter().map(ScoredObservation::new).collect();

    let completeness = completeness_filter(&scored);
    log::info!(
        "{} complete matches, {} incomplete",
        completeness.complete.len(),
        completeness.incomplete.len()
    );
    let complete = completeness.complete;

    let pool = build_pool(cfg.parallelism)?;

    log::info!("feature elo over {} axes", strategies.axes.len());
    let elo = run_feature_elo(
        &scored,
        &complete,
        &strategies.axes,
        &cfg.binning,
        &cfg.elo,
        &pool,
    );
    let cluster = run_cluster_rating(&scored, &complete, &strategies.cluster, &cfg.cluster);

    let scouted: BTreeSet<MatchKey> = scored.iter().map(|s| s.key()).collect();
    let upcoming: Vec<ScheduledMatch> = schedule
        .iter()
        .filter(|s| !scouted.contains(&s.key))
        .cloned()
        .collect();
    let input = build_regression_input(&scored, &complete, &cluster.table, &strategies.aspects);
    let regression = run_sequential_regression(&input, &upcoming, &cfg.forest, &pool);

    let complete_keys: BTreeSet<MatchKey> = complete.iter().map(|m| m.key).collect();
    let unscouted: Vec<MatchKey> = schedule
        .iter()
        .map(|s| s.key)
        .chain(completeness.incomplete.iter().copied())
        .filter(|k| !complete_keys.contains(k))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    diagnostics.incomplete_matches = completeness.incomplete;
    diagnostics.cold_start_matches = regression.cold_start.clone();
    diagnostics.empty_training_matches = regression.empty_training.clone();
    diagnostics.degenerate_axes = elo.degenerate_axes();
    diagnostics.fallback_predictions = regression.fallbacks.clone();

    let teams = merge_teams(&scored, &complete, &elo, &cluster, &regression);
    let matches = merge_matches(&scored, &complete, &elo, &regression);
    log::info!("index built: {} teams, {} matches", teams.len(), matches.len());

    Ok(PipelineIndex {
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        teams,
        matches,
        clusters: cluster.clusters,
        unscouted,
        diagnostics,
    })
}

fn merge_teams(
    scored: &[ScoredObservation],
    complete: &[CompleteMatch],
    elo: &FeatureEloOutput,
    cluster: &ClusterOutput,
    regression: &RegressionOutput,
) -> BTreeMap<TeamId, TeamRating> {
    let mut teams: BTreeMap<TeamId, TeamRating> = BTreeMap::new();
    for s in scored {
        let rating = teams
            .entry(s.team())
            .or_insert_with(|| TeamRating::new(s.team()));
        rating.matches.push(s.key());
    }

    let mut rated: BTreeMap<TeamId, Vec<&ScoredObservation>> = BTreeMap::new();
    for m in complete {
        for idx in m.members() {
            rated.entry(scored[idx].team()).or_default().push(&scored[idx]);
        }
    }

    for (team, rating) in teams.iter_mut() {
        let team_obs = rated.get(team).map(Vec::as_slice).unwrap_or_default();
        rating.elo_featured = elo.team_scores(team_obs);
        if let Some(profile) = cluster.teams.get(team) {
            rating.ai_cluster = Some(profile.cluster);
            rating.ai_cluster_rank = Some(profile.rank);
            rating.ai_cluster_score = Some(profile.score);
            rating.ai_features = Some(profile.categories.clone());
        }
    }

    for p in &regression.upcoming {
        for (alliance, side) in [(Alliance::Red, &p.red), (Alliance::Blue, &p.blue)] {
            for (team, prediction) in side {
                let rating = teams
                    .entry(*team)
                    .or_insert_with(|| TeamRating::new(*team));
                rating.upcoming.push(UpcomingContribution {
                    key: p.key,
                    alliance,
                    prediction: prediction.clone(),
                });
            }
        }
    }
    teams
}

fn merge_matches(
    scored: &[ScoredObservation],
    complete: &[CompleteMatch],
    elo: &FeatureEloOutput,
    regression: &RegressionOutput,
) -> BTreeMap<MatchKey, MatchPredictionRecord> {
    let mut matches: BTreeMap<MatchKey, MatchPredictionRecord> = BTreeMap::new();
    for s in scored {
        let prediction = regression.prediction(s.key());
        let record = matches.entry(s.key()).or_insert_with(|| MatchPredictionRecord {
            red: BTreeMap::new(),
            blue: BTreeMap::new(),
            complete: false,
            ai_alliance_totals: prediction.map(|p| AllianceTotals {
                red: p.red_total,
                blue: p.blue_total,
            }),
            elo_red_win: None,
        });
        let entry = TeamMatchEntry {
            heuristic: s.heuristic,
            ai_prediction: prediction.and_then(|p| p.team(s.team()).cloned()),
        };
        match s.alliance() {
            Alliance::Red => record.red.insert(s.team(), entry),
            Alliance::Blue => record.blue.insert(s.team(), entry),
        };
    }

    for m in complete {
        let Some(record) = matches.get_mut(&m.key) else {
            continue;
        };
        record.complete = true;
        let red: Vec<&ScoredObservation> = m.red.iter().map(|&i| &scored[i]).collect();
        let blue: Vec<&ScoredObservation> = m.blue.iter().map(|&i| &scored[i]).collect();
        record.elo_red_win = elo.red_win_probability(&red, &blue);
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_input_is_fatal() {
        let err = run_pipeline(&[], &[], &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::NoObservations));
    }

    #[test]
    fn all_malformed_is_fatal() {
        let rows = vec![json!({"match_type": "qm"}), json!("not a row")];
        let err = run_pipeline(&rows, &[], &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::NoValidObservations { skipped: 2 }));
    }
}
