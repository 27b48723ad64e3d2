use std::collections::BTreeMap;

use serde::Serialize;

use crate::calibration::{Outcome, classify_outcome};
use crate::heuristic::{HeuristicScore, score_observation};
use crate::observation::{Alliance, MatchKey, Observation, TeamId};

pub const ALLIANCE_SIZE: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredObservation {
    pub observation: Observation,
    pub heuristic: HeuristicScore,
}

impl ScoredObservation {
    pub fn new(observation: Observation) -> Self {
        let heuristic = score_observation(&observation);
        Self {
            observation,
            heuristic,
        }
    }

    pub fn key(&self) -> MatchKey {
        self.observation.key
    }

    pub fn team(&self) -> TeamId {
        self.observation.team
    }

    pub fn alliance(&self) -> Alliance {
        self.observation.alliance
    }
}

/// A match with exactly three scouted robots on each side. Sides hold indices into the
/// observation slice the match was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteMatch {
    pub key: MatchKey,
    pub red: Vec<usize>,
    pub blue: Vec<usize>,
}

impl CompleteMatch {
    pub fn side(&self, alliance: Alliance) -> &[usize] {
        match alliance {
            Alliance::Red => &self.red,
            Alliance::Blue => &self.blue,
        }
    }

    pub fn members(&self) -> impl Iterator<Item = usize> + '_ {
        self.red.iter().chain(self.blue.iter()).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AllianceOutcome {
    pub key: MatchKey,
    pub alliance: Alliance,
    pub total: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Completeness {
    pub complete: Vec<CompleteMatch>,
    pub incomplete: Vec<MatchKey>,
}

/// Split scouted matches into fully scouted ones (3 + 3 distinct teams) and the rest.
/// `complete` comes out in chronological order.
pub fn completeness_filter(observations: &[ScoredObservation]) -> Completeness {
    let mut groups: BTreeMap<MatchKey, (Vec<usize>, Vec<usize>)> = BTreeMap::new();
    for (idx, obs) in observations.iter().enumerate() {
        let entry = groups.entry(obs.key()).or_default();
        match obs.alliance() {
            Alliance::Red => entry.0.push(idx),
            Alliance::Blue => entry.1.push(idx),
        }
    }

    let mut out = Completeness::default();
    for (key, (red, blue)) in groups {
        if distinct_teams(observations, &red) == ALLIANCE_SIZE
            && distinct_teams(observations, &blue) == ALLIANCE_SIZE
            && red.len() == ALLIANCE_SIZE
            && blue.len() == ALLIANCE_SIZE
        {
            out.complete.push(CompleteMatch { key, red, blue });
        } else {
            log::debug!(
                "match {key} incomplete: {} red / {} blue observations",
                red.len(),
                blue.len()
            );
            out.incomplete.push(key);
        }
    }
    out
}

fn distinct_teams(observations: &[ScoredObservation], side: &[usize]) -> usize {
    let mut teams: Vec<TeamId> = side.iter().map(|&i| observations[i].team()).collect();
    teams.sort();
    teams.dedup();
    teams.len()
}

pub fn alliance_outcomes(
    observations: &[ScoredObservation],
    m: &CompleteMatch,
) -> (AllianceOutcome, AllianceOutcome) {
    let total = |side: &[usize]| -> f64 {
        side.iter()
            .map(|&i| observations[i].heuristic.total)
            .sum()
    };
    (
        AllianceOutcome {
            key: m.key,
            alliance: Alliance::Red,
            total: total(&m.red),
        },
        AllianceOutcome {
            key: m.key,
            alliance: Alliance::Blue,
            total: total(&m.blue),
        },
    )
}

/// Actual score from red's point of view: 1.0 red win, 0.0 blue win, 0.5 tie.
pub fn red_result(red: &AllianceOutcome, blue: &AllianceOutcome) -> f64 {
    match classify_outcome(red.total, blue.total) {
        Outcome::Red => 1.0,
        Outcome::Blue => 0.0,
        Outcome::Tie => 0.5,
    }
}
