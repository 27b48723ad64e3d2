use serde::{Deserialize, Serialize};

use crate::observation::{ClimbState, CoralCounts, Observation};

pub const AUTO_LEAVE_PTS: f64 = 3.0;
pub const AUTO_CORAL_PTS: [f64; 4] = [3.0, 4.0, 6.0, 7.0];
pub const TELEOP_CORAL_PTS: [f64; 4] = [2.0, 3.0, 4.0, 5.0];
pub const PROCESSOR_PTS: f64 = 6.0;
pub const NET_PTS: f64 = 4.0;
pub const PARK_PTS: f64 = 2.0;
pub const SHALLOW_CAGE_PTS: f64 = 6.0;
pub const DEEP_CAGE_PTS: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AutoPoints {
    pub leave: f64,
    pub coral: f64,
    pub algae: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TeleopPoints {
    pub coral: f64,
    pub algae: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EndgamePoints {
    pub climb: f64,
    pub total: f64,
}

/// Point estimate of one robot's contribution, from counted actions and game weights.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HeuristicScore {
    pub auto: AutoPoints,
    pub teleop: TeleopPoints,
    pub endgame: EndgamePoints,
    pub total: f64,
}

pub fn score_observation(obs: &Observation) -> HeuristicScore {
    let leave = if obs.auto.leave { AUTO_LEAVE_PTS } else { 0.0 };
    let auto_coral = coral_points(&obs.auto.coral, &AUTO_CORAL_PTS);
    let auto_algae = algae_points(obs.auto.algae_processor, obs.auto.algae_net);
    let auto = AutoPoints {
        leave,
        coral: auto_coral,
        algae: auto_algae,
        total: leave + auto_coral + auto_algae,
    };

    let tele_coral = coral_points(&obs.teleop.coral, &TELEOP_CORAL_PTS);
    let tele_algae = algae_points(obs.teleop.algae_processor, obs.teleop.algae_net);
    let teleop = TeleopPoints {
        coral: tele_coral,
        algae: tele_algae,
        total: tele_coral + tele_algae,
    };

    let climb = climb_points(obs.postmatch.climb);
    let endgame = EndgamePoints {
        climb,
        total: climb,
    };

    HeuristicScore {
        auto,
        teleop,
        endgame,
        total: auto.total + teleop.total + endgame.total,
    }
}

pub fn climb_points(climb: ClimbState) -> f64 {
    match climb {
        ClimbState::None => 0.0,
        ClimbState::Park => PARK_PTS,
        ClimbState::Shallow => SHALLOW_CAGE_PTS,
        ClimbState::Deep => DEEP_CAGE_PTS,
    }
}

fn coral_points(counts: &CoralCounts, weights: &[f64; 4]) -> f64 {
    counts
        .levels()
        .iter()
        .zip(weights)
        .map(|(n, w)| *n as f64 * w)
        .sum()
}

fn algae_points(processor: u32, net: u32) -> f64 {
    processor as f64 * PROCESSOR_PTS + net as f64 * NET_PTS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{Alliance, AutoActions, MatchKey, Postmatch, TeamId, TeleopActions};

    #[test]
    fn breakdown_sums_to_total() {
        let obs = Observation {
            key: MatchKey::qual(1),
            alliance: Alliance::Red,
            team: TeamId(254),
            auto: AutoActions {
                leave: true,
                coral: CoralCounts { l1: 0, l2: 0, l3: 0, l4: 2 },
                algae_processor: 1,
                algae_net: 0,
                coral_missed: 1,
            },
            teleop: TeleopActions {
                coral: CoralCounts { l1: 1, l2: 2, l3: 0, l4: 5 },
                algae_processor: 0,
                algae_net: 3,
                coral_missed: 0,
                algae_missed: 0,
            },
            postmatch: Postmatch {
                climb: ClimbState::Deep,
            },
        };
        let s = score_observation(&obs);
        assert_eq!(s.auto.total, 3.0 + 14.0 + 6.0);
        assert_eq!(s.teleop.coral, 2.0 + 6.0 + 25.0);
        assert_eq!(s.teleop.algae, 12.0);
        assert_eq!(s.endgame.total, 12.0);
        assert_eq!(s.total, 23.0 + 33.0 + 12.0 + 12.0);
    }
}
