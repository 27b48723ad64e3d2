use scout_ratings::binning::{BinningConfig, QuantileBinner};
use scout_ratings::heuristic::score_observation;
use scout_ratings::observation::{
    AutoActions, ClimbState, CoralCounts, Postmatch, TeleopActions,
};
use scout_ratings::{Alliance, MatchKey, Observation, TeamId};

fn ident(v: &f64) -> Option<f64> {
    Some(*v)
}

#[test]
fn binning_is_monotone_over_one_to_hundred() {
    let values: Vec<f64> = (1..=100).map(f64::from).collect();
    let binner = QuantileBinner::fit("coral", &values, ident, &BinningConfig::default());
    assert_eq!(binner.bins(), 4);

    let idx: Vec<usize> = values
        .iter()
        .map(|v| binner.bin_index(*v).expect("in range"))
        .collect();
    assert!(idx.windows(2).all(|w| w[0] <= w[1]));

    let mut counts = [0usize; 4];
    for i in &idx {
        counts[*i] += 1;
    }
    assert_eq!(counts, [25, 25, 25, 25]);
    assert_eq!(binner.tag(&26.0), vec!["coral_mid".to_string()]);
}

#[test]
fn out_of_range_and_non_finite_values_get_no_tag() {
    let values: Vec<f64> = (1..=100).map(f64::from).collect();
    let binner = QuantileBinner::fit("coral", &values, ident, &BinningConfig::default());
    assert!(binner.tag(&0.5).is_empty());
    assert!(binner.tag(&100.5).is_empty());
    assert!(binner.tag(&f64::INFINITY).is_empty());
    assert!(binner.tag(&f64::NAN).is_empty());
}

#[test]
fn custom_labels_follow_bin_count() {
    let values: Vec<f64> = (0..30).map(f64::from).collect();
    let cfg = BinningConfig {
        n_bins: 3,
        labels: None,
    };
    let binner = QuantileBinner::fit("algae", &values, ident, &cfg);
    assert_eq!(binner.label_for(0.0).as_deref(), Some("algae_q1"));
    assert_eq!(binner.label_for(29.0).as_deref(), Some("algae_q3"));
}

fn sample() -> Observation {
    Observation {
        key: MatchKey::qual(7),
        alliance: Alliance::Blue,
        team: TeamId(1678),
        auto: AutoActions {
            leave: true,
            coral: CoralCounts {
                l1: 1,
                l2: 0,
                l3: 0,
                l4: 2,
            },
            algae_processor: 1,
            algae_net: 0,
            coral_missed: 1,
        },
        teleop: TeleopActions {
            coral: CoralCounts {
                l1: 2,
                l2: 1,
                l3: 0,
                l4: 3,
            },
            algae_processor: 0,
            algae_net: 2,
            coral_missed: 3,
            algae_missed: 0,
        },
        postmatch: Postmatch {
            climb: ClimbState::Deep,
        },
    }
}

#[test]
fn heuristic_points_follow_game_values() {
    let h = score_observation(&sample());
    // auto: leave 3 + coral 3 + 14 + processor 6
    assert_eq!(h.auto.total, 26.0);
    // teleop: coral 4 + 3 + 15, net 8
    assert_eq!(h.teleop.coral, 22.0);
    assert_eq!(h.teleop.algae, 8.0);
    assert_eq!(h.endgame.total, 12.0);
    assert_eq!(h.total, 68.0);
}

#[test]
fn heuristic_scoring_is_idempotent() {
    let obs = sample();
    let first = score_observation(&obs);
    let second = score_observation(&obs);
    assert_eq!(first, second);

    let roundtrip: Observation =
        serde_json::from_str(&serde_json::to_string(&obs).expect("serializes")).expect("parses");
    assert_eq!(score_observation(&roundtrip), first);
}

#[test]
fn missed_attempts_do_not_score() {
    let mut obs = sample();
    let before = score_observation(&obs).total;
    obs.teleop.coral_missed += 10;
    obs.auto.coral_missed += 10;
    assert_eq!(score_observation(&obs).total, before);
}
