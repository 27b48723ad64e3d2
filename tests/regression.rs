use proptest::prelude::*;

use scout_ratings::alliance::{ScoredObservation, completeness_filter};
use scout_ratings::clustering::build_row_table;
use scout_ratings::forest::ForestConfig;
use scout_ratings::game_fields::{default_aspects, default_strategies};
use scout_ratings::observation::{
    AutoActions, ClimbState, CoralCounts, Postmatch, TeleopActions,
};
use scout_ratings::parallel::build_pool;
use scout_ratings::regression::{
    RegressionInput, RegressionOutput, build_regression_input, run_sequential_regression,
    training_set,
};
use scout_ratings::{Alliance, MatchKey, Observation, TeamId};

fn observation(number: u32, team: u32, alliance: Alliance, skill: u32) -> Observation {
    Observation {
        key: MatchKey::qual(number),
        alliance,
        team: TeamId(team),
        auto: AutoActions {
            leave: skill > 1,
            coral: CoralCounts {
                l1: 1,
                l2: 0,
                l3: skill % 2,
                l4: skill / 2,
            },
            algae_processor: skill % 3,
            algae_net: 0,
            coral_missed: 1,
        },
        teleop: TeleopActions {
            coral: CoralCounts {
                l1: 2,
                l2: skill,
                l3: 1,
                l4: skill,
            },
            algae_processor: 1,
            algae_net: skill % 4,
            coral_missed: 2,
            algae_missed: 1,
        },
        postmatch: Postmatch {
            climb: if skill > 3 {
                ClimbState::Deep
            } else {
                ClimbState::Park
            },
        },
    }
}

fn lineup(number: u32, red: [u32; 3], blue: [u32; 3], skill: impl Fn(u32) -> u32) -> Vec<Observation> {
    red.iter()
        .map(|&t| observation(number, t, Alliance::Red, skill(t)))
        .chain(blue.iter().map(|&t| observation(number, t, Alliance::Blue, skill(t))))
        .collect()
}

fn small_forest() -> ForestConfig {
    ForestConfig {
        n_trees: 8,
        ..ForestConfig::default()
    }
}

fn prepare(mut observations: Vec<Observation>) -> RegressionInput {
    observations.sort_by(|a, b| (a.key, a.alliance, a.team).cmp(&(b.key, b.alliance, b.team)));
    let scored: Vec<ScoredObservation> = observations.into_iter().map(ScoredObservation::new).collect();
    let complete = completeness_filter(&scored).complete;
    let table = build_row_table(&scored, &complete, &default_strategies());
    build_regression_input(&scored, &complete, &table, &default_aspects())
}

fn regress(input: &RegressionInput) -> RegressionOutput {
    let pool = build_pool(2).expect("pool");
    run_sequential_regression(input, &[], &small_forest(), &pool)
}

#[test]
fn first_appearance_skips_the_whole_match() {
    let skill = |t: u32| t % 5;
    let mut obs = lineup(1, [1, 2, 3], [4, 5, 6], skill);
    obs.extend(lineup(2, [1, 2, 3], [4, 5, 7], skill));
    obs.extend(lineup(3, [6, 2, 3], [4, 5, 1], skill));
    obs.extend(lineup(4, [7, 2, 3], [4, 5, 6], skill));

    let input = prepare(obs);
    let out = regress(&input);

    assert_eq!(out.cold_start, vec![MatchKey::qual(1), MatchKey::qual(2)]);
    let predicted: Vec<MatchKey> = out.predictions.iter().map(|p| p.key).collect();
    assert_eq!(predicted, vec![MatchKey::qual(3), MatchKey::qual(4)]);

    let qm3 = &out.predictions[0];
    assert_eq!(qm3.training_samples, 12);
    assert_eq!(qm3.red.len() + qm3.blue.len(), 6);
    assert!(out.fallbacks.is_empty());
}

#[test]
fn team_totals_are_sums_of_aspects() {
    let skill = |t: u32| t % 5;
    let mut obs = lineup(1, [1, 2, 3], [4, 5, 6], skill);
    obs.extend(lineup(2, [4, 2, 6], [1, 5, 3], skill));
    obs.extend(lineup(3, [1, 5, 6], [4, 2, 3], skill));

    let out = regress(&prepare(obs));
    for p in &out.predictions {
        for tp in p.red.values().chain(p.blue.values()) {
            let sum: f64 = tp.aspects.values().sum();
            assert!((tp.total - sum).abs() < 1e-9);
            assert_eq!(tp.aspects.len(), 4);
        }
        let red: f64 = p.red.values().map(|t| t.total).sum();
        assert!((p.red_total - red).abs() < 1e-9);
    }
}

#[test]
fn upcoming_matches_train_on_everything_scouted() {
    let skill = |t: u32| t % 5;
    let mut obs = lineup(1, [1, 2, 3], [4, 5, 6], skill);
    obs.extend(lineup(2, [4, 2, 6], [1, 5, 3], skill));
    let input = prepare(obs);
    let upcoming = vec![
        scout_ratings::observation::ScheduledMatch {
            key: MatchKey::qual(3),
            red: vec![TeamId(1), TeamId(2), TeamId(3)],
            blue: vec![TeamId(4), TeamId(5), TeamId(6)],
        },
        scout_ratings::observation::ScheduledMatch {
            key: MatchKey::qual(4),
            red: vec![TeamId(1), TeamId(2), TeamId(3)],
            blue: vec![TeamId(4), TeamId(5), TeamId(99)],
        },
    ];
    let pool = build_pool(2).expect("pool");
    let out = run_sequential_regression(&input, &upcoming, &small_forest(), &pool);

    assert_eq!(out.upcoming.len(), 1);
    assert_eq!(out.upcoming[0].training_samples, 12);
    assert!(out.cold_start.contains(&MatchKey::qual(4)));
}

fn arb_event() -> impl Strategy<Value = Vec<(Vec<u32>, Vec<u32>)>> {
    // Each match: a shuffled pick of six of eight teams, and a skill per slot.
    prop::collection::vec(
        (Just((1..=8u32).collect::<Vec<u32>>()).prop_shuffle(), prop::collection::vec(0u32..6, 6)),
        2..7,
    )
}

fn build_event(matches: &[(Vec<u32>, Vec<u32>)]) -> Vec<Observation> {
    let mut obs = Vec::new();
    for (i, (teams, skills)) in matches.iter().enumerate() {
        let number = i as u32 + 1;
        for slot in 0..6 {
            let alliance = if slot < 3 { Alliance::Red } else { Alliance::Blue };
            obs.push(observation(number, teams[slot], alliance, skills[slot]));
        }
    }
    obs
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn training_never_sees_the_predicted_match_or_later(matches in arb_event()) {
        let input = prepare(build_event(&matches));
        for m in &input.matches {
            for s in training_set(&input, m.key) {
                prop_assert!(s.key < m.key);
            }
        }
    }

    #[test]
    fn later_matches_do_not_change_earlier_predictions(matches in arb_event()) {
        let full_input = prepare(build_event(&matches));
        let full = regress(&full_input);

        let cut = matches.len() - 1;
        let prefix_input = prepare(build_event(&matches[..cut]));
        let prefix = regress(&prefix_input);

        let cut_key = MatchKey::qual(cut as u32);
        for s in prefix_input.samples.iter() {
            let same = full_input
                .samples
                .iter()
                .find(|f| f.key == s.key && f.team == s.team)
                .expect("sample present in full run");
            prop_assert_eq!(&same.features, &s.features);
        }
        let earlier: Vec<_> = full.predictions.iter().filter(|p| p.key <= cut_key).collect();
        prop_assert_eq!(earlier.len(), prefix.predictions.len());
        for (a, b) in earlier.iter().zip(prefix.predictions.iter()) {
            prop_assert_eq!(*a, b);
        }
    }
}
