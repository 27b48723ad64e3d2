use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use scout_ratings::elo::{EloConfig, EloGame, expected_score, train_feature_elo};

const TAGS: [&str; 4] = ["auto_low", "auto_mid", "auto_high", "auto_elite"];

fn side(rng: &mut StdRng) -> Vec<usize> {
    (0..3).map(|_| rng.gen_range(0..TAGS.len())).collect()
}

fn tags(idx: &[usize]) -> Vec<String> {
    idx.iter().map(|&i| TAGS[i].to_string()).collect()
}

/// Outcome driven by tag strength plus noise, drawn identically for both sides.
fn symmetric_games(n: usize, seed: u64) -> Vec<EloGame> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let red = side(&mut rng);
            let blue = side(&mut rng);
            let mut strength =
                |s: &[usize]| s.iter().sum::<usize>() as f64 + rng.r#gen::<f64>() * 1.5;
            let r = strength(&red);
            let b = strength(&blue);
            let outcome = if r > b {
                1.0
            } else if r < b {
                0.0
            } else {
                0.5
            };
            EloGame {
                red: tags(&red),
                blue: tags(&blue),
                outcome,
            }
        })
        .collect()
}

#[test]
fn mean_rating_stays_near_base() {
    let cfg = EloConfig::default();
    let ratings = train_feature_elo(&symmetric_games(300, 7), &cfg);
    assert_eq!(ratings.len(), TAGS.len());
    let mean = ratings.values().sum::<f64>() / ratings.len() as f64;
    assert!((mean - cfg.base_rating).abs() < 10.0, "mean drifted to {mean}");
}

#[test]
fn ratings_order_by_tag_strength() {
    let ratings = train_feature_elo(&symmetric_games(300, 11), &EloConfig::default());
    for pair in TAGS.windows(2) {
        assert!(ratings[pair[0]] < ratings[pair[1]], "{} !< {}", pair[0], pair[1]);
    }
}

#[test]
fn retraining_is_deterministic() {
    let games = symmetric_games(50, 3);
    let a = train_feature_elo(&games, &EloConfig::default());
    let b = train_feature_elo(&games, &EloConfig::default());
    assert_eq!(a, b);
}

#[test]
fn expectation_is_symmetric() {
    let p = expected_score(1100.0, 1000.0);
    assert!((p + expected_score(1000.0, 1100.0) - 1.0).abs() < 1e-12);
    assert!((expected_score(1000.0, 1000.0) - 0.5).abs() < 1e-12);
}

#[test]
fn balanced_round_robin_keeps_every_tag_at_base() {
    let mut games = Vec::new();
    for _ in 0..10 {
        for (i, red) in TAGS.iter().enumerate() {
            for (j, blue) in TAGS.iter().enumerate() {
                if i == j {
                    continue;
                }
                for outcome in [1.0, 0.0] {
                    games.push(EloGame {
                        red: vec![red.to_string()],
                        blue: vec![blue.to_string()],
                        outcome,
                    });
                }
            }
        }
    }

    let cfg = EloConfig::default();
    let ratings = train_feature_elo(&games, &cfg);
    assert_eq!(ratings.len(), TAGS.len());
    for (tag, rating) in &ratings {
        assert!((rating - cfg.base_rating).abs() < 1.0, "{tag} drifted to {rating}");
    }
}
