use crate::alliance::ScoredObservation;
use crate::clustering::{
    CategoryScore, ClusterStrategies, DerivedFeature, FeatureRow, FieldExtractor, RowContext,
    RowTable,
};
use crate::elo::EloAxis;
use crate::observation::ClimbState;
use crate::regression::Aspect;

pub fn default_strategies() -> ClusterStrategies {
    ClusterStrategies {
        extractors: vec![
            FieldExtractor {
                name: "auto_counts",
                extract: auto_counts,
            },
            FieldExtractor {
                name: "teleop_counts",
                extract: teleop_counts,
            },
            FieldExtractor {
                name: "endgame",
                extract: endgame_fields,
            },
            FieldExtractor {
                name: "heuristic_points",
                extract: heuristic_points,
            },
        ],
        derived: vec![
            DerivedFeature {
                name: "totals",
                derive: derive_totals,
            },
            DerivedFeature {
                name: "level_share",
                derive: derive_level_share,
            },
            DerivedFeature {
                name: "make_rates",
                derive: derive_make_rates,
            },
            DerivedFeature {
                name: "point_shares",
                derive: derive_point_shares,
            },
        ],
        categories: default_categories(),
    }
}

pub fn default_categories() -> Vec<CategoryScore> {
    vec![
        CategoryScore::new(
            "coral",
            &[
                ("teleop_coral_points", 1.0),
                ("l4_share", 10.0),
                ("coral_make_rate", 5.0),
            ],
        ),
        CategoryScore::new(
            "algae",
            &[("teleop_algae_points", 1.0), ("algae_make_rate", 5.0)],
        ),
        CategoryScore::new("auto", &[("auto_points", 1.0), ("auto_leave", 2.0)]),
        CategoryScore::new("endgame", &[("endgame_points", 1.0)]),
    ]
}

pub fn default_axes() -> Vec<EloAxis> {
    vec![
        EloAxis {
            name: "auto",
            extract: auto_pts,
        },
        EloAxis {
            name: "coral",
            extract: coral_pts,
        },
        EloAxis {
            name: "algae",
            extract: algae_pts,
        },
        EloAxis {
            name: "endgame",
            extract: endgame_pts,
        },
    ]
}

/// Heuristic sub-totals; together they sum to the observation's total.
pub fn default_aspects() -> Vec<Aspect> {
    vec![
        Aspect {
            name: "auto",
            value: auto_pts,
        },
        Aspect {
            name: "coral",
            value: coral_pts,
        },
        Aspect {
            name: "algae",
            value: algae_pts,
        },
        Aspect {
            name: "endgame",
            value: endgame_pts,
        },
    ]
}

fn auto_pts(s: &ScoredObservation) -> Option<f64> {
    Some(s.heuristic.auto.total)
}

fn coral_pts(s: &ScoredObservation) -> Option<f64> {
    Some(s.heuristic.teleop.coral)
}

fn algae_pts(s: &ScoredObservation) -> Option<f64> {
    Some(s.heuristic.teleop.algae)
}

fn endgame_pts(s: &ScoredObservation) -> Option<f64> {
    Some(s.heuristic.endgame.total)
}

fn auto_counts(ctx: &RowContext<'_>) -> Vec<(&'static str, f64)> {
    let a = &ctx.scored.observation.auto;
    vec![
        ("auto_leave", if a.leave { 1.0 } else { 0.0 }),
        ("auto_coral_l1", a.coral.l1 as f64),
        ("auto_coral_l2", a.coral.l2 as f64),
        ("auto_coral_l3", a.coral.l3 as f64),
        ("auto_coral_l4", a.coral.l4 as f64),
        ("auto_algae_processor", a.algae_processor as f64),
        ("auto_algae_net", a.algae_net as f64),
        ("auto_coral_missed", a.coral_missed as f64),
    ]
}

fn teleop_counts(ctx: &RowContext<'_>) -> Vec<(&'static str, f64)> {
    let t = &ctx.scored.observation.teleop;
    vec![
        ("teleop_coral_l1", t.coral.l1 as f64),
        ("teleop_coral_l2", t.coral.l2 as f64),
        ("teleop_coral_l3", t.coral.l3 as f64),
        ("teleop_coral_l4", t.coral.l4 as f64),
        ("teleop_algae_processor", t.algae_processor as f64),
        ("teleop_algae_net", t.algae_net as f64),
        ("teleop_coral_missed", t.coral_missed as f64),
        ("teleop_algae_missed", t.algae_missed as f64),
    ]
}

fn endgame_fields(ctx: &RowContext<'_>) -> Vec<(&'static str, f64)> {
    let climb = ctx.scored.observation.postmatch.climb;
    vec![
        ("climb_deep", f64::from(u8::from(climb == ClimbState::Deep))),
        (
            "climb_attempted",
            f64::from(u8::from(matches!(climb, ClimbState::Shallow | ClimbState::Deep))),
        ),
    ]
}

fn heuristic_points(ctx: &RowContext<'_>) -> Vec<(&'static str, f64)> {
    let h = &ctx.scored.heuristic;
    vec![
        ("auto_points", h.auto.total),
        ("teleop_coral_points", h.teleop.coral),
        ("teleop_algae_points", h.teleop.algae),
        ("endgame_points", h.endgame.total),
        ("total_points", h.total),
    ]
}

fn col(row: &FeatureRow, name: &str) -> f64 {
    row.value(name).unwrap_or(0.0)
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 { num / den } else { 0.0 }
}

fn derive_totals(table: &mut RowTable) {
    for row in &mut table.rows {
        let coral: f64 = (1..=4)
            .map(|l| col(row, &format!("auto_coral_l{l}")) + col(row, &format!("teleop_coral_l{l}")))
            .sum();
        let algae = col(row, "auto_algae_processor")
            + col(row, "auto_algae_net")
            + col(row, "teleop_algae_processor")
            + col(row, "teleop_algae_net");
        row.set("coral_total", coral);
        row.set("algae_total", algae);
    }
}

// Share of scored coral placed on each level. This is how often a robot uses a level,
// not how often its attempts at that level succeed.
fn derive_level_share(table: &mut RowTable) {
    for row in &mut table.rows {
        let total = col(row, "coral_total");
        for l in 1..=4 {
            let used = col(row, &format!("auto_coral_l{l}")) + col(row, &format!("teleop_coral_l{l}"));
            row.set(&format!("l{l}_share"), ratio(used, total));
        }
    }
}

fn derive_make_rates(table: &mut RowTable) {
    for row in &mut table.rows {
        let coral = col(row, "coral_total");
        let coral_missed = col(row, "auto_coral_missed") + col(row, "teleop_coral_missed");
        let algae = col(row, "algae_total");
        let algae_missed = col(row, "teleop_algae_missed");
        row.set("coral_make_rate", ratio(coral, coral + coral_missed));
        row.set("algae_make_rate", ratio(algae, algae + algae_missed));
    }
}

fn derive_point_shares(table: &mut RowTable) {
    for row in &mut table.rows {
        let total = col(row, "total_points");
        row.set("auto_point_share", ratio(col(row, "auto_points"), total));
        row.set("endgame_point_share", ratio(col(row, "endgame_points"), total));
    }
}
