use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use scout_ratings::alliance::{ScoredObservation, completeness_filter};
use scout_ratings::binning::{BinningConfig, QuantileBinner};
use scout_ratings::clustering::run_cluster_rating;
use scout_ratings::game_fields::{default_axes, default_strategies};
use scout_ratings::kmeans::ClusterConfig;
use scout_ratings::observation::ingest_observations;
use scout_ratings::{EventFile, PipelineConfig, run_pipeline};

fn event() -> EventFile {
    serde_json::from_str(EVENT_JSON).expect("valid fixture json")
}

fn scored() -> Vec<ScoredObservation> {
    ingest_observations(&event().observations)
        .observations
        .into_iter()
        .map(ScoredObservation::new)
        .collect()
}

fn bench_ingest(c: &mut Criterion) {
    let event = event();
    c.bench_function("ingest_observations", |b| {
        b.iter(|| {
            let out = ingest_observations(black_box(&event.observations));
            black_box(out.observations.len());
        })
    });
}

fn bench_binning(c: &mut Criterion) {
    let scored = scored();
    let axis = default_axes()[1];
    c.bench_function("quantile_binner_fit", |b| {
        b.iter(|| {
            let binner = QuantileBinner::fit(
                axis.name,
                black_box(&scored),
                axis.extract,
                &BinningConfig::default(),
            );
            black_box(binner.bins());
        })
    });
}

fn bench_clustering(c: &mut Criterion) {
    let scored = scored();
    let complete = completeness_filter(&scored).complete;
    let strategies = default_strategies();
    c.bench_function("cluster_rating", |b| {
        b.iter(|| {
            let out = run_cluster_rating(
                black_box(&scored),
                &complete,
                &strategies,
                &ClusterConfig::default(),
            );
            black_box(out.teams.len());
        })
    });
}

fn bench_full_pipeline(c: &mut Criterion) {
    let event = event();
    let cfg = PipelineConfig {
        parallelism: 4,
        ..PipelineConfig::default()
    };
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);
    group.bench_function("fixture_event", |b| {
        b.iter(|| {
            let index = run_pipeline(black_box(&event.observations), &event.schedule, &cfg)
                .expect("pipeline runs");
            black_box(index.teams.len());
        })
    });
    group.finish();
}

criterion_group!(
    perf,
    bench_ingest,
    bench_binning,
    bench_clustering,
    bench_full_pipeline
);
criterion_main!(perf);

static EVENT_JSON: &str = include_str!("../tests/fixtures/event.json");
