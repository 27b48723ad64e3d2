use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use scout_ratings::calibration;
use scout_ratings::logging;
use scout_ratings::{EventFile, PipelineConfig, run_pipeline};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    logging::init_from_env();

    let path = event_path_arg().unwrap_or_else(|| PathBuf::from("tests/fixtures/event.json"));
    let bins = parse_usize_arg("--bins").unwrap_or(5).clamp(2, 20);

    let raw = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let event: EventFile =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    let cfg = PipelineConfig::from_env();

    let index = run_pipeline(&event.observations, &event.schedule, &cfg)?;
    let pairs = index.prediction_pairs();
    if pairs.is_empty() {
        return Err(anyhow!(
            "no predicted matches in {} (cold start covers every complete match?)",
            path.display()
        ));
    }

    // Forest forecasts were made before each match, so these are walk-forward numbers.
    let regression = calibration::evaluate_alliance_predictions(&pairs);
    println!("Regression (alliance totals)");
    println!("  samples:          {}", regression.samples);
    println!("  mae:              {:.2}", regression.mae);
    println!("  rmse:             {:.2}", regression.rmse);
    println!("  winner accuracy:  {:.3}", regression.winner_accuracy);

    // Elo is fitted on the whole event, so this is in-sample.
    let (red_win, outcomes) = index.elo_forecasts();
    let elo = calibration::evaluate_win_probs(&red_win, &outcomes);
    println!("Feature Elo (in-sample red win)");
    println!("  samples:          {}", elo.samples);
    println!("  brier:            {:.4}", elo.brier);
    println!("  log loss:         {:.4}", elo.log_loss);
    println!("  accuracy:         {:.3}", elo.accuracy);
    for b in calibration::calibration_bins(&red_win, &outcomes, bins) {
        if b.count == 0 {
            continue;
        }
        println!(
            "  [{:.2}, {:.2}) n={:<4} pred={:.3} actual={:.3}",
            b.bucket_start, b.bucket_end, b.count, b.avg_pred, b.actual_rate
        );
    }

    let d = &index.diagnostics;
    println!("Diagnostics");
    println!("  skipped rows:     {}", d.skipped_observations.len());
    println!("  resubmitted:      {}", d.resubmitted);
    println!("  incomplete:       {}", d.incomplete_matches.len());
    println!("  cold start:       {}", d.cold_start_matches.len());
    println!("  empty training:   {}", d.empty_training_matches.len());
    println!("  fallbacks:        {}", d.fallback_predictions.len());
    if !d.degenerate_axes.is_empty() {
        println!("  degenerate axes:  {}", d.degenerate_axes.join(", "));
    }
    Ok(())
}

fn event_path_arg() -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut idx = 0;
    while idx < args.len() {
        if args[idx] == "--bins" {
            idx += 2;
            continue;
        }
        if !args[idx].starts_with("--") {
            return Some(PathBuf::from(&args[idx]));
        }
        idx += 1;
    }
    None
}

fn parse_usize_arg(name: &str) -> Option<usize> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&format!("{name}="))
            && let Ok(v) = raw.trim().parse::<usize>()
        {
            return Some(v);
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && let Ok(v) = next.trim().parse::<usize>()
        {
            return Some(v);
        }
    }
    None
}
