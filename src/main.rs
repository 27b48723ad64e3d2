use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use scout_ratings::logging;
use scout_ratings::{EventFile, PipelineConfig, run_pipeline};

const DEFAULT_EVENT_PATH: &str = "tests/fixtures/event.json";

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    logging::init_from_env();

    let event_path = positional_arg().unwrap_or_else(|| PathBuf::from(DEFAULT_EVENT_PATH));
    let mut cfg = match arg_value("--config") {
        Some(path) => PipelineConfig::load(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    cfg.apply_env();

    let raw = fs::read_to_string(&event_path)
        .with_context(|| format!("reading event file {}", event_path.display()))?;
    let event: EventFile = serde_json::from_str(&raw)
        .with_context(|| format!("parsing event file {}", event_path.display()))?;

    let index = run_pipeline(&event.observations, &event.schedule, &cfg)
        .context("running pipeline")?;

    let out = if has_flag("--teams-only") {
        index.team_index_json()?
    } else {
        serde_json::to_string_pretty(&index)?
    };

    match arg_value("--out") {
        Some(path) => {
            fs::write(&path, out).with_context(|| format!("writing {}", path.display()))?;
            log::info!("wrote index for {} teams to {}", index.teams.len(), path.display());
        }
        None => println!("{out}"),
    }
    Ok(())
}

fn positional_arg() -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut idx = 0;
    while idx < args.len() {
        let arg = &args[idx];
        if arg == "--out" || arg == "--config" {
            idx += 2;
            continue;
        }
        if !arg.starts_with("--") {
            return Some(PathBuf::from(arg));
        }
        idx += 1;
    }
    None
}

fn arg_value(name: &str) -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&format!("{name}="))
            && !raw.trim().is_empty()
        {
            return Some(PathBuf::from(raw.trim()));
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(PathBuf::from(next));
        }
    }
    None
}

fn has_flag(name: &str) -> bool {
    std::env::args().skip(1).any(|arg| arg == name)
}
