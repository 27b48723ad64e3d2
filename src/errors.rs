use thiserror::Error;

/// Why a raw scouting row was rejected at ingestion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ObservationError {
    #[error("row is not a JSON object")]
    NotAnObject,
    #[error("missing field `{0}`")]
    MissingField(String),
    #[error("field `{field}` is not numeric: {found}")]
    NotNumeric { field: String, found: String },
    #[error("field `{field}` has negative or fractional count {value}")]
    InvalidCount { field: String, value: f64 },
    #[error("field `{field}` has unknown value `{value}`")]
    UnknownValue { field: String, value: String },
    #[error("team {team} recorded on both alliances in {match_key}")]
    ConflictingAlliance { team: u32, match_key: String },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("observation collection is empty")]
    NoObservations,
    #[error("no valid observations ({skipped} rows skipped as malformed)")]
    NoValidObservations { skipped: usize },
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}
