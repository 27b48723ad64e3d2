pub mod alliance;
pub mod binning;
pub mod calibration;
pub mod clustering;
pub mod config;
pub mod elo;
pub mod errors;
pub mod forest;
pub mod game_fields;
pub mod heuristic;
pub mod index;
pub mod kmeans;
pub mod logging;
pub mod observation;
pub mod parallel;
pub mod pipeline;
pub mod regression;

pub use config::PipelineConfig;
pub use errors::{ConfigError, ObservationError, PipelineError};
pub use index::{MatchPredictionRecord, PipelineIndex, TeamRating};
pub use observation::{Alliance, MatchKey, MatchType, Observation, TeamId};
pub use pipeline::{EventFile, Strategies, run_pipeline, run_typed};
