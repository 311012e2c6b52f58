//! Job configuration for the strata encoder.
//!
//! A job is described by a JSON (or RON) file naming the source rasters, the
//! output paths and the encode parameters. CLI flags override file values
//! before validation.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    DEFAULT_LOCAL_LAYERS, DEFAULT_MIP_LEVEL, JobConfig, LOCAL_LAYERS_RANGE, MAX_JOB_LAYERS,
    MIP_LEVEL_RANGE,
};
pub use error::ConfigError;
