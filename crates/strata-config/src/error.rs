//! Configuration error types.

/// Errors that can occur when loading or validating a job description.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the job file from disk.
    #[error("failed to read job file: {0}")]
    ReadError(#[source] std::io::Error),

    /// Failed to parse JSON content.
    #[error("failed to parse job JSON: {0}")]
    JsonError(#[source] serde_json::Error),

    /// Failed to parse RON content.
    #[error("failed to parse job RON: {0}")]
    RonError(#[source] ron::error::SpannedError),

    /// A parameter is outside its allowed range.
    #[error("invalid {name} {value}, must be in range {min}..={max}")]
    OutOfRange {
        /// Parameter name as written in the job file.
        name: &'static str,
        /// Supplied value.
        value: u32,
        /// Smallest allowed value.
        min: u32,
        /// Largest allowed value.
        max: u32,
    },

    /// A required path is empty.
    #[error("{0} can't be empty")]
    EmptyPath(&'static str),

    /// More source layers than the encoder can address.
    #[error("{count} source layers given, at most {max} supported")]
    TooManyLayers {
        /// Number of layers in the job.
        count: usize,
        /// Maximum supported.
        max: usize,
    },
}
