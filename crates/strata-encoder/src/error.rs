//! Top-level error type of the encoder binary.

use strata_cluster::ClusterError;
use strata_config::ConfigError;
use strata_io::IoError;

/// Exit code for a bad job description.
pub const EXIT_CONFIG: i32 = 2;
/// Exit code for a job that failed while processing.
pub const EXIT_PROCESSING: i32 = 1;

/// Any error that aborts a job.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The job description could not be loaded or is invalid.
    #[error("invalid job: {0}")]
    Config(#[from] ConfigError),

    /// An input could not be read or an output could not be written.
    #[error(transparent)]
    Io(#[from] IoError),

    /// The encode itself failed.
    #[error("encode failed: {0}")]
    Cluster(#[from] ClusterError),
}

impl AppError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => EXIT_CONFIG,
            Self::Io(_) | Self::Cluster(_) => EXIT_PROCESSING,
        }
    }

    /// The error followed by each of its sources, one per line.
    pub fn chain(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            let text = err.to_string();
            if !message.contains(&text) {
                message.push_str("\n  caused by: ");
                message.push_str(&text);
            }
            source = err.source();
        }
        message
    }
}
