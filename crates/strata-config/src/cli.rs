//! Command-line argument parsing for the encoder.

use std::path::PathBuf;

use clap::Parser;

use crate::JobConfig;

/// Strata encoder command-line arguments.
///
/// CLI values override settings loaded from the job file.
#[derive(Parser, Debug)]
#[command(name = "strata-encoder", about = "Spatial clustering texture layer encoder")]
pub struct CliArgs {
    /// Job description (`.json` or `.ron`).
    pub job: PathBuf,

    /// Downsample level (1..=5).
    #[arg(long)]
    pub max_mip_level: Option<u32>,

    /// Maximum layers blended per block (2..=5).
    #[arg(long)]
    pub max_local_layers: Option<u32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Directory for a JSON log file.
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Write debug dumps (graph, palette masks, intersections).
    #[arg(long)]
    pub debug_dump: bool,
}

impl JobConfig {
    /// Apply CLI overrides to a loaded job.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(level) = args.max_mip_level {
            self.max_mip_level = level;
        }
        if let Some(count) = args.max_local_layers {
            self.max_local_layers_count = count;
        }
        if args.debug_dump {
            self.debug_dump = true;
        }
    }
}
