//! The binary entry point for the strata encoder.

mod error;
mod job;

use clap::Parser;
use strata_config::{CliArgs, JobConfig};
use tracing::{error, info};

use crate::error::AppError;

fn main() {
    let args = CliArgs::parse();

    // Logging first so job loading is traced
    strata_log::init_logging(args.log_dir.as_deref(), args.log_dir.is_some(), args.log_level.as_deref());

    if let Err(err) = run(&args) {
        error!("{}", err.chain());
        eprintln!("error: {}", err.chain());
        std::process::exit(err.exit_code());
    }
}

fn run(args: &CliArgs) -> Result<(), AppError> {
    let mut job = JobConfig::load(&args.job)?;
    job.apply_cli_overrides(args);
    job.validate()?;
    job.log_parameters();

    let summary = job::run_job(&job)?;
    if summary.clean {
        info!("Encoded without errors");
    } else {
        info!(
            "Encoded with {} diagnostic raster(s) and {} unsolved cluster(s)",
            summary.diagnostics_written.len(),
            summary.unsolved_clusters
        );
    }
    Ok(())
}
