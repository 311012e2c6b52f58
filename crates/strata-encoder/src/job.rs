//! One encode job: load the sources, run the encoder, write every output.

use std::path::{Path, PathBuf};

use image::RgbaImage;
use strata_cluster::{
    ClusterError, DebugArtifact, Diagnostics, EncodeInputs, EncodeOutput, EncodeSettings, Encoder,
};
use strata_config::JobConfig;
use strata_io::{ClusterDescription, IoError, load_image, save_indirection, save_rgba};
use tracing::{error, info, warn};

use crate::error::AppError;

/// Raster written when the subset map cannot be downsampled.
pub const INVALID_MAPPING_FILE: &str = "invalid_mapping.tga";
/// Raster of texels that had more visible layers than the budget.
pub const TOO_MANY_MASKS_FILE: &str = "too_many_masks_error.tga";
/// Raster of weight and solver problems.
pub const ERRORS_FILE: &str = "errors.tga";

/// Budget at which the weights map needs its alpha channel.
const ALPHA_WEIGHTS_BUDGET: u32 = 5;

/// What a finished job produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    /// Number of palettes in the indirection map.
    pub palettes: usize,
    /// Clusters left over budget.
    pub unsolved_clusters: usize,
    /// Soft-error rasters written to the diagnostics directory.
    pub diagnostics_written: Vec<PathBuf>,
    /// No soft error was recorded.
    pub clean: bool,
}

/// Runs a validated job.
///
/// Soft errors are written as rasters and logged; they do not fail the job.
pub fn run_job(job: &JobConfig) -> Result<JobSummary, AppError> {
    let inputs = load_inputs(job)?;

    let settings = EncodeSettings {
        mip_level: job.max_mip_level,
        budget: job.max_local_layers_count,
        debug_dump: job.debug_dump,
    };

    let output = match Encoder::new(settings).run(&inputs) {
        Ok(output) => output,
        Err(ClusterError::InvalidMapping { blocks, diagnostic }) => {
            let path = job.diagnostics_dir().join(INVALID_MAPPING_FILE);
            save_rgba(&path, &diagnostic, false)?;
            error!("Bad subset mapping, see '{}'", path.display());
            return Err(ClusterError::InvalidMapping { blocks, diagnostic }.into());
        }
        Err(err) => return Err(err.into()),
    };

    save_outputs(job, &output)?;
    let diagnostics_written = save_diagnostics(job.diagnostics_dir(), &output.diagnostics)?;
    if job.debug_dump {
        save_debug(job.diagnostics_dir(), &output.debug)?;
    }

    info!(
        "Done: {} palette(s), {} pass(es), {} split(s)",
        output.palettes.len(),
        output.report.passes,
        output.report.splits
    );

    Ok(JobSummary {
        palettes: output.palettes.len(),
        unsolved_clusters: output.report.unsolved.len(),
        diagnostics_written,
        clean: !output.diagnostics.has_errors(),
    })
}

fn load_inputs(job: &JobConfig) -> Result<EncodeInputs, AppError> {
    info!("Loading subset id map '{}'", job.source_color_id.display());
    let subset_map = load_image(&job.source_color_id)?;

    let layers = job
        .source_layers
        .iter()
        .map(|path| {
            info!("Loading layer '{}'", path.display());
            load_image(path)
        })
        .collect::<Result<Vec<RgbaImage>, IoError>>()?;

    Ok(EncodeInputs { subset_map, layers })
}

fn save_outputs(job: &JobConfig, output: &EncodeOutput) -> Result<(), AppError> {
    // Resolve the description before touching the disk.
    let description =
        ClusterDescription::from_palettes(&output.palettes, &output.subset_colors, &job.source_layers)?;

    save_indirection(&job.indirect_map_file, &output.indirection)?;
    save_rgba(
        &job.weights_map_file,
        &output.weights,
        job.max_local_layers_count == ALPHA_WEIGHTS_BUDGET,
    )?;
    description.write(&job.description_file)?;

    info!("Saved '{}'", job.indirect_map_file.display());
    info!("Saved '{}'", job.weights_map_file.display());
    info!("Saved '{}'", job.description_file.display());
    Ok(())
}

fn save_diagnostics(dir: &Path, diagnostics: &Diagnostics) -> Result<Vec<PathBuf>, AppError> {
    let mut written = Vec::new();

    if let Some(image) = &diagnostics.too_many_layers {
        let path = dir.join(TOO_MANY_MASKS_FILE);
        save_rgba(&path, image, false)?;
        warn!(
            "{} texel(s) had too many layers, see '{}'",
            diagnostics.truncated_texels,
            path.display()
        );
        written.push(path);
    }

    if let Some(image) = &diagnostics.weights {
        let path = dir.join(ERRORS_FILE);
        save_rgba(&path, image, false)?;
        warn!(
            "Weight errors: {} discarded pixel(s), {} broken edge point(s), {} unsolved cluster(s), see '{}'",
            diagnostics.discarded_weight_pixels,
            diagnostics.broken_edge_points,
            diagnostics.unsolved_clusters.len(),
            path.display()
        );
        written.push(path);
    }

    Ok(written)
}

fn save_debug(dir: &Path, artifacts: &[DebugArtifact]) -> Result<(), AppError> {
    for artifact in artifacts {
        let path = dir.join(artifact.name());
        match artifact {
            DebugArtifact::Text { contents, .. } => {
                std::fs::create_dir_all(dir).map_err(|source| IoError::Write {
                    path: dir.to_path_buf(),
                    source,
                })?;
                std::fs::write(&path, contents).map_err(|source| IoError::Write {
                    path: path.clone(),
                    source,
                })?;
            }
            DebugArtifact::Image { image, .. } => save_rgba(&path, image, false)?,
        }
    }
    info!("Wrote {} debug file(s) to '{}'", artifacts.len(), dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const GREEN: Rgba<u8> = Rgba([0, 200, 0, 255]);

    /// Writes a 64x64 green subset map and two layers, returning the job.
    fn write_job(dir: &Path) -> JobConfig {
        let subset = RgbaImage::from_pixel(64, 64, GREEN);
        let left = RgbaImage::from_fn(64, 64, |x, _| Rgba([if x < 32 { 255 } else { 0 }, 0, 0, 255]));
        let top = RgbaImage::from_fn(64, 64, |_, y| Rgba([if y < 16 { 128 } else { 0 }, 0, 0, 255]));

        let subset_path = dir.join("ids.png");
        let left_path = dir.join("left.png");
        let top_path = dir.join("top.png");
        subset.save(&subset_path).unwrap();
        left.save(&left_path).unwrap();
        top.save(&top_path).unwrap();

        JobConfig {
            max_mip_level: 3,
            max_local_layers_count: 3,
            description_file: dir.join("out/desc.json"),
            indirect_map_file: dir.join("out/indirect.tga"),
            weights_map_file: dir.join("out/weights.tga"),
            source_color_id: subset_path,
            source_layers: vec![left_path, top_path],
            diagnostics_dir: Some(dir.join("diag")),
            debug_dump: false,
        }
    }

    #[test]
    fn test_job_writes_all_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let job = write_job(dir.path());

        let summary = run_job(&job).unwrap();
        assert!(summary.palettes >= 1);
        assert_eq!(summary.unsolved_clusters, 0);
        assert!(summary.clean);
        assert!(summary.diagnostics_written.is_empty());

        let indirect = load_image(&job.indirect_map_file).unwrap();
        assert_eq!(indirect.dimensions(), (8, 8));
        assert!(indirect.pixels().all(|p| p[0] >= 1 && p[1] == 0 && p[2] == 0));

        let weights = load_image(&job.weights_map_file).unwrap();
        assert_eq!(weights.dimensions(), (64, 64));

        let text = std::fs::read_to_string(&job.description_file).unwrap();
        let description: ClusterDescription = serde_json::from_str(&text).unwrap();
        assert_eq!(description.clusters.len(), summary.palettes);
        assert!(
            description
                .clusters
                .iter()
                .any(|c| c.base_layer.as_deref() == Some("base_00C800"))
        );
    }

    #[test]
    fn test_debug_dump_writes_graph() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = write_job(dir.path());
        job.debug_dump = true;

        run_job(&job).unwrap();
        let dot = std::fs::read_to_string(dir.path().join("diag/clusters.dot")).unwrap();
        assert!(dot.contains("digraph"));
    }

    #[test]
    fn test_mixed_block_writes_invalid_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let job = write_job(dir.path());
        let mut subset = RgbaImage::from_pixel(64, 64, GREEN);
        subset.put_pixel(3, 3, Rgba([200, 0, 0, 255]));
        subset.save(&job.source_color_id).unwrap();

        let err = run_job(&job).unwrap_err();
        assert!(matches!(err, AppError::Cluster(ClusterError::InvalidMapping { .. })));
        assert_eq!(err.exit_code(), 1);
        assert!(dir.path().join("diag").join(INVALID_MAPPING_FILE).is_file());
    }

    #[test]
    fn test_missing_layer_fails_before_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = write_job(dir.path());
        job.source_layers.push(dir.path().join("absent.png"));

        let err = run_job(&job).unwrap_err();
        assert!(matches!(err, AppError::Io(IoError::Missing { .. })));
        assert!(!job.indirect_map_file.exists());
    }

    #[test]
    fn test_overlapping_layers_write_soft_error_rasters() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = write_job(dir.path());
        job.max_local_layers_count = 2;
        job.source_layers.clear();
        for i in 0..4 {
            let path = dir.path().join(format!("veil{i}.png"));
            RgbaImage::from_pixel(64, 64, Rgba([100, 0, 0, 255])).save(&path).unwrap();
            job.source_layers.push(path);
        }

        let summary = run_job(&job).unwrap();
        assert!(!summary.clean);

        let diag = dir.path().join("diag");
        assert_eq!(
            summary.diagnostics_written,
            vec![diag.join(TOO_MANY_MASKS_FILE), diag.join(ERRORS_FILE)]
        );
        assert!(diag.join(TOO_MANY_MASKS_FILE).is_file());

        // Both kept layers fit one palette; the two dropped ones show up red.
        let errors = load_image(&diag.join(ERRORS_FILE)).unwrap();
        assert_eq!(errors.dimensions(), (64, 64));
        assert_eq!(errors.get_pixel(10, 10), &Rgba([255, 0, 0, 255]));
        assert!(job.indirect_map_file.is_file());
    }

    #[test]
    fn test_unknown_layer_path_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let job = write_job(dir.path());
        let inputs = load_inputs(&job).unwrap();
        let output = Encoder::new(EncodeSettings {
            mip_level: 3,
            budget: 3,
            debug_dump: false,
        })
        .run(&inputs)
        .unwrap();

        // Palettes reference layer 1, which this job no longer names.
        let mut short = job.clone();
        short.source_layers.truncate(1);
        let err = save_outputs(&short, &output).unwrap_err();
        assert!(matches!(err, AppError::Io(IoError::UnknownLayer { .. })));
        assert!(!job.indirect_map_file.exists());
        assert!(!job.weights_map_file.exists());
        assert!(!job.description_file.exists());
    }
}
