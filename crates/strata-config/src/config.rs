//! The job description and its validation.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Allowed downsample levels.
pub const MIP_LEVEL_RANGE: RangeInclusive<u32> = 1..=5;
/// Allowed layers per palette, base layer included.
pub const LOCAL_LAYERS_RANGE: RangeInclusive<u32> = 2..=5;
/// Source layers addressable by a 64-bit mask with one bit kept for the base.
pub const MAX_JOB_LAYERS: usize = 63;

/// Default downsample level (8x8 blocks).
pub const DEFAULT_MIP_LEVEL: u32 = 3;
/// Default layers per palette.
pub const DEFAULT_LOCAL_LAYERS: u32 = 4;

/// One encode job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct JobConfig {
    /// Downsample level of the indirection map.
    pub max_mip_level: u32,
    /// Maximum layers blended per block.
    pub max_local_layers_count: u32,
    /// Output cluster description (JSON).
    pub description_file: PathBuf,
    /// Output indirection map.
    pub indirect_map_file: PathBuf,
    /// Output weights map.
    pub weights_map_file: PathBuf,
    /// Color-coded subset-id map.
    #[serde(rename = "sourceColorID")]
    pub source_color_id: PathBuf,
    /// Layer masks, front to back.
    pub source_layers: Vec<PathBuf>,
    /// Where diagnostic rasters are written. Defaults to the working directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics_dir: Option<PathBuf>,
    /// Write debug dumps next to the diagnostics.
    pub debug_dump: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            max_mip_level: DEFAULT_MIP_LEVEL,
            max_local_layers_count: DEFAULT_LOCAL_LAYERS,
            description_file: PathBuf::new(),
            indirect_map_file: PathBuf::new(),
            weights_map_file: PathBuf::new(),
            source_color_id: PathBuf::new(),
            source_layers: Vec::new(),
            diagnostics_dir: None,
            debug_dump: false,
        }
    }
}

impl JobConfig {
    /// Loads a job file: `.ron` files as RON, anything else as JSON.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let is_ron = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("ron"));

        let job = if is_ron {
            Self::from_ron(&contents)?
        } else {
            Self::from_json(&contents)?
        };
        log::info!("Loaded job from {}", path.display());
        Ok(job)
    }

    /// Parses a JSON job description.
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(contents).map_err(ConfigError::JsonError)
    }

    /// Parses a RON job description.
    pub fn from_ron(contents: &str) -> Result<Self, ConfigError> {
        ron::from_str(contents).map_err(ConfigError::RonError)
    }

    /// Checks parameter ranges and required paths.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("mip level", self.max_mip_level, &MIP_LEVEL_RANGE)?;
        check_range("local layers count", self.max_local_layers_count, &LOCAL_LAYERS_RANGE)?;

        let required = [
            (&self.indirect_map_file, "result indirect map file name"),
            (&self.description_file, "result description file name"),
            (&self.weights_map_file, "result weights map file name"),
            (&self.source_color_id, "subset id map file name"),
        ];
        for (path, what) in required {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::EmptyPath(what));
            }
        }

        if self.source_layers.len() > MAX_JOB_LAYERS {
            return Err(ConfigError::TooManyLayers {
                count: self.source_layers.len(),
                max: MAX_JOB_LAYERS,
            });
        }

        Ok(())
    }

    /// Directory for diagnostic rasters and debug dumps.
    pub fn diagnostics_dir(&self) -> &Path {
        self.diagnostics_dir.as_deref().unwrap_or(Path::new("."))
    }

    /// Logs the job description.
    pub fn log_parameters(&self) {
        log::info!("Job description");
        log::info!("  Max mip level : {}", self.max_mip_level);
        log::info!("  Max local layers : {}", self.max_local_layers_count);
        log::info!("  Base layer");
        log::info!("    {}", self.source_color_id.display());
        log::info!("  Source layers, count {}", self.source_layers.len());
        for (i, layer) in self.source_layers.iter().enumerate() {
            log::info!("    [{}] - '{}'", i + 1, layer.display());
        }
        log::info!("  Destination");
        log::info!("    {}", self.description_file.display());
        log::info!("    {}", self.indirect_map_file.display());
        log::info!("    {}", self.weights_map_file.display());
    }
}

fn check_range(name: &'static str, value: u32, range: &RangeInclusive<u32>) -> Result<(), ConfigError> {
    if range.contains(&value) {
        return Ok(());
    }
    Err(ConfigError::OutOfRange {
        name,
        value,
        min: *range.start(),
        max: *range.end(),
    })
}
