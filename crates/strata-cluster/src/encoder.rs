//! In-memory encode pipeline: subset map and layer masks in, palettes,
//! indirection map and weights map out.

use image::{GrayImage, Rgb, RgbaImage};
use tracing::{debug, info, warn};

use crate::ClusterError;
use crate::adjacency::build_graph;
use crate::composite::build_mask_raster;
use crate::debug::{DebugArtifact, collect_artifacts};
use crate::diagnostics::Diagnostics;
use crate::downsample::{downsample_base_max, downsample_layer_max, red_channel};
use crate::graph::Graph;
use crate::mask::MAX_SOURCE_LAYERS;
use crate::palette::{LocalPalette, build_palettes};
use crate::raster::is_power_of_two_dims;
use crate::segment::find_regions;
use crate::solver::{SolveReport, solve};
use crate::subset::SubsetMap;
use crate::weights::build_weights_map;

/// Encode parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodeSettings {
    /// Downsample factor as a power of two (block edge `1 << mip_level`).
    pub mip_level: u32,
    /// Maximum layers blended per block, base layer included.
    pub budget: u32,
    /// Produce [`DebugArtifact`]s.
    pub debug_dump: bool,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            mip_level: 3,
            budget: 3,
            debug_dump: false,
        }
    }
}

/// Source rasters of one job.
#[derive(Clone, Debug)]
pub struct EncodeInputs {
    /// Color-coded subset-id map.
    pub subset_map: RgbaImage,
    /// Layer masks front to back; the red channel is the opacity.
    pub layers: Vec<RgbaImage>,
}

/// Everything an encode produces.
#[derive(Debug)]
pub struct EncodeOutput {
    /// 1-based palette id per block.
    pub indirection: GrayImage,
    /// Full-resolution blend weights.
    pub weights: RgbaImage,
    /// Meaningful channels of `weights`.
    pub weight_channels: usize,
    /// Final palettes, in indirection order.
    pub palettes: Vec<LocalPalette>,
    /// Distinct subset colors in order of first appearance.
    pub subset_colors: Vec<Rgb<u8>>,
    /// Solved region graph.
    pub graph: Graph,
    /// Solver statistics.
    pub report: SolveReport,
    /// Soft errors.
    pub diagnostics: Diagnostics,
    /// Debug files, empty unless [`EncodeSettings::debug_dump`] is set.
    pub debug: Vec<DebugArtifact>,
}

/// Runs the clustering pipeline.
#[derive(Clone, Debug, Default)]
pub struct Encoder {
    settings: EncodeSettings,
}

impl Encoder {
    /// Creates an encoder with the given settings.
    pub fn new(settings: EncodeSettings) -> Self {
        Self { settings }
    }

    /// Encodes one job.
    ///
    /// # Errors
    ///
    /// Input validation errors, [`ClusterError::InvalidMapping`] for a subset
    /// map that cannot be downsampled, and palette invariant violations.
    /// Quality problems are reported through [`EncodeOutput::diagnostics`]
    /// instead.
    pub fn run(&self, inputs: &EncodeInputs) -> Result<EncodeOutput, ClusterError> {
        let EncodeSettings {
            mip_level,
            budget,
            debug_dump,
        } = self.settings;

        check_inputs(inputs)?;

        let subset = SubsetMap::prepare(&inputs.subset_map)?;
        let layers: Vec<GrayImage> = inputs.layers.iter().map(red_channel).collect();

        let base_small = downsample_base_max(&subset.image, mip_level)?;
        let layers_small = layers
            .iter()
            .map(|layer| downsample_layer_max(layer, mip_level))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            "Downsampled {} layer(s) to {}x{}",
            layers_small.len(),
            base_small.width(),
            base_small.height()
        );

        let raster = build_mask_raster(&base_small, &layers_small, budget);

        let nodes = find_regions(&raster.masks);
        info!("{} region(s) found", nodes.len());
        if nodes.is_empty() {
            warn!("Subset map has no base material, output will be empty");
        }

        let mut graph = build_graph(nodes);
        info!(
            "Graph: {} node(s), {} edge(s), {} cluster(s)",
            graph.nodes.len(),
            graph.edges.len(),
            graph.cluster_count()
        );
        debug_assert_eq!(graph.validate_clusters(), Ok(()));

        let report = solve(&mut graph, budget);
        let palettes = build_palettes(&graph, &base_small, budget)?;

        let weights = build_weights_map(
            &subset.image,
            &layers,
            &graph,
            &palettes,
            &report.unsolved,
            mip_level,
            budget,
        );

        let debug = if debug_dump {
            collect_artifacts(&raster.masks, &graph, &palettes.palettes)
        } else {
            Vec::new()
        };

        let diagnostics = Diagnostics {
            too_many_layers: raster.truncated,
            truncated_texels: raster.truncated_texels,
            weights: weights.errors,
            discarded_weight_pixels: weights.discarded_weight_pixels,
            broken_edge_points: weights.broken_edge_points,
            unsolved_clusters: report.unsolved.clone(),
        };

        Ok(EncodeOutput {
            indirection: palettes.indirection,
            weights: weights.image,
            weight_channels: weights.channels,
            palettes: palettes.palettes,
            subset_colors: subset.colors,
            graph,
            report,
            diagnostics,
            debug,
        })
    }
}

fn check_inputs(inputs: &EncodeInputs) -> Result<(), ClusterError> {
    let (width, height) = inputs.subset_map.dimensions();
    if !is_power_of_two_dims(width, height) {
        return Err(ClusterError::NotPowerOfTwo { width, height });
    }

    if inputs.layers.len() > MAX_SOURCE_LAYERS {
        return Err(ClusterError::TooManyLayers {
            count: inputs.layers.len(),
            max: MAX_SOURCE_LAYERS,
        });
    }

    for (index, layer) in inputs.layers.iter().enumerate() {
        if layer.dimensions() != (width, height) {
            return Err(ClusterError::DimensionMismatch {
                index,
                width: layer.width(),
                height: layer.height(),
                expected_width: width,
                expected_height: height,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_mismatched_layer_rejected() {
        let inputs = EncodeInputs {
            subset_map: RgbaImage::from_pixel(8, 8, Rgba([0, 200, 0, 255])),
            layers: vec![RgbaImage::new(8, 8), RgbaImage::new(4, 8)],
        };
        let result = Encoder::default().run(&inputs);
        assert!(matches!(
            result,
            Err(ClusterError::DimensionMismatch { index: 1, width: 4, .. })
        ));
    }

    #[test]
    fn test_non_power_of_two_rejected() {
        let inputs = EncodeInputs {
            subset_map: RgbaImage::new(12, 8),
            layers: Vec::new(),
        };
        assert!(matches!(
            Encoder::default().run(&inputs),
            Err(ClusterError::NotPowerOfTwo { width: 12, height: 8 })
        ));
    }

    #[test]
    fn test_base_only_job_produces_one_palette() {
        let inputs = EncodeInputs {
            subset_map: RgbaImage::from_pixel(16, 16, Rgba([0, 200, 0, 255])),
            layers: vec![RgbaImage::new(16, 16)],
        };
        let settings = EncodeSettings {
            mip_level: 2,
            budget: 2,
            debug_dump: true,
        };
        let output = Encoder::new(settings).run(&inputs).unwrap();

        assert_eq!(output.indirection.dimensions(), (4, 4));
        assert!(output.indirection.pixels().all(|p| p[0] == 1));
        assert_eq!(output.palettes.len(), 1);
        assert!(output.palettes[0].mask.is_base_only());
        assert_eq!(output.weight_channels, 1);
        assert!(output.weights.pixels().all(|p| p.0 == [0, 0, 0, 0]));
        assert!(!output.diagnostics.has_errors());
        assert!(output.debug.iter().any(|a| a.name() == "clusters.dot"));
    }
}
