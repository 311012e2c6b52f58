//! Soft-error bookkeeping.
//!
//! Quality problems that do not abort the job are collected here and emitted
//! as optional rasters next to the normal output.

use image::{Rgba, RgbaImage};

/// Opaque black: "no problem here".
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
/// Opaque white.
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
/// Too many layers, or significant weight discarded.
pub const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
/// Boundary block of a broken edge.
pub const YELLOW: Rgba<u8> = Rgba([255, 255, 0, 255]);
/// Block of a cluster the solver left over budget.
pub const MAGENTA: Rgba<u8> = Rgba([255, 0, 255, 255]);

/// Soft errors accumulated during an encode.
///
/// Their presence never changes whether the encode succeeds.
#[derive(Debug, Default)]
pub struct Diagnostics {
    /// Downsample-resolution raster marking texels with more visible layers
    /// than the budget (red). `None` if no texel was truncated.
    pub too_many_layers: Option<RgbaImage>,
    /// Number of truncated texels.
    pub truncated_texels: usize,
    /// Full-resolution raster of weight problems (red: discarded layer
    /// weight, yellow: broken edge boundary, magenta: unsolved cluster).
    /// `None` if nothing was flagged.
    pub weights: Option<RgbaImage>,
    /// Pixels whose discarded layer weight was non-zero inside the base material.
    pub discarded_weight_pixels: usize,
    /// Boundary points on broken edges.
    pub broken_edge_points: usize,
    /// Cluster ids the solver could not bring within budget.
    pub unsolved_clusters: Vec<usize>,
}

impl Diagnostics {
    /// Returns `true` if any soft error was recorded.
    pub fn has_errors(&self) -> bool {
        self.too_many_layers.is_some() || self.weights.is_some() || !self.unsolved_clusters.is_empty()
    }
}

/// Lazily allocated black raster, created on the first flagged texel.
#[derive(Debug)]
pub(crate) struct LazyRaster {
    width: u32,
    height: u32,
    image: Option<RgbaImage>,
}

impl LazyRaster {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            image: None,
        }
    }

    pub(crate) fn put(&mut self, x: u32, y: u32, color: Rgba<u8>) {
        let (width, height) = (self.width, self.height);
        self.image
            .get_or_insert_with(|| RgbaImage::from_pixel(width, height, BLACK))
            .put_pixel(x, y, color);
    }

    pub(crate) fn into_image(self) -> Option<RgbaImage> {
        self.image
    }
}
