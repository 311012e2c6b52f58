//! Error types for the clustering pipeline.

use image::RgbaImage;

/// Errors that abort an encode.
///
/// Soft quality problems are not errors; they are collected in
/// [`crate::Diagnostics`].
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// A source layer does not match the subset-id map dimensions.
    #[error("layer {index} is {width}x{height}, all layers must be {expected_width}x{expected_height}")]
    DimensionMismatch {
        /// Index of the offending layer.
        index: usize,
        /// Layer width.
        width: u32,
        /// Layer height.
        height: u32,
        /// Subset-id map width.
        expected_width: u32,
        /// Subset-id map height.
        expected_height: u32,
    },

    /// The subset-id map is not a power of two in each dimension.
    #[error("source dimension {width}x{height} must be a power of two")]
    NotPowerOfTwo {
        /// Image width.
        width: u32,
        /// Image height.
        height: u32,
    },

    /// The image is smaller than one downsample block.
    #[error("image {width}x{height} is smaller than a {block}x{block} downsample block")]
    ImageTooSmall {
        /// Image width.
        width: u32,
        /// Image height.
        height: u32,
        /// Block edge length.
        block: u32,
    },

    /// The subset-id map has more distinct colors than layer bits.
    #[error("too many ids in color id map (> {max}), wrong texture?")]
    TooManySubsetColors {
        /// Maximum supported number of colors.
        max: usize,
    },

    /// More source layers than available mask bits.
    #[error("{count} source layers given, at most {max} supported")]
    TooManyLayers {
        /// Number of layers supplied.
        count: usize,
        /// Maximum supported.
        max: usize,
    },

    /// A downsample block spans two subset colors, or adjacent blocks disagree.
    ///
    /// `diagnostic` is a full-resolution raster highlighting the offending
    /// texels: red for mismatching pixels, green for mixed blocks, blue for
    /// blocks that disagree with a neighbor.
    #[error("bad subset mapping found in {blocks} block(s)")]
    InvalidMapping {
        /// Number of offending blocks.
        blocks: usize,
        /// Highlight raster at source resolution.
        diagnostic: Box<RgbaImage>,
    },

    /// Two palettes claimed the same downsample block.
    #[error("palettes {first} and {second} overlap at block ({x}, {y})")]
    PaletteOverlap {
        /// 0-based index of the palette already owning the block.
        first: usize,
        /// 0-based index of the palette claiming it again.
        second: usize,
        /// Block x.
        x: u32,
        /// Block y.
        y: u32,
    },

    /// The indirection map can address at most `max` palettes.
    #[error("{count} palettes produced, the indirection map holds at most {max}")]
    TooManyPalettes {
        /// Number of palettes produced.
        count: usize,
        /// Maximum addressable.
        max: usize,
    },

    /// No cluster could be matched to a palette (internal inconsistency).
    #[error("cluster {cluster} has no matching palette")]
    MissingPalette {
        /// Cluster id.
        cluster: usize,
    },
}
