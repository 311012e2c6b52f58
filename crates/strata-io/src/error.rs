//! I/O error types.

use std::path::PathBuf;

/// Errors raised while reading inputs or writing outputs.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// The input file does not exist.
    #[error("can't find file '{}'", path.display())]
    Missing {
        /// Requested path.
        path: PathBuf,
    },

    /// The file exists but could not be decoded.
    #[error("can't load image '{}': {source}", path.display())]
    Decode {
        /// Offending file.
        path: PathBuf,
        /// Decoder error.
        #[source]
        source: image::ImageError,
    },

    /// Input rasters must be a power of two in each dimension.
    #[error("image '{}' is {width}x{height}, dimensions must be a power of two", path.display())]
    NotPowerOfTwo {
        /// Offending file.
        path: PathBuf,
        /// Image width.
        width: u32,
        /// Image height.
        height: u32,
    },

    /// The raster could not be encoded or written.
    #[error("can't save image '{}': {source}", path.display())]
    Encode {
        /// Destination.
        path: PathBuf,
        /// Encoder error.
        #[source]
        source: image::ImageError,
    },

    /// A plain file or directory could not be written.
    #[error("can't write '{}': {source}", path.display())]
    Write {
        /// Destination.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The description document could not be serialized.
    #[error("can't serialize cluster description: {0}")]
    Serialize(#[source] serde_json::Error),

    /// A palette references a layer index with no source path.
    #[error("palette references layer {index}, but only {count} source layers exist")]
    UnknownLayer {
        /// Layer index.
        index: u32,
        /// Number of source layers.
        count: usize,
    },

    /// A palette's base color is not one of the subset map colors.
    #[error("can't find color coded id for base color {0}")]
    UnknownBaseColor(String),
}
