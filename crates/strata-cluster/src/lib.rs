//! Spatial clustering of texture layers.
//!
//! Layer masks are composited into a per-texel [`LayerMask`] raster, segmented
//! into 8-connected regions, linked into a boundary-weighted [`Graph`], and
//! partitioned so that no cluster blends more than a fixed number of layers.
//! The solved clusters become [`LocalPalette`]s addressed by an indirection
//! map, with a full-resolution weights map re-normalized per palette.

mod adjacency;
mod composite;
mod debug;
mod diagnostics;
mod downsample;
mod encoder;
mod error;
mod graph;
mod mask;
mod palette;
mod raster;
mod segment;
mod solver;
mod subset;
mod weights;

pub use adjacency::{NarrowPhase, broad_phase, build_graph};
pub use composite::{FrontToBack, MaskRaster, build_mask_raster};
pub use debug::{DebugArtifact, DotGraph, collect_artifacts, intersection_images, mask_tag, palette_mask_image};
pub use diagnostics::{BLACK, Diagnostics, MAGENTA, RED, WHITE, YELLOW};
pub use downsample::{block_size, downsample_base_max, downsample_layer_max, red_channel};
pub use encoder::{EncodeInputs, EncodeOutput, EncodeSettings, Encoder};
pub use error::ClusterError;
pub use graph::{Edge, EdgeId, EdgePoints, Graph, GraphError, Node, NodeId};
pub use mask::{BASE_LAYER_BIT, LayerMask, MAX_SOURCE_LAYERS};
pub use palette::{LocalPalette, MAX_PALETTES, PaletteSet, build_palettes, merge_by_color};
pub use raster::{Bounds, Grid, NEIGHBORS_8, is_power_of_two_dims};
pub use segment::find_regions;
pub use solver::{ClusterOutcome, ClusterSolver, LayerDropHint, SolveReport, Solution, apply_solution, solve};
pub use subset::{MAX_SUBSET_COLORS, SubsetMap};
pub use weights::{MAX_WEIGHT_CHANNELS, PixelWeights, WeightsMap, build_weights_map, quantize};
