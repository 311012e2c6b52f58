//! File I/O for the strata encoder: raster load/save and the cluster
//! description document.

mod description;
mod error;
mod raster;

pub use description::{ClusterDescription, ClusterEntry, base_layer_id};
pub use error::IoError;
pub use raster::{load_image, save_indirection, save_rgba};
