//! Local palettes and the indirection map.
//!
//! Solved clusters that share a base material color are folded together
//! while their combined layer set stays within budget. Each resulting
//! palette claims the downsample blocks of its clusters; the indirection map
//! stores the 1-based palette id per block.

use image::{GrayImage, Luma, Rgb, RgbaImage};
use tracing::{info, warn};

use crate::ClusterError;
use crate::graph::Graph;
use crate::mask::{BASE_LAYER_BIT, LayerMask};
use crate::raster::Grid;

/// Palette ids 1..=254 fit the 8-bit indirection map.
pub const MAX_PALETTES: usize = 254;

// ---------------------------------------------------------------------------
// LocalPalette
// ---------------------------------------------------------------------------

/// Layer set blended by one region of the indirection map.
#[derive(Clone, Debug)]
pub struct LocalPalette {
    /// Union of the member clusters' masks.
    pub mask: LayerMask,
    /// Base material color shared by every member cluster.
    pub base_color: Rgb<u8>,
    /// Downsample blocks owned by this palette.
    pub membership: Grid<bool>,
}

impl LocalPalette {
    /// Source layer indices in ascending order, without the base layer.
    pub fn source_layers(&self) -> impl Iterator<Item = u32> + '_ {
        self.mask.layers().filter(|&l| l != BASE_LAYER_BIT)
    }

    /// Number of blocks owned.
    pub fn block_count(&self) -> usize {
        self.membership.as_slice().iter().filter(|&&owned| owned).count()
    }
}

/// Palettes, their indirection map, and the cluster → palette assignment.
#[derive(Clone, Debug)]
pub struct PaletteSet {
    /// Final palettes; palette `i` is written as `i + 1` in `indirection`.
    pub palettes: Vec<LocalPalette>,
    /// 1-based palette id per downsample block, 0 where empty.
    pub indirection: GrayImage,
    /// Palette index of each cluster.
    pub cluster_palette: Vec<usize>,
}

impl PaletteSet {
    /// Palette owning block `(x, y)`, if any.
    pub fn palette_at(&self, x: u32, y: u32) -> Option<&LocalPalette> {
        let id = self.indirection.get_pixel(x, y)[0] as usize;
        id.checked_sub(1).and_then(|i| self.palettes.get(i))
    }
}

fn rgb(color: image::Rgba<u8>) -> Rgb<u8> {
    Rgb([color[0], color[1], color[2]])
}

/// Base color of each cluster, sampled at the first texel of its
/// lowest-id node in the downsampled subset map.
pub fn cluster_base_colors(graph: &Graph, base: &RgbaImage) -> Vec<Rgb<u8>> {
    let mut colors: Vec<Option<Rgb<u8>>> = vec![None; graph.cluster_count()];
    for node in &graph.nodes {
        let Some(cluster) = node.cluster else {
            continue;
        };
        let slot = &mut colors[cluster];
        if slot.is_none() {
            let p = node.to_grid(node.pixels[0]);
            *slot = Some(rgb(*base.get_pixel(p.x as u32, p.y as u32)));
        }
    }
    colors
        .into_iter()
        .map(|c| c.unwrap_or(Rgb([0, 0, 0])))
        .collect()
}

/// First-fit merge of `(mask, color)` pairs: an entry joins the first group
/// with the same color whose combined mask stays within `budget`.
pub fn merge_by_color(clusters: &[(LayerMask, Rgb<u8>)], budget: u32) -> Vec<(LayerMask, Rgb<u8>)> {
    let mut merged: Vec<(LayerMask, Rgb<u8>)> = Vec::with_capacity(clusters.len());
    for &(mask, color) in clusters {
        let target = merged
            .iter_mut()
            .find(|(m, c)| *c == color && (*m | mask).count() <= budget);
        match target {
            Some((m, _)) => *m |= mask,
            None => merged.push((mask, color)),
        }
    }
    merged
}

/// Merges solved clusters into palettes and rasterizes the indirection map.
///
/// `base` is the downsampled subset map the graph was built from.
///
/// # Errors
///
/// - [`ClusterError::TooManyPalettes`] if more than [`MAX_PALETTES`] remain.
/// - [`ClusterError::MissingPalette`] / [`ClusterError::PaletteOverlap`] on
///   internal inconsistencies.
pub fn build_palettes(graph: &Graph, base: &RgbaImage, budget: u32) -> Result<PaletteSet, ClusterError> {
    let (width, height) = base.dimensions();

    let colors = cluster_base_colors(graph, base);
    let clusters: Vec<(LayerMask, Rgb<u8>)> = (0..graph.cluster_count())
        .map(|c| (graph.cluster_mask(c), colors[c]))
        .collect();

    let merged = merge_by_color(&clusters, budget);
    if merged.len() > MAX_PALETTES {
        return Err(ClusterError::TooManyPalettes {
            count: merged.len(),
            max: MAX_PALETTES,
        });
    }
    if merged.is_empty() {
        warn!("No palettes produced, the indirection map is empty");
    }

    let cluster_palette = clusters
        .iter()
        .enumerate()
        .map(|(cluster, &(mask, color))| {
            merged
                .iter()
                .position(|&(m, c)| m.contains(mask) && c == color)
                .ok_or(ClusterError::MissingPalette { cluster })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut palettes: Vec<LocalPalette> = merged
        .iter()
        .map(|&(mask, base_color)| LocalPalette {
            mask,
            base_color,
            membership: Grid::new(width, height, false),
        })
        .collect();

    let mut indirection = GrayImage::new(width, height);
    for node in &graph.nodes {
        let Some(cluster) = node.cluster else {
            continue;
        };
        let palette = cluster_palette[cluster];
        for p in node.grid_pixels() {
            let (x, y) = (p.x as u32, p.y as u32);
            let existing = indirection.get_pixel(x, y)[0];
            if existing != 0 {
                return Err(ClusterError::PaletteOverlap {
                    first: existing as usize - 1,
                    second: palette,
                    x,
                    y,
                });
            }
            indirection.put_pixel(x, y, Luma([(palette + 1) as u8]));
            palettes[palette].membership.set(x, y, true);
        }
    }

    info!(
        "{} cluster(s) merged into {} local palette(s)",
        clusters.len(),
        palettes.len()
    );
    for (i, palette) in palettes.iter().enumerate() {
        info!(
            "Palette {}: layers [{}], {} block(s)",
            i + 1,
            palette.mask,
            palette.block_count()
        );
    }

    Ok(PaletteSet {
        palettes,
        indirection,
        cluster_palette,
    })
}
