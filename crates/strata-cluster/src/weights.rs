//! Full-resolution weights map.
//!
//! Every source pixel is re-composited front to back, keeping only the layers
//! of the palette its block was assigned to. The kept weights are normalized
//! and written to the first `budget - 1` channels; the base layer's share stays
//! implicit.

use image::{GrayImage, Rgba, RgbaImage};
use tracing::{info, warn};

use crate::composite::FrontToBack;
use crate::diagnostics::{LazyRaster, MAGENTA, RED, YELLOW};
use crate::graph::{Graph, Node};
use crate::mask::LayerMask;
use crate::palette::PaletteSet;

/// Channels of an RGBA weights texel.
pub const MAX_WEIGHT_CHANNELS: usize = 4;

/// Normalized blend weights of one pixel within a palette.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PixelWeights {
    /// Non-base palette layers in ascending layer order. Layers past the
    /// channel count still take part in normalization.
    pub layers: [f32; MAX_WEIGHT_CHANNELS],
    /// Base layer weight; zero if the palette has no base layer.
    pub base: f32,
    /// A layer outside the palette had non-zero weight.
    pub discarded: bool,
}

impl PixelWeights {
    /// Composites `alphas` front to back, keeping only the layers of `palette`.
    pub fn composite<I: Iterator<Item = u8>>(alphas: I, palette: LayerMask) -> Self {
        let mut weights = Self::default();
        let mut composite = FrontToBack::new(alphas);
        let mut slot = 0;
        let mut total = 0.0f32;

        for (index, weight) in composite.by_ref() {
            if palette.has_layer(index) {
                total += weight;
                if let Some(value) = weights.layers.get_mut(slot) {
                    *value = weight;
                }
                slot += 1;
            } else if weight > 0.0 {
                weights.discarded = true;
            }
        }

        if palette.has_base() {
            weights.base = composite.remaining();
            total += weights.base;
        }

        if total > 0.0 {
            for value in &mut weights.layers {
                *value /= total;
            }
            weights.base /= total;
        }

        weights
    }
}

/// 8-bit channel value of a weight, rounded down.
pub fn quantize(weight: f32) -> u8 {
    (weight.clamp(0.0, 1.0) * 255.0) as u8
}

/// Result of [`build_weights_map`].
#[derive(Debug)]
pub struct WeightsMap {
    /// Full-resolution weights, transparent black where no palette applies.
    pub image: RgbaImage,
    /// Number of meaningful channels (`budget - 1`).
    pub channels: usize,
    /// Soft-error raster, see [`crate::Diagnostics::weights`].
    pub errors: Option<RgbaImage>,
    /// Pixels inside the base material that lost layer weight.
    pub discarded_weight_pixels: usize,
    /// Boundary points on broken edges.
    pub broken_edge_points: usize,
}

/// Paints every source pixel of the block under `node`'s texel `local`.
fn paint_block(errors: &mut LazyRaster, node: &Node, local: glam::IVec2, mip_level: u32, color: Rgba<u8>) {
    let p = node.to_grid(local);
    let block = 1u32 << mip_level;
    let (ox, oy) = ((p.x as u32) << mip_level, (p.y as u32) << mip_level);
    for y in oy..oy + block {
        for x in ox..ox + block {
            errors.put(x, y, color);
        }
    }
}

/// Builds the weights map at source resolution.
///
/// `subset_map` is the cleaned full-resolution subset map (alpha marks the
/// base material) and `layers` the full-resolution layer opacities.
/// `unsolved` lists clusters left over budget; their blocks are flagged.
pub fn build_weights_map(
    subset_map: &RgbaImage,
    layers: &[GrayImage],
    graph: &Graph,
    palettes: &PaletteSet,
    unsolved: &[usize],
    mip_level: u32,
    budget: u32,
) -> WeightsMap {
    let (width, height) = subset_map.dimensions();
    let channels = (budget.saturating_sub(1) as usize).min(MAX_WEIGHT_CHANNELS);

    let mut errors = LazyRaster::new(width, height);
    let mut broken_edge_points = 0usize;

    for edge in graph.edges.iter().filter(|e| e.broken) {
        for (node, points) in [(edge.a, &edge.points_a), (edge.b, &edge.points_b)] {
            let node = graph.node(node);
            for &local in &points.points {
                paint_block(&mut errors, node, local, mip_level, YELLOW);
            }
            broken_edge_points += points.points.len();
        }
    }

    for node in &graph.nodes {
        if node.cluster.is_some_and(|c| unsolved.contains(&c)) {
            for &local in &node.pixels {
                paint_block(&mut errors, node, local, mip_level, MAGENTA);
            }
        }
    }

    let mut image = RgbaImage::new(width, height);
    let mut discarded_weight_pixels = 0usize;

    for y in 0..height {
        for x in 0..width {
            let Some(palette) = palettes.palette_at(x >> mip_level, y >> mip_level) else {
                continue;
            };

            let weights =
                PixelWeights::composite(layers.iter().map(|l| l.get_pixel(x, y)[0]), palette.mask);

            if weights.discarded && subset_map.get_pixel(x, y)[3] != 0 {
                errors.put(x, y, RED);
                discarded_weight_pixels += 1;
            }

            let texel = image.get_pixel_mut(x, y);
            for (c, &w) in weights.layers.iter().take(channels).enumerate() {
                texel[c] = quantize(w);
            }
        }
    }

    if broken_edge_points > 0 {
        info!("{broken_edge_points} boundary point(s) on broken edges");
    }
    if discarded_weight_pixels > 0 {
        warn!("Layer weight discarded in {discarded_weight_pixels} pixel(s) inside the base material");
    }

    WeightsMap {
        image,
        channels,
        errors: errors.into_image(),
        discarded_weight_pixels,
        broken_edge_points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjacency::build_graph;
    use crate::palette::build_palettes;
    use crate::raster::Grid;
    use crate::segment::find_regions;
    use crate::solver::solve;
    use image::Luma;

    fn layers(bits: &[u32]) -> LayerMask {
        bits.iter().fold(LayerMask::EMPTY, |acc, &b| acc | LayerMask::layer(b))
    }

    fn assert_sums_to_one(w: &PixelWeights) {
        let total: f32 = w.layers.iter().sum::<f32>() + w.base;
        assert!((total - 1.0).abs() < 1e-5, "weights sum to {total}");
    }

    #[test]
    fn test_palette_weights_normalize() {
        let w = PixelWeights::composite([128u8, 64].into_iter(), layers(&[0, 1, 63]));
        assert_sums_to_one(&w);
        assert!(!w.discarded);
        assert!(w.layers[0] > w.layers[1]);
    }

    #[test]
    fn test_layer_outside_palette_is_discarded() {
        let w = PixelWeights::composite([100u8, 200, 0].into_iter(), layers(&[1, 63]));
        assert!(w.discarded);
        assert_sums_to_one(&w);
        assert_eq!(w.layers[1], 0.0);
    }

    #[test]
    fn test_zero_weight_outside_palette_is_not_discarded() {
        let w = PixelWeights::composite([0u8, 255].into_iter(), layers(&[1]));
        assert!(!w.discarded);
        assert_eq!(w.layers[0], 1.0);
        assert_eq!(w.base, 0.0);
    }

    #[test]
    fn test_quantize_floors_and_clamps() {
        assert_eq!(quantize(1.0), 255);
        assert_eq!(quantize(0.5), 127);
        assert_eq!(quantize(-0.2), 0);
        assert_eq!(quantize(1.7), 255);
    }

    #[test]
    fn test_weights_map_writes_channels_and_flags_cut() {
        // 4x2 source, mip 1: two blocks side by side with disjoint layer sets.
        let subset = RgbaImage::from_pixel(4, 2, Rgba([0, 200, 0, 255]));
        let l0 = GrayImage::from_fn(4, 2, |x, _| Luma([if x < 2 { 255 } else { 0 }]));
        let l1 = GrayImage::from_fn(4, 2, |x, _| Luma([if x < 2 { 0 } else { 128 }]));

        let mut masks = Grid::new(2, 1, LayerMask::EMPTY);
        masks.set(0, 0, layers(&[0]));
        masks.set(1, 0, layers(&[1, 63]));
        let mut graph = build_graph(find_regions(&masks));
        let report = solve(&mut graph, 2);
        assert_eq!(report.splits, 1);

        let base = RgbaImage::from_pixel(2, 1, Rgba([0, 200, 0, 255]));
        let palettes = build_palettes(&graph, &base, 2).unwrap();
        let map = build_weights_map(&subset, &[l0, l1], &graph, &palettes, &[], 1, 2);

        assert_eq!(map.channels, 1);
        assert_eq!(map.image.get_pixel(0, 0).0, [255, 0, 0, 0]);
        // About half layer 1 over the base.
        let texel = map.image.get_pixel(3, 1).0;
        assert!(texel[0] == 127 || texel[0] == 128, "got {texel:?}");
        assert_eq!(texel[1..], [0, 0, 0]);
        assert_eq!(map.broken_edge_points, 2);
        assert_eq!(map.discarded_weight_pixels, 0);
        let errors = map.errors.unwrap();
        assert_eq!(errors.get_pixel(1, 1), &YELLOW);
        assert_eq!(errors.get_pixel(2, 0), &YELLOW);
    }

    #[test]
    fn test_unsolved_cluster_blocks_are_magenta() {
        let subset = RgbaImage::from_pixel(2, 2, Rgba([0, 200, 0, 255]));
        let layer = GrayImage::from_pixel(2, 2, Luma([90]));
        let mut masks = Grid::new(1, 1, LayerMask::EMPTY);
        masks.set(0, 0, layers(&[0, 63]));
        let graph = build_graph(find_regions(&masks));
        let base = RgbaImage::from_pixel(1, 1, Rgba([0, 200, 0, 255]));
        let palettes = build_palettes(&graph, &base, 3).unwrap();

        let map = build_weights_map(&subset, &[layer], &graph, &palettes, &[0], 1, 3);
        let errors = map.errors.unwrap();
        assert_eq!(errors.get_pixel(1, 1), &MAGENTA);
        assert_eq!(map.channels, 2);
    }
}
