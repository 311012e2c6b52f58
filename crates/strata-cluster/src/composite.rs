//! Front-to-back alpha compositing of layer masks into per-texel [`LayerMask`]s.

use image::{GrayImage, RgbaImage};
use tracing::warn;

use crate::diagnostics::{LazyRaster, RED};
use crate::mask::LayerMask;
use crate::raster::Grid;

/// Iterator over absolute layer weights, composited front to back.
///
/// Layer `i` with opacity `a_i` receives `a_i * acc`, after which
/// `acc *= 1 - a_i`. Whatever remains in `acc` belongs to the base layer,
/// see [`FrontToBack::remaining`].
pub struct FrontToBack<I> {
    alphas: I,
    index: u32,
    remaining: f32,
}

impl<I: Iterator<Item = u8>> FrontToBack<I> {
    /// Starts compositing the given 8-bit opacities.
    pub fn new(alphas: I) -> Self {
        Self {
            alphas,
            index: 0,
            remaining: 1.0,
        }
    }

    /// Weight not yet claimed by any layer; the base layer's share once the
    /// iterator is exhausted.
    pub fn remaining(&self) -> f32 {
        self.remaining
    }
}

impl<I: Iterator<Item = u8>> Iterator for FrontToBack<I> {
    /// `(layer index, absolute weight)`.
    type Item = (u32, f32);

    fn next(&mut self) -> Option<Self::Item> {
        let alpha = f32::from(self.alphas.next()?) / 255.0;
        let weight = alpha * self.remaining;
        self.remaining *= 1.0 - alpha;
        let index = self.index;
        self.index += 1;
        Some((index, weight))
    }
}

#[derive(Clone, Copy, Debug)]
struct LayerWeight {
    mask: LayerMask,
    weight: f32,
}

/// Result of [`build_mask_raster`].
#[derive(Debug)]
pub struct MaskRaster {
    /// Per-texel layer set; empty outside the base material.
    pub masks: Grid<LayerMask>,
    /// Texels where more layers were visible than the budget allows (red).
    pub truncated: Option<RgbaImage>,
    /// Number of truncated texels.
    pub truncated_texels: usize,
}

/// Composites downsampled layer masks into a per-texel [`LayerMask`] raster.
///
/// Only texels inside the base material (non-zero alpha in `base`) are
/// considered. When more than `budget` layers are visible at a texel, only
/// the `budget` heaviest are kept and the texel is flagged.
pub fn build_mask_raster(base: &RgbaImage, layers: &[GrayImage], budget: u32) -> MaskRaster {
    let (width, height) = base.dimensions();
    let budget = budget as usize;

    let mut masks = Grid::new(width, height, LayerMask::EMPTY);
    let mut truncated = LazyRaster::new(width, height);
    let mut truncated_texels = 0;
    let mut pixel_layers: Vec<LayerWeight> = Vec::with_capacity(layers.len() + 1);

    for y in 0..height {
        for x in 0..width {
            if base.get_pixel(x, y)[3] == 0 {
                continue;
            }

            pixel_layers.clear();
            let mut composite = FrontToBack::new(layers.iter().map(|l| l.get_pixel(x, y)[0]));
            for (index, weight) in composite.by_ref() {
                pixel_layers.push(LayerWeight {
                    mask: LayerMask::layer(index),
                    weight,
                });
            }
            pixel_layers.push(LayerWeight {
                mask: LayerMask::BASE,
                weight: composite.remaining(),
            });

            pixel_layers.sort_by(|a, b| b.weight.total_cmp(&a.weight));

            let visible = pixel_layers.iter().filter(|l| l.weight > 0.0).count();
            if visible > budget {
                truncated.put(x, y, RED);
                truncated_texels += 1;

                let kept: f32 = pixel_layers[..budget].iter().map(|l| l.weight).sum();
                for layer in &mut pixel_layers[..budget] {
                    layer.weight /= kept;
                }
                for layer in &mut pixel_layers[budget..] {
                    layer.weight = 0.0;
                }
            }

            let texel = masks.get_mut(x, y);
            for layer in pixel_layers.iter().filter(|l| l.weight > 0.0) {
                *texel |= layer.mask;
            }
        }
    }

    if truncated_texels > 0 {
        warn!("Too many layers per pixel in {truncated_texels} texel(s)");
    }

    MaskRaster {
        masks,
        truncated: truncated.into_image(),
        truncated_texels,
    }
}
