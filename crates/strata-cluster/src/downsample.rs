//! Max-filter downsampling of layer masks and the subset-id map.
//!
//! Each output texel covers a `2^mip x 2^mip` block of source pixels. Layer
//! masks keep the block maximum so that any coverage survives. The subset-id
//! map must be uniform per block, and neighboring blocks must agree, or the
//! segmentation downstream would mix base materials.

use image::{GrayImage, Luma, Rgba, RgbaImage};
use tracing::error;

use crate::ClusterError;
use crate::diagnostics::{BLACK, RED};
use crate::raster::NEIGHBORS_8;
use crate::subset::{TRANSPARENT, same_rgb};

/// Edge length in source pixels of one downsample block.
pub fn block_size(mip_level: u32) -> u32 {
    1 << mip_level
}

/// Checks that a `width x height` image holds at least one block.
///
/// # Errors
///
/// Returns [`ClusterError::ImageTooSmall`] otherwise.
pub fn check_block_fit(width: u32, height: u32, mip_level: u32) -> Result<u32, ClusterError> {
    let block = block_size(mip_level);
    if width < block || height < block {
        return Err(ClusterError::ImageTooSmall {
            width,
            height,
            block,
        });
    }
    Ok(block)
}

/// Extracts the red channel, which carries a layer's opacity.
pub fn red_channel(image: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([image.get_pixel(x, y)[0]])
    })
}

/// Downsamples a layer opacity mask keeping the maximum of every block.
///
/// # Errors
///
/// Returns [`ClusterError::ImageTooSmall`] if the mask is smaller than a block.
pub fn downsample_layer_max(source: &GrayImage, mip_level: u32) -> Result<GrayImage, ClusterError> {
    let block = check_block_fit(source.width(), source.height(), mip_level)?;

    Ok(GrayImage::from_fn(
        source.width() >> mip_level,
        source.height() >> mip_level,
        |x, y| {
            let mut max = 0u8;
            for sy in 0..block {
                for sx in 0..block {
                    max = max.max(source.get_pixel(x * block + sx, y * block + sy)[0]);
                }
            }
            Luma([max])
        },
    ))
}

/// Downsamples the cleaned subset-id map, one color per block.
///
/// The block color is the first non-transparent pixel in row-major order, or
/// transparent if the block is empty.
///
/// # Errors
///
/// Returns [`ClusterError::InvalidMapping`] with a source-resolution
/// diagnostic if any block mixes two colors or two 8-adjacent non-empty
/// blocks differ.
pub fn downsample_base_max(source: &RgbaImage, mip_level: u32) -> Result<RgbaImage, ClusterError> {
    let block = check_block_fit(source.width(), source.height(), mip_level)?;
    let (width, height) = (source.width() >> mip_level, source.height() >> mip_level);

    let mut result = RgbaImage::from_pixel(width, height, TRANSPARENT);
    let mut diagnostic: Option<RgbaImage> = None;
    let mut bad_blocks = 0usize;

    for y in 0..height {
        for x in 0..width {
            let mut block_color: Option<Rgba<u8>> = None;
            let mut mixed = false;

            for sy in 0..block {
                for sx in 0..block {
                    let (ox, oy) = (x * block + sx, y * block + sy);
                    let pixel = *source.get_pixel(ox, oy);
                    if pixel[3] == 0 {
                        continue;
                    }
                    match block_color {
                        None => block_color = Some(pixel),
                        Some(color) if !same_rgb(color, pixel) => {
                            mixed = true;
                            diagnostic_image(&mut diagnostic, source).put_pixel(ox, oy, RED);
                        }
                        Some(_) => {}
                    }
                }
            }

            if mixed {
                bad_blocks += 1;
                let diag = diagnostic_image(&mut diagnostic, source);
                for_each_block_pixel(x, y, block, |ox, oy| diag.get_pixel_mut(ox, oy)[1] = 255);
            }

            result.put_pixel(x, y, block_color.unwrap_or(TRANSPARENT));
        }
    }

    for y in 0..height {
        for x in 0..width {
            let color = *result.get_pixel(x, y);
            if color[3] == 0 {
                continue;
            }

            let disagrees = NEIGHBORS_8.iter().any(|offset| {
                let (nx, ny) = (x as i32 + offset.x, y as i32 + offset.y);
                if nx < 0 || ny < 0 || nx >= width as i32 || ny >= height as i32 {
                    return false;
                }
                let neighbor = *result.get_pixel(nx as u32, ny as u32);
                neighbor[3] != 0 && !same_rgb(neighbor, color)
            });

            if disagrees {
                bad_blocks += 1;
                let diag = diagnostic_image(&mut diagnostic, source);
                for_each_block_pixel(x, y, block, |ox, oy| diag.get_pixel_mut(ox, oy)[2] = 255);
            }
        }
    }

    if let Some(diagnostic) = diagnostic {
        error!("Bad mapping found in {bad_blocks} block(s)");
        return Err(ClusterError::InvalidMapping {
            blocks: bad_blocks,
            diagnostic: Box::new(diagnostic),
        });
    }

    Ok(result)
}

fn diagnostic_image<'a>(slot: &'a mut Option<RgbaImage>, source: &RgbaImage) -> &'a mut RgbaImage {
    slot.get_or_insert_with(|| RgbaImage::from_pixel(source.width(), source.height(), BLACK))
}

fn for_each_block_pixel(bx: u32, by: u32, block: u32, mut f: impl FnMut(u32, u32)) {
    for sy in 0..block {
        for sx in 0..block {
            f(bx * block + sx, by * block + sy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREEN_ID: Rgba<u8> = Rgba([0, 200, 0, 255]);
    const BLUE_ID: Rgba<u8> = Rgba([0, 0, 200, 255]);

    #[test]
    fn test_layer_max_filter_keeps_peak() {
        let mut src = GrayImage::new(4, 4);
        src.put_pixel(1, 0, Luma([17]));
        src.put_pixel(3, 3, Luma([250]));
        src.put_pixel(2, 3, Luma([40]));

        let dst = downsample_layer_max(&src, 1).unwrap();
        assert_eq!(dst.dimensions(), (2, 2));
        assert_eq!(dst.get_pixel(0, 0)[0], 17);
        assert_eq!(dst.get_pixel(1, 0)[0], 0);
        assert_eq!(dst.get_pixel(1, 1)[0], 250);
    }

    #[test]
    fn test_too_small_image_rejected() {
        let src = GrayImage::new(4, 4);
        assert!(matches!(
            downsample_layer_max(&src, 3),
            Err(ClusterError::ImageTooSmall { block: 8, .. })
        ));
    }

    #[test]
    fn test_base_block_takes_first_color() {
        let mut src = RgbaImage::from_pixel(4, 4, TRANSPARENT);
        src.put_pixel(1, 1, GREEN_ID);
        let dst = downsample_base_max(&src, 1).unwrap();
        assert_eq!(dst.get_pixel(0, 0), &GREEN_ID);
        assert_eq!(dst.get_pixel(1, 1), &TRANSPARENT);
    }

    #[test]
    fn test_mixed_block_reports_mapping_error() {
        let mut src = RgbaImage::from_pixel(4, 4, TRANSPARENT);
        src.put_pixel(0, 0, GREEN_ID);
        src.put_pixel(1, 1, BLUE_ID);

        match downsample_base_max(&src, 1) {
            Err(ClusterError::InvalidMapping { blocks, diagnostic }) => {
                assert_eq!(blocks, 1);
                assert_eq!(diagnostic.dimensions(), (4, 4));
                // Offending pixel red, whole block flagged green.
                assert_eq!(diagnostic.get_pixel(1, 1).0, [255, 255, 0, 255]);
                assert_eq!(diagnostic.get_pixel(0, 1).0, [0, 255, 0, 255]);
                assert_eq!(diagnostic.get_pixel(3, 3).0, [0, 0, 0, 255]);
            }
            other => panic!("expected mapping error, got {other:?}"),
        }
    }

    #[test]
    fn test_disagreeing_neighbor_blocks_report_mapping_error() {
        let mut src = RgbaImage::from_pixel(4, 2, TRANSPARENT);
        src.put_pixel(0, 0, GREEN_ID);
        src.put_pixel(2, 0, BLUE_ID);

        match downsample_base_max(&src, 1) {
            Err(ClusterError::InvalidMapping { blocks, diagnostic }) => {
                assert_eq!(blocks, 2);
                assert_eq!(diagnostic.get_pixel(1, 1)[2], 255);
                assert_eq!(diagnostic.get_pixel(3, 1)[2], 255);
            }
            other => panic!("expected mapping error, got {other:?}"),
        }
    }

    #[test]
    fn test_separated_colors_are_valid() {
        let mut src = RgbaImage::from_pixel(6, 2, TRANSPARENT);
        src.put_pixel(0, 0, GREEN_ID);
        src.put_pixel(5, 1, BLUE_ID);
        // Blocks 0 and 2 are two apart: not adjacent.
        let dst = downsample_base_max(&src, 1);
        assert!(dst.is_ok());
    }
}
