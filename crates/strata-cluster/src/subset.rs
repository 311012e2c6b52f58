//! Color-coded subset-id map preparation.
//!
//! The subset-id map selects the base material per texel. Artists paint it
//! with flat colors, so near-identical colors are snapped to one canonical
//! entry and near-black or transparent texels become background.

use image::{Rgb, Rgba, RgbaImage};
use tracing::info;

use crate::ClusterError;

/// Maximum number of distinct subset colors.
pub const MAX_SUBSET_COLORS: usize = 64;

/// Alpha and RGB values at or below this are treated as empty.
const EMPTY_THRESHOLD: u8 = 8;

/// Per-channel tolerance when matching a texel against a known color.
const NEAR_COLOR_THRESHOLD: u8 = 6;

/// Fully transparent black.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Returns `true` if both colors have identical RGB channels.
pub fn same_rgb(a: Rgba<u8>, b: Rgba<u8>) -> bool {
    a.0[..3] == b.0[..3]
}

/// Returns `true` if every RGB channel differs by at most `threshold`.
pub fn near_rgb(a: Rgba<u8>, b: Rgba<u8>, threshold: u8) -> bool {
    a.0[..3]
        .iter()
        .zip(&b.0[..3])
        .all(|(&x, &y)| x.abs_diff(y) <= threshold)
}

/// A cleaned subset-id map and the distinct colors found in it.
#[derive(Clone, Debug)]
pub struct SubsetMap {
    /// Cleaned map: background is [`TRANSPARENT`], everything else is one of
    /// `colors` with alpha 255.
    pub image: RgbaImage,
    /// Distinct colors in order of first appearance.
    pub colors: Vec<Rgb<u8>>,
}

impl SubsetMap {
    /// Cleans `source` and collects its distinct colors.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::TooManySubsetColors`] if more than
    /// [`MAX_SUBSET_COLORS`] distinct colors are present.
    pub fn prepare(source: &RgbaImage) -> Result<Self, ClusterError> {
        let mut image = source.clone();
        let mut unique: Vec<Rgba<u8>> = Vec::with_capacity(MAX_SUBSET_COLORS);

        for pixel in image.pixels_mut() {
            let [r, g, b, a] = pixel.0;
            if a <= EMPTY_THRESHOLD
                || (r <= EMPTY_THRESHOLD && g <= EMPTY_THRESHOLD && b <= EMPTY_THRESHOLD)
            {
                *pixel = TRANSPARENT;
                continue;
            }

            match unique
                .iter()
                .find(|&&known| near_rgb(known, *pixel, NEAR_COLOR_THRESHOLD))
            {
                Some(&known) => *pixel = known,
                None => {
                    if unique.len() >= MAX_SUBSET_COLORS {
                        return Err(ClusterError::TooManySubsetColors {
                            max: MAX_SUBSET_COLORS,
                        });
                    }
                    unique.push(*pixel);
                }
            }
            pixel.0[3] = 255;
        }

        let colors: Vec<Rgb<u8>> = unique.iter().map(|c| Rgb([c[0], c[1], c[2]])).collect();
        for (i, c) in colors.iter().enumerate() {
            info!("Base material #{i} = 0x{:02X}{:02X}{:02X}", c[0], c[1], c[2]);
        }

        Ok(Self { image, colors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_near_colors_snap_to_first_seen() {
        let mut src = RgbaImage::new(2, 1);
        src.put_pixel(0, 0, Rgba([200, 100, 50, 255]));
        src.put_pixel(1, 0, Rgba([204, 97, 55, 255]));

        let map = SubsetMap::prepare(&src).unwrap();
        assert_eq!(map.colors.len(), 1);
        assert_eq!(map.image.get_pixel(1, 0), &Rgba([200, 100, 50, 255]));
    }

    #[test]
    fn test_dark_and_transparent_become_background() {
        let mut src = RgbaImage::new(3, 1);
        src.put_pixel(0, 0, Rgba([255, 0, 0, 4]));
        src.put_pixel(1, 0, Rgba([5, 8, 2, 255]));
        src.put_pixel(2, 0, Rgba([0, 200, 0, 128]));

        let map = SubsetMap::prepare(&src).unwrap();
        assert_eq!(map.image.get_pixel(0, 0), &TRANSPARENT);
        assert_eq!(map.image.get_pixel(1, 0), &TRANSPARENT);
        assert_eq!(map.image.get_pixel(2, 0), &Rgba([0, 200, 0, 255]));
        assert_eq!(map.colors, vec![Rgb([0, 200, 0])]);
    }

    #[test]
    fn test_too_many_colors_rejected() {
        // 13 reds x 5 greens, every pair further apart than the match tolerance.
        let mut distinct = RgbaImage::new(65, 1);
        for x in 0..65u32 {
            let r = 20 + (x % 13) as u8 * 18;
            let g = 20 + (x / 13) as u8 * 40;
            distinct.put_pixel(x, 0, Rgba([r, g, 90, 255]));
        }
        let result = SubsetMap::prepare(&distinct);
        assert!(matches!(
            result,
            Err(ClusterError::TooManySubsetColors { max: 64 })
        ));
    }
}
