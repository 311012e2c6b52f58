//! Raster loading and saving.
//!
//! The format follows the file extension (TGA, PNG or JPEG on load; TGA or
//! PNG on save).

use std::path::Path;

use image::{DynamicImage, GrayImage, Rgb, RgbImage, RgbaImage};
use strata_cluster::is_power_of_two_dims;
use tracing::debug;

use crate::IoError;

/// Loads an image as RGBA8.
///
/// # Errors
///
/// [`IoError::Missing`] if the file does not exist, [`IoError::Decode`] for
/// unsupported or corrupt files, and [`IoError::NotPowerOfTwo`] for
/// non-power-of-two dimensions.
pub fn load_image(path: &Path) -> Result<RgbaImage, IoError> {
    if !path.is_file() {
        return Err(IoError::Missing {
            path: path.to_path_buf(),
        });
    }

    let image = image::open(path)
        .map_err(|source| IoError::Decode {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgba8();

    let (width, height) = image.dimensions();
    if !is_power_of_two_dims(width, height) {
        return Err(IoError::NotPowerOfTwo {
            path: path.to_path_buf(),
            width,
            height,
        });
    }

    debug!("Loaded '{}' ({width}x{height})", path.display());
    Ok(image)
}

/// Saves an RGBA raster, dropping the alpha channel unless `use_alpha` is set.
pub fn save_rgba(path: &Path, image: &RgbaImage, use_alpha: bool) -> Result<(), IoError> {
    let image = if use_alpha {
        DynamicImage::ImageRgba8(image.clone())
    } else {
        DynamicImage::ImageRgba8(image.clone()).to_rgb8().into()
    };
    save(path, &image)
}

/// Saves the indirection map as RGB with the palette id in the red channel.
pub fn save_indirection(path: &Path, indirection: &GrayImage) -> Result<(), IoError> {
    let rgb = RgbImage::from_fn(indirection.width(), indirection.height(), |x, y| {
        Rgb([indirection.get_pixel(x, y)[0], 0, 0])
    });
    save(path, &DynamicImage::ImageRgb8(rgb))
}

fn save(path: &Path, image: &DynamicImage) -> Result<(), IoError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| IoError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    image.save(path).map_err(|source| IoError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("Saved '{}'", path.display());
    Ok(())
}
