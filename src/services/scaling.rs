//! Pre-detection downscaling
//!
//! Images whose longer side exceeds the cap are shrunk proportionally so the
//! longer side equals the cap. Detection geometry is always expressed in the
//! coordinates of the image actually fed to the model.

use image::imageops::{self, FilterType};
use image::RgbImage;

/// Longer-side cap applied before inference
pub const DEFAULT_MAX_DIMENSION: u32 = 1280;

/// Target size for an image of `width` x `height` under `max_dimension`.
/// Returns the input size when no scaling is needed.
pub fn scaled_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longer = width.max(height);
    if longer <= max_dimension {
        return (width, height);
    }
    // Integer math so exact ratios (e.g. 4:3) never truncate one pixel short
    let scale = |side: u32| (u64::from(side) * u64::from(max_dimension) / u64::from(longer)) as u32;
    (scale(width).max(1), scale(height).max(1))
}

/// Downscale if needed, with a Triangle (area-like) filter
pub fn fit_within(image: RgbImage, max_dimension: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    let (new_width, new_height) = scaled_dimensions(width, height, max_dimension);
    if (new_width, new_height) == (width, height) {
        return image;
    }
    imageops::resize(&image, new_width, new_height, FilterType::Triangle)
}
