//! Image Recompressor: downscale, flatten and re-encode a raster as JPEG.

pub mod jpeg;
pub mod raster;

use image::DynamicImage;

use raster::Prepared;

/// A JPEG re-encoding of an image.
#[derive(Debug, Clone)]
pub struct Recompressed {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub grayscale: bool,
}

/// What to do with one image after trying to recompress it.
#[derive(Debug, Clone)]
pub enum Decision {
    /// The candidate is strictly smaller than the stored bytes.
    Replace(Recompressed),
    /// The candidate is not smaller; the stored bytes stay.
    Keep { candidate_size: usize },
}

/// Encode `image` as JPEG at `quality`, downscaling so neither side exceeds `max_dim`.
pub fn recompress_image(
    image: DynamicImage,
    quality: u8,
    max_dim: u32,
) -> crate::error::Result<Recompressed> {
    let prepared = raster::flatten(raster::downscale(image, max_dim));
    let (width, height) = prepared.dimensions();
    let (data, grayscale) = match &prepared {
        Prepared::Rgb(rgb) => (jpeg::encode_rgb_to_jpeg(rgb, quality)?, false),
        Prepared::Gray(gray) => (jpeg::encode_gray_to_jpeg(gray, quality)?, true),
    };

    Ok(Recompressed {
        data,
        width,
        height,
        grayscale,
    })
}

/// Recompress and compare with `original_size`; only a strictly smaller result replaces.
pub fn recompress_if_smaller(
    image: DynamicImage,
    original_size: usize,
    quality: u8,
    max_dim: u32,
) -> crate::error::Result<Decision> {
    let candidate = recompress_image(image, quality, max_dim)?;
    if candidate.data.len() < original_size {
        Ok(Decision::Replace(candidate))
    } else {
        Ok(Decision::Keep {
            candidate_size: candidate.data.len(),
        })
    }
}
