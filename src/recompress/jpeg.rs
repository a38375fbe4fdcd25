// jpeg-encoder: RGB / gray raster -> progressive JPEG with optimised Huffman tables

use image::{GrayImage, RgbImage};
use jpeg_encoder::{ColorType, Encoder};

use crate::error::DocMergeError;

fn check_quality(quality: u8) -> crate::error::Result<()> {
    if !(1..=100).contains(&quality) {
        return Err(DocMergeError::jpeg_encode(format!(
            "JPEG quality must be 1-100, got {}",
            quality
        )));
    }
    Ok(())
}

/// JPEG frames address at most 65535 samples per side.
fn frame_size(width: u32, height: u32) -> crate::error::Result<(u16, u16)> {
    match (u16::try_from(width), u16::try_from(height)) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err(DocMergeError::jpeg_encode(format!(
            "image of {}x{} cannot be stored as JPEG",
            width, height
        ))),
    }
}

fn encode(
    samples: &[u8],
    width: u32,
    height: u32,
    color: ColorType,
    quality: u8,
) -> crate::error::Result<Vec<u8>> {
    check_quality(quality)?;
    let (w, h) = frame_size(width, height)?;

    let mut buf = Vec::new();
    let mut encoder = Encoder::new(&mut buf, quality);
    encoder.set_progressive(true);
    encoder.set_optimized_huffman_tables(true);
    encoder
        .encode(samples, w, h, color)
        .map_err(|e| DocMergeError::jpeg_encode(e.to_string()))?;

    Ok(buf)
}

/// Encode an RGB image to JPEG bytes at `quality` (1 = worst, 100 = best).
pub fn encode_rgb_to_jpeg(rgb: &RgbImage, quality: u8) -> crate::error::Result<Vec<u8>> {
    encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb, quality)
}

/// Encode a single-channel image to a grayscale JPEG.
pub fn encode_gray_to_jpeg(gray: &GrayImage, quality: u8) -> crate::error::Result<Vec<u8>> {
    encode(gray.as_raw(), gray.width(), gray.height(), ColorType::Luma, quality)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    fn has_marker(bytes: &[u8], marker: u8) -> bool {
        bytes.windows(2).any(|w| w == [0xFF, marker])
    }

    #[test]
    fn test_rgb_output_is_jpeg() {
        let img = RgbImage::from_pixel(16, 16, Rgb([200, 10, 10]));
        let bytes = encode_rgb_to_jpeg(&img, 80).expect("encode");
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(&bytes[bytes.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_output_is_progressive() {
        let img = RgbImage::from_fn(64, 64, |x, y| Rgb([(x * 4) as u8, (y * 4) as u8, 90]));
        let bytes = encode_rgb_to_jpeg(&img, 80).expect("encode");
        // SOF2 = progressive DCT, SOF0 = baseline
        assert!(has_marker(&bytes, 0xC2));
        assert!(!has_marker(&bytes, 0xC0));
    }

    #[test]
    fn test_gray_output_decodes_as_luma() {
        let img = GrayImage::from_pixel(8, 8, Luma([128]));
        let bytes = encode_gray_to_jpeg(&img, 90).expect("encode");
        assert!(has_marker(&bytes, 0xC2));
        let decoded = image::load_from_memory(&bytes).expect("decode");
        assert_eq!(decoded.color(), image::ColorType::L8);
    }

    #[test]
    fn test_quality_zero_rejected() {
        let img = RgbImage::new(2, 2);
        assert!(encode_rgb_to_jpeg(&img, 0).is_err());
        assert!(encode_gray_to_jpeg(&GrayImage::new(2, 2), 101).is_err());
    }

    #[test]
    fn test_oversized_frame_rejected() {
        assert!(frame_size(70_000, 10).is_err());
        assert!(frame_size(0, 10).is_err());
        assert_eq!(frame_size(640, 480).expect("size"), (640, 480));
    }
}
