// Pixel preparation before JPEG encoding: downscale, flatten alpha, normalise colour.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Rgb, RgbImage};

/// Raster in one of the two layouts the JPEG encoder accepts.
#[derive(Debug)]
pub enum Prepared {
    Rgb(RgbImage),
    Gray(GrayImage),
}

impl Prepared {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Prepared::Rgb(img) => img.dimensions(),
            Prepared::Gray(img) => img.dimensions(),
        }
    }
}

/// Target size so that the longer side equals `max_dim`, aspect preserved.
///
/// Returns `None` when the image already fits.
pub fn fit_within(width: u32, height: u32, max_dim: u32) -> Option<(u32, u32)> {
    let longer = width.max(height);
    if longer <= max_dim {
        return None;
    }
    // Integer math: a square image stays square.
    let scaled =
        |side: u32| ((u64::from(side) * u64::from(max_dim) / u64::from(longer)) as u32).max(1);
    if width >= height {
        Some((max_dim, scaled(height)))
    } else {
        Some((scaled(width), max_dim))
    }
}

/// Downscale with Lanczos3 when the longer side exceeds `max_dim`.
pub fn downscale(image: DynamicImage, max_dim: u32) -> DynamicImage {
    match fit_within(image.width(), image.height(), max_dim) {
        Some((w, h)) => image.resize_exact(w, h, FilterType::Lanczos3),
        None => image,
    }
}

/// Composite an alpha channel over white; otherwise keep gray/RGB or convert to RGB.
pub fn flatten(image: DynamicImage) -> Prepared {
    if image.color().has_alpha() {
        let rgba = image.to_rgba8();
        let (w, h) = rgba.dimensions();
        let mut out = RgbImage::new(w, h);
        for (dst, src) in out.pixels_mut().zip(rgba.pixels()) {
            let [r, g, b, a] = src.0;
            *dst = Rgb([over_white(r, a), over_white(g, a), over_white(b, a)]);
        }
        return Prepared::Rgb(out);
    }

    match image {
        DynamicImage::ImageLuma8(gray) => Prepared::Gray(gray),
        DynamicImage::ImageRgb8(rgb) => Prepared::Rgb(rgb),
        other => Prepared::Rgb(other.to_rgb8()),
    }
}

fn over_white(channel: u8, alpha: u8) -> u8 {
    let c = u32::from(channel);
    let a = u32::from(alpha);
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{LumaA, Rgba, RgbaImage};

    #[test]
    fn test_fit_within_landscape() {
        assert_eq!(fit_within(3840, 2160, 1920), Some((1920, 1080)));
        assert_eq!(fit_within(1920, 1080, 1920), None);
    }

    #[test]
    fn test_fit_within_portrait_truncates() {
        assert_eq!(fit_within(1000, 3000, 1920), Some((640, 1920)));
        assert_eq!(fit_within(1001, 3000, 1920), Some((640, 1920)));
    }

    #[test]
    fn test_fit_within_keeps_one_pixel() {
        assert_eq!(fit_within(10000, 1, 1920), Some((1920, 1)));
    }

    #[test]
    fn test_downscale_longer_side() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(2400, 1200));
        let out = downscale(img, 1920);
        assert_eq!((out.width(), out.height()), (1920, 960));
    }

    #[test]
    fn test_transparent_pixel_becomes_white() {
        let mut rgba = RgbaImage::new(2, 1);
        rgba.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        rgba.put_pixel(1, 0, Rgba([0, 0, 0, 255]));
        let Prepared::Rgb(rgb) = flatten(DynamicImage::ImageRgba8(rgba)) else {
            panic!("expected RGB");
        };
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(rgb.get_pixel(1, 0).0, [0, 0, 0]);
    }

    #[test]
    fn test_half_alpha_blends() {
        let mut rgba = RgbaImage::new(1, 1);
        rgba.put_pixel(0, 0, Rgba([0, 0, 0, 128]));
        let Prepared::Rgb(rgb) = flatten(DynamicImage::ImageRgba8(rgba)) else {
            panic!("expected RGB");
        };
        assert_eq!(rgb.get_pixel(0, 0).0, [127, 127, 127]);
    }

    #[test]
    fn test_gray_alpha_flattens_to_rgb() {
        let img = image::ImageBuffer::from_pixel(1, 1, LumaA([10u8, 255]));
        assert!(matches!(
            flatten(DynamicImage::ImageLumaA8(img)),
            Prepared::Rgb(_)
        ));
    }

    #[test]
    fn test_gray_stays_gray() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(3, 3));
        assert!(matches!(flatten(img), Prepared::Gray(_)));
    }
}
