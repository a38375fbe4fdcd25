// Image XObject metadata, decoding of stored streams, in-place replacement.

use std::io::Read;

use flate2::read::ZlibDecoder;
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::DocMergeError;
use crate::recompress::Recompressed;

/// Colour model of a stored image, as far as this crate can decode it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorModel {
    Gray,
    Rgb,
    Cmyk,
    /// Indexed, Lab, DeviceN, ...
    Other,
}

/// Image XObject metadata.
#[derive(Debug, Clone)]
pub struct ImageMeta {
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u8,
    pub color: ColorModel,
    pub filters: Vec<String>,
    pub has_decode_parms: bool,
    pub is_stencil: bool,
    pub has_color_key_mask: bool,
    pub smask: Option<ObjectId>,
}

impl ImageMeta {
    /// The filter chain reduced to a single filter, if it is one.
    fn single_filter(&self) -> Option<&str> {
        match self.filters.as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        }
    }
}

/// An image XObject decoded to pixels, ready for recompression.
#[derive(Debug)]
pub struct DecodedImage {
    pub image: DynamicImage,
    /// Bytes stored in the PDF for the base image (what a replacement must beat).
    pub stored_size: usize,
    /// `/SMask` folded into the pixels as an alpha channel.
    pub merged_smask: bool,
}

/// Read the image XObject metadata from a stream dictionary.
pub fn read_image_meta(doc: &Document, dict: &Dictionary) -> crate::error::Result<ImageMeta> {
    let width = dict_get_u32(dict, b"Width")?;
    let height = dict_get_u32(dict, b"Height")?;
    // BitsPerComponent: only a missing key defaults to 8; type errors propagate
    let bits_per_component = match dict.get(b"BitsPerComponent") {
        Ok(_) => dict_get_u32(dict, b"BitsPerComponent")? as u8,
        Err(_) => 8,
    };

    let color = match dict.get(b"ColorSpace") {
        Ok(obj) => color_model(doc, obj),
        Err(_) => ColorModel::Rgb,
    };

    let filters = match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![String::from_utf8_lossy(name).into_owned()],
        Ok(Object::Array(arr)) => arr
            .iter()
            .filter_map(|obj| obj.as_name().ok())
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .collect(),
        _ => Vec::new(),
    };

    let is_stencil = dict
        .get(b"ImageMask")
        .and_then(Object::as_bool)
        .unwrap_or(false);
    let has_color_key_mask = matches!(dict.get(b"Mask"), Ok(Object::Array(_)));
    let smask = dict.get(b"SMask").and_then(Object::as_reference).ok();
    let has_decode_parms = matches!(
        dict.get(b"DecodeParms"),
        Ok(Object::Dictionary(_)) | Ok(Object::Reference(_)) | Ok(Object::Array(_))
    );

    Ok(ImageMeta {
        width,
        height,
        bits_per_component,
        color,
        filters,
        has_decode_parms,
        is_stencil,
        has_color_key_mask,
        smask,
    })
}

/// Map a `/ColorSpace` entry onto a [`ColorModel`].
fn color_model(doc: &Document, obj: &Object) -> ColorModel {
    let resolved = match obj {
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(o) => o,
            Err(_) => return ColorModel::Other,
        },
        other => other,
    };

    match resolved {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => ColorModel::Gray,
            b"DeviceRGB" | b"CalRGB" | b"RGB" => ColorModel::Rgb,
            b"DeviceCMYK" | b"CMYK" => ColorModel::Cmyk,
            _ => ColorModel::Other,
        },
        Object::Array(arr) => {
            let family = arr.first().and_then(|o| o.as_name().ok());
            match family {
                Some(b"ICCBased") => {
                    let components = arr
                        .get(1)
                        .and_then(|o| o.as_reference().ok())
                        .and_then(|id| doc.get_object(id).ok())
                        .and_then(|o| o.as_stream().ok())
                        .and_then(|s| s.dict.get(b"N").and_then(Object::as_i64).ok());
                    match components {
                        Some(1) => ColorModel::Gray,
                        Some(3) => ColorModel::Rgb,
                        Some(4) => ColorModel::Cmyk,
                        _ => ColorModel::Other,
                    }
                }
                Some(b"CalGray") => ColorModel::Gray,
                Some(b"CalRGB") => ColorModel::Rgb,
                _ => ColorModel::Other,
            }
        }
        _ => ColorModel::Other,
    }
}

/// Dictionary value as u32 (negative values are an error).
fn dict_get_u32(dict: &Dictionary, key: &[u8]) -> crate::error::Result<u32> {
    match dict.get(key) {
        Ok(Object::Integer(i)) => u32::try_from(*i).map_err(|_| {
            DocMergeError::image_xobject(format!(
                "Value out of u32 range for {:?}: {}",
                String::from_utf8_lossy(key),
                i
            ))
        }),
        Ok(Object::Real(f)) if *f >= 0.0 && *f <= u32::MAX as f32 => Ok(*f as u32),
        Ok(other) => Err(DocMergeError::image_xobject(format!(
            "Expected integer for {:?}, got {:?}",
            String::from_utf8_lossy(key),
            other
        ))),
        Err(_) => Err(DocMergeError::image_xobject(format!(
            "Missing required key: {:?}",
            String::from_utf8_lossy(key),
        ))),
    }
}

/// Decode the image XObject `id` into pixels.
///
/// Supported: DCTDecode, FlateDecode (no predictor) and unfiltered streams
/// with 8-bit gray or RGB samples. A soft mask is merged as alpha. Anything
/// else is an error for the caller to record as skipped.
pub fn decode_image_xobject(doc: &Document, id: ObjectId) -> crate::error::Result<DecodedImage> {
    let stream = doc
        .get_object(id)
        .and_then(Object::as_stream)
        .map_err(|e| DocMergeError::image_xobject(format!("object {id:?} is not a stream: {e}")))?;
    let meta = read_image_meta(doc, &stream.dict)?;

    if meta.is_stencil {
        return Err(DocMergeError::image_xobject("stencil masks are left untouched"));
    }
    if meta.has_color_key_mask {
        return Err(DocMergeError::image_xobject(
            "colour-key masked images are left untouched",
        ));
    }
    if stream.dict.has(b"Decode") {
        return Err(DocMergeError::image_xobject("/Decode arrays are not applied"));
    }

    let mut image = decode_samples(&stream.content, &meta)?;
    check_dimensions(&image, &meta)?;

    let merged_smask = match meta.smask {
        Some(mask_id) => {
            let mask = decode_soft_mask(doc, mask_id)?;
            image = merge_alpha(&image, &mask)?;
            true
        }
        None => false,
    };

    Ok(DecodedImage {
        image,
        stored_size: stream.content.len(),
        merged_smask,
    })
}

/// Decode a `/SMask` image into an 8-bit gray alpha plane.
fn decode_soft_mask(doc: &Document, id: ObjectId) -> crate::error::Result<GrayImage> {
    let stream = doc
        .get_object(id)
        .and_then(Object::as_stream)
        .map_err(|e| DocMergeError::image_xobject(format!("SMask {id:?} unreadable: {e}")))?;
    let mut meta = read_image_meta(doc, &stream.dict)?;
    // Soft masks are always DeviceGray, whatever the dictionary claims.
    meta.color = ColorModel::Gray;
    let mask = decode_samples(&stream.content, &meta)?;
    Ok(mask.to_luma8())
}

fn check_dimensions(image: &DynamicImage, meta: &ImageMeta) -> crate::error::Result<()> {
    if image.width() != meta.width || image.height() != meta.height {
        return Err(DocMergeError::image_xobject(format!(
            "decoded size {}x{} does not match dictionary {}x{}",
            image.width(),
            image.height(),
            meta.width,
            meta.height
        )));
    }
    Ok(())
}

/// Attach `mask` as the alpha channel of `image`, resizing the mask if needed.
fn merge_alpha(image: &DynamicImage, mask: &GrayImage) -> crate::error::Result<DynamicImage> {
    let mask = if mask.dimensions() == (image.width(), image.height()) {
        mask.clone()
    } else {
        image::imageops::resize(
            mask,
            image.width(),
            image.height(),
            image::imageops::FilterType::Triangle,
        )
    };

    let mut rgba: RgbaImage = image.to_rgba8();
    for (pixel, alpha) in rgba.pixels_mut().zip(mask.pixels()) {
        pixel.0[3] = alpha.0[0];
    }
    Ok(DynamicImage::ImageRgba8(rgba))
}

fn decode_samples(data: &[u8], meta: &ImageMeta) -> crate::error::Result<DynamicImage> {
    match meta.single_filter() {
        Some("DCTDecode") | Some("DCT") => decode_jpeg(data, meta),
        Some("FlateDecode") | Some("Fl") => {
            if meta.has_decode_parms {
                return Err(DocMergeError::image_xobject(
                    "FlateDecode with DecodeParms (predictors) is not supported",
                ));
            }
            decode_flate(data, meta)
        }
        None if meta.filters.is_empty() => decode_raw(data, meta),
        _ => Err(DocMergeError::image_xobject(format!(
            "Unsupported image filter chain: {:?}",
            meta.filters
        ))),
    }
}

fn decode_jpeg(data: &[u8], meta: &ImageMeta) -> crate::error::Result<DynamicImage> {
    if meta.color == ColorModel::Cmyk {
        return Err(DocMergeError::image_xobject("CMYK JPEG images are not re-encoded"));
    }
    let reader = image::ImageReader::with_format(
        std::io::Cursor::new(data),
        image::ImageFormat::Jpeg,
    );
    reader
        .decode()
        .map_err(|e| DocMergeError::image_xobject(format!("JPEG decode error: {}", e)))
}

fn decode_flate(data: &[u8], meta: &ImageMeta) -> crate::error::Result<DynamicImage> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| DocMergeError::image_xobject(format!("FlateDecode error: {}", e)))?;
    decode_raw(&decompressed, meta)
}

fn decode_raw(data: &[u8], meta: &ImageMeta) -> crate::error::Result<DynamicImage> {
    let w = meta.width;
    let h = meta.height;
    let pixels = (w as usize)
        .checked_mul(h as usize)
        .ok_or_else(|| DocMergeError::image_xobject("image dimensions overflow"))?;

    match (meta.color, meta.bits_per_component) {
        (ColorModel::Rgb, 8) => {
            let expected = pixels * 3;
            if data.len() < expected {
                return Err(DocMergeError::image_xobject(format!(
                    "RGB data too short: expected {}, got {}",
                    expected,
                    data.len()
                )));
            }
            let img = RgbImage::from_raw(w, h, data[..expected].to_vec()).ok_or_else(|| {
                DocMergeError::image_xobject("Failed to create RGB image from raw data")
            })?;
            Ok(DynamicImage::ImageRgb8(img))
        }
        (ColorModel::Gray, 8) => {
            if data.len() < pixels {
                return Err(DocMergeError::image_xobject(format!(
                    "Gray data too short: expected {}, got {}",
                    pixels,
                    data.len()
                )));
            }
            let img = GrayImage::from_raw(w, h, data[..pixels].to_vec()).ok_or_else(|| {
                DocMergeError::image_xobject("Failed to create Gray image from raw data")
            })?;
            Ok(DynamicImage::ImageLuma8(img))
        }
        (cs, bpc) => Err(DocMergeError::image_xobject(format!(
            "Unsupported color space / BPC combination: {:?} / {}",
            cs, bpc
        ))),
    }
}

/// Overwrite the image XObject `id` with a recompressed JPEG.
///
/// Only the stream and its pixel-describing keys change; the object id,
/// and therefore every placement of the image on every page, stays the same.
pub fn replace_with_jpeg(
    doc: &mut Document,
    id: ObjectId,
    replacement: &Recompressed,
    drop_smask: bool,
) -> crate::error::Result<()> {
    let stream = doc
        .get_object_mut(id)
        .and_then(Object::as_stream_mut)
        .map_err(|e| DocMergeError::image_xobject(format!("object {id:?} is not a stream: {e}")))?;

    let dict = &mut stream.dict;
    dict.set("Width", i64::from(replacement.width));
    dict.set("Height", i64::from(replacement.height));
    dict.set(
        "ColorSpace",
        if replacement.grayscale { "DeviceGray" } else { "DeviceRGB" },
    );
    dict.set("BitsPerComponent", 8);
    dict.set("Filter", "DCTDecode");
    dict.remove(b"DecodeParms");
    dict.remove(b"Decode");
    if drop_smask {
        dict.remove(b"SMask");
    }
    stream.set_content(replacement.data.clone());
    // JPEG data must not be deflated again on save.
    stream.allows_compression = false;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, dictionary};

    fn flate_encode(data: &[u8]) -> Vec<u8> {
        use flate2::Compression;
        use flate2::write::ZlibEncoder;
        use std::io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).expect("write");
        encoder.finish().expect("finish")
    }

    fn add_image(doc: &mut Document, dict: Dictionary, data: Vec<u8>) -> ObjectId {
        doc.add_object(Stream::new(dict, data))
    }

    #[test]
    fn test_read_image_meta_defaults() {
        let doc = Document::with_version("1.5");
        let dict = dictionary! {
            "Subtype" => "Image",
            "Width" => 50,
            "Height" => 30,
        };
        let meta = read_image_meta(&doc, &dict).expect("meta");
        assert_eq!((meta.width, meta.height), (50, 30));
        assert_eq!(meta.bits_per_component, 8);
        assert_eq!(meta.color, ColorModel::Rgb);
        assert!(meta.filters.is_empty());
        assert!(meta.smask.is_none());
    }

    #[test]
    fn test_read_image_meta_negative_width() {
        let doc = Document::with_version("1.5");
        let dict = dictionary! { "Width" => -5, "Height" => 30 };
        assert!(read_image_meta(&doc, &dict).is_err());
    }

    #[test]
    fn test_icc_based_component_count() {
        let mut doc = Document::with_version("1.5");
        let icc = doc.add_object(Stream::new(dictionary! { "N" => 1 }, vec![0; 4]));
        let cs = Object::Array(vec![Object::Name(b"ICCBased".to_vec()), Object::Reference(icc)]);
        assert_eq!(color_model(&doc, &cs), ColorModel::Gray);
    }

    #[test]
    fn test_decode_flate_rgb_exact_pixels() {
        let mut doc = Document::with_version("1.5");
        let raw: Vec<u8> = [100u8, 150, 200].repeat(30 * 30);
        let id = add_image(
            &mut doc,
            dictionary! {
                "Subtype" => "Image",
                "Width" => 30,
                "Height" => 30,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            flate_encode(&raw),
        );

        let decoded = decode_image_xobject(&doc, id).expect("decode");
        assert_eq!(decoded.image.width(), 30);
        assert_eq!(decoded.image.to_rgb8().get_pixel(0, 0).0, [100, 150, 200]);
        assert!(!decoded.merged_smask);
    }

    #[test]
    fn test_decode_merges_smask_as_alpha() {
        let mut doc = Document::with_version("1.5");
        let mask_id = add_image(
            &mut doc,
            dictionary! {
                "Subtype" => "Image",
                "Width" => 4,
                "Height" => 4,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![0u8; 16],
        );
        let id = add_image(
            &mut doc,
            dictionary! {
                "Subtype" => "Image",
                "Width" => 4,
                "Height" => 4,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "SMask" => mask_id,
            },
            vec![10u8; 48],
        );

        let decoded = decode_image_xobject(&doc, id).expect("decode");
        assert!(decoded.merged_smask);
        assert!(decoded.image.color().has_alpha());
        assert_eq!(decoded.image.to_rgba8().get_pixel(1, 1).0[3], 0);
        assert_eq!(decoded.stored_size, 48);
    }

    #[test]
    fn test_decode_rejects_stencil_and_predictors() {
        let mut doc = Document::with_version("1.5");
        let stencil = add_image(
            &mut doc,
            dictionary! {
                "Subtype" => "Image",
                "Width" => 8,
                "Height" => 1,
                "ImageMask" => true,
                "BitsPerComponent" => 1,
            },
            vec![0xFF],
        );
        let predicted = add_image(
            &mut doc,
            dictionary! {
                "Subtype" => "Image",
                "Width" => 1,
                "Height" => 1,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
                "DecodeParms" => dictionary! { "Predictor" => 15, "Columns" => 1 },
            },
            flate_encode(&[0, 0]),
        );

        assert!(decode_image_xobject(&doc, stencil).is_err());
        assert!(decode_image_xobject(&doc, predicted).is_err());
    }

    #[test]
    fn test_decode_skips_inverted_decode_array() {
        let mut doc = Document::with_version("1.5");
        let id = add_image(
            &mut doc,
            dictionary! {
                "Subtype" => "Image",
                "Width" => 2,
                "Height" => 2,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Decode" => vec![Object::Integer(1), Object::Integer(0)],
            },
            vec![0u8; 4],
        );
        assert!(decode_image_xobject(&doc, id).is_err());
    }

    #[test]
    fn test_decode_rejects_short_data() {
        let mut doc = Document::with_version("1.5");
        let id = add_image(
            &mut doc,
            dictionary! {
                "Subtype" => "Image",
                "Width" => 10,
                "Height" => 10,
                "ColorSpace" => "DeviceGray",
            },
            vec![0u8; 20],
        );
        assert!(decode_image_xobject(&doc, id).is_err());
    }

    #[test]
    fn test_replace_with_jpeg_rewrites_dictionary() {
        let mut doc = Document::with_version("1.5");
        let id = add_image(
            &mut doc,
            dictionary! {
                "Subtype" => "Image",
                "Width" => 10,
                "Height" => 10,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
                "DecodeParms" => dictionary! { "Predictor" => 1 },
                "SMask" => Object::Reference((99, 0)),
            },
            vec![1, 2, 3],
        );
        let replacement = Recompressed {
            data: vec![0xFF, 0xD8, 0xFF, 0xD9],
            width: 5,
            height: 5,
            grayscale: true,
        };

        replace_with_jpeg(&mut doc, id, &replacement, true).expect("replace");

        let stream = doc.get_object(id).unwrap().as_stream().unwrap();
        assert_eq!(stream.content, vec![0xFF, 0xD8, 0xFF, 0xD9]);
        assert_eq!(stream.dict.get(b"Filter").unwrap().as_name().unwrap(), b"DCTDecode");
        assert_eq!(stream.dict.get(b"ColorSpace").unwrap().as_name().unwrap(), b"DeviceGray");
        assert_eq!(stream.dict.get(b"Width").unwrap().as_i64().unwrap(), 5);
        assert!(stream.dict.get(b"DecodeParms").is_err());
        assert!(stream.dict.get(b"SMask").is_err());
    }
}
