// Shared fixtures: small PDFs built in memory with lopdf.
#![allow(dead_code)]

use docmerge::pdf::reader::PdfReader;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

/// Serialise a fixture document without any cleanup.
pub fn save(doc: &mut Document) -> Vec<u8> {
    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("save fixture");
    buf
}

/// Attach `page_ids` under a fresh Pages node and set the catalog.
fn finish_tree(doc: &mut Document, pages_id: ObjectId, page_ids: &[ObjectId]) {
    let kids: Vec<Object> = page_ids.iter().map(|&id| id.into()).collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_ids.len() as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
}

/// A document with one page per entry of `sizes` (width, height in points).
pub fn build_pdf(sizes: &[(i64, i64)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });

    let mut page_ids = Vec::new();
    for (i, &(w, h)) in sizes.iter().enumerate() {
        let ops = format!("0 0 m {w} {h} l S BT /F1 12 Tf 10 10 Td (page {}) Tj ET", i + 1);
        let content_id = doc.add_object(Stream::new(dictionary! {}, ops.into_bytes()));
        page_ids.push(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), w.into(), h.into()],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
            "Contents" => content_id,
        }));
    }

    finish_tree(&mut doc, pages_id, &page_ids);
    save(&mut doc)
}

/// Set `key` on the 1-indexed page `page_num` of `bytes` and re-serialise.
pub fn with_page_attribute(bytes: &[u8], page_num: u32, key: &str, value: Object) -> Vec<u8> {
    let mut doc = Document::load_mem(bytes).expect("parse fixture");
    let page_id = doc.get_pages()[&page_num];
    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .expect("page dictionary")
        .set(key, value);
    save(&mut doc)
}

/// A one-page document whose `/Contents` is an array, one stream per entry.
pub fn build_pdf_with_content_streams(width: i64, height: i64, streams: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let contents: Vec<Object> = streams
        .iter()
        .map(|ops| doc.add_object(Stream::new(dictionary! {}, ops.as_bytes().to_vec())).into())
        .collect();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
        "Contents" => contents,
    });
    finish_tree(&mut doc, pages_id, &[page_id]);
    save(&mut doc)
}

/// Decoded content of the Form XObject `name` drawn on page `page_num`.
pub fn form_content(bytes: &[u8], page_num: u32, name: &str) -> String {
    let doc = Document::load_mem(bytes).expect("parse output");
    let page_id = doc.get_pages()[&page_num];
    let page = doc.get_dictionary(page_id).expect("page");
    let resources = page.get(b"Resources").and_then(Object::as_dict).expect("resources");
    let xobjects = resources.get(b"XObject").and_then(Object::as_dict).expect("xobjects");
    let form_id = xobjects.get(name.as_bytes()).and_then(Object::as_reference).expect("form ref");
    let stream = doc.get_object(form_id).and_then(Object::as_stream).expect("form stream");
    let data = if stream.dict.has(b"Filter") {
        stream.decompressed_content().expect("inflate")
    } else {
        stream.content.clone()
    };
    String::from_utf8_lossy(&data).into_owned()
}

/// An image XObject dictionary with 8 bits per component.
pub fn image_dict(width: u32, height: u32, color_space: &str) -> Dictionary {
    dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => i64::from(width),
        "Height" => i64::from(height),
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8,
    }
}

/// A one-page Letter document drawing every stream in `images`.
///
/// Returns the bytes and the object ids the images were given.
pub fn build_pdf_with_images(images: Vec<Stream>) -> (Vec<u8>, Vec<ObjectId>) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut xobjects = Dictionary::new();
    let mut ops = String::new();
    let mut ids = Vec::new();
    for (i, image) in images.into_iter().enumerate() {
        let id = doc.add_object(image);
        let name = format!("Im{i}");
        ops.push_str(&format!("q 200 0 0 150 50 {} cm /{name} Do Q\n", 50 + i * 160));
        xobjects.set(name, id);
        ids.push(id);
    }

    let content_id = doc.add_object(Stream::new(dictionary! {}, ops.into_bytes()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Resources" => dictionary! { "XObject" => xobjects },
        "Contents" => content_id,
    });

    finish_tree(&mut doc, pages_id, &[page_id]);
    (save(&mut doc), ids)
}

/// Smooth RGB gradient, raw interleaved samples.
pub fn gradient_rgb(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            data.push((x * 255 / width.max(1)) as u8);
            data.push((y * 255 / height.max(1)) as u8);
            data.push(128);
        }
    }
    data
}

/// Smooth gray gradient, raw samples.
pub fn gradient_gray(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((width * height) as usize);
    for _ in 0..height {
        for x in 0..width {
            data.push((x * 255 / width.max(1)) as u8);
        }
    }
    data
}

/// zlib-compress `data` (FlateDecode).
pub fn flate(data: &[u8]) -> Vec<u8> {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("write");
    encoder.finish().expect("finish")
}

/// Width and height of every page, in order.
pub fn page_sizes(bytes: &[u8]) -> Vec<(f64, f64)> {
    let reader = PdfReader::from_bytes(bytes).expect("parse output");
    (1..=reader.page_count())
        .map(|p| reader.page_dimensions(p).expect("page size"))
        .collect()
}

/// Decoded content stream of the 1-indexed page `page_num`.
pub fn page_content(bytes: &[u8], page_num: u32) -> String {
    let doc = Document::load_mem(bytes).expect("parse output");
    let page_id = doc.get_pages()[&page_num];
    String::from_utf8_lossy(&doc.get_page_content(page_id).expect("content")).into_owned()
}
