use std::collections::HashSet;

use lopdf::{Dictionary, Document, Object, ObjectId};

use tracing::warn;

use crate::error::DocMergeError;

/// Largest page side most viewers accept (14,400 pt = 200 in).
const PDF_MAX_DIMENSION_PT: f64 = 14_400.0;

/// Page rectangle in PDF user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl PageBox {
    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Overlap of two boxes, or `None` when they do not overlap.
    pub fn intersect(&self, other: &PageBox) -> Option<PageBox> {
        let b = PageBox {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        };
        (b.width() > 0.0 && b.height() > 0.0).then_some(b)
    }

    pub fn to_object(self) -> Object {
        Object::Array(vec![
            Object::Real(self.x0 as f32),
            Object::Real(self.y0 as f32),
            Object::Real(self.x1 as f32),
            Object::Real(self.y1 as f32),
        ])
    }
}

pub struct PdfReader {
    doc: Document,
}

impl PdfReader {
    /// Parse an in-memory PDF.
    pub fn from_bytes(bytes: &[u8]) -> crate::error::Result<Self> {
        let doc = Document::load_mem(bytes)
            .map_err(|e| DocMergeError::pdf_read(e.to_string()))?;
        Ok(Self { doc })
    }

    /// Borrow the underlying lopdf document.
    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn into_document(self) -> Document {
        self.doc
    }

    /// Number of pages.
    pub fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }

    /// Displayed page size `(width, height)` in points for the given page
    /// (1-indexed): the visible box, with the sides swapped for a quarter turn.
    pub fn page_dimensions(&self, page_num: u32) -> crate::error::Result<(f64, f64)> {
        let page_id = self.get_page_id(page_num)?;
        let b = page_box_of(&self.doc, page_id)?;
        Ok(rotated_size(&b, page_rotation(&self.doc, page_id)))
    }

    /// Object ids of the image XObjects referenced from the page's resources,
    /// including resources inherited from the page tree and those of nested
    /// Form XObjects.
    pub fn page_image_xobjects(&self, page_num: u32) -> crate::error::Result<Vec<ObjectId>> {
        let page_id = self.get_page_id(page_num)?;
        let (resource_dict, resource_ids) = self.doc.get_page_resources(page_id)?;

        let mut ids = Vec::new();
        let mut visited_forms = HashSet::new();
        if let Some(dict) = resource_dict {
            self.collect_image_ids(dict, &mut ids, &mut visited_forms)?;
        }
        for res_id in resource_ids {
            let dict = self.doc.get_dictionary(res_id)?;
            self.collect_image_ids(dict, &mut ids, &mut visited_forms)?;
        }

        let mut seen = HashSet::new();
        ids.retain(|id| seen.insert(*id));
        Ok(ids)
    }

    /// Collect `Subtype Image` streams from a resource dictionary's `/XObject`,
    /// descending into Form XObjects once each.
    fn collect_image_ids(
        &self,
        dict: &Dictionary,
        ids: &mut Vec<ObjectId>,
        visited_forms: &mut HashSet<ObjectId>,
    ) -> crate::error::Result<()> {
        let xobject_dict = match dict.get(b"XObject") {
            Ok(Object::Dictionary(d)) => d,
            Ok(Object::Reference(id)) => self.doc.get_object(*id).and_then(Object::as_dict)?,
            _ => return Ok(()),
        };

        for (_, value) in xobject_dict.iter() {
            let Object::Reference(id) = value else {
                continue;
            };
            let Ok(stream) = self.doc.get_object(*id).and_then(Object::as_stream) else {
                continue;
            };
            match stream.dict.get(b"Subtype").and_then(Object::as_name) {
                Ok(b"Image") => ids.push(*id),
                Ok(b"Form") if visited_forms.insert(*id) => {
                    let resources = match stream.dict.get(b"Resources") {
                        Ok(Object::Dictionary(d)) => Some(d),
                        Ok(Object::Reference(res_id)) => self.doc.get_dictionary(*res_id).ok(),
                        _ => None,
                    };
                    if let Some(resources) = resources {
                        self.collect_image_ids(resources, ids, visited_forms)?;
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn get_page_id(&self, page_num: u32) -> crate::error::Result<ObjectId> {
        let pages = self.doc.get_pages();
        pages
            .get(&page_num)
            .copied()
            .ok_or_else(|| DocMergeError::pdf_read(format!("page {} not found", page_num)))
    }
}

/// Look up a page attribute, following `/Parent` for inheritable keys.
pub(crate) fn inherited_attribute(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut current = dict;
    // Page trees deeper than this are malformed (or cyclic).
    for _ in 0..64 {
        if let Ok(obj) = current.get(key) {
            return Some(obj.clone());
        }
        let parent_id = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = doc.get_dictionary(parent_id).ok()?;
    }
    None
}

/// Visible box of a page: the CropBox clipped to the MediaBox, or the
/// MediaBox alone when there is no usable CropBox.
pub(crate) fn page_box_of(doc: &Document, page_id: ObjectId) -> crate::error::Result<PageBox> {
    let page_dict = doc.get_dictionary(page_id)?;
    let media_box = read_box(doc, page_dict, b"MediaBox")?
        .ok_or_else(|| DocMergeError::pdf_read("MediaBox not found"))?;

    let visible = match read_box(doc, page_dict, b"CropBox") {
        Ok(Some(crop)) => crop.intersect(&media_box).unwrap_or(media_box),
        _ => media_box,
    };

    if visible.width() > PDF_MAX_DIMENSION_PT || visible.height() > PDF_MAX_DIMENSION_PT {
        warn!(
            width = visible.width(),
            height = visible.height(),
            "page larger than 14400 pt"
        );
    }
    Ok(visible)
}

/// Read a rectangle attribute (inherited through `/Parent`), normalised so
/// that x0 < x1 and y0 < y1.
fn read_box(doc: &Document, page_dict: &Dictionary, key: &[u8]) -> crate::error::Result<Option<PageBox>> {
    let Some(rect) = inherited_attribute(doc, page_dict, key) else {
        return Ok(None);
    };
    let rect = match rect {
        Object::Reference(id) => doc.get_object(id)?.clone(),
        other => other,
    };
    let name = String::from_utf8_lossy(key);
    let values = rect.as_array()?;
    if values.len() < 4 {
        return Err(DocMergeError::pdf_read(format!("Invalid {name}")));
    }

    let coords = values[..4]
        .iter()
        .map(number)
        .collect::<Option<Vec<f64>>>()
        .ok_or_else(|| DocMergeError::pdf_read(format!("Invalid {name} value")))?;

    let b = PageBox {
        x0: coords[0].min(coords[2]),
        y0: coords[1].min(coords[3]),
        x1: coords[0].max(coords[2]),
        y1: coords[1].max(coords[3]),
    };
    if b.width() <= 0.0 || b.height() <= 0.0 {
        return Err(DocMergeError::pdf_read(format!(
            "Invalid {name}: non-positive page dimensions"
        )));
    }
    Ok(Some(b))
}

/// Clockwise `/Rotate` of a page in degrees: 0, 90, 180 or 270.
///
/// Values that are not a multiple of 90 are ignored, as viewers do.
pub(crate) fn page_rotation(doc: &Document, page_id: ObjectId) -> u16 {
    let Ok(page_dict) = doc.get_dictionary(page_id) else {
        return 0;
    };
    let degrees = match inherited_attribute(doc, page_dict, b"Rotate") {
        Some(Object::Integer(d)) => d,
        Some(Object::Real(d)) if d.fract() == 0.0 => d as i64,
        _ => 0,
    };
    match degrees.rem_euclid(360) {
        d @ (90 | 180 | 270) => d as u16,
        _ => 0,
    }
}

/// Width and height of `b` as displayed under `rotation`.
pub(crate) fn rotated_size(b: &PageBox, rotation: u16) -> (f64, f64) {
    if rotation % 180 == 90 {
        (b.height(), b.width())
    } else {
        (b.width(), b.height())
    }
}

/// Numeric PDF object as f64 (integers and reals both occur in boxes).
pub(crate) fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(*f as f64),
        _ => None,
    }
}
