//! Copying objects between documents.
//!
//! Object ids are private to a document, so anything taken from a source
//! document has to be re-homed in the destination with its references
//! rewritten. [`ObjectImporter`] does that once per source document and
//! remembers what it already copied, so shared fonts and images are only
//! imported once.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

use super::reader::{PageBox, inherited_attribute, page_box_of, page_rotation, rotated_size};

/// Page attributes that a page may inherit from its ancestors in the page tree.
pub const INHERITABLE_PAGE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Deep-copies objects from one source document into a destination.
pub struct ObjectImporter<'a> {
    source: &'a Document,
    mapping: HashMap<ObjectId, ObjectId>,
}

impl<'a> ObjectImporter<'a> {
    pub fn new(source: &'a Document) -> Self {
        Self {
            source,
            mapping: HashMap::new(),
        }
    }

    /// Pin a source id to an already-allocated destination id.
    ///
    /// References to `source_id` met later are rewritten to `dest_id`
    /// instead of producing another copy.
    pub fn map_id(&mut self, source_id: ObjectId, dest_id: ObjectId) {
        self.mapping.insert(source_id, dest_id);
    }

    /// Copy `obj` into `dest`, following indirect references.
    ///
    /// `/Parent` entries are dropped: they point back into the source page tree.
    pub fn import(&mut self, dest: &mut Document, obj: &Object) -> lopdf::Result<Object> {
        match obj {
            Object::Reference(id) => Ok(Object::Reference(self.import_reference(dest, *id)?)),
            Object::Dictionary(dict) => Ok(Object::Dictionary(self.import_dict(dest, dict)?)),
            Object::Array(arr) => {
                let mut out = Vec::with_capacity(arr.len());
                for item in arr {
                    out.push(self.import(dest, item)?);
                }
                Ok(Object::Array(out))
            }
            Object::Stream(stream) => {
                let dict = self.import_dict(dest, &stream.dict)?;
                let mut copied = Stream::new(dict, stream.content.clone());
                copied.allows_compression = stream.allows_compression;
                Ok(Object::Stream(copied))
            }
            _ => Ok(obj.clone()),
        }
    }

    pub fn import_dict(&mut self, dest: &mut Document, dict: &Dictionary) -> lopdf::Result<Dictionary> {
        let mut out = Dictionary::new();
        for (key, value) in dict.iter() {
            if key.as_slice() == b"Parent" {
                continue;
            }
            out.set(key.clone(), self.import(dest, value)?);
        }
        Ok(out)
    }

    fn import_reference(&mut self, dest: &mut Document, id: ObjectId) -> lopdf::Result<ObjectId> {
        if let Some(&new_id) = self.mapping.get(&id) {
            return Ok(new_id);
        }

        // Reserve the id first so cycles (annotation /P -> page -> /Annots)
        // resolve to the same copy.
        let new_id = dest.new_object_id();
        self.mapping.insert(id, new_id);

        let copied = match self.source.get_object(id) {
            Ok(referenced) => self.import(dest, referenced)?,
            // Dangling references are legal in PDF and read as null.
            Err(_) => Object::Null,
        };
        dest.objects.insert(new_id, copied);
        Ok(new_id)
    }

    /// Copy a page dictionary with its inherited attributes made explicit.
    ///
    /// The returned dictionary has no `/Parent`; the caller attaches it to
    /// its own page tree.
    pub fn import_page(&mut self, dest: &mut Document, page_id: ObjectId) -> lopdf::Result<Dictionary> {
        let page_dict = self.source.get_dictionary(page_id)?;
        let mut flattened = page_dict.clone();
        for key in INHERITABLE_PAGE_KEYS {
            if !flattened.has(key)
                && let Some(value) = inherited_attribute(self.source, page_dict, key)
            {
                flattened.set(key.to_vec(), value);
            }
        }
        self.import_dict(dest, &flattened)
    }

    /// Turn a source page into a Form XObject in `dest`.
    ///
    /// The form's `/BBox` is the page's visible box, which clips the drawing
    /// to the CropBox. `/Rotate` is not part of a form; it is recorded on the
    /// returned [`PageForm`] and applied by whoever places the form.
    pub fn import_page_as_form(
        &mut self,
        dest: &mut Document,
        page_id: ObjectId,
    ) -> crate::error::Result<PageForm> {
        let page_box = page_box_of(self.source, page_id)?;
        let rotation = page_rotation(self.source, page_id);
        let content = page_content(self.source, page_id);

        let page_dict = self.source.get_dictionary(page_id)?;
        let resources = match inherited_attribute(self.source, page_dict, b"Resources") {
            Some(res) => self.import(dest, &res)?,
            None => Object::Dictionary(Dictionary::new()),
        };

        let form_dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "FormType" => 1,
            "BBox" => page_box.to_object(),
            "Resources" => resources,
        };
        let id = dest.add_object(Stream::new(form_dict, content));
        Ok(PageForm {
            id,
            page_box,
            rotation,
        })
    }
}

/// Decoded content of a page, its streams joined by newlines.
///
/// A content stream may end mid-line, so streams are never concatenated
/// directly: `S` followed by `q` would otherwise read as `Sq`.
pub fn page_content(doc: &Document, page_id: ObjectId) -> Vec<u8> {
    let mut combined = Vec::new();
    for (index, stream_id) in doc.get_page_contents(page_id).into_iter().enumerate() {
        let Ok(stream) = doc.get_object(stream_id).and_then(Object::as_stream) else {
            continue;
        };
        if index > 0 {
            combined.push(b'\n');
        }
        match stream.decompressed_content() {
            Ok(data) => combined.extend_from_slice(&data),
            Err(_) => combined.extend_from_slice(&stream.content),
        }
    }
    combined
}

/// A page embedded as a Form XObject.
#[derive(Debug, Clone, Copy)]
pub struct PageForm {
    pub id: ObjectId,
    pub page_box: PageBox,
    /// Clockwise page rotation in degrees (0, 90, 180 or 270).
    pub rotation: u16,
}

impl PageForm {
    /// Size of the page as a viewer shows it.
    pub fn display_size(&self) -> (f64, f64) {
        rotated_size(&self.page_box, self.rotation)
    }

    /// `cm` operands that draw the form upright, scaled by `scale`, with the
    /// lower-left corner of the displayed page at `(tx, ty)`.
    pub fn placement_matrix(&self, scale: f64, tx: f64, ty: f64) -> [f64; 6] {
        let PageBox { x0, y0, x1, y1 } = self.page_box;
        // Map the box onto [0, w] x [0, h] of the displayed page.
        let [a, b, c, d, e, f] = match self.rotation {
            90 => [0.0, -1.0, 1.0, 0.0, -y0, x1],
            180 => [-1.0, 0.0, 0.0, -1.0, x1, y1],
            270 => [0.0, 1.0, -1.0, 0.0, y1, -x0],
            _ => [1.0, 0.0, 0.0, 1.0, -x0, -y0],
        };
        [
            a * scale,
            b * scale,
            c * scale,
            d * scale,
            e * scale + tx,
            f * scale + ty,
        ]
    }
}
