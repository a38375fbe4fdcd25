use lopdf::Document;

use super::optimizer;
use crate::error::DocMergeError;

/// Serialise a document after structural cleanup.
///
/// Unreachable objects are dropped and unfiltered streams (content, images,
/// fonts) are deflated before writing.
pub fn save_to_bytes(doc: &mut Document) -> crate::error::Result<Vec<u8>> {
    optimizer::optimize(doc);

    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|e| DocMergeError::pdf_write(e.to_string()))?;
    Ok(buf)
}
