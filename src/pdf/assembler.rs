//! Concatenation of whole documents.

use lopdf::{Document, Object, dictionary};
use tracing::debug;

use super::import::ObjectImporter;
use super::reader::PdfReader;
use super::writer;
use crate::error::DocMergeError;

/// Combine PDFs given as raw bytes, in order, and serialise the result.
pub fn combine_pdfs(inputs: &[Vec<u8>]) -> crate::error::Result<Vec<u8>> {
    let mut documents = Vec::with_capacity(inputs.len());
    for (i, bytes) in inputs.iter().enumerate() {
        let reader = PdfReader::from_bytes(bytes)
            .map_err(|e| DocMergeError::pdf_read(format!("document {}: {e}", i + 1)))?;
        documents.push(reader.into_document());
    }

    let mut output = assemble(&documents)?;
    writer::save_to_bytes(&mut output)
}

/// Build one document holding every page of `documents`, in list order.
///
/// Stream bytes are carried over verbatim; nothing is re-encoded here.
pub fn assemble(documents: &[Document]) -> crate::error::Result<Document> {
    let mut output = Document::with_version("1.7");
    let pages_id = output.new_object_id();
    let mut kids = Vec::new();

    for (doc_index, source) in documents.iter().enumerate() {
        let mut importer = ObjectImporter::new(source);
        let source_pages: Vec<_> = source.get_pages().into_values().collect();
        debug!(document = doc_index + 1, pages = source_pages.len(), "appending document");

        // Allocate destination ids up front so cross-page references
        // (links, annotation /P) land on the copied pages.
        let dest_ids: Vec<_> = source_pages
            .iter()
            .map(|&page_id| {
                let dest_id = output.new_object_id();
                importer.map_id(page_id, dest_id);
                dest_id
            })
            .collect();

        for (&page_id, &dest_id) in source_pages.iter().zip(&dest_ids) {
            let mut page = importer.import_page(&mut output, page_id)?;
            page.set("Parent", pages_id);
            output.objects.insert(dest_id, Object::Dictionary(page));
            kids.push(Object::Reference(dest_id));
        }
    }

    let count = kids.len() as i64;
    output.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = output.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    output.trailer.set("Root", catalog_id);

    Ok(output)
}
