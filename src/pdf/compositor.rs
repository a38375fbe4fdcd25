//! Letterhead compositing: background page + scaled, centred content + page label.

use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use tracing::debug;

use super::import::{ObjectImporter, PageForm};
use super::reader::PdfReader;
use super::writer;
use crate::error::DocMergeError;

/// Distance of the label baseline origin from the right edge, in points.
pub const LABEL_RIGHT_OFFSET: f64 = 60.0;
/// Distance of the label baseline from the bottom edge, in points.
pub const LABEL_BOTTOM_OFFSET: f64 = 20.0;
pub const LABEL_FONT_SIZE: f64 = 10.0;

const LETTERHEAD_NAME: &str = "Lh";
const CONTENT_NAME: &str = "Pg";
const FONT_NAME: &str = "Helv";

/// Where a content page lands on the output page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Scale `content_w x content_h` by `scale` and centre it on a `page_w x page_h` page.
///
/// No clamping: a placement larger than the page yields negative offsets.
pub fn centered_placement(
    page_w: f64,
    page_h: f64,
    content_w: f64,
    content_h: f64,
    scale: f64,
) -> Placement {
    let width = content_w * scale;
    let height = content_h * scale;
    Placement {
        x: (page_w - width) / 2.0,
        y: (page_h - height) / 2.0,
        width,
        height,
    }
}

/// Label anchor in top-left-origin page coordinates: `(W - 60, H - 20)`.
pub fn label_anchor(page_w: f64, page_h: f64) -> (f64, f64) {
    (page_w - LABEL_RIGHT_OFFSET, page_h - LABEL_BOTTOM_OFFSET)
}

/// Label text for the 0-indexed page `index` of `total`.
pub fn page_label(index: usize, total: usize) -> String {
    format!("{} / {}", index + 1, total)
}

/// Merge `content` onto the first page of `letterhead` and serialise the result.
pub fn merge_with_letterhead(
    content: &[u8],
    letterhead: &[u8],
    scale: f64,
) -> crate::error::Result<Vec<u8>> {
    let content = PdfReader::from_bytes(content)?;
    let letterhead = PdfReader::from_bytes(letterhead)?;
    let mut output = composite(content.document(), letterhead.document(), scale)?;
    writer::save_to_bytes(&mut output)
}

/// Build the composited document in memory.
///
/// One output page per content page, each sized to the letterhead's first page.
pub fn composite(
    content: &Document,
    letterhead: &Document,
    scale: f64,
) -> crate::error::Result<Document> {
    let letterhead_page = letterhead
        .get_pages()
        .values()
        .next()
        .copied()
        .ok_or_else(|| DocMergeError::invalid_input("letterhead PDF has no pages"))?;

    let mut output = Document::with_version("1.7");
    let pages_id = output.new_object_id();

    let mut lh_importer = ObjectImporter::new(letterhead);
    let background = lh_importer.import_page_as_form(&mut output, letterhead_page)?;
    let (page_w, page_h) = background.display_size();

    let font_id = output.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let content_pages: Vec<ObjectId> = content.get_pages().into_values().collect();
    let total = content_pages.len();
    let mut content_importer = ObjectImporter::new(content);
    let mut kids = Vec::with_capacity(total);

    for (index, &source_page) in content_pages.iter().enumerate() {
        let foreground = content_importer.import_page_as_form(&mut output, source_page)?;
        let (content_w, content_h) = foreground.display_size();
        let placement = centered_placement(page_w, page_h, content_w, content_h, scale);
        debug!(
            page = index + 1,
            rotation = foreground.rotation,
            ?placement,
            "placing content page"
        );

        let ops = page_operations(
            &background,
            &foreground,
            &placement,
            scale,
            &page_label(index, total),
        );
        let content_id = output.add_object(Stream::new(dictionary! {}, ops.into_bytes()));

        let page_id = output.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(page_w as f32),
                Object::Real(page_h as f32),
            ],
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    LETTERHEAD_NAME => background.id,
                    CONTENT_NAME => foreground.id,
                },
                "Font" => dictionary! {
                    FONT_NAME => font_id,
                },
            },
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
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

/// Content stream for one output page: background, foreground, label.
///
/// Both forms are drawn upright, so rotated source pages appear the way a
/// viewer shows them.
fn page_operations(
    background: &PageForm,
    foreground: &PageForm,
    placement: &Placement,
    scale: f64,
    label: &str,
) -> String {
    let (page_w, page_h) = background.display_size();
    let (label_x, label_y_top) = label_anchor(page_w, page_h);
    // PDF user space grows upwards.
    let label_y = page_h - label_y_top;

    format!(
        "q {bg} cm /{LETTERHEAD_NAME} Do Q\n\
         q {fg} cm /{CONTENT_NAME} Do Q\n\
         BT /{FONT_NAME} {LABEL_FONT_SIZE} Tf 0 g 1 0 0 1 {label_x} {label_y} Tm ({label}) Tj ET\n",
        bg = fmt_matrix(background.placement_matrix(1.0, 0.0, 0.0)),
        fg = fmt_matrix(foreground.placement_matrix(scale, placement.x, placement.y)),
        label_x = fmt_num(label_x),
        label_y = fmt_num(label_y),
        label = escape_text(label),
    )
}

fn fmt_matrix(m: [f64; 6]) -> String {
    m.iter().map(|&v| fmt_num(v)).collect::<Vec<_>>().join(" ")
}

/// Format a number for a content stream (no exponent notation).
fn fmt_num(value: f64) -> String {
    let s = format!("{value:.4}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '(' | ')' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
