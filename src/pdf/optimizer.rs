// Structural cleanup: FlateDecode compression and unreachable object removal.

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use lopdf::{Document, Object, ObjectId};

/// Apply FlateDecode to every stream in the document that has no filter yet.
///
/// Content streams, fonts and images alike; streams that already carry a
/// filter are skipped (no double compression), as are streams that
/// forbid compression. The compressed form is kept only when it is smaller.
pub fn compress_streams(doc: &mut Document) -> usize {
    let ids: Vec<ObjectId> = doc.objects.keys().copied().collect();
    let mut compressed_count = 0;

    for id in ids {
        let Some(Object::Stream(stream)) = doc.objects.get_mut(&id) else {
            continue;
        };
        if stream.dict.has(b"Filter") || !stream.allows_compression || stream.content.is_empty() {
            continue;
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        if encoder.write_all(&stream.content).is_err() {
            continue;
        }
        let Ok(compressed) = encoder.finish() else {
            continue;
        };
        if compressed.len() >= stream.content.len() {
            continue;
        }

        stream.dict.set("Filter", "FlateDecode");
        stream.set_content(compressed);
        compressed_count += 1;
    }

    compressed_count
}

/// Remove objects no longer reachable from the trailer.
pub fn delete_unused_objects(doc: &mut Document) -> usize {
    doc.prune_objects().len()
}

/// Run every cleanup pass in order.
///
/// 1. Remove unreachable objects (nothing is compressed that is about to be dropped)
/// 2. Compress unfiltered streams
pub fn optimize(doc: &mut Document) {
    let pruned = delete_unused_objects(doc);
    let compressed = compress_streams(doc);
    tracing::debug!(pruned, compressed, "structural cleanup done");
}
