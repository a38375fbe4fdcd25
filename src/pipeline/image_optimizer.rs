// Per-document image optimisation: enumerate -> recompress (parallel) -> apply + save

use std::collections::HashSet;

use lopdf::ObjectId;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::pdf::image_xobject;
use crate::pdf::reader::PdfReader;
use crate::pdf::writer;
use crate::recompress::{self, Decision};

/// Parameters for one optimisation job.
#[derive(Debug, Clone, Copy)]
pub struct OptimizeOptions {
    /// JPEG quality (1-100).
    pub quality: u8,
    /// Longer-side limit in pixels.
    pub max_image_dimension: u32,
}

/// What happened to a single image XObject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    Replaced { old_size: usize, new_size: usize },
    Kept { original_size: usize, candidate_size: usize },
    Skipped { reason: String },
}

#[derive(Debug, Clone)]
pub struct ImageReport {
    pub object_id: ObjectId,
    pub outcome: ImageOutcome,
}

/// Aggregated result of [`optimize_document`].
#[derive(Debug, Clone, Default)]
pub struct OptimizationReport {
    pub images: Vec<ImageReport>,
    pub input_size: usize,
    pub output_size: usize,
    /// The rewritten document was not smaller, so the input was returned as-is.
    pub kept_original_file: bool,
}

impl OptimizationReport {
    fn count(&self, pred: impl Fn(&ImageOutcome) -> bool) -> usize {
        self.images.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn replaced(&self) -> usize {
        self.count(|o| matches!(o, ImageOutcome::Replaced { .. }))
    }

    pub fn kept(&self) -> usize {
        self.count(|o| matches!(o, ImageOutcome::Kept { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ImageOutcome::Skipped { .. }))
    }
}

/// Phase B result for one image.
enum Attempt {
    /// The stream could not be decoded; nothing to recompress.
    Undecodable(crate::error::DocMergeError),
    Recompressed {
        stored_size: usize,
        merged_smask: bool,
        decision: crate::error::Result<Decision>,
    },
}

/// Recompress the embedded images of `input` and serialise the result.
///
/// Phase A: enumerate image ids, page order (sequential)
/// Phase B: decode + downscale + JPEG encode (rayon parallel)
/// Phase C: replace smaller images in place, save (sequential)
///
/// Each worker decodes its own image, so only the rasters in flight are held
/// in memory. A failure on one image is recorded in the report and never
/// aborts the job. Only a malformed document is an error.
pub fn optimize_document(
    input: &[u8],
    options: &OptimizeOptions,
) -> crate::error::Result<(Vec<u8>, OptimizationReport)> {
    let reader = PdfReader::from_bytes(input)?;
    let mut report = OptimizationReport {
        input_size: input.len(),
        ..OptimizationReport::default()
    };

    // --- Phase A: enumeration (sequential) ---
    let mut seen = HashSet::new();
    let mut image_ids = Vec::new();
    for page_num in 1..=reader.page_count() {
        match reader.page_image_xobjects(page_num) {
            Ok(ids) => image_ids.extend(ids.into_iter().filter(|id| seen.insert(*id))),
            Err(e) => warn!(page = page_num, error = %e, "cannot read page resources"),
        }
    }

    // --- Phase B: decode + recompression (rayon parallel) ---
    let doc = reader.document();
    let attempts: Vec<(ObjectId, Attempt)> = image_ids
        .into_par_iter()
        .map(|id| {
            let attempt = match image_xobject::decode_image_xobject(doc, id) {
                Ok(decoded) => Attempt::Recompressed {
                    stored_size: decoded.stored_size,
                    merged_smask: decoded.merged_smask,
                    decision: recompress::recompress_if_smaller(
                        decoded.image,
                        decoded.stored_size,
                        options.quality,
                        options.max_image_dimension,
                    ),
                },
                Err(e) => Attempt::Undecodable(e),
            };
            (id, attempt)
        })
        .collect();

    // --- Phase C: apply + serialise (sequential) ---
    let mut doc = reader.into_document();
    for (id, attempt) in attempts {
        let (stored_size, merged_smask, decision) = match attempt {
            Attempt::Recompressed {
                stored_size,
                merged_smask,
                decision,
            } => (stored_size, merged_smask, decision),
            Attempt::Undecodable(e) => {
                warn!(object = ?id, error = %e, "skipping image");
                report.images.push(ImageReport {
                    object_id: id,
                    outcome: ImageOutcome::Skipped {
                        reason: e.to_string(),
                    },
                });
                continue;
            }
        };
        let outcome = match decision {
            Ok(Decision::Replace(candidate)) => {
                let new_size = candidate.data.len();
                match image_xobject::replace_with_jpeg(&mut doc, id, &candidate, merged_smask) {
                    Ok(()) => {
                        debug!(object = ?id, old_size = stored_size, new_size, "image replaced");
                        ImageOutcome::Replaced {
                            old_size: stored_size,
                            new_size,
                        }
                    }
                    Err(e) => {
                        warn!(object = ?id, error = %e, "replacement failed");
                        ImageOutcome::Skipped {
                            reason: e.to_string(),
                        }
                    }
                }
            }
            Ok(Decision::Keep { candidate_size }) => {
                debug!(object = ?id, stored_size, candidate_size, "image kept");
                ImageOutcome::Kept {
                    original_size: stored_size,
                    candidate_size,
                }
            }
            Err(e) => {
                warn!(object = ?id, error = %e, "recompression failed");
                ImageOutcome::Skipped {
                    reason: e.to_string(),
                }
            }
        };
        report.images.push(ImageReport {
            object_id: id,
            outcome,
        });
    }

    let output = writer::save_to_bytes(&mut doc)?;
    let output = if output.len() < input.len() {
        output
    } else {
        report.kept_original_file = true;
        input.to_vec()
    };
    report.output_size = output.len();

    info!(
        replaced = report.replaced(),
        kept = report.kept(),
        skipped = report.skipped(),
        input_size = report.input_size,
        output_size = report.output_size,
        kept_original_file = report.kept_original_file,
        "optimisation finished"
    );
    Ok((output, report))
}
