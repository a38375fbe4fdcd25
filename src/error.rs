use thiserror::Error;

/// Failures of the PDF library and letterhead store.
///
/// The HTTP layer maps `InvalidInput` and `PdfReadError` to 400 and
/// `VersionConflict` to 412; everything else surfaces as a 500.
#[derive(Debug, Error)]
pub enum DocMergeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Input bytes did not parse as a PDF.
    #[error("invalid PDF: {0}")]
    PdfReadError(String),

    #[error("failed to serialise PDF: {0}")]
    PdfWriteError(String),

    /// Caller-supplied value out of contract (scale, quality, name, ...).
    #[error("{0}")]
    InvalidInput(String),

    /// An image stream the optimiser cannot decode; reported as skipped.
    #[error("unsupported image: {0}")]
    ImageXObjectError(String),

    #[error("JPEG encode error: {0}")]
    JpegEncodeError(String),

    #[error("letterhead store error: {0}")]
    StoreError(String),

    /// Conditional write failed against the stored letterhead version.
    #[error("version mismatch: {0}")]
    VersionConflict(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Generates factory methods for [`DocMergeError`] variants that wrap a `String`.
macro_rules! error_constructors {
    ($(
        $(#[doc = $doc:expr])*
        $method:ident => $variant:ident
    ),* $(,)?) => {
        impl DocMergeError {
            $(
                $(#[doc = $doc])*
                pub fn $method(msg: impl Into<String>) -> Self {
                    Self::$variant(msg.into())
                }
            )*
        }
    };
}

error_constructors! {
    config => ConfigError,
    pdf_read => PdfReadError,
    pdf_write => PdfWriteError,
    /// Rejected request parameter or upload.
    invalid_input => InvalidInput,
    image_xobject => ImageXObjectError,
    jpeg_encode => JpegEncodeError,
    store => StoreError,
    /// Stored version differs from the one the client expected.
    version_conflict => VersionConflict,
}

impl From<lopdf::Error> for DocMergeError {
    fn from(e: lopdf::Error) -> Self {
        Self::PdfReadError(e.to_string())
    }
}

impl From<serde_yml::Error> for DocMergeError {
    fn from(e: serde_yml::Error) -> Self {
        Self::ConfigError(e.to_string())
    }
}

impl From<image::ImageError> for DocMergeError {
    fn from(e: image::ImageError) -> Self {
        Self::JpegEncodeError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DocMergeError>;
