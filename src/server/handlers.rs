//! HTTP handlers: merge, combine, optimize, default letterhead, health.

use axum::{
    Json,
    extract::{Multipart, State},
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;

use super::AppState;
use super::error::ApiError;
use super::upload::UploadForm;
use crate::config::params::{resolve_quality, resolve_scale};
use crate::pdf::reader::PdfReader;
use crate::pdf::{assembler, compositor};
use crate::pipeline::image_optimizer::{OptimizeOptions, optimize_document};
use crate::store::{LetterheadInfo, Precondition};

/// Store name backing the `/api/letterhead` routes.
pub const DEFAULT_LETTERHEAD: &str = "default";

/// Run CPU-bound or file-system work on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("worker task failed: {e}")))?
        .map_err(ApiError::from)
}

fn pdf_response(bytes: Vec<u8>, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

fn quoted_etag(version: &str) -> String {
    format!("\"{version}\"")
}

/// Strip an optional weak marker and the quotes from an entity tag.
fn unquote_etag(raw: &str) -> &str {
    let raw = raw.trim();
    let raw = raw.strip_prefix("W/").unwrap_or(raw);
    raw.trim_matches('"')
}

fn header_str<'a>(
    headers: &'a HeaderMap,
    name: &header::HeaderName,
) -> Result<Option<&'a str>, ApiError> {
    headers
        .get(name)
        .map(|v| {
            v.to_str()
                .map_err(|_| ApiError::BadRequest(format!("{name} header is not ASCII")))
        })
        .transpose()
}

/// Map `If-Match` / `If-None-Match: *` onto a store precondition.
pub fn precondition_from_headers(headers: &HeaderMap) -> Result<Precondition, ApiError> {
    if let Some(value) = header_str(headers, &header::IF_NONE_MATCH)?
        && value.trim() == "*"
    {
        return Ok(Precondition::Absent);
    }
    match header_str(headers, &header::IF_MATCH)? {
        Some(value) if value.trim() != "*" => {
            Ok(Precondition::Matches(unquote_etag(value).to_string()))
        }
        _ => Ok(Precondition::None),
    }
}

/// `POST /api/merge`
pub async fn merge(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut form = UploadForm::read(multipart).await?;
    let content = form
        .take("content")
        .ok_or_else(|| ApiError::BadRequest("content PDF is required".to_string()))?;
    let scale = resolve_scale(&state.settings, form.text("scale")?.as_deref())?;

    let letterhead = match form.take("letterhead") {
        Some(part) => part.bytes,
        None => {
            let store = state.store.clone();
            blocking(move || store.get(DEFAULT_LETTERHEAD))
                .await?
                .ok_or_else(|| {
                    ApiError::BadRequest(
                        "No letterhead provided and no default letterhead found".to_string(),
                    )
                })?
                .bytes
        }
    };

    let merged = blocking(move || {
        compositor::merge_with_letterhead(&content.bytes, &letterhead, scale)
    })
    .await?;

    info!(scale, size = merged.len(), "merge done");
    Ok(pdf_response(merged, "merged.pdf"))
}

/// `POST /api/combine`
pub async fn combine(multipart: Multipart) -> Result<Response, ApiError> {
    let mut form = UploadForm::read(multipart).await?;
    let files: Vec<Vec<u8>> = form.take_all("files").into_iter().map(|p| p.bytes).collect();
    if files.len() < 2 {
        return Err(ApiError::BadRequest(
            "At least 2 PDF files are required".to_string(),
        ));
    }

    let count = files.len();
    let combined = blocking(move || assembler::combine_pdfs(&files)).await?;

    info!(files = count, size = combined.len(), "combine done");
    Ok(pdf_response(combined, "combined.pdf"))
}

/// `POST /api/optimize`
pub async fn optimize(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut form = UploadForm::read(multipart).await?;
    let file = form
        .take("file")
        .ok_or_else(|| ApiError::BadRequest("file is required".to_string()))?;
    let options = OptimizeOptions {
        quality: resolve_quality(&state.settings, form.text("quality")?.as_deref())?,
        max_image_dimension: state.settings.max_image_dimension,
    };

    let (bytes, report) = blocking(move || optimize_document(&file.bytes, &options)).await?;

    let mut response = pdf_response(bytes, "optimized.pdf");
    let headers = response.headers_mut();
    headers.insert("x-images-replaced", HeaderValue::from(report.replaced()));
    headers.insert("x-images-kept", HeaderValue::from(report.kept()));
    headers.insert("x-images-skipped", HeaderValue::from(report.skipped()));
    Ok(response)
}

/// `POST /api/letterhead`
pub async fn upload_letterhead(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let precondition = precondition_from_headers(&headers)?;
    let mut form = UploadForm::read(multipart).await?;
    let file = form
        .take("file")
        .ok_or_else(|| ApiError::BadRequest("file is required".to_string()))?;
    let filename = file.file_name.clone().unwrap_or_default();
    if !filename.ends_with(".pdf") {
        return Err(ApiError::BadRequest("File must be a PDF".to_string()));
    }

    let store = state.store.clone();
    let stored = blocking(move || {
        let reader = PdfReader::from_bytes(&file.bytes)?;
        let pages = reader.page_count();
        if pages == 0 {
            return Err(crate::error::DocMergeError::invalid_input(
                "letterhead PDF has no pages",
            ));
        }
        if pages > 1 {
            info!(pages, "letterhead has several pages; only the first is used");
        }
        store.put(DEFAULT_LETTERHEAD, &file.bytes, &precondition)
    })
    .await?;

    info!(filename = %filename, size = stored.size, version = %stored.version, "default letterhead stored");
    Ok(Json(json!({
        "message": "Default letterhead uploaded successfully",
        "filename": filename,
        "size": stored.size,
        "version": stored.version,
    })))
}

/// `GET /api/letterhead`
pub async fn letterhead_info(State(state): State<AppState>) -> Result<Json<InfoBody>, ApiError> {
    let store = state.store.clone();
    let info = blocking(move || store.info(DEFAULT_LETTERHEAD)).await?;
    Ok(Json(InfoBody {
        exists: info.is_some(),
        info,
    }))
}

/// `{"exists": false}` or `{"exists": true, "name", "size", "version", "path"}`.
#[derive(Debug, Serialize)]
pub struct InfoBody {
    exists: bool,
    #[serde(flatten)]
    info: Option<LetterheadInfo>,
}

/// `GET /api/letterhead/download`
pub async fn download_letterhead(State(state): State<AppState>) -> Result<Response, ApiError> {
    let store = state.store.clone();
    let letterhead = blocking(move || store.get(DEFAULT_LETTERHEAD))
        .await?
        .ok_or_else(|| ApiError::NotFound("No default letterhead found".to_string()))?;

    let etag = quoted_etag(&letterhead.version);
    let mut response = pdf_response(letterhead.bytes, "default_letterhead.pdf");
    if let Ok(value) = HeaderValue::from_str(&etag) {
        response.headers_mut().insert(header::ETAG, value);
    }
    Ok(response)
}

/// `DELETE /api/letterhead`
pub async fn delete_letterhead(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let precondition = match precondition_from_headers(&headers)? {
        // If-None-Match has no meaning for a delete.
        Precondition::Absent => Precondition::None,
        other => other,
    };
    let store = state.store.clone();
    let removed = blocking(move || store.delete(DEFAULT_LETTERHEAD, &precondition)).await?;
    if !removed {
        return Err(ApiError::NotFound("No default letterhead found".to_string()));
    }

    info!("default letterhead deleted");
    Ok(Json(json!({ "message": "Default letterhead deleted" })))
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
