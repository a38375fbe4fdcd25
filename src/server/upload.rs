//! Multipart form collection.

use axum::extract::Multipart;

use super::error::ApiError;

/// One uploaded part.
#[derive(Debug, Clone)]
pub struct UploadedPart {
    pub name: String,
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

/// All parts of a multipart body, in the order they were sent.
#[derive(Debug, Default)]
pub struct UploadForm {
    parts: Vec<UploadedPart>,
}

impl UploadForm {
    /// Drain `multipart` into memory.
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut parts = Vec::new();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or("").to_string();
            let file_name = field.file_name().map(str::to_string);
            let bytes = field.bytes().await?.to_vec();
            parts.push(UploadedPart {
                name,
                file_name,
                bytes,
            });
        }
        Ok(Self { parts })
    }

    /// Remove and return the first part called `name`.
    ///
    /// An empty file part (a form submitted with nothing selected) counts as absent.
    pub fn take(&mut self, name: &str) -> Option<UploadedPart> {
        let index = self
            .parts
            .iter()
            .position(|p| p.name == name && !p.bytes.is_empty())?;
        Some(self.parts.remove(index))
    }

    /// Remove and return every non-empty part called `name`, in order.
    pub fn take_all(&mut self, name: &str) -> Vec<UploadedPart> {
        let (matching, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.parts)
            .into_iter()
            .partition(|p| p.name == name);
        self.parts = rest;
        matching.into_iter().filter(|p| !p.bytes.is_empty()).collect()
    }

    /// Text value of the first part called `name`.
    pub fn text(&self, name: &str) -> Result<Option<String>, ApiError> {
        let Some(part) = self.parts.iter().find(|p| p.name == name) else {
            return Ok(None);
        };
        String::from_utf8(part.bytes.clone())
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("field '{name}' is not valid UTF-8")))
    }
}
