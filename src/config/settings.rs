use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::DocMergeError;

/// How out-of-range numeric request parameters are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamPolicy {
    /// Replace the value with the configured default.
    Clamp,
    /// Refuse the request with a client error.
    Reject,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind_addr: String,
    pub storage_dir: PathBuf,
    pub default_scale: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    pub default_quality: u8,
    pub min_quality: u8,
    pub max_quality: u8,
    pub max_image_dimension: u32,
    pub max_upload_bytes: usize,
    pub param_policy: ParamPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            bind_addr: "0.0.0.0:8000".to_string(),
            storage_dir: PathBuf::from("app/uploads"),
            default_scale: 0.85,
            min_scale: 0.01,
            max_scale: 1.0,
            default_quality: 80,
            min_quality: 60,
            max_quality: 95,
            max_image_dimension: 1920,
            max_upload_bytes: 100 * 1024 * 1024,
            param_policy: ParamPolicy::Clamp,
        }
    }
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> crate::error::Result<Self> {
        let settings: Settings = serde_yml::from_str(yaml).map_err(|e| {
            DocMergeError::config(format!("Failed to parse settings YAML: {e}"))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Check that ranges are ordered and that defaults fall inside them.
    pub fn validate(&self) -> crate::error::Result<()> {
        if !(self.min_scale > 0.0 && self.min_scale <= self.max_scale) {
            return Err(DocMergeError::config(format!(
                "scale range must satisfy 0 < min <= max, got {}..={}",
                self.min_scale, self.max_scale
            )));
        }
        if !(self.min_scale..=self.max_scale).contains(&self.default_scale) {
            return Err(DocMergeError::config(format!(
                "default_scale {} outside {}..={}",
                self.default_scale, self.min_scale, self.max_scale
            )));
        }
        if self.min_quality == 0 || self.max_quality > 100 || self.min_quality > self.max_quality {
            return Err(DocMergeError::config(format!(
                "quality range must satisfy 1 <= min <= max <= 100, got {}..={}",
                self.min_quality, self.max_quality
            )));
        }
        if !(self.min_quality..=self.max_quality).contains(&self.default_quality) {
            return Err(DocMergeError::config(format!(
                "default_quality {} outside {}..={}",
                self.default_quality, self.min_quality, self.max_quality
            )));
        }
        if self.max_image_dimension == 0 {
            return Err(DocMergeError::config("max_image_dimension must be positive"));
        }
        Ok(())
    }
}
