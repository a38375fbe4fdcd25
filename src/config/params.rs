use super::settings::{ParamPolicy, Settings};
use crate::error::DocMergeError;

/// Resolve the merge `scale` field against the configured range.
///
/// `None` means the field was absent. Out-of-range values fall back to
/// `default_scale` under [`ParamPolicy::Clamp`] and are refused under
/// [`ParamPolicy::Reject`].
pub fn resolve_scale(settings: &Settings, raw: Option<&str>) -> crate::error::Result<f64> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(settings.default_scale);
    };
    let value: f64 = raw
        .parse()
        .map_err(|_| DocMergeError::invalid_input(format!("scale is not a number: {raw}")))?;

    if value.is_finite() && (settings.min_scale..=settings.max_scale).contains(&value) {
        return Ok(value);
    }
    match settings.param_policy {
        ParamPolicy::Clamp => Ok(settings.default_scale),
        ParamPolicy::Reject => Err(DocMergeError::invalid_input(format!(
            "scale must be within {}..={}, got {value}",
            settings.min_scale, settings.max_scale
        ))),
    }
}

/// Resolve the optimize `quality` field against the configured range.
pub fn resolve_quality(settings: &Settings, raw: Option<&str>) -> crate::error::Result<u8> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(settings.default_quality);
    };
    let value: i64 = raw
        .parse()
        .map_err(|_| DocMergeError::invalid_input(format!("quality is not an integer: {raw}")))?;

    let min = i64::from(settings.min_quality);
    let max = i64::from(settings.max_quality);
    if (min..=max).contains(&value) {
        // In range of a u8-bounded interval.
        return Ok(value as u8);
    }
    match settings.param_policy {
        ParamPolicy::Clamp => Ok(settings.default_quality),
        ParamPolicy::Reject => Err(DocMergeError::invalid_input(format!(
            "quality must be within {min}..={max}, got {value}"
        ))),
    }
}
