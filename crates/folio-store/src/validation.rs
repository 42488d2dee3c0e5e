//! Input checks applied before anything reaches storage.

use folio_core::{FolioError, FolioResult};

/// Implemented by every create and patch payload.
pub trait Validate {
    fn validate(&self) -> FolioResult<()>;
}

/// A required text field: present and not blank.
pub fn require(field: &str, value: &str) -> FolioResult<()> {
    if value.trim().is_empty() {
        return Err(FolioError::validation(format!("{field} is required")));
    }
    Ok(())
}

/// A patched text field: may be absent, must not be blank when present.
pub fn require_if_present(field: &str, value: Option<&str>) -> FolioResult<()> {
    match value {
        Some(value) => require(field, value),
        None => Ok(()),
    }
}

pub fn require_email(field: &str, value: &str) -> FolioResult<()> {
    require(field, value)?;
    let value = value.trim();
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(FolioError::validation(format!("{field} must be a valid email address"))),
    }
}

/// Blank optional text is stored as absent.
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
