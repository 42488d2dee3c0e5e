/// Core error types for the Folio engine.
use std::path::PathBuf;

/// A specialized Result type for Folio operations.
pub type FolioResult<T> = Result<T, FolioError>;

/// Top-level error type encompassing the store and configuration layers.
#[derive(Debug, thiserror::Error)]
pub enum FolioError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: u64 },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("config error: {message} ({path:?})")]
    Config { message: String, path: PathBuf },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FolioError {
    /// Create a not-found error for an entity kind.
    pub fn not_found(kind: &'static str, id: u64) -> Self {
        FolioError::NotFound { kind, id }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        FolioError::Validation(message.into())
    }

    /// Create a config error tied to a file.
    pub fn config(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        FolioError::Config {
            message: message.into(),
            path: path.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = FolioError::not_found("project", 7);
        assert_eq!(err.to_string(), "project not found: 7");
    }

    #[test]
    fn test_config_error_display() {
        let err = FolioError::config("bad port", "/etc/folio.config.toml");
        assert!(err.to_string().contains("bad port"));
    }
}
