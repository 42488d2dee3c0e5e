/// A specialized Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Failures inside the renderer. None of these escape the animation
/// controller; they are turned into fallbacks or degradation signals.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("graphics context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("context '{id}' is gone")]
    ContextLost { id: String },

    #[error("draw failed: {0}")]
    Draw(String),
}

impl RenderError {
    pub fn context_lost(id: impl Into<String>) -> Self {
        RenderError::ContextLost { id: id.into() }
    }
}
