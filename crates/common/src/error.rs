//! Error types shared across Splice crates.

/// Top-level error type for Splice operations.
#[derive(Debug, thiserror::Error)]
pub enum SpliceError {
    #[error("Edit error: {message}")]
    Edit { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error("Export cancelled")]
    Cancelled,

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using SpliceError.
pub type SpliceResult<T> = Result<T, SpliceError>;

impl SpliceError {
    pub fn edit(msg: impl Into<String>) -> Self {
        Self::Edit {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
            message: msg.into(),
        }
    }

    /// Whether this error represents a user-requested abort rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructor_helpers_format_messages() {
        let err = SpliceError::render("graph construction failed");
        assert_eq!(err.to_string(), "Render error: graph construction failed");
        assert!(!err.is_cancelled());
        assert!(SpliceError::Cancelled.is_cancelled());
    }
}
