//! Render and decode error types.

use std::path::PathBuf;

use splice_common::error::SpliceError;

/// Failure to decode one source. Never fatal for a whole render.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("source not found: {source_id}")]
    NotFound { source_id: String },

    #[error("unsupported source {source_id}: {reason}")]
    Unsupported { source_id: String, reason: String },

    #[error("malformed source {source_id}: {reason}")]
    Malformed { source_id: String, reason: String },
}

impl DecodeError {
    pub fn malformed(source_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::Malformed {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }

    pub fn unsupported(source_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unsupported {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors that end a render session.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("render cancelled")]
    Cancelled,

    #[error("graph construction failed: {message}")]
    Graph { message: String },

    #[error("encode failed: {message}")]
    Encode { message: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unsupported: {message}")]
    Unsupported { message: String },
}

impl RenderError {
    pub fn graph(msg: impl Into<String>) -> Self {
        Self::Graph {
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type RenderResult<T> = Result<T, RenderError>;

impl From<RenderError> for SpliceError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Cancelled => SpliceError::Cancelled,
            RenderError::Unsupported { message } => SpliceError::Unsupported { message },
            RenderError::Io { source, .. } => SpliceError::Io(source),
            other => SpliceError::render(other.to_string()),
        }
    }
}

impl From<DecodeError> for SpliceError {
    fn from(err: DecodeError) -> Self {
        SpliceError::decode(err.to_string())
    }
}
