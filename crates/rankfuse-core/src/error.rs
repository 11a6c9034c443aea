//! Error types for rank fusion.

use thiserror::Error;

/// Result type alias using FusionError.
pub type Result<T> = std::result::Result<T, FusionError>;

/// Errors that can occur while configuring or running a fusion.
#[derive(Error, Debug)]
pub enum FusionError {
    /// Invalid fusion configuration (weights, `k`, `c`, decay policy).
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A retriever failed to produce a ranked list.
    #[error("Retriever '{retriever}' failed: {message}")]
    Retriever { retriever: String, message: String },

    /// The fusion call was cancelled or timed out.
    #[error("Fusion cancelled: {reason}")]
    Cancelled { reason: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl FusionError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a retriever error.
    pub fn retriever(retriever: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Retriever {
            retriever: retriever.into(),
            message: message.into(),
        }
    }

    /// Create a cancellation error.
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get a stable error code for callers that report errors by kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Retriever { .. } => "RETRIEVER_ERROR",
            Self::Cancelled { .. } => "CANCELLED",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Whether this error came from a configuration mistake rather than a runtime failure.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FusionError::retriever("bm25", "index missing");
        let text = err.to_string();
        assert!(text.contains("bm25"));
        assert!(text.contains("index missing"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            FusionError::configuration("bad k").error_code(),
            "CONFIGURATION_ERROR"
        );
        assert_eq!(FusionError::cancelled("timeout").error_code(), "CANCELLED");
        assert_eq!(
            FusionError::retriever("dense", "boom").error_code(),
            "RETRIEVER_ERROR"
        );
    }

    #[test]
    fn test_is_configuration() {
        assert!(FusionError::configuration("x").is_configuration());
        assert!(!FusionError::internal("x").is_configuration());
    }
}
