//! Error types for Lead Pulse

use thiserror::Error;

/// Errors that can occur while scoring or analysing leads
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Store operation failed: {0}")]
    TransientStore(String),

    #[error("Optional dependency unavailable: {0}")]
    DegradedDependency(String),

    #[error("Failed to parse input: {0}")]
    Parse(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error class for transport layers wrapping the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Maps to a 404-equivalent
    NotFound,
    /// Maps to a retryable 5xx-equivalent
    Retryable,
    /// Maps to a 400-equivalent
    BadRequest,
}

impl ScoringError {
    pub fn lead_not_found(id: impl ToString) -> Self {
        ScoringError::NotFound {
            entity: "lead",
            id: id.to_string(),
        }
    }

    /// Classify the error for callers that translate it into a status code
    pub fn class(&self) -> ErrorClass {
        match self {
            ScoringError::NotFound { .. } => ErrorClass::NotFound,
            ScoringError::TransientStore(_) | ScoringError::Io(_) => ErrorClass::Retryable,
            _ => ErrorClass::BadRequest,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(
            ScoringError::lead_not_found("abc").class(),
            ErrorClass::NotFound
        );
        assert!(ScoringError::TransientStore("disk".into()).is_retryable());
        assert_eq!(
            ScoringError::Validation("bad".into()).class(),
            ErrorClass::BadRequest
        );
        assert_eq!(
            ScoringError::DegradedDependency("cache".into()).class(),
            ErrorClass::BadRequest
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = ScoringError::lead_not_found("1234");
        assert_eq!(err.to_string(), "lead not found: 1234");
    }
}
