//! Application-level errors

use domain::DomainError;
use thiserror::Error;

/// Errors that can occur in the application layer
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// Domain-level error
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The upstream dependency is unavailable or failed
    #[error("Dependency error: {0}")]
    Dependency(String),
}

impl ApplicationError {
    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Dependency(_))
    }

    /// HTTP status code to report for this error
    ///
    /// Dependency failures map to 503 so they can be alerted on separately from
    /// synthetic 404s.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Dependency(_) => 503,
            Self::Domain(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_error_is_503() {
        let err = ApplicationError::Dependency("database down".to_string());
        assert_eq!(err.status_code(), 503);
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "Dependency error: database down");
    }

    #[test]
    fn domain_error_is_transparent() {
        let err: ApplicationError = DomainError::ValidationError("x".to_string()).into();
        assert_eq!(err.to_string(), "Validation failed: x");
        assert_eq!(err.status_code(), 500);
        assert!(!err.is_retryable());
    }
}
