//! Result and error types for Fireshot.

use thiserror::Error;

/// Result type for Fireshot operations
pub type FireshotResult<T> = Result<T, FireshotError>;

/// Errors that can occur during a verification run
#[derive(Debug, Error)]
pub enum FireshotError {
    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunchError {
        /// Error message
        message: String,
    },

    /// Page error
    #[error("Page error: {message}")]
    PageError {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    NavigationError {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Network interception could not be installed or serviced
    #[error("Network interception failed: {message}")]
    InterceptionError {
        /// Error message
        message: String,
    },

    /// Client-side storage write failed
    #[error("Storage write of {key:?} failed: {message}")]
    StorageError {
        /// Storage key being written
        key: String,
        /// Error message
        message: String,
    },

    /// Script evaluation error
    #[error("Script evaluation failed: {message}")]
    EvaluationError {
        /// Error message
        message: String,
    },

    /// Input simulation error
    #[error("Input simulation failed: {message}")]
    InputError {
        /// Error message
        message: String,
    },

    /// Screenshot error
    #[error("Screenshot failed: {message}")]
    ScreenshotError {
        /// Error message
        message: String,
    },

    /// Operation timed out
    #[error("Operation timed out after {ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Plan failed validation before any browser work
    #[error("Invalid plan: {message}")]
    InvalidPlan {
        /// Error message
        message: String,
    },

    /// Invalid state error (operation called in wrong state)
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl FireshotError {
    /// Create a page error
    #[must_use]
    pub fn page(message: impl Into<String>) -> Self {
        Self::PageError {
            message: message.into(),
        }
    }

    /// Create an invalid plan error
    #[must_use]
    pub fn invalid_plan(message: impl Into<String>) -> Self {
        Self::InvalidPlan {
            message: message.into(),
        }
    }

    /// Create an invalid state error
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_error_names_url() {
        let err = FireshotError::NavigationError {
            url: "http://localhost:5174/asset/fire".to_string(),
            message: "net::ERR_CONNECTION_REFUSED".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("http://localhost:5174/asset/fire"));
        assert!(text.contains("ERR_CONNECTION_REFUSED"));
    }

    #[test]
    fn test_storage_error_quotes_key() {
        let err = FireshotError::StorageError {
            key: "asset-google-id-token".to_string(),
            message: "SecurityError".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Storage write of \"asset-google-id-token\" failed: SecurityError"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: FireshotError = io.into();
        assert!(matches!(err, FireshotError::Io(_)));
    }
}
