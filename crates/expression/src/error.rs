//! Error types for structr-expression
//!
//! Parse errors and structured errors raised by builtins abort the whole
//! evaluation. Everything a builtin can recover from is returned as a value.

use thiserror::Error;

// ============================================================================
// Main Error Type
// ============================================================================

/// Expression parsing and evaluation errors
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ExpressionError {
    /// Malformed template: bracket mismatch or token outside of any node
    #[error("{message}")]
    Parse { message: String },

    /// Structured error raised by a side-effecting builtin
    #[error("{message}")]
    Framework { status: u16, message: String },

    /// Evaluation error
    #[error("Expression evaluation error: {message}")]
    Eval { message: String },

    /// A collaborating service failed or is not configured
    #[error("{service} service error: {message}")]
    Service {
        service: &'static str,
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ExpressionError {
    /// Get error code for categorization
    pub fn code(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "EXPR:PARSE",
            Self::Framework { .. } => "EXPR:FRAMEWORK",
            Self::Eval { .. } => "EXPR:EVAL",
            Self::Service { .. } => "EXPR:SERVICE",
            Self::Io(_) => "EXPR:IO",
            Self::Json(_) => "EXPR:JSON",
            Self::Internal { .. } => "EXPR:INTERNAL",
        }
    }

    /// HTTP-like status the surrounding application reports for this error
    pub fn status(&self) -> u16 {
        match self {
            Self::Parse { .. } => 422,
            Self::Framework { status, .. } => *status,
            Self::Json(_) => 400,
            Self::Service { .. } => 503,
            Self::Eval { .. } | Self::Io(_) | Self::Internal { .. } => 500,
        }
    }

    // ============================================================================
    // Convenience Constructors
    // ============================================================================

    /// Create a parse error
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create a structured framework error with the given status
    pub fn framework(status: u16, message: impl Into<String>) -> Self {
        Self::Framework {
            status,
            message: message.into(),
        }
    }

    /// Create an evaluation error
    pub fn eval_error(message: impl Into<String>) -> Self {
        Self::Eval {
            message: message.into(),
        }
    }

    /// Create a service error
    pub fn service(service: &'static str, message: impl Into<String>) -> Self {
        Self::Service {
            service,
            message: message.into(),
        }
    }

    /// Error for a builtin that needs a service the engine was built without
    pub fn service_unavailable(service: &'static str) -> Self {
        Self::service(service, "not configured")
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

// ============================================================================
// Result Type
// ============================================================================

/// Result type for expression operations
pub type ExpressionResult<T> = Result<T, ExpressionError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_error_message_is_verbatim() {
        let error = ExpressionError::parse_error(
            "Invalid expression: mismatched closing bracket after foo(",
        );
        assert_eq!(
            error.to_string(),
            "Invalid expression: mismatched closing bracket after foo("
        );
        assert_eq!(error.status(), 422);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ExpressionError::parse_error("x").code(), "EXPR:PARSE");
        assert_eq!(ExpressionError::framework(400, "x").code(), "EXPR:FRAMEWORK");
        assert_eq!(ExpressionError::service_unavailable("mail").code(), "EXPR:SERVICE");
    }

    #[test]
    fn test_framework_status() {
        assert_eq!(ExpressionError::framework(404, "gone").status(), 404);
        assert_eq!(ExpressionError::internal("boom").status(), 500);
    }

    #[test]
    fn test_service_error_display() {
        let error = ExpressionError::service_unavailable("mail");
        assert_eq!(error.to_string(), "mail service error: not configured");
    }
}
