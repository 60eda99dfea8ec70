use crate::native::NativeError;
use thiserror::Error;

/// Error category for decision-making (fix input, inspect query, release, abort)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid user input or configuration
    Validation,
    /// The server rejected the SQL or a fetch
    Query,
    /// Cursor or handle bookkeeping problem
    Resource,
    /// Anything else
    Fatal,
}

#[derive(Error, Debug, Clone)]
pub enum OciError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{message}")]
    InvalidQuery {
        message: String,
        native: Option<NativeError>,
    },

    #[error("{message}")]
    Runtime {
        message: String,
        native: Option<NativeError>,
    },

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Cursor not found: {0}")]
    CursorNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Job error: {message}")]
    Job { message: String, code: i32 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for OciError {
    fn from(err: serde_json::Error) -> Self {
        OciError::Config(err.to_string())
    }
}

impl OciError {
    pub(crate) fn query(message: impl Into<String>, native: NativeError) -> Self {
        OciError::InvalidQuery {
            message: message.into(),
            native: Some(native),
        }
    }

    pub(crate) fn runtime(message: impl Into<String>, native: NativeError) -> Self {
        OciError::Runtime {
            message: message.into(),
            native: Some(native),
        }
    }

    pub fn native(&self) -> Option<&NativeError> {
        match self {
            OciError::InvalidQuery { native, .. } | OciError::Runtime { native, .. } => {
                native.as_ref()
            }
            _ => None,
        }
    }

    /// Native library error code, 0 when the error did not come from the client library.
    pub fn native_code(&self) -> i32 {
        match self {
            OciError::Job { code, .. } => *code,
            _ => self.native().map(|n| n.code).unwrap_or(0),
        }
    }

    pub fn message(&self) -> String {
        let display = self.to_string();
        match self.native() {
            Some(native) if native.message != display => format!("{}: {}", display, native.message),
            _ => display,
        }
    }

    pub fn error_category(&self) -> ErrorCategory {
        match self {
            OciError::InvalidArgument(_) | OciError::Config(_) => ErrorCategory::Validation,
            OciError::InvalidQuery { .. } | OciError::Runtime { .. } => ErrorCategory::Query,
            OciError::InvalidCursor(_) | OciError::CursorNotFound(_) => ErrorCategory::Resource,
            OciError::Job { .. } | OciError::Internal(_) => ErrorCategory::Fatal,
        }
    }
}

pub type Result<T> = std::result::Result<T, OciError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn ora(code: i32, message: &str) -> NativeError {
        NativeError::new(code, message)
    }

    #[test]
    fn test_oci_error_variants() {
        let err1 = OciError::InvalidArgument("bad handle".to_string());
        assert_eq!(err1.to_string(), "Invalid argument: bad handle");

        let err2 = OciError::InvalidCursor("out_cur".to_string());
        assert_eq!(err2.to_string(), "Invalid cursor: out_cur");

        let err3 = OciError::CursorNotFound("no cursors registered".to_string());
        assert!(err3.to_string().contains("no cursors registered"));

        let err4 = OciError::Config("missing field".to_string());
        assert_eq!(err4.to_string(), "Configuration error: missing field");

        let err5 = OciError::Internal("Lock poisoned".to_string());
        assert!(err5.to_string().contains("Lock poisoned"));
    }

    #[test]
    fn test_query_error_carries_native_pair() {
        let err = OciError::query("Statement couldn't be produced", ora(900, "invalid SQL"));
        assert_eq!(err.native_code(), 900);
        assert_eq!(err.to_string(), "Statement couldn't be produced");
        assert_eq!(err.message(), "Statement couldn't be produced: invalid SQL");
    }

    #[test]
    fn test_non_native_error_defaults() {
        let err = OciError::InvalidCursor("x".to_string());
        assert_eq!(err.native_code(), 0);
        assert!(err.native().is_none());
        assert_eq!(err.message(), "Invalid cursor: x");
    }

    #[test]
    fn test_job_error_code() {
        let err = OciError::Job {
            message: "Add Job unsuccess".to_string(),
            code: 25,
        };
        assert_eq!(err.native_code(), 25);
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            OciError::InvalidArgument("x".into()).error_category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            OciError::runtime("exec failed", ora(1, "unique constraint")).error_category(),
            ErrorCategory::Query
        );
        assert_eq!(
            OciError::InvalidCursor("c".into()).error_category(),
            ErrorCategory::Resource
        );
        assert_eq!(
            OciError::Internal("poisoned".into()).error_category(),
            ErrorCategory::Fatal
        );
    }

    #[test]
    fn test_from_serde_json_error() {
        let err: OciError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, OciError::Config(_)));
    }
}
