//! Error types for the vSphere client crate.

use std::fmt;

/// Categorised error kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmwareErrorKind {
    /// vSphere REST API unreachable or session expired
    ConnectionError,
    /// Authentication failed (401)
    AuthenticationError,
    /// Resource not found (404) or no inventory object with that name
    NotFound,
    /// More than one inventory object carries the requested name
    AmbiguousName,
    /// Requested transition is not valid for the object's current state
    InvalidVmState,
    /// Module parameter missing, malformed or out of range
    InvalidParameter,
    /// HTTP / API error with status code
    ApiError(u16),
    /// Permission denied (403)
    AccessDenied,
    /// Task failed on vCenter
    TaskError,
    /// HTTP timeout or task wait deadline exceeded
    Timeout,
    /// Task wait aborted by the operator
    Cancelled,
    /// JSON parse / deserialization error
    ParseError,
    /// Generic
    Other,
}

/// Crate error type carrying a kind + human-readable message.
#[derive(Debug, Clone)]
pub struct VmwareError {
    pub kind: VmwareErrorKind,
    pub message: String,
}

impl VmwareError {
    pub fn new(kind: VmwareErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, message: msg.into() }
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::new(VmwareErrorKind::ConnectionError, msg)
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::new(VmwareErrorKind::AuthenticationError, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(VmwareErrorKind::NotFound, msg)
    }

    pub fn ambiguous(msg: impl Into<String>) -> Self {
        Self::new(VmwareErrorKind::AmbiguousName, msg)
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::new(VmwareErrorKind::InvalidVmState, msg)
    }

    pub fn invalid_param(msg: impl Into<String>) -> Self {
        Self::new(VmwareErrorKind::InvalidParameter, msg)
    }

    pub fn api(status: u16, msg: impl Into<String>) -> Self {
        Self::new(VmwareErrorKind::ApiError(status), msg)
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::new(VmwareErrorKind::ParseError, msg)
    }

    pub fn task(msg: impl Into<String>) -> Self {
        Self::new(VmwareErrorKind::TaskError, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(VmwareErrorKind::Timeout, msg)
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::new(VmwareErrorKind::Cancelled, msg)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == VmwareErrorKind::NotFound
    }
}

impl fmt::Display for VmwareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

impl std::error::Error for VmwareError {}

impl From<VmwareError> for String {
    fn from(e: VmwareError) -> String {
        e.to_string()
    }
}

impl From<reqwest::Error> for VmwareError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::timeout(format!("HTTP timeout: {e}"))
        } else if e.is_connect() {
            Self::connection(format!("Connection failed: {e}"))
        } else {
            Self::new(VmwareErrorKind::Other, format!("HTTP error: {e}"))
        }
    }
}

impl From<serde_json::Error> for VmwareError {
    fn from(e: serde_json::Error) -> Self {
        Self::parse(format!("JSON parse error: {e}"))
    }
}

/// Convenience alias.
pub type VmwareResult<T> = Result<T, VmwareError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_message() {
        let err = VmwareError::not_found("datastore 'ds9' not found");
        let s = err.to_string();
        assert!(s.contains("NotFound"));
        assert!(s.contains("ds9"));
    }

    #[test]
    fn api_error_carries_status() {
        let err = VmwareError::api(500, "boom");
        assert_eq!(err.kind, VmwareErrorKind::ApiError(500));
        assert!(err.to_string().contains("ApiError(500)"));
    }

    #[test]
    fn json_error_maps_to_parse() {
        let bad = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: VmwareError = bad.into();
        assert_eq!(err.kind, VmwareErrorKind::ParseError);
    }

    #[test]
    fn into_string() {
        let s: String = VmwareError::cancelled("interrupted").into();
        assert!(s.starts_with("[Cancelled]"));
    }
}
