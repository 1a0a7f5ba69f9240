use std::fmt;

use crate::status_code::{self, StatusCode, status_code_t};

/// A status value carrying a code and optional message.
///
/// The `#[must_use]` attribute ensures callers do not silently ignore error
/// statuses coming back from a pool, device or interface call.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct Status {
    code: status_code_t,
    message: Option<String>,
}

impl Status {
    /// Create a status with just a code.
    pub fn new(code: status_code_t) -> Self {
        Self {
            code,
            message: None,
        }
    }

    /// Create a status with a code and a descriptive message.
    pub fn with_message(code: status_code_t, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(msg.into()),
        }
    }

    /// Return the numeric status code.
    pub fn code(&self) -> status_code_t {
        self.code
    }

    /// Return the optional message.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Whether this status represents success (code == OK).
    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::OK
    }

    /// Return the POSIX errno closest to this status.
    pub fn errno(&self) -> i32 {
        status_code::to_errno(self.code)
    }

    /// Produce a human-readable description like `"Mpool::Exhausted(2001) desc-only"`.
    pub fn describe(&self) -> String {
        let name = status_code::to_string(self.code);
        match &self.message {
            Some(msg) => format!("{}({}) {}", name, self.code, msg),
            None => format!("{}({})", name, self.code),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl std::error::Error for Status {}

impl From<status_code_t> for Status {
    fn from(code: status_code_t) -> Self {
        Self::new(code)
    }
}

impl From<std::io::Error> for Status {
    fn from(err: std::io::Error) -> Self {
        Self::with_message(StatusCode::OS_ERROR, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status_code::{MpoolCode, TransportCode};

    #[test]
    fn test_status_ok() {
        let s = Status::new(StatusCode::OK);
        assert!(s.is_ok());
        assert_eq!(s.code(), 0);
        assert!(s.message().is_none());
        assert_eq!(s.describe(), "OK(0)");
    }

    #[test]
    fn test_status_with_message() {
        let s = Status::with_message(MpoolCode::EXHAUSTED, "desc pool");
        assert!(!s.is_ok());
        assert_eq!(s.code(), 2001);
        assert_eq!(s.message(), Some("desc pool"));
        assert_eq!(s.describe(), "Mpool::Exhausted(2001) desc pool");
    }

    #[test]
    fn test_status_display() {
        let s = Status::new(TransportCode::IN_PROGRESS);
        assert_eq!(format!("{}", s), "Transport::InProgress(1004)");
    }

    #[test]
    fn test_status_from_code() {
        let s: Status = StatusCode::INVALID_ARG.into();
        assert_eq!(s.code(), 3);
        assert_eq!(s.errno(), libc::EINVAL);
    }

    #[test]
    fn test_status_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "mmap failed");
        let s: Status = io.into();
        assert_eq!(s.code(), StatusCode::OS_ERROR);
        assert!(s.describe().contains("mmap failed"));
    }

    #[test]
    fn test_status_is_error() {
        let s = Status::new(StatusCode::UNKNOWN);
        let e: &dyn std::error::Error = &s;
        assert!(e.to_string().contains("Unknown"));
    }
}
