use crate::status::Status;
use crate::status_code::status_code_t;

/// The standard result type used across the fabric crates, with `Status` as the error.
pub type Result<T> = std::result::Result<T, Status>;

/// Create an error result from a status code.
pub fn make_error<T>(code: status_code_t) -> Result<T> {
    Err(Status::new(code))
}

/// Create an error result from a status code and message.
pub fn make_error_msg<T>(code: status_code_t, msg: impl Into<String>) -> Result<T> {
    Err(Status::with_message(code, msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status_code::{StatusCode, TransportCode};

    #[test]
    fn test_make_error() {
        let r: Result<i32> = make_error(TransportCode::NO_DEVICE);
        assert!(r.is_err());
        assert_eq!(r.unwrap_err().code(), 1000);
    }

    #[test]
    fn test_make_error_msg() {
        let r: Result<i32> = make_error_msg(StatusCode::INVALID_ARG, "bad alignment");
        let err = r.unwrap_err();
        assert_eq!(err.code(), 3);
        assert_eq!(err.message(), Some("bad alignment"));
    }
}
