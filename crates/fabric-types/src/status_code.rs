/// Status code type alias. Codes are grouped into ranges of 1000.
#[allow(non_camel_case_types)]
pub type status_code_t = u16;

/// Common status codes (0-999).
pub mod StatusCode {
    use super::status_code_t;

    pub const OK: status_code_t = 0;
    pub const NOT_IMPLEMENTED: status_code_t = 1;
    pub const INVALID_ARG: status_code_t = 3;
    pub const INVALID_CONFIG: status_code_t = 4;
    pub const CONFIG_INVALID_TYPE: status_code_t = 15;
    pub const CONFIG_INVALID_VALUE: status_code_t = 16;
    pub const NOT_ENOUGH_MEMORY: status_code_t = 26;
    pub const IO_ERROR: status_code_t = 69;
    pub const CONFIG_PARSE_ERROR: status_code_t = 71;
    pub const OS_ERROR: status_code_t = 72;
    pub const FOUND_BUG: status_code_t = 998;
    pub const UNKNOWN: status_code_t = 999;
}

/// Transport interface status codes (1xxx).
pub mod TransportCode {
    use super::status_code_t;

    pub const NO_DEVICE: status_code_t = 1000;
    pub const ACTIVATION_FAILED: status_code_t = 1002;
    pub const NOT_ACTIVE: status_code_t = 1003;
    pub const IN_PROGRESS: status_code_t = 1004;
    pub const UNREACHABLE: status_code_t = 1005;
    pub const UNSUPPORTED: status_code_t = 1006;
    pub const EXCEEDS_LIMIT: status_code_t = 1007;
    pub const MEM_REG_FAILED: status_code_t = 1008;
}

/// Memory pool status codes (2xxx).
pub mod MpoolCode {
    use super::status_code_t;

    pub const INVALID_PARAMS: status_code_t = 2000;
    pub const EXHAUSTED: status_code_t = 2001;
    pub const CHUNK_ALLOC_FAILED: status_code_t = 2002;
}

/// Classification of status code ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum StatusCodeType {
    Invalid = -1,
    Common = 0,
    Transport = 1,
    Mpool = 2,
}

/// Determine the type/category of a status code.
pub fn type_of(code: status_code_t) -> StatusCodeType {
    match code {
        0..=999 => StatusCodeType::Common,
        1000..=1999 => StatusCodeType::Transport,
        2000..=2999 => StatusCodeType::Mpool,
        _ => StatusCodeType::Invalid,
    }
}

/// Convert a status code to its human-readable name.
pub fn to_string(code: status_code_t) -> &'static str {
    match code {
        // Common
        StatusCode::OK => "OK",
        StatusCode::NOT_IMPLEMENTED => "NotImplemented",
        StatusCode::INVALID_ARG => "InvalidArg",
        StatusCode::INVALID_CONFIG => "InvalidConfig",
        StatusCode::CONFIG_INVALID_TYPE => "ConfigInvalidType",
        StatusCode::CONFIG_INVALID_VALUE => "ConfigInvalidValue",
        StatusCode::NOT_ENOUGH_MEMORY => "NotEnoughMemory",
        StatusCode::IO_ERROR => "IOError",
        StatusCode::CONFIG_PARSE_ERROR => "ConfigParseError",
        StatusCode::OS_ERROR => "OSError",
        StatusCode::FOUND_BUG => "FoundBug",
        StatusCode::UNKNOWN => "Unknown",

        // Transport
        TransportCode::NO_DEVICE => "Transport::NoDevice",
        TransportCode::ACTIVATION_FAILED => "Transport::ActivationFailed",
        TransportCode::NOT_ACTIVE => "Transport::NotActive",
        TransportCode::IN_PROGRESS => "Transport::InProgress",
        TransportCode::UNREACHABLE => "Transport::Unreachable",
        TransportCode::UNSUPPORTED => "Transport::Unsupported",
        TransportCode::EXCEEDS_LIMIT => "Transport::ExceedsLimit",
        TransportCode::MEM_REG_FAILED => "Transport::MemRegFailed",

        // Mpool
        MpoolCode::INVALID_PARAMS => "Mpool::InvalidParams",
        MpoolCode::EXHAUSTED => "Mpool::Exhausted",
        MpoolCode::CHUNK_ALLOC_FAILED => "Mpool::ChunkAllocFailed",

        _ => "UnknownStatusCode",
    }
}

/// Convert a status code to the corresponding POSIX errno value.
pub fn to_errno(code: status_code_t) -> i32 {
    match code {
        c if c == StatusCode::INVALID_ARG || c == MpoolCode::INVALID_PARAMS => libc::EINVAL,
        c if c == StatusCode::NOT_IMPLEMENTED => libc::ENOSYS,
        c if c == StatusCode::NOT_ENOUGH_MEMORY
            || c == MpoolCode::EXHAUSTED
            || c == MpoolCode::CHUNK_ALLOC_FAILED =>
        {
            libc::ENOMEM
        }
        c if c == TransportCode::NO_DEVICE => libc::ENODEV,
        c if c == TransportCode::IN_PROGRESS => libc::EINPROGRESS,
        c if c == TransportCode::UNREACHABLE => libc::EHOSTUNREACH,
        c if c == TransportCode::UNSUPPORTED => libc::EOPNOTSUPP,
        c if c == TransportCode::EXCEEDS_LIMIT => libc::EMSGSIZE,
        _ => libc::EIO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_values() {
        assert_eq!(StatusCode::OK, 0);
        assert_eq!(StatusCode::UNKNOWN, 999);
        assert_eq!(TransportCode::NO_DEVICE, 1000);
        assert_eq!(MpoolCode::INVALID_PARAMS, 2000);
    }

    #[test]
    fn test_type_of() {
        assert_eq!(type_of(StatusCode::OK), StatusCodeType::Common);
        assert_eq!(type_of(StatusCode::UNKNOWN), StatusCodeType::Common);
        assert_eq!(type_of(TransportCode::IN_PROGRESS), StatusCodeType::Transport);
        assert_eq!(type_of(MpoolCode::EXHAUSTED), StatusCodeType::Mpool);
        assert_eq!(type_of(9000), StatusCodeType::Invalid);
    }

    #[test]
    fn test_to_string() {
        assert_eq!(to_string(StatusCode::OK), "OK");
        assert_eq!(to_string(StatusCode::NOT_ENOUGH_MEMORY), "NotEnoughMemory");
        assert_eq!(
            to_string(TransportCode::ACTIVATION_FAILED),
            "Transport::ActivationFailed"
        );
        assert_eq!(to_string(MpoolCode::EXHAUSTED), "Mpool::Exhausted");
        assert_eq!(to_string(12345), "UnknownStatusCode");
    }

    #[test]
    fn test_unassigned_codes_have_no_name() {
        for code in [1001, 1009, 2003] {
            assert_eq!(to_string(code), "UnknownStatusCode");
            assert_eq!(to_errno(code), libc::EIO);
        }
    }

    #[test]
    fn test_to_errno() {
        assert_eq!(to_errno(StatusCode::INVALID_ARG), libc::EINVAL);
        assert_eq!(to_errno(MpoolCode::EXHAUSTED), libc::ENOMEM);
        assert_eq!(to_errno(TransportCode::NO_DEVICE), libc::ENODEV);
        assert_eq!(to_errno(TransportCode::IN_PROGRESS), libc::EINPROGRESS);
        assert_eq!(to_errno(TransportCode::ACTIVATION_FAILED), libc::EIO);
    }
}
