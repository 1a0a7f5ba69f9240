use fabric_config::ConfigError;
use fabric_types::{Status, TransportCode};

use crate::pools::PoolRole;

/// Interface construction errors, one variant per stage that can fail.
#[derive(Debug, thiserror::Error)]
pub enum IfaceError {
    #[error("device '{requested}' not found in memory domain of '{available}'")]
    NoDevice { requested: String, available: String },

    #[error("invalid interface config: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to create descriptor pool {role}: {source}")]
    PoolInit {
        role: PoolRole,
        #[source]
        source: Status,
    },

    #[error("device activation failed: {0}")]
    Activation(#[source] Status),

    #[error(transparent)]
    Status(#[from] Status),
}

impl IfaceError {
    /// The status code surfaced to callers.
    pub fn status(&self) -> Status {
        match self {
            IfaceError::NoDevice { .. } => Status::with_message(TransportCode::NO_DEVICE, self.to_string()),
            IfaceError::Config(e) => Status::with_message(e.code(), e.to_string()),
            IfaceError::PoolInit { source, .. } => source.clone(),
            IfaceError::Activation(status) | IfaceError::Status(status) => status.clone(),
        }
    }

    /// Name of the stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            IfaceError::NoDevice { .. } => "device",
            IfaceError::Config(_) => "config",
            IfaceError::PoolInit { role, .. } => role.name(),
            IfaceError::Activation(_) => "activation",
            IfaceError::Status(_) => "interface",
        }
    }
}

impl From<IfaceError> for Status {
    fn from(err: IfaceError) -> Self {
        err.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_types::{MpoolCode, StatusCode};

    #[test]
    fn test_status_and_stage() {
        let err = IfaceError::PoolInit {
            role: PoolRole::Famo,
            source: Status::new(MpoolCode::INVALID_PARAMS),
        };
        assert_eq!(err.status().code(), MpoolCode::INVALID_PARAMS);
        assert_eq!(err.stage(), "rdma_famo_desc");
        assert!(err.to_string().contains("rdma_famo_desc"));

        let err = IfaceError::Activation(Status::new(TransportCode::ACTIVATION_FAILED));
        assert_eq!(err.stage(), "activation");
        assert_eq!(Status::from(err).code(), TransportCode::ACTIVATION_FAILED);

        let err = IfaceError::NoDevice {
            requested: "a".into(),
            available: "b".into(),
        };
        assert_eq!(err.status().code(), TransportCode::NO_DEVICE);
    }

    #[test]
    fn test_config_error_code() {
        let err = IfaceError::from(ConfigError::InvalidValue {
            field: "iface.alloc".into(),
            reason: "empty".into(),
        });
        assert_eq!(err.status().code(), StatusCode::CONFIG_INVALID_VALUE);
    }
}
