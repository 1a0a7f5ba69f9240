//! Configuration support.
//!
//! A configuration type implements [`Config`] to be parsed from a TOML table,
//! validated, and rendered back to TOML. The default methods go through
//! `serde`, so most types only need `#[derive(Serialize, Deserialize)]` and a
//! `validate` override.

mod loader;

pub use loader::{load_config, parse_config};

use fabric_types::{Status, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Errors raised while reading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("toml parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("toml render error: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("type mismatch for `{field}`: expected {expected}")]
    TypeMismatch { field: String, expected: String },

    #[error("value {value} of `{field}` out of range (min: {min:?}, max: {max:?})")]
    OutOfRange {
        field: String,
        value: String,
        min: Option<String>,
        max: Option<String>,
    },

    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    /// Status code equivalent of this error.
    pub fn code(&self) -> fabric_types::status_code_t {
        match self {
            ConfigError::Io(_) => StatusCode::IO_ERROR,
            ConfigError::Parse(_) | ConfigError::Render(_) => StatusCode::CONFIG_PARSE_ERROR,
            ConfigError::TypeMismatch { .. } => StatusCode::CONFIG_INVALID_TYPE,
            ConfigError::OutOfRange { .. } | ConfigError::InvalidValue { .. } => {
                StatusCode::CONFIG_INVALID_VALUE
            }
        }
    }
}

impl From<ConfigError> for Status {
    fn from(err: ConfigError) -> Self {
        Status::with_message(err.code(), err.to_string())
    }
}

/// A configuration section.
pub trait Config: Sized + Serialize + DeserializeOwned {
    /// Build the configuration from a parsed TOML value. Missing keys take
    /// their serde defaults.
    fn from_toml(value: &toml::Value) -> Result<Self, ConfigError> {
        Ok(value.clone().try_into()?)
    }

    /// Check cross-field constraints after parsing.
    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Render the configuration as TOML text.
    fn render(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestConfig {
        #[serde(default = "default_depth")]
        depth: u32,
        #[serde(default)]
        name: String,
    }

    fn default_depth() -> u32 {
        16
    }

    impl Config for TestConfig {
        fn validate(&self) -> Result<(), ConfigError> {
            if self.depth == 0 {
                return Err(ConfigError::OutOfRange {
                    field: "depth".into(),
                    value: "0".into(),
                    min: Some("1".into()),
                    max: None,
                });
            }
            Ok(())
        }
    }

    #[test]
    fn test_from_toml_defaults() {
        let value: toml::Value = "name = \"x\"".parse().unwrap();
        let cfg = TestConfig::from_toml(&value).unwrap();
        assert_eq!(cfg.depth, 16);
        assert_eq!(cfg.name, "x");
    }

    #[test]
    fn test_from_toml_type_mismatch() {
        let value: toml::Value = "depth = \"deep\"".parse().unwrap();
        let err = TestConfig::from_toml(&value).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert_eq!(err.code(), StatusCode::CONFIG_PARSE_ERROR);
    }

    #[test]
    fn test_render() {
        let cfg = TestConfig {
            depth: 4,
            name: "n".into(),
        };
        let text = cfg.render().unwrap();
        assert!(text.contains("depth = 4"));
    }

    #[test]
    fn test_error_into_status() {
        let err = ConfigError::InvalidValue {
            field: "alloc".into(),
            reason: "empty".into(),
        };
        let status: Status = err.into();
        assert_eq!(status.code(), StatusCode::CONFIG_INVALID_VALUE);
        assert!(status.describe().contains("alloc"));
    }
}
