use std::path::Path;

use crate::{Config, ConfigError};

/// Parse and validate a configuration from TOML text.
pub fn parse_config<T: Config>(content: &str) -> Result<T, ConfigError> {
    let value: toml::Value = content.parse()?;
    let config = T::from_toml(&value)?;
    config.validate()?;
    Ok(config)
}

/// Load, parse and validate a configuration file.
///
/// Configuration is read once; callers keep the returned value for the
/// lifetime of whatever it configures.
pub fn load_config<T: Config>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    tracing::debug!("Config loaded from {:?}", path);
    Ok(config)
}
