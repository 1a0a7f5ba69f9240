//! Interface configuration.
//!
//! Parsed once when an interface is created and never mutated afterwards.

use fabric_config::{Config, ConfigError};
use fabric_mpool::{parse_alloc_methods, AllocMethod};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_SHORT: usize = 2048;
pub const DEFAULT_MAX_BCOPY: usize = 2048;
/// Objects added per pool growth step when `bufs_grow` is 0.
pub const DEFAULT_BUFS_GROW: usize = 128;
/// `max_bufs` value meaning "no bound".
pub const UNLIMITED_BUFS: i64 = -1;

/// Generic interface limits and chunk allocation priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IfaceConfig {
    /// Largest payload for inline ("short") operations.
    #[serde(default = "default_max_short")]
    pub max_short: usize,

    /// Largest payload for buffered-copy operations.
    #[serde(default = "default_max_bcopy")]
    pub max_bcopy: usize,

    /// Chunk allocation methods, tried in order.
    #[serde(default = "default_alloc")]
    pub alloc: Vec<AllocMethod>,
}

fn default_max_short() -> usize {
    DEFAULT_MAX_SHORT
}

fn default_max_bcopy() -> usize {
    DEFAULT_MAX_BCOPY
}

fn default_alloc() -> Vec<AllocMethod> {
    vec![AllocMethod::Huge, AllocMethod::Mmap, AllocMethod::Heap]
}

impl Default for IfaceConfig {
    fn default() -> Self {
        Self {
            max_short: default_max_short(),
            max_bcopy: default_max_bcopy(),
            alloc: default_alloc(),
        }
    }
}

/// Sizing for the descriptor pools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MpoolConfig {
    /// Maximum objects per pool, `-1` for unlimited.
    #[serde(default = "default_max_bufs")]
    pub max_bufs: i64,

    /// Objects added per growth step, `0` for the transport default.
    #[serde(default)]
    pub bufs_grow: usize,
}

fn default_max_bufs() -> i64 {
    UNLIMITED_BUFS
}

impl Default for MpoolConfig {
    fn default() -> Self {
        Self {
            max_bufs: default_max_bufs(),
            bufs_grow: 0,
        }
    }
}

impl MpoolConfig {
    pub fn grow(&self) -> usize {
        if self.bufs_grow == 0 {
            DEFAULT_BUFS_GROW
        } else {
            self.bufs_grow
        }
    }

    pub fn max_elems(&self) -> Option<usize> {
        usize::try_from(self.max_bufs).ok()
    }
}

/// Full configuration of an RDMA interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RdmaIfaceConfig {
    #[serde(default)]
    pub iface: IfaceConfig,

    /// Descriptor pool sizing.
    #[serde(default)]
    pub fma: MpoolConfig,
}

impl RdmaIfaceConfig {
    /// Apply a single `KEY=value` style override. Keys are the upper-case
    /// names used in environment variables, without the transport prefix.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidValue {
            field: key.to_string(),
            reason,
        };
        let parse_usize = |v: &str| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::TypeMismatch {
                    field: key.to_string(),
                    expected: "unsigned integer".into(),
                })
        };
        match key {
            "MAX_SHORT" => self.iface.max_short = parse_usize(value)?,
            "MAX_BCOPY" => self.iface.max_bcopy = parse_usize(value)?,
            "ALLOC" => {
                self.iface.alloc =
                    parse_alloc_methods(value).map_err(|e| invalid(e.describe()))?;
            }
            "FMA_MAX_BUFS" => {
                self.fma.max_bufs =
                    value
                        .trim()
                        .parse::<i64>()
                        .map_err(|_| ConfigError::TypeMismatch {
                            field: key.to_string(),
                            expected: "integer".into(),
                        })?;
            }
            "FMA_BUFS_GROW" => self.fma.bufs_grow = parse_usize(value)?,
            _ => return Err(invalid("unknown key".into())),
        }
        Ok(())
    }

    /// Apply every variable in `vars` whose name starts with `prefix`.
    /// Returns the number of overrides applied.
    pub fn apply_overrides<I, K, V>(&mut self, prefix: &str, vars: I) -> Result<usize, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut applied = 0;
        for (name, value) in vars {
            if let Some(key) = name.as_ref().strip_prefix(prefix) {
                self.set(key, value.as_ref())?;
                tracing::debug!(key, value = value.as_ref(), "config override");
                applied += 1;
            }
        }
        Ok(applied)
    }
}

impl Config for RdmaIfaceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.iface.alloc.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "iface.alloc".into(),
                reason: "at least one allocation method is required".into(),
            });
        }
        if self.fma.max_bufs != UNLIMITED_BUFS && self.fma.max_bufs < 1 {
            return Err(ConfigError::OutOfRange {
                field: "fma.max_bufs".into(),
                value: self.fma.max_bufs.to_string(),
                min: Some("1".into()),
                max: None,
            });
        }
        if let Some(max) = self.fma.max_elems() {
            if max < self.fma.grow() {
                return Err(ConfigError::InvalidValue {
                    field: "fma.max_bufs".into(),
                    reason: format!("{} is smaller than the grow count {}", max, self.fma.grow()),
                });
            }
        }
        Ok(())
    }
}
