//! Transport component registration.

use std::path::Path;

use fabric_config::{load_config, ConfigError};

use crate::config::RdmaIfaceConfig;
use crate::device::{query_resources, Md, TlResource};
use crate::error::IfaceError;
use crate::iface::RdmaIface;
use crate::worker::Worker;

pub const TL_NAME: &str = "rdma";

pub type QueryResourcesFn = fn(&Md) -> Vec<TlResource>;
pub type IfaceOpenFn =
    fn(&Md, &Worker, &str, usize, RdmaIfaceConfig) -> Result<RdmaIface, IfaceError>;

/// Descriptor of a transport a memory domain can open.
pub struct TlComponent {
    pub name: &'static str,
    /// Prefix of configuration override variables.
    pub config_prefix: &'static str,
    pub query_resources: QueryResourcesFn,
    pub iface_open: IfaceOpenFn,
}

impl std::fmt::Debug for TlComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlComponent")
            .field("name", &self.name)
            .field("config_prefix", &self.config_prefix)
            .finish()
    }
}

impl TlComponent {
    /// Read the interface configuration: the TOML file if given, then any
    /// `<env_prefix><config_prefix>KEY` overrides from `vars`.
    pub fn read_config<I, K, V>(
        &self,
        path: Option<&Path>,
        env_prefix: &str,
        vars: I,
    ) -> Result<RdmaIfaceConfig, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = match path {
            Some(path) => load_config::<RdmaIfaceConfig>(path)?,
            None => RdmaIfaceConfig::default(),
        };
        let prefix = format!("{}{}", env_prefix, self.config_prefix);
        config.apply_overrides(&prefix, vars)?;
        fabric_config::Config::validate(&config)?;
        Ok(config)
    }
}

/// Resource query entry point of the RDMA transport.
pub fn query_tl_resources(md: &Md) -> Vec<TlResource> {
    query_resources(md.device().as_ref(), TL_NAME)
}

pub static RDMA_TL_COMPONENT: TlComponent = TlComponent {
    name: TL_NAME,
    config_prefix: "RDMA_",
    query_resources: query_tl_resources,
    iface_open: RdmaIface::create,
};

static MD_COMPONENTS: [&TlComponent; 1] = [&RDMA_TL_COMPONENT];

/// Transports registered for fabric memory domains.
pub fn md_components() -> &'static [&'static TlComponent] {
    &MD_COMPONENTS
}

/// Look up a registered transport by name.
pub fn find_component(name: &str) -> Option<&'static TlComponent> {
    md_components().iter().copied().find(|c| c.name == name)
}
