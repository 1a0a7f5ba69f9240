//! RDMA transport interface for the fabric communication layer.
//!
//! The interface exposes one-sided PUT/GET and atomic operations in three
//! cost tiers (short, buffered copy, zero copy) and advertises per-tier size
//! limits through [`RdmaIface::query`].
//!
//! # Architecture
//!
//! - [`RdmaIfaceConfig`]: limits, allocation priority and pool sizing.
//! - [`FabricDevice`] / [`Md`]: driver boundary and memory domain. Without a
//!   hardware driver, [`SimDevice`] stands in for the fabric.
//! - [`DescPools`]: the five descriptor pools owned by an activated interface.
//! - [`RdmaIface`]: construction under the global [`ActivationLock`], query,
//!   dispatch to endpoints, teardown.
//! - [`Worker`]: progress registration.
//! - [`TlComponent`]: transport registration for a memory domain.

pub mod attr;
pub mod component;
pub mod config;
pub mod desc;
pub mod device;
pub mod ep;
pub mod error;
pub mod iface;
pub mod lock;
pub mod ops;
pub mod pools;
pub mod worker;

pub use attr::{IfaceAttr, IfaceFlags, IfaceLimits, OpCaps};
pub use component::{md_components, query_tl_resources, TlComponent, RDMA_TL_COMPONENT, TL_NAME};
pub use config::RdmaIfaceConfig;
pub use device::{DeviceType, FabricDevice, IfaceAddr, Md, SimDevice, TlResource};
pub use ep::{Endpoint, RmaOp};
pub use error::IfaceError;
pub use iface::{BaseIface, RdmaIface};
pub use lock::ActivationLock;
pub use ops::{IfaceOps, OpBinding, OpKind};
pub use pools::{DescPools, PoolRole, PoolService, SystemPools};
pub use worker::{Progress, ProgressId, Worker};
