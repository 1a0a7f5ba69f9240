//! Capability snapshot reported by `RdmaIface::query`.

use bitflags::bitflags;
use fabric_types::{Result, Status, StatusCode};
use serde::{Serialize, Serializer};

use crate::device::IfaceAddr;

/// Buffered-copy segment size of the fast memory access path.
pub const FMA_SEG_SIZE: usize = 2048;
/// Largest zero-copy transfer.
pub const RDMA_MAX_SIZE: usize = 1 << 30;
/// Bytes of a buffered GET segment reserved for alignment fix-up.
pub const GET_BCOPY_RESERVED: usize = 8;

bitflags! {
    /// Operations an interface supports. Bits are independent.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct IfaceFlags: u64 {
        const PUT_SHORT = 1 << 0;
        const PUT_BCOPY = 1 << 1;
        const PUT_ZCOPY = 1 << 2;
        const GET_SHORT = 1 << 4;
        const GET_BCOPY = 1 << 5;
        const GET_ZCOPY = 1 << 6;
        const AM_SHORT = 1 << 8;
        const AM_BCOPY = 1 << 9;
        const AM_ZCOPY = 1 << 10;
        const ATOMIC_ADD64 = 1 << 16;
        const ATOMIC_FADD64 = 1 << 17;
        const ATOMIC_CSWAP64 = 1 << 19;
        const CONNECT_TO_EP = 1 << 24;
        const CONNECT_TO_IFACE = 1 << 25;
    }
}

impl IfaceFlags {
    /// Everything the RDMA interface advertises.
    pub fn rdma() -> Self {
        IfaceFlags::PUT_SHORT
            | IfaceFlags::PUT_BCOPY
            | IfaceFlags::PUT_ZCOPY
            | IfaceFlags::GET_BCOPY
            | IfaceFlags::GET_ZCOPY
            | IfaceFlags::ATOMIC_CSWAP64
            | IfaceFlags::ATOMIC_FADD64
            | IfaceFlags::ATOMIC_ADD64
            | IfaceFlags::CONNECT_TO_IFACE
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }
}

fn serialize_flags<S: Serializer>(flags: &IfaceFlags, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.collect_seq(flags.iter_names().map(|(name, _)| name))
}

/// Size limits of one operation class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OpCaps {
    pub max_short: usize,
    pub max_bcopy: usize,
    pub max_zcopy: usize,
}

/// Tier limits of an interface instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IfaceLimits {
    pub fma_seg_size: usize,
    pub rdma_max_size: usize,
}

impl Default for IfaceLimits {
    fn default() -> Self {
        Self {
            fma_seg_size: FMA_SEG_SIZE,
            rdma_max_size: RDMA_MAX_SIZE,
        }
    }
}

impl IfaceLimits {
    pub fn new(fma_seg_size: usize, rdma_max_size: usize) -> Result<Self> {
        if fma_seg_size < GET_BCOPY_RESERVED || rdma_max_size < fma_seg_size {
            return Err(Status::with_message(
                StatusCode::INVALID_ARG,
                format!(
                    "invalid limits: fma_seg_size={} rdma_max_size={}",
                    fma_seg_size, rdma_max_size
                ),
            ));
        }
        Ok(Self {
            fma_seg_size,
            rdma_max_size,
        })
    }
}

/// Interface capabilities. Fields not set by the transport stay zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IfaceAttr {
    pub put: OpCaps,
    pub get: OpCaps,
    pub am: OpCaps,
    pub iface_addr_len: usize,
    pub ep_addr_len: usize,
    #[serde(serialize_with = "serialize_flags")]
    pub flags: IfaceFlags,
}

impl IfaceAttr {
    pub fn for_limits(limits: &IfaceLimits) -> Self {
        let mut attr = IfaceAttr::default();
        attr.put.max_short = limits.fma_seg_size;
        attr.put.max_bcopy = limits.fma_seg_size;
        attr.put.max_zcopy = limits.rdma_max_size;
        attr.get.max_bcopy = limits.fma_seg_size - GET_BCOPY_RESERVED;
        attr.get.max_zcopy = limits.rdma_max_size;
        attr.iface_addr_len = IfaceAddr::LEN;
        attr.ep_addr_len = 0;
        attr.flags = IfaceFlags::rdma();
        attr
    }
}
