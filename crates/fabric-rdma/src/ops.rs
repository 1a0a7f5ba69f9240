//! Operation dispatch table of the RDMA interface.

use std::fmt;

use crate::attr::IfaceFlags;

/// Every entry point an interface exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpKind {
    Query,
    Flush,
    Close,
    GetAddress,
    IsReachable,
    EpCreateConnected,
    EpDestroy,
    PutShort,
    PutBcopy,
    PutZcopy,
    AmShort,
    GetBcopy,
    GetZcopy,
    AtomicAdd64,
    AtomicFadd64,
    AtomicCswap64,
    PendingAdd,
    PendingPurge,
}

impl OpKind {
    pub const ALL: [OpKind; 18] = [
        OpKind::Query,
        OpKind::Flush,
        OpKind::Close,
        OpKind::GetAddress,
        OpKind::IsReachable,
        OpKind::EpCreateConnected,
        OpKind::EpDestroy,
        OpKind::PutShort,
        OpKind::PutBcopy,
        OpKind::PutZcopy,
        OpKind::AmShort,
        OpKind::GetBcopy,
        OpKind::GetZcopy,
        OpKind::AtomicAdd64,
        OpKind::AtomicFadd64,
        OpKind::AtomicCswap64,
        OpKind::PendingAdd,
        OpKind::PendingPurge,
    ];

    /// Capability bit a data-movement operation requires.
    pub fn required_flag(self) -> Option<IfaceFlags> {
        let flag = match self {
            OpKind::PutShort => IfaceFlags::PUT_SHORT,
            OpKind::PutBcopy => IfaceFlags::PUT_BCOPY,
            OpKind::PutZcopy => IfaceFlags::PUT_ZCOPY,
            OpKind::AmShort => IfaceFlags::AM_SHORT,
            OpKind::GetBcopy => IfaceFlags::GET_BCOPY,
            OpKind::GetZcopy => IfaceFlags::GET_ZCOPY,
            OpKind::AtomicAdd64 => IfaceFlags::ATOMIC_ADD64,
            OpKind::AtomicFadd64 => IfaceFlags::ATOMIC_FADD64,
            OpKind::AtomicCswap64 => IfaceFlags::ATOMIC_CSWAP64,
            _ => return None,
        };
        Some(flag)
    }

    pub fn is_data(self) -> bool {
        self.required_flag().is_some()
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Where a table entry is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpBinding {
    /// Handled by the interface itself.
    Iface,
    /// Delegated to the endpoint.
    Endpoint,
    /// Present in the table but not implemented; calls succeed as no-ops.
    Unimplemented,
}

/// Fixed table of entry points. Kinds missing from the table are unsupported.
#[derive(Debug)]
pub struct IfaceOps {
    entries: &'static [(OpKind, OpBinding)],
}

impl IfaceOps {
    pub fn binding(&self, kind: OpKind) -> Option<OpBinding> {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, binding)| *binding)
    }

    pub fn entries(&self) -> impl Iterator<Item = (OpKind, OpBinding)> + '_ {
        self.entries.iter().copied()
    }

    pub fn is_implemented(&self, kind: OpKind) -> bool {
        matches!(
            self.binding(kind),
            Some(OpBinding::Iface) | Some(OpBinding::Endpoint)
        )
    }
}

pub static RDMA_IFACE_OPS: IfaceOps = IfaceOps {
    entries: &[
        (OpKind::Query, OpBinding::Iface),
        (OpKind::Flush, OpBinding::Iface),
        (OpKind::Close, OpBinding::Iface),
        (OpKind::GetAddress, OpBinding::Iface),
        (OpKind::IsReachable, OpBinding::Iface),
        (OpKind::EpCreateConnected, OpBinding::Endpoint),
        (OpKind::EpDestroy, OpBinding::Endpoint),
        (OpKind::PutShort, OpBinding::Endpoint),
        (OpKind::PutBcopy, OpBinding::Endpoint),
        (OpKind::PutZcopy, OpBinding::Endpoint),
        (OpKind::GetBcopy, OpBinding::Endpoint),
        (OpKind::GetZcopy, OpBinding::Endpoint),
        (OpKind::AtomicAdd64, OpBinding::Endpoint),
        (OpKind::AtomicFadd64, OpBinding::Endpoint),
        (OpKind::AtomicCswap64, OpBinding::Endpoint),
        (OpKind::PendingAdd, OpBinding::Unimplemented),
        (OpKind::PendingPurge, OpBinding::Unimplemented),
    ],
};
