//! Endpoint boundary and one-sided operations.

use fabric_mpool::MpoolObj;
use fabric_types::{Result, Status, TransportCode};

use crate::attr::IfaceAttr;
use crate::device::IfaceAddr;
use crate::ops::OpKind;

/// A one-sided operation posted on an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RmaOp {
    PutShort {
        remote_addr: u64,
        rkey: u64,
        payload: Vec<u8>,
    },
    PutBcopy {
        remote_addr: u64,
        rkey: u64,
        len: usize,
    },
    PutZcopy {
        local_addr: usize,
        len: usize,
        remote_addr: u64,
        rkey: u64,
    },
    AmShort {
        id: u8,
        header: u64,
        payload: Vec<u8>,
    },
    GetBcopy {
        remote_addr: u64,
        rkey: u64,
        len: usize,
    },
    GetZcopy {
        local_addr: usize,
        len: usize,
        remote_addr: u64,
        rkey: u64,
    },
    AtomicAdd64 {
        remote_addr: u64,
        rkey: u64,
        add: u64,
    },
    AtomicFadd64 {
        remote_addr: u64,
        rkey: u64,
        add: u64,
    },
    AtomicCswap64 {
        remote_addr: u64,
        rkey: u64,
        compare: u64,
        swap: u64,
    },
}

impl RmaOp {
    pub fn kind(&self) -> OpKind {
        match self {
            RmaOp::PutShort { .. } => OpKind::PutShort,
            RmaOp::PutBcopy { .. } => OpKind::PutBcopy,
            RmaOp::PutZcopy { .. } => OpKind::PutZcopy,
            RmaOp::AmShort { .. } => OpKind::AmShort,
            RmaOp::GetBcopy { .. } => OpKind::GetBcopy,
            RmaOp::GetZcopy { .. } => OpKind::GetZcopy,
            RmaOp::AtomicAdd64 { .. } => OpKind::AtomicAdd64,
            RmaOp::AtomicFadd64 { .. } => OpKind::AtomicFadd64,
            RmaOp::AtomicCswap64 { .. } => OpKind::AtomicCswap64,
        }
    }

    /// Payload bytes moved.
    pub fn len(&self) -> usize {
        match self {
            RmaOp::PutShort { payload, .. } => payload.len(),
            RmaOp::AmShort { payload, .. } => 8 + payload.len(),
            RmaOp::PutBcopy { len, .. }
            | RmaOp::PutZcopy { len, .. }
            | RmaOp::GetBcopy { len, .. }
            | RmaOp::GetZcopy { len, .. } => *len,
            RmaOp::AtomicAdd64 { .. }
            | RmaOp::AtomicFadd64 { .. }
            | RmaOp::AtomicCswap64 { .. } => 8,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Local buffer of zero-copy operations.
    pub fn local_addr(&self) -> Option<usize> {
        match self {
            RmaOp::PutZcopy { local_addr, .. } | RmaOp::GetZcopy { local_addr, .. } => {
                Some(*local_addr)
            }
            _ => None,
        }
    }
}

/// A connection to a remote interface.
pub trait Endpoint: Send {
    fn id(&self) -> u64;

    fn remote_addr(&self) -> IfaceAddr;

    /// Post `op`. The endpoint holds `desc` until the operation completes.
    fn execute(&mut self, op: &RmaOp, desc: MpoolObj) -> Result<()>;
}

impl std::fmt::Debug for dyn Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.id())
            .field("remote", &self.remote_addr())
            .finish()
    }
}

/// Check `op` against the capability snapshot.
pub fn check_op(attr: &IfaceAttr, op: &RmaOp) -> Result<()> {
    let kind = op.kind();
    let supported = kind
        .required_flag()
        .map(|flag| attr.flags.contains(flag))
        .unwrap_or(false);
    if !supported {
        return Err(Status::with_message(
            TransportCode::UNSUPPORTED,
            format!("{} is not supported", kind),
        ));
    }

    let limit = match kind {
        OpKind::PutShort => Some(attr.put.max_short),
        OpKind::PutBcopy => Some(attr.put.max_bcopy),
        OpKind::PutZcopy => Some(attr.put.max_zcopy),
        OpKind::AmShort => Some(attr.am.max_short),
        OpKind::GetBcopy => Some(attr.get.max_bcopy),
        OpKind::GetZcopy => Some(attr.get.max_zcopy),
        _ => None,
    };
    match limit {
        Some(limit) if op.len() > limit => Err(Status::with_message(
            TransportCode::EXCEEDS_LIMIT,
            format!("{} of {} bytes exceeds limit {}", kind, op.len(), limit),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::IfaceLimits;

    fn attr() -> IfaceAttr {
        IfaceAttr::for_limits(&IfaceLimits::default())
    }

    #[test]
    fn test_op_kind_and_len() {
        let op = RmaOp::GetZcopy {
            local_addr: 0x1000,
            len: 4096,
            remote_addr: 0,
            rkey: 0,
        };
        assert_eq!(op.kind(), OpKind::GetZcopy);
        assert_eq!(op.len(), 4096);
        assert_eq!(op.local_addr(), Some(0x1000));

        let op = RmaOp::AtomicCswap64 {
            remote_addr: 0,
            rkey: 0,
            compare: 1,
            swap: 2,
        };
        assert_eq!(op.len(), 8);
        assert_eq!(op.local_addr(), None);
    }

    #[test]
    fn test_check_op_limits() {
        let attr = attr();
        let put = |len| RmaOp::PutBcopy {
            remote_addr: 0,
            rkey: 0,
            len,
        };
        assert!(check_op(&attr, &put(2048)).is_ok());
        assert_eq!(
            check_op(&attr, &put(2049)).unwrap_err().code(),
            TransportCode::EXCEEDS_LIMIT
        );

        let get = |len| RmaOp::GetBcopy {
            remote_addr: 0,
            rkey: 0,
            len,
        };
        assert!(check_op(&attr, &get(2040)).is_ok());
        assert!(check_op(&attr, &get(2041)).is_err());
    }

    #[test]
    fn test_check_op_unsupported() {
        let op = RmaOp::AmShort {
            id: 0,
            header: 0,
            payload: vec![1, 2, 3],
        };
        assert_eq!(
            check_op(&attr(), &op).unwrap_err().code(),
            TransportCode::UNSUPPORTED
        );

        let op = RmaOp::AtomicFadd64 {
            remote_addr: 0,
            rkey: 0,
            add: 1,
        };
        assert!(check_op(&attr(), &op).is_ok());
    }
}
