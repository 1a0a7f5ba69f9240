//! The five descriptor pools of an interface and the service that builds them.

use std::fmt;
use std::sync::{Arc, Weak};

use fabric_mpool::{AllocMethod, Chunk, MemPool, MpoolOps, MpoolParams, CACHE_LINE_SIZE};
use fabric_types::{Result, Status, StatusCode, TransportCode};

use crate::attr::IfaceLimits;
use crate::config::MpoolConfig;
use crate::desc::{self, ATOMIC_RESULT_SIZE, BASE_DESC_SIZE, FETCH_DESC_SIZE};
use crate::device::FabricDevice;
use crate::ops::OpKind;

/// Creates and destroys memory pools.
pub trait PoolService: Send + Sync {
    fn init(&self, params: MpoolParams, ops: Arc<dyn MpoolOps>) -> Result<MemPool>;

    fn cleanup(&self, pool: MemPool, leak_check: bool);
}

/// Pools backed by [`fabric_mpool::MemPool`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPools;

impl PoolService for SystemPools {
    fn init(&self, params: MpoolParams, ops: Arc<dyn MpoolOps>) -> Result<MemPool> {
        MemPool::new(params, ops)
    }

    fn cleanup(&self, pool: MemPool, leak_check: bool) {
        pool.cleanup(leak_check)
    }
}

/// Role of a descriptor pool, in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolRole {
    Desc,
    Get,
    Buffer,
    Famo,
    GetBuffer,
}

impl PoolRole {
    pub const ALL: [PoolRole; 5] = [
        PoolRole::Desc,
        PoolRole::Get,
        PoolRole::Buffer,
        PoolRole::Famo,
        PoolRole::GetBuffer,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PoolRole::Desc => "rdma_desc",
            PoolRole::Get => "rdma_get_desc",
            PoolRole::Buffer => "rdma_buffer_desc",
            PoolRole::Famo => "rdma_famo_desc",
            PoolRole::GetBuffer => "rdma_get_buffer_desc",
        }
    }

    /// Object size and alignment offset.
    pub fn geometry(self, limits: &IfaceLimits) -> (usize, usize) {
        match self {
            PoolRole::Desc => (BASE_DESC_SIZE, 0),
            PoolRole::Get => (FETCH_DESC_SIZE, 0),
            PoolRole::Buffer => (BASE_DESC_SIZE + limits.fma_seg_size, BASE_DESC_SIZE),
            PoolRole::Famo => (FETCH_DESC_SIZE + ATOMIC_RESULT_SIZE, FETCH_DESC_SIZE),
            PoolRole::GetBuffer => (FETCH_DESC_SIZE + limits.fma_seg_size, FETCH_DESC_SIZE),
        }
    }

    /// Whether chunks are registered with the device. Registered pools hold
    /// buffers the fabric writes results into.
    pub fn registered(self) -> bool {
        matches!(self, PoolRole::Famo | PoolRole::GetBuffer)
    }

    /// Whether objects carry the fetch header.
    pub fn has_fetch_header(self) -> bool {
        !matches!(self, PoolRole::Desc | PoolRole::Buffer)
    }

    pub fn params(self, limits: &IfaceLimits, config: &MpoolConfig) -> MpoolParams {
        let (elem_size, align_offset) = self.geometry(limits);
        MpoolParams {
            name: self.name().to_string(),
            elem_size,
            align_offset,
            alignment: CACHE_LINE_SIZE,
            elems_per_chunk: config.grow(),
            max_elems: config.max_elems(),
        }
    }

    pub fn ops(self, device: &Arc<dyn FabricDevice>, alloc: &[AllocMethod]) -> Arc<dyn MpoolOps> {
        if self.registered() {
            Arc::new(RegisteredDescOps {
                device: Arc::downgrade(device),
                dev_name: device.name().to_string(),
                alloc: alloc.to_vec(),
            })
        } else {
            Arc::new(DescOps)
        }
    }

    /// Pool a data-movement operation draws its descriptor from.
    pub fn for_op(kind: OpKind) -> Option<PoolRole> {
        match kind {
            OpKind::PutShort | OpKind::PutZcopy | OpKind::AtomicAdd64 => Some(PoolRole::Desc),
            OpKind::PutBcopy => Some(PoolRole::Buffer),
            OpKind::GetZcopy => Some(PoolRole::Get),
            OpKind::GetBcopy => Some(PoolRole::GetBuffer),
            OpKind::AtomicFadd64 | OpKind::AtomicCswap64 => Some(PoolRole::Famo),
            _ => None,
        }
    }
}

impl fmt::Display for PoolRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ops of unregistered pools: huge pages with heap fallback.
#[derive(Debug, Default)]
pub struct DescOps;

impl MpoolOps for DescOps {
    fn chunk_alloc(&self, size: usize, align: usize) -> Result<Chunk> {
        Chunk::alloc(size, align, &[AllocMethod::Huge, AllocMethod::Heap])
    }

    fn obj_init(&self, _chunk: &Chunk, obj: &mut [u8]) {
        desc::base_desc_init(obj);
    }
}

/// Ops of registered pools: each chunk is registered with the device and its
/// key stamped into every descriptor.
///
/// The device is held weakly: descriptors queued on the device keep their
/// pool alive, and the pool must not keep the device alive in turn.
pub struct RegisteredDescOps {
    device: Weak<dyn FabricDevice>,
    dev_name: String,
    alloc: Vec<AllocMethod>,
}

impl MpoolOps for RegisteredDescOps {
    fn chunk_alloc(&self, size: usize, align: usize) -> Result<Chunk> {
        let device = self.device.upgrade().ok_or_else(|| {
            Status::with_message(
                TransportCode::NO_DEVICE,
                format!("{}: device is gone", self.dev_name),
            )
        })?;
        let mut chunk = Chunk::alloc(size, align, &self.alloc)?;
        let key = device
            .register_memory(chunk.addr(), chunk.len())
            .map_err(|e| {
                Status::with_message(
                    TransportCode::MEM_REG_FAILED,
                    format!("{}: {}", self.dev_name, e),
                )
            })?;
        chunk.set_key(Some(key));
        Ok(chunk)
    }

    fn chunk_release(&self, chunk: &mut Chunk) {
        let Some(key) = chunk.key() else {
            return;
        };
        match self.device.upgrade() {
            Some(device) => {
                if let Err(e) = device.deregister_memory(key) {
                    tracing::warn!(device = %self.dev_name, key, "failed to deregister chunk: {}", e);
                }
            }
            None => tracing::debug!(device = %self.dev_name, key, "device gone, skipping deregistration"),
        }
        chunk.set_key(None);
    }

    fn obj_init(&self, chunk: &Chunk, obj: &mut [u8]) {
        desc::desc_key_init(chunk.key().unwrap_or_default(), obj);
    }
}

/// The five pools of an activated interface.
#[derive(Debug)]
pub struct DescPools {
    pub desc: MemPool,
    pub get: MemPool,
    pub buffer: MemPool,
    pub famo: MemPool,
    pub get_buffer: MemPool,
}

impl DescPools {
    pub fn pool(&self, role: PoolRole) -> &MemPool {
        match role {
            PoolRole::Desc => &self.desc,
            PoolRole::Get => &self.get,
            PoolRole::Buffer => &self.buffer,
            PoolRole::Famo => &self.famo,
            PoolRole::GetBuffer => &self.get_buffer,
        }
    }

    /// Destroy all five pools in reverse creation order.
    pub fn release(self, service: &dyn PoolService, leak_check: bool) {
        let DescPools {
            desc,
            get,
            buffer,
            famo,
            get_buffer,
        } = self;
        for pool in [get_buffer, famo, buffer, get, desc] {
            service.cleanup(pool, leak_check);
        }
    }
}

/// Pools created so far during interface construction. Dropping the stack
/// destroys them in reverse order.
pub(crate) struct PoolStack<'a> {
    service: &'a dyn PoolService,
    pools: Vec<(PoolRole, MemPool)>,
}

impl<'a> PoolStack<'a> {
    pub fn new(service: &'a dyn PoolService) -> Self {
        Self {
            service,
            pools: Vec::with_capacity(PoolRole::ALL.len()),
        }
    }

    pub fn push(&mut self, role: PoolRole, params: MpoolParams, ops: Arc<dyn MpoolOps>) -> Result<()> {
        let pool = self.service.init(params, ops)?;
        tracing::debug!(pool = %role, "descriptor pool created");
        self.pools.push((role, pool));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// Hand the pools over to the interface.
    pub fn finish(mut self) -> Result<DescPools> {
        let pools = std::mem::take(&mut self.pools);
        match <[(PoolRole, MemPool); 5]>::try_from(pools) {
            Ok(
                [
                    (PoolRole::Desc, desc),
                    (PoolRole::Get, get),
                    (PoolRole::Buffer, buffer),
                    (PoolRole::Famo, famo),
                    (PoolRole::GetBuffer, get_buffer),
                ],
            ) => Ok(DescPools {
                desc,
                get,
                buffer,
                famo,
                get_buffer,
            }),
            Ok(pools) => {
                self.pools = pools.into();
                Err(Status::with_message(
                    StatusCode::FOUND_BUG,
                    "descriptor pools created out of order",
                ))
            }
            Err(pools) => {
                let created = pools.len();
                self.pools = pools;
                Err(Status::with_message(
                    StatusCode::FOUND_BUG,
                    format!("only {} of 5 descriptor pools created", created),
                ))
            }
        }
    }
}

impl Drop for PoolStack<'_> {
    fn drop(&mut self) {
        while let Some((role, pool)) = self.pools.pop() {
            tracing::debug!(pool = %role, "rolling back descriptor pool");
            self.service.cleanup(pool, false);
        }
    }
}
