//! Fabric device abstraction.
//!
//! A [`FabricDevice`] is the driver boundary: activation, memory
//! registration, completion polling and endpoint creation. Without a hardware
//! driver linked in, [`SimDevice`] provides an in-process implementation so
//! the interface lifecycle can run and be tested anywhere.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use byteorder::{ByteOrder, LittleEndian};
use fabric_mpool::MpoolObj;
use fabric_types::{Result, Status, StatusCode, TransportCode};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::ep::{Endpoint, RmaOp};
use crate::pools::{PoolService, SystemPools};

/// Memory registration handle.
pub type MemKey = u64;

/// Address family tag of fabric socket addresses.
pub const FABRIC_ADDR_FAMILY: u16 = 0x4642;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    Hardware,
    Simulated,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Hardware => write!(f, "HARDWARE"),
            DeviceType::Simulated => write!(f, "SIMULATED"),
        }
    }
}

/// Fabric socket address of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IfaceAddr {
    pub family: u16,
    pub nic_addr: u32,
    pub domain_id: u32,
}

impl IfaceAddr {
    /// Encoded size: family, two reserved bytes, nic address, domain id.
    pub const LEN: usize = 12;

    pub fn new(nic_addr: u32, domain_id: u32) -> Self {
        Self {
            family: FABRIC_ADDR_FAMILY,
            nic_addr,
            domain_id,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut buf = [0u8; Self::LEN];
        LittleEndian::write_u16(&mut buf[0..2], self.family);
        LittleEndian::write_u32(&mut buf[4..8], self.nic_addr);
        LittleEndian::write_u32(&mut buf[8..12], self.domain_id);
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::LEN {
            return Err(Status::with_message(
                StatusCode::INVALID_ARG,
                format!("address needs {} bytes, got {}", Self::LEN, buf.len()),
            ));
        }
        Ok(Self {
            family: LittleEndian::read_u16(&buf[0..2]),
            nic_addr: LittleEndian::read_u32(&buf[4..8]),
            domain_id: LittleEndian::read_u32(&buf[8..12]),
        })
    }

    pub fn is_fabric(&self) -> bool {
        self.family == FABRIC_ADDR_FAMILY
    }
}

impl fmt::Display for IfaceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}:{}", self.nic_addr, self.domain_id)
    }
}

/// Driver operations the interface depends on.
///
/// `activate` and `deactivate` are not safe to run concurrently with each
/// other; callers serialize them through the activation lock. Every
/// successful `activate` takes one binding on the device and the matching
/// `deactivate` releases it. The device stays active while any binding is
/// held.
pub trait FabricDevice: Send + Sync {
    fn name(&self) -> &str;

    fn dev_type(&self) -> DeviceType;

    fn iface_addr(&self) -> IfaceAddr;

    fn activate(&self) -> Result<()>;

    fn deactivate(&self) -> Result<()>;

    fn is_active(&self) -> bool;

    fn register_memory(&self, addr: usize, len: usize) -> Result<MemKey>;

    fn deregister_memory(&self, key: MemKey) -> Result<()>;

    /// Poll for completions. Returns the number of completed operations.
    fn progress(&self) -> usize;

    /// `TransportCode::IN_PROGRESS` while operations are outstanding.
    fn flush(&self) -> Result<()>;

    fn create_ep(&self, remote: IfaceAddr) -> Result<Box<dyn Endpoint>>;
}

/// A transport resource offered by a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TlResource {
    pub tl_name: String,
    pub dev_name: String,
    pub dev_type: DeviceType,
}

/// Shared discovery routine: one resource per device for the given transport.
pub fn query_resources(device: &dyn FabricDevice, tl_name: &str) -> Vec<TlResource> {
    tracing::debug!(tl = tl_name, device = device.name(), "querying transport resources");
    vec![TlResource {
        tl_name: tl_name.to_string(),
        dev_name: device.name().to_string(),
        dev_type: device.dev_type(),
    }]
}

/// Memory domain: a device plus the pool service used for its interfaces.
#[derive(Clone)]
pub struct Md {
    device: Arc<dyn FabricDevice>,
    pools: Arc<dyn PoolService>,
}

impl Md {
    pub fn new(device: Arc<dyn FabricDevice>) -> Self {
        Self::with_pool_service(device, Arc::new(SystemPools))
    }

    pub fn with_pool_service(device: Arc<dyn FabricDevice>, pools: Arc<dyn PoolService>) -> Self {
        Self { device, pools }
    }

    pub fn device(&self) -> &Arc<dyn FabricDevice> {
        &self.device
    }

    pub fn pool_service(&self) -> &Arc<dyn PoolService> {
        &self.pools
    }
}

impl fmt::Debug for Md {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Md").field("device", &self.device.name()).finish()
    }
}

/// Number of simulated activate/deactivate calls currently running, across
/// all simulated devices.
static SECTIONS_IN_FLIGHT: AtomicUsize = AtomicUsize::new(0);

#[derive(Default)]
struct SimState {
    bindings: usize,
    fail_activations: usize,
    activations: usize,
    deactivations: usize,
    registrations: HashMap<MemKey, (usize, usize)>,
}

struct SimShared {
    state: Mutex<SimState>,
    outstanding: Mutex<VecDeque<MpoolObj>>,
    posted: AtomicU64,
    next_key: AtomicU64,
    next_ep: AtomicU64,
}

/// In-process fabric device.
#[derive(Clone)]
pub struct SimDevice {
    name: String,
    addr: IfaceAddr,
    activation_delay: Duration,
    shared: Arc<SimShared>,
}

impl SimDevice {
    pub fn new(name: impl Into<String>, nic_addr: u32) -> Self {
        Self {
            name: name.into(),
            addr: IfaceAddr::new(nic_addr, 0),
            activation_delay: Duration::ZERO,
            shared: Arc::new(SimShared {
                state: Mutex::new(SimState::default()),
                outstanding: Mutex::new(VecDeque::new()),
                posted: AtomicU64::new(0),
                next_key: AtomicU64::new(1),
                next_ep: AtomicU64::new(1),
            }),
        }
    }

    /// Time spent inside activate/deactivate, to widen overlap windows.
    pub fn with_activation_delay(mut self, delay: Duration) -> Self {
        self.activation_delay = delay;
        self
    }

    /// Make the next `n` activations fail.
    pub fn fail_next_activations(&self, n: usize) {
        self.shared.state.lock().fail_activations = n;
    }

    pub fn activation_count(&self) -> usize {
        self.shared.state.lock().activations
    }

    pub fn deactivation_count(&self) -> usize {
        self.shared.state.lock().deactivations
    }

    /// Activations not yet matched by a deactivation.
    pub fn active_bindings(&self) -> usize {
        self.shared.state.lock().bindings
    }

    pub fn registered_regions(&self) -> usize {
        self.shared.state.lock().registrations.len()
    }

    /// Operations posted through endpoints of this device.
    pub fn posted_ops(&self) -> u64 {
        self.shared.posted.load(Ordering::Acquire)
    }

    pub fn outstanding_ops(&self) -> usize {
        self.shared.outstanding.lock().len()
    }

    fn critical_section<T>(&self, f: impl FnOnce(&mut SimState) -> Result<T>) -> Result<T> {
        if SECTIONS_IN_FLIGHT.fetch_add(1, Ordering::SeqCst) != 0 {
            SECTIONS_IN_FLIGHT.fetch_sub(1, Ordering::SeqCst);
            return Err(Status::with_message(
                StatusCode::FOUND_BUG,
                format!("{}: overlapping activation sections", self.name),
            ));
        }
        if !self.activation_delay.is_zero() {
            std::thread::sleep(self.activation_delay);
        }
        let result = {
            let mut state = self.shared.state.lock();
            f(&mut *state)
        };
        SECTIONS_IN_FLIGHT.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl fmt::Debug for SimDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimDevice")
            .field("name", &self.name)
            .field("addr", &self.addr)
            .finish()
    }
}

impl FabricDevice for SimDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn dev_type(&self) -> DeviceType {
        DeviceType::Simulated
    }

    fn iface_addr(&self) -> IfaceAddr {
        self.addr
    }

    fn activate(&self) -> Result<()> {
        self.critical_section(|state| {
            if state.fail_activations > 0 {
                state.fail_activations -= 1;
                return Err(Status::with_message(
                    TransportCode::ACTIVATION_FAILED,
                    "injected activation failure",
                ));
            }
            state.activations += 1;
            state.bindings += 1;
            Ok(state.bindings)
        })
        .map(|bindings| {
            tracing::debug!(device = %self.name, bindings, "simulated device activated");
        })
    }

    fn deactivate(&self) -> Result<()> {
        let bindings = self.critical_section(|state| {
            if state.bindings == 0 {
                return Err(Status::with_message(
                    TransportCode::NOT_ACTIVE,
                    "device is not active",
                ));
            }
            state.deactivations += 1;
            state.bindings -= 1;
            Ok(state.bindings)
        })?;
        if bindings == 0 {
            // Operations still queued when the last binding goes away never
            // complete; their descriptors go back to their pools.
            let abandoned: Vec<MpoolObj> = self.shared.outstanding.lock().drain(..).collect();
            if !abandoned.is_empty() {
                tracing::warn!(device = %self.name, ops = abandoned.len(), "dropping outstanding operations");
            }
        }
        tracing::debug!(device = %self.name, bindings, "simulated device deactivated");
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.shared.state.lock().bindings > 0
    }

    fn register_memory(&self, addr: usize, len: usize) -> Result<MemKey> {
        if len == 0 {
            return Err(Status::with_message(
                TransportCode::MEM_REG_FAILED,
                "cannot register an empty region",
            ));
        }
        let key = self.shared.next_key.fetch_add(1, Ordering::Relaxed);
        self.shared.state.lock().registrations.insert(key, (addr, len));
        tracing::trace!(device = %self.name, key, addr, len, "memory registered");
        Ok(key)
    }

    fn deregister_memory(&self, key: MemKey) -> Result<()> {
        match self.shared.state.lock().registrations.remove(&key) {
            Some(_) => Ok(()),
            None => Err(Status::with_message(
                StatusCode::INVALID_ARG,
                format!("unknown memory key {}", key),
            )),
        }
    }

    fn progress(&self) -> usize {
        let completed: Vec<MpoolObj> = self.shared.outstanding.lock().drain(..).collect();
        completed.len()
    }

    fn flush(&self) -> Result<()> {
        if self.shared.outstanding.lock().is_empty() {
            Ok(())
        } else {
            Err(Status::new(TransportCode::IN_PROGRESS))
        }
    }

    fn create_ep(&self, remote: IfaceAddr) -> Result<Box<dyn Endpoint>> {
        let id = self.shared.next_ep.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(SimEndpoint {
            id,
            remote,
            shared: Arc::clone(&self.shared),
        }))
    }
}

/// Endpoint of a [`SimDevice`]. Posted operations complete on the next
/// device progress call.
struct SimEndpoint {
    id: u64,
    remote: IfaceAddr,
    shared: Arc<SimShared>,
}

impl Endpoint for SimEndpoint {
    fn id(&self) -> u64 {
        self.id
    }

    fn remote_addr(&self) -> IfaceAddr {
        self.remote
    }

    fn execute(&mut self, op: &RmaOp, desc: MpoolObj) -> Result<()> {
        tracing::trace!(ep = self.id, kind = ?op.kind(), len = op.len(), "posting operation");
        self.shared.posted.fetch_add(1, Ordering::AcqRel);
        self.shared.outstanding.lock().push_back(desc);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::ActivationLock;

    #[test]
    fn test_iface_addr_encoding() {
        let addr = IfaceAddr::new(0xabcd, 7);
        let bytes = addr.to_bytes();
        assert_eq!(bytes.len(), IfaceAddr::LEN);
        assert_eq!(&bytes[2..4], &[0, 0]);
        assert_eq!(IfaceAddr::from_bytes(&bytes).unwrap(), addr);
        assert!(IfaceAddr::from_bytes(&bytes[..8]).is_err());
        assert!(addr.is_fabric());
        assert_eq!(addr.to_string(), "0xabcd:7");
    }

    #[test]
    fn test_query_resources() {
        let dev = SimDevice::new("sim0", 1);
        let resources = query_resources(&dev, "rdma");
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].tl_name, "rdma");
        assert_eq!(resources[0].dev_name, "sim0");
        assert_eq!(resources[0].dev_type, DeviceType::Simulated);
    }

    #[test]
    fn test_activation_cycle() {
        let dev = SimDevice::new("sim-act", 2);
        let _lock = ActivationLock::acquire();
        dev.fail_next_activations(1);
        let err = dev.activate().unwrap_err();
        assert_eq!(err.code(), TransportCode::ACTIVATION_FAILED);
        assert!(!dev.is_active());

        dev.activate().unwrap();
        assert!(dev.is_active());
        assert_eq!(dev.activation_count(), 1);

        dev.deactivate().unwrap();
        assert_eq!(dev.deactivation_count(), 1);
        assert_eq!(
            dev.deactivate().unwrap_err().code(),
            TransportCode::NOT_ACTIVE
        );
    }

    #[test]
    fn test_bindings_are_counted() {
        let dev = SimDevice::new("sim-bind", 5);
        let _lock = ActivationLock::acquire();
        dev.activate().unwrap();
        dev.activate().unwrap();
        assert_eq!(dev.active_bindings(), 2);

        dev.deactivate().unwrap();
        assert!(dev.is_active());
        dev.deactivate().unwrap();
        assert!(!dev.is_active());
        assert_eq!(dev.activation_count(), 2);
        assert_eq!(dev.deactivation_count(), 2);
    }

    #[test]
    fn test_last_deactivate_drops_outstanding() {
        use fabric_mpool::{DefaultOps, MemPool, MpoolParams};

        let dev = SimDevice::new("sim-drain", 6);
        let pool = MemPool::new(MpoolParams::new("sim-drain-desc", 64), Arc::new(DefaultOps)).unwrap();
        let mut ep = dev.create_ep(IfaceAddr::new(9, 0)).unwrap();
        let _lock = ActivationLock::acquire();
        dev.activate().unwrap();
        let op = RmaOp::AtomicAdd64 {
            remote_addr: 0,
            rkey: 0,
            add: 1,
        };
        ep.execute(&op, pool.get().unwrap()).unwrap();
        assert_eq!(pool.in_use(), 1);

        dev.deactivate().unwrap();
        assert_eq!(dev.outstanding_ops(), 0);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_memory_registration() {
        let dev = SimDevice::new("sim-mr", 3);
        let key = dev.register_memory(0x1000, 4096).unwrap();
        assert_eq!(dev.registered_regions(), 1);
        assert!(dev.register_memory(0x2000, 0).is_err());
        dev.deregister_memory(key).unwrap();
        assert!(dev.deregister_memory(key).is_err());
        assert_eq!(dev.registered_regions(), 0);
    }

    #[test]
    fn test_flush_tracks_outstanding() {
        use fabric_mpool::{DefaultOps, MemPool, MpoolParams};

        let dev = SimDevice::new("sim-ep", 4);
        let pool = MemPool::new(MpoolParams::new("sim-ep-desc", 64), Arc::new(DefaultOps)).unwrap();
        let mut ep = dev.create_ep(IfaceAddr::new(9, 0)).unwrap();
        assert_eq!(ep.remote_addr().nic_addr, 9);
        assert!(format!("{:?}", ep).starts_with("Endpoint"));

        let op = RmaOp::AtomicAdd64 {
            remote_addr: 0,
            rkey: 0,
            add: 1,
        };
        ep.execute(&op, pool.get().unwrap()).unwrap();
        assert_eq!(dev.flush().unwrap_err().code(), TransportCode::IN_PROGRESS);
        assert_eq!(pool.in_use(), 1);

        assert_eq!(dev.progress(), 1);
        dev.flush().unwrap();
        assert_eq!(pool.in_use(), 0);
        assert_eq!(dev.posted_ops(), 1);
    }
}
