//! RDMA interface lifecycle.
//!
//! Construction runs under the process-wide [`ActivationLock`]: the five
//! descriptor pools are created in order, the device is activated, and the
//! interface registers itself with the worker's progress engine. A failure at
//! any step destroys exactly the pools created so far, newest first, before
//! the lock is released.
//!
//! Teardown happens when the interface is dropped (or passed to
//! [`RdmaIface::destroy`]): the progress callback is removed and, for an
//! activated interface, the pools are destroyed in reverse creation order and
//! the device is deactivated.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fabric_config::Config;
use fabric_types::{Result, Status, TransportCode};

use crate::attr::{IfaceAttr, IfaceLimits};
use crate::config::RdmaIfaceConfig;
use crate::desc::{BaseDesc, FetchDesc};
use crate::device::{FabricDevice, IfaceAddr, Md};
use crate::ep::{check_op, Endpoint, RmaOp};
use crate::error::IfaceError;
use crate::lock::ActivationLock;
use crate::ops::{IfaceOps, OpBinding, OpKind, RDMA_IFACE_OPS};
use crate::pools::{DescPools, PoolRole, PoolStack};
use crate::worker::{Progress, ProgressId, Worker};

/// State shared by every transport interface.
#[derive(Debug)]
pub struct BaseIface {
    ops: &'static IfaceOps,
    md: Md,
    worker: Worker,
    dev_name: String,
    rx_headroom: usize,
    config: RdmaIfaceConfig,
}

impl BaseIface {
    pub fn new(
        ops: &'static IfaceOps,
        md: Md,
        worker: Worker,
        dev_name: &str,
        rx_headroom: usize,
        config: RdmaIfaceConfig,
    ) -> std::result::Result<Self, IfaceError> {
        config.validate()?;
        if md.device().name() != dev_name {
            return Err(IfaceError::NoDevice {
                requested: dev_name.to_string(),
                available: md.device().name().to_string(),
            });
        }
        Ok(Self {
            ops,
            md,
            worker,
            dev_name: dev_name.to_string(),
            rx_headroom,
            config,
        })
    }

    pub fn ops(&self) -> &'static IfaceOps {
        self.ops
    }

    pub fn md(&self) -> &Md {
        &self.md
    }

    pub fn worker(&self) -> &Worker {
        &self.worker
    }

    pub fn dev_name(&self) -> &str {
        &self.dev_name
    }

    pub fn rx_headroom(&self) -> usize {
        self.rx_headroom
    }

    pub fn config(&self) -> &RdmaIfaceConfig {
        &self.config
    }
}

/// Per-interface progress context. The worker holds one reference, the
/// interface the other.
struct IfaceProgress {
    dev_name: String,
    device: Arc<dyn FabricDevice>,
    completed: AtomicU64,
}

impl IfaceProgress {
    fn new(dev_name: &str, device: Arc<dyn FabricDevice>) -> Arc<Self> {
        Arc::new(Self {
            dev_name: dev_name.to_string(),
            device,
            completed: AtomicU64::new(0),
        })
    }
}

impl Progress for IfaceProgress {
    fn progress(&self) -> usize {
        let n = self.device.progress();
        if n > 0 {
            self.completed.fetch_add(n as u64, Ordering::Relaxed);
            tracing::trace!(device = %self.dev_name, completed = n, "progress");
        }
        n
    }
}

enum IfaceState {
    Inactive,
    Active(DescPools),
}

/// An RDMA transport interface bound to one device.
pub struct RdmaIface {
    base: BaseIface,
    limits: IfaceLimits,
    state: IfaceState,
    progress: Arc<IfaceProgress>,
    progress_id: Option<ProgressId>,
    next_completion: AtomicU64,
}

impl RdmaIface {
    pub fn create(
        md: &Md,
        worker: &Worker,
        dev_name: &str,
        rx_headroom: usize,
        config: RdmaIfaceConfig,
    ) -> std::result::Result<RdmaIface, IfaceError> {
        let _lock = ActivationLock::acquire();

        let base = BaseIface::new(
            &RDMA_IFACE_OPS,
            md.clone(),
            worker.clone(),
            dev_name,
            rx_headroom,
            config,
        )
        .map_err(|e| {
            tracing::error!(device = dev_name, stage = e.stage(), "failed to create interface: {}", e);
            e
        })?;
        let limits = IfaceLimits::default();
        let device = base.md().device().clone();

        let mut stack = PoolStack::new(base.md().pool_service().as_ref());
        for role in PoolRole::ALL {
            let params = role.params(&limits, &base.config().fma);
            let ops = role.ops(&device, &base.config().iface.alloc);
            if let Err(source) = stack.push(role, params, ops) {
                tracing::error!(
                    device = dev_name,
                    pool = %role,
                    created = stack.len(),
                    "failed to create descriptor pool: {}",
                    source
                );
                return Err(IfaceError::PoolInit { role, source });
            }
        }

        if let Err(status) = device.activate() {
            tracing::error!(device = dev_name, "device activation failed: {}", status);
            return Err(IfaceError::Activation(status));
        }

        let pools = match stack.finish() {
            Ok(pools) => pools,
            Err(status) => {
                if let Err(e) = device.deactivate() {
                    tracing::warn!(device = dev_name, "failed to deactivate device: {}", e);
                }
                return Err(status.into());
            }
        };

        let progress = IfaceProgress::new(dev_name, Arc::clone(&device));
        let progress_id = worker.progress_register(progress.clone());

        tracing::info!(
            device = dev_name,
            addr = %device.iface_addr(),
            "rdma interface created"
        );
        Ok(RdmaIface {
            base,
            limits,
            state: IfaceState::Active(pools),
            progress,
            progress_id: Some(progress_id),
            next_completion: AtomicU64::new(1),
        })
    }

    /// Tear the interface down.
    pub fn destroy(self) {
        tracing::debug!(device = self.base.dev_name(), "destroying rdma interface");
        drop(self);
    }

    pub fn base(&self) -> &BaseIface {
        &self.base
    }

    pub fn ops(&self) -> &'static IfaceOps {
        self.base.ops()
    }

    pub fn limits(&self) -> IfaceLimits {
        self.limits
    }

    pub fn is_activated(&self) -> bool {
        matches!(self.state, IfaceState::Active(_))
    }

    pub fn pools(&self) -> Option<&DescPools> {
        match &self.state {
            IfaceState::Active(pools) => Some(pools),
            IfaceState::Inactive => None,
        }
    }

    /// Completions reaped by this interface's progress callback.
    pub fn completed_ops(&self) -> u64 {
        self.progress.completed.load(Ordering::Relaxed)
    }

    pub fn query(&self) -> IfaceAttr {
        IfaceAttr::for_limits(&self.limits)
    }

    /// `TransportCode::IN_PROGRESS` while operations are outstanding.
    pub fn flush(&self) -> Result<()> {
        self.base.md().device().flush()
    }

    pub fn get_address(&self) -> IfaceAddr {
        self.base.md().device().iface_addr()
    }

    pub fn is_reachable(&self, addr: &IfaceAddr) -> bool {
        addr.is_fabric()
    }

    /// Reachability check on an encoded address.
    pub fn is_reachable_bytes(&self, addr: &[u8]) -> bool {
        IfaceAddr::from_bytes(addr)
            .map(|addr| self.is_reachable(&addr))
            .unwrap_or(false)
    }

    pub fn ep_create_connected(&self, remote: &IfaceAddr) -> Result<Box<dyn Endpoint>> {
        if !self.is_reachable(remote) {
            return Err(Status::with_message(
                TransportCode::UNREACHABLE,
                format!("address family {:#x} is not reachable", remote.family),
            ));
        }
        self.base.md().device().create_ep(*remote)
    }

    pub fn ep_destroy(&self, ep: Box<dyn Endpoint>) {
        tracing::trace!(ep = ep.id(), "endpoint destroyed");
    }

    /// Post a data-movement operation on `ep`, with a descriptor from the
    /// pool that serves its class.
    pub fn ep_execute(&self, ep: &mut dyn Endpoint, op: &RmaOp) -> Result<()> {
        let kind = op.kind();
        if self.ops().binding(kind) != Some(OpBinding::Endpoint) {
            return Err(Status::with_message(
                TransportCode::UNSUPPORTED,
                format!("{} is not bound to the endpoint", kind),
            ));
        }
        check_op(&self.query(), op)?;

        let pools = self
            .pools()
            .ok_or_else(|| Status::new(TransportCode::NOT_ACTIVE))?;
        let role = PoolRole::for_op(kind).ok_or_else(|| Status::new(TransportCode::UNSUPPORTED))?;
        let mut desc = pools.pool(role).get()?;

        let base = BaseDesc {
            mem_key: BaseDesc::read(&desc).mem_key,
            ep_id: ep.id(),
            op: kind as u32,
            flags: 0,
            len: op.len() as u64,
        };
        if role.has_fetch_header() {
            FetchDesc {
                base,
                user_buffer: op.local_addr().unwrap_or_default() as u64,
                padding: 0,
                expected_len: op.len() as u32,
                completion_id: self.next_completion.fetch_add(1, Ordering::Relaxed),
            }
            .write(&mut desc);
        } else {
            base.write(&mut desc);
        }
        ep.execute(op, desc)
    }

    // TODO: queue requests on a per-endpoint pending list once endpoints report
    // resource exhaustion; until then add and purge are accepted no-ops.
    pub fn pending_add(&self, ep: &dyn Endpoint) -> Result<()> {
        debug_assert_eq!(
            self.ops().binding(OpKind::PendingAdd),
            Some(OpBinding::Unimplemented)
        );
        tracing::trace!(ep = ep.id(), "pending add ignored");
        Ok(())
    }

    pub fn pending_purge(&self, ep: &dyn Endpoint) -> Result<()> {
        debug_assert_eq!(
            self.ops().binding(OpKind::PendingPurge),
            Some(OpBinding::Unimplemented)
        );
        tracing::trace!(ep = ep.id(), "pending purge ignored");
        Ok(())
    }

    fn teardown(&mut self) {
        if let Some(id) = self.progress_id.take() {
            self.base.worker().progress_unregister(id);
        }
        let IfaceState::Active(pools) = std::mem::replace(&mut self.state, IfaceState::Inactive)
        else {
            return;
        };

        let _lock = ActivationLock::acquire();
        pools.release(self.base.md().pool_service().as_ref(), true);
        if let Err(e) = self.base.md().device().deactivate() {
            tracing::warn!(device = self.base.dev_name(), "failed to deactivate device: {}", e);
        }
        tracing::info!(device = self.base.dev_name(), "rdma interface destroyed");
    }

    #[cfg(test)]
    fn inactive_for_test(md: &Md, worker: &Worker) -> RdmaIface {
        let dev_name = md.device().name().to_string();
        let base = BaseIface::new(
            &RDMA_IFACE_OPS,
            md.clone(),
            worker.clone(),
            &dev_name,
            0,
            RdmaIfaceConfig::default(),
        )
        .unwrap();
        let progress = IfaceProgress::new(&dev_name, md.device().clone());
        let progress_id = worker.progress_register(progress.clone());
        RdmaIface {
            base,
            limits: IfaceLimits::default(),
            state: IfaceState::Inactive,
            progress,
            progress_id: Some(progress_id),
            next_completion: AtomicU64::new(1),
        }
    }
}

impl Drop for RdmaIface {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for RdmaIface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RdmaIface")
            .field("device", &self.base.dev_name())
            .field("limits", &self.limits)
            .field("activated", &self.is_activated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::IfaceFlags;
    use crate::device::SimDevice;
    use crate::pools::testing::{PoolEvent, TrackingPools};
    use fabric_types::StatusCode;
    use std::time::Duration;

    struct Fixture {
        sim: Arc<SimDevice>,
        pools: Arc<TrackingPools>,
        md: Md,
        worker: Worker,
    }

    fn fixture(name: &str, pools: TrackingPools) -> Fixture {
        let sim = Arc::new(SimDevice::new(name, 0x10));
        let pools = Arc::new(pools);
        let md = Md::with_pool_service(sim.clone(), pools.clone());
        Fixture {
            sim,
            pools,
            md,
            worker: Worker::new(),
        }
    }

    fn pool_names_reversed(n: usize) -> Vec<String> {
        PoolRole::ALL[..n]
            .iter()
            .rev()
            .map(|r| r.name().to_string())
            .collect()
    }

    #[test]
    fn test_create_and_query() {
        let f = fixture("sim-e2e", TrackingPools::new());
        let iface = RdmaIface::create(&f.md, &f.worker, "sim-e2e", 0, RdmaIfaceConfig::default())
            .unwrap();
        assert!(iface.is_activated());
        assert_eq!(f.worker.num_progress_callbacks(), 1);
        assert_eq!(f.pools.live(), 5);
        assert_eq!(f.sim.activation_count(), 1);

        let attr = iface.query();
        assert_eq!(attr.put.max_short, 2048);
        assert_eq!(attr.put.max_bcopy, 2048);
        assert_eq!(attr.put.max_zcopy, 1 << 30);
        assert_eq!(attr.get.max_bcopy, 2040);
        assert_eq!(attr.get.max_zcopy, 1 << 30);
        assert_eq!(attr.iface_addr_len, IfaceAddr::LEN);
        assert_eq!(attr.ep_addr_len, 0);
        assert_eq!(attr.flags, IfaceFlags::rdma());
        assert_eq!(iface.query(), attr);

        iface.destroy();
        assert_eq!(f.worker.num_progress_callbacks(), 0);
        assert_eq!(f.pools.cleanups(), pool_names_reversed(5));
        assert_eq!(f.pools.live(), 0);
        assert_eq!(f.sim.deactivation_count(), 1);
    }

    #[test]
    fn test_config_limits_do_not_change_advertised_sizes() {
        let f = fixture("sim-cfg", TrackingPools::new());
        let mut config = RdmaIfaceConfig::default();
        config.iface.max_short = 64;
        config.iface.max_bcopy = 512;
        let iface = RdmaIface::create(&f.md, &f.worker, "sim-cfg", 0, config).unwrap();
        assert_eq!(iface.query().put.max_short, 2048);
        assert_eq!(iface.base().config().iface.max_bcopy, 512);
    }

    #[test]
    fn test_rollback_at_each_pool() {
        for k in 1..=5 {
            let name = format!("sim-pool-fail-{}", k);
            let f = fixture(&name, TrackingPools::failing_at(k));
            let err = RdmaIface::create(&f.md, &f.worker, &name, 0, RdmaIfaceConfig::default())
                .unwrap_err();
            match &err {
                IfaceError::PoolInit { role, .. } => assert_eq!(*role, PoolRole::ALL[k - 1]),
                other => panic!("unexpected error {:?}", other),
            }
            assert_eq!(err.status().code(), StatusCode::NOT_ENOUGH_MEMORY);
            assert_eq!(f.pools.cleanups(), pool_names_reversed(k - 1));
            assert_eq!(f.pools.live(), 0);
            assert_eq!(f.sim.activation_count(), 0);
            assert_eq!(f.worker.num_progress_callbacks(), 0);
        }
    }

    #[test]
    fn test_rollback_on_activation_failure() {
        let f = fixture("sim-act-fail", TrackingPools::new());
        f.sim.fail_next_activations(1);
        let err = RdmaIface::create(&f.md, &f.worker, "sim-act-fail", 0, RdmaIfaceConfig::default())
            .unwrap_err();
        assert!(matches!(err, IfaceError::Activation(_)));
        assert_eq!(err.stage(), "activation");
        assert_eq!(err.status().code(), TransportCode::ACTIVATION_FAILED);

        let events = f.pools.events();
        assert_eq!(events.len(), 10);
        assert!(matches!(events[4], PoolEvent::Init(_)));
        assert_eq!(f.pools.cleanups(), pool_names_reversed(5));
        assert_eq!(f.worker.num_progress_callbacks(), 0);
        assert_eq!(f.sim.deactivation_count(), 0);
    }

    #[test]
    fn test_lock_released_after_failure() {
        let f = fixture("sim-lock", TrackingPools::failing_at(3));
        assert!(RdmaIface::create(&f.md, &f.worker, "sim-lock", 0, RdmaIfaceConfig::default()).is_err());

        let (md, worker) = (f.md.clone(), f.worker.clone());
        let handle = std::thread::spawn(move || {
            RdmaIface::create(&md, &worker, "sim-lock", 0, RdmaIfaceConfig::default()).is_ok()
        });
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_wrong_device_name() {
        let f = fixture("sim-name", TrackingPools::new());
        let err = RdmaIface::create(&f.md, &f.worker, "other", 0, RdmaIfaceConfig::default())
            .unwrap_err();
        assert!(matches!(err, IfaceError::NoDevice { .. }));
        assert!(f.pools.events().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let f = fixture("sim-badcfg", TrackingPools::new());
        let mut config = RdmaIfaceConfig::default();
        config.fma.max_bufs = 0;
        let err = RdmaIface::create(&f.md, &f.worker, "sim-badcfg", 0, config).unwrap_err();
        assert!(matches!(err, IfaceError::Config(_)));
        assert!(f.pools.events().is_empty());
    }

    #[test]
    fn test_teardown_of_inactive_iface() {
        let f = fixture("sim-inactive", TrackingPools::new());
        let iface = RdmaIface::inactive_for_test(&f.md, &f.worker);
        assert!(!iface.is_activated());
        assert_eq!(f.worker.num_progress_callbacks(), 1);
        drop(iface);
        assert_eq!(f.worker.num_progress_callbacks(), 0);
        assert!(f.pools.events().is_empty());
        assert_eq!(f.sim.deactivation_count(), 0);
    }

    #[test]
    fn test_execute_flush_and_progress() {
        let sim = Arc::new(SimDevice::new("sim-exec", 0x20));
        let md = Md::new(sim.clone());
        let worker = Worker::new();
        let mut config = RdmaIfaceConfig::default();
        config.iface.alloc = vec![fabric_mpool::AllocMethod::Heap];
        let iface = RdmaIface::create(&md, &worker, "sim-exec", 0, config).unwrap();

        let remote = IfaceAddr::new(0x30, 0);
        let mut ep = iface.ep_create_connected(&remote).unwrap();
        iface
            .ep_execute(
                ep.as_mut(),
                &RmaOp::PutBcopy {
                    remote_addr: 0x1000,
                    rkey: 1,
                    len: 100,
                },
            )
            .unwrap();
        iface
            .ep_execute(
                ep.as_mut(),
                &RmaOp::GetBcopy {
                    remote_addr: 0x2000,
                    rkey: 1,
                    len: 2040,
                },
            )
            .unwrap();

        let pools = iface.pools().unwrap();
        assert_eq!(pools.buffer.in_use(), 1);
        assert_eq!(pools.get_buffer.in_use(), 1);
        assert_eq!(sim.registered_regions(), 1);
        assert_eq!(
            iface.flush().unwrap_err().code(),
            TransportCode::IN_PROGRESS
        );

        assert_eq!(iface.completed_ops(), 0);
        assert_eq!(worker.progress(), 2);
        assert_eq!(iface.completed_ops(), 2);
        iface.flush().unwrap();
        assert_eq!(pools.buffer.in_use(), 0);
        assert_eq!(sim.posted_ops(), 2);

        iface.ep_destroy(ep);
        iface.destroy();
        assert_eq!(sim.registered_regions(), 0);
    }

    #[test]
    fn test_two_ifaces_share_one_device() {
        let sim = Arc::new(SimDevice::new("sim-shared", 0x22));
        let md = Md::new(sim.clone());
        let worker = Worker::new();
        let a = RdmaIface::create(&md, &worker, "sim-shared", 0, RdmaIfaceConfig::default()).unwrap();
        let b = RdmaIface::create(&md, &worker, "sim-shared", 0, RdmaIfaceConfig::default()).unwrap();
        assert_eq!(sim.activation_count(), 2);
        assert_eq!(sim.active_bindings(), 2);
        assert_eq!(worker.num_progress_callbacks(), 2);

        a.destroy();
        assert!(b.is_activated());
        assert!(sim.is_active());
        assert_eq!(sim.active_bindings(), 1);
        assert_eq!(worker.num_progress_callbacks(), 1);

        b.destroy();
        assert!(!sim.is_active());
        assert_eq!(sim.deactivation_count(), 2);
        assert_eq!(worker.num_progress_callbacks(), 0);
    }

    #[test]
    fn test_destroy_with_in_flight_op_releases_device() {
        let sim = Arc::new(SimDevice::new("sim-inflight", 0x23));
        let md = Md::new(sim.clone());
        let worker = Worker::new();
        let mut config = RdmaIfaceConfig::default();
        config.iface.alloc = vec![fabric_mpool::AllocMethod::Heap];
        let iface = RdmaIface::create(&md, &worker, "sim-inflight", 0, config).unwrap();

        let mut ep = iface.ep_create_connected(&IfaceAddr::new(0x40, 0)).unwrap();
        iface
            .ep_execute(
                ep.as_mut(),
                &RmaOp::AtomicFadd64 {
                    remote_addr: 0x3000,
                    rkey: 1,
                    add: 1,
                },
            )
            .unwrap();
        assert_eq!(sim.outstanding_ops(), 1);
        assert_eq!(sim.registered_regions(), 1);

        iface.ep_destroy(ep);
        iface.destroy();
        assert_eq!(sim.outstanding_ops(), 0);
        assert_eq!(sim.registered_regions(), 0);

        let weak = Arc::downgrade(&sim);
        drop(md);
        drop(sim);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_execute_rejects_unsupported_and_oversized() {
        let sim = Arc::new(SimDevice::new("sim-reject", 0x21));
        let md = Md::new(sim.clone());
        let worker = Worker::new();
        let iface = RdmaIface::create(&md, &worker, "sim-reject", 0, RdmaIfaceConfig::default())
            .unwrap();
        let mut ep = iface.ep_create_connected(&IfaceAddr::new(1, 0)).unwrap();

        let am = RmaOp::AmShort {
            id: 1,
            header: 0,
            payload: vec![0; 4],
        };
        assert_eq!(
            iface.ep_execute(ep.as_mut(), &am).unwrap_err().code(),
            TransportCode::UNSUPPORTED
        );
        let big = RmaOp::PutShort {
            remote_addr: 0,
            rkey: 0,
            payload: vec![0; 4096],
        };
        assert_eq!(
            iface.ep_execute(ep.as_mut(), &big).unwrap_err().code(),
            TransportCode::EXCEEDS_LIMIT
        );
        assert_eq!(sim.posted_ops(), 0);
    }

    #[test]
    fn test_reachability() {
        let f = fixture("sim-reach", TrackingPools::new());
        let iface = RdmaIface::create(&f.md, &f.worker, "sim-reach", 0, RdmaIfaceConfig::default())
            .unwrap();
        let own = iface.get_address();
        assert_eq!(own, f.sim.iface_addr());
        assert!(iface.is_reachable(&own));
        assert!(iface.is_reachable_bytes(&own.to_bytes()));
        assert!(!iface.is_reachable_bytes(&[0u8; 4]));

        let foreign = IfaceAddr {
            family: 2,
            nic_addr: 1,
            domain_id: 0,
        };
        assert!(!iface.is_reachable(&foreign));
        assert_eq!(
            iface.ep_create_connected(&foreign).unwrap_err().code(),
            TransportCode::UNREACHABLE
        );
    }

    #[test]
    fn test_pending_entries_are_noops() {
        let f = fixture("sim-pending", TrackingPools::new());
        let iface = RdmaIface::create(&f.md, &f.worker, "sim-pending", 0, RdmaIfaceConfig::default())
            .unwrap();
        let ep = iface.ep_create_connected(&IfaceAddr::new(2, 0)).unwrap();
        assert!(iface.pending_add(ep.as_ref()).is_ok());
        assert!(iface.pending_purge(ep.as_ref()).is_ok());
        assert!(!iface.ops().is_implemented(OpKind::PendingAdd));
        assert!(!iface.ops().is_implemented(OpKind::PendingPurge));
    }

    #[test]
    fn test_concurrent_creates_never_overlap_activation() {
        let handles: Vec<_> = (0..6)
            .map(|i| {
                std::thread::spawn(move || {
                    let name = format!("sim-mt-{}", i);
                    let sim = Arc::new(
                        SimDevice::new(name.as_str(), i).with_activation_delay(Duration::from_millis(2)),
                    );
                    let md = Md::with_pool_service(sim.clone(), Arc::new(TrackingPools::new()));
                    let worker = Worker::new();
                    let iface = RdmaIface::create(&md, &worker, &name, 0, RdmaIfaceConfig::default())?;
                    iface.destroy();
                    Ok::<_, IfaceError>(sim.deactivation_count())
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap().unwrap(), 1);
        }
    }
}
