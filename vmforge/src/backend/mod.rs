//! Virtualization backend interface.
//!
//! The backend is the source of truth for VM existence and state. The
//! pipeline and the management operations only ever talk to this trait;
//! the production implementation drives libvirt through `virsh`
//! (see [`virsh`]), and tests substitute fakes.

mod virsh;

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::errors::ForgeResult;
use crate::spec::VmSpec;

pub use virsh::VirshBackend;

/// Reference to a VM on the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmHandle {
    pub name: String,
}

impl VmHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VmState {
    Running,
    Stopped,
}

impl std::fmt::Display for VmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VmState::Running => write!(f, "running"),
            VmState::Stopped => write!(f, "stopped"),
        }
    }
}

/// One row of `list_all` output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmRecord {
    pub name: String,
    pub state: VmState,
    pub max_memory_mb: u64,
    pub cpus: u32,
    pub os_type: String,
    pub arch: String,
}

/// Hypervisor compute API consumed by the pipeline and operations.
#[async_trait::async_trait]
pub trait VirtualizationBackend: Send + Sync {
    /// Define a new VM from the normalized spec.
    ///
    /// Fails with `ForgeError::Creation` when the backend rejects the spec
    /// (duplicate name, invalid pool, ...).
    async fn create(&self, spec: &VmSpec) -> ForgeResult<VmHandle>;

    async fn start(&self, handle: &VmHandle) -> ForgeResult<()>;

    /// Graceful shutdown request; returns once the request is accepted,
    /// not once the VM is down.
    async fn shutdown(&self, handle: &VmHandle) -> ForgeResult<()>;

    /// Force-destroy the VM, optionally removing its volumes.
    async fn destroy(&self, handle: &VmHandle, destroy_volumes: bool) -> ForgeResult<()>;

    async fn list_all(&self) -> ForgeResult<Vec<VmRecord>>;

    /// The VM's assigned network address, if one is known yet.
    ///
    /// May fail with `ForgeError::TransientBackend` while the guest is
    /// still acquiring a lease; callers retry against their own budget.
    async fn address(&self, handle: &VmHandle) -> ForgeResult<Option<IpAddr>>;

    async fn state(&self, handle: &VmHandle) -> ForgeResult<VmState>;

    /// Register the VM to start on host boot. Idempotent.
    async fn register_autostart(&self, name: &str) -> ForgeResult<()>;
}
