//! Shared context threaded through the provisioning phases.

use std::net::IpAddr;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::PipelineOptions;
use crate::backend::{VirtualizationBackend, VmHandle};
use crate::bootstrap::ConfigBootstrapper;
use crate::logging::JobLogger;
use crate::readiness::ReadinessProbe;
use crate::spec::VmSpec;
use crate::transfer::FileTransferClient;

pub type SharedCtx = Arc<Mutex<ProvisionCtx>>;

/// State accumulated while one VM moves through the pipeline.
///
/// Phases take a lock, read their inputs, release it across await points on
/// collaborators, then take it again to store outputs.
pub struct ProvisionCtx {
    pub spec: VmSpec,
    pub opts: PipelineOptions,

    pub backend: Arc<dyn VirtualizationBackend>,
    pub transfer: Arc<dyn FileTransferClient>,
    pub bootstrapper: Arc<dyn ConfigBootstrapper>,
    pub probe: Arc<dyn ReadinessProbe>,
    pub logger: Arc<JobLogger>,

    /// Set by the create phase.
    pub handle: Option<VmHandle>,
    /// Set by the address-acquisition phase.
    pub address: Option<IpAddr>,
    /// Notes emitted by the transfer phases.
    pub transfer_output: Vec<String>,
    /// Complete captured bootstrap output, kept on failure too.
    pub bootstrap_output: Option<String>,
}

impl ProvisionCtx {
    pub fn new(
        spec: VmSpec,
        opts: PipelineOptions,
        backend: Arc<dyn VirtualizationBackend>,
        transfer: Arc<dyn FileTransferClient>,
        bootstrapper: Arc<dyn ConfigBootstrapper>,
        probe: Arc<dyn ReadinessProbe>,
        logger: Arc<JobLogger>,
    ) -> Self {
        Self {
            spec,
            opts,
            backend,
            transfer,
            bootstrapper,
            probe,
            logger,
            handle: None,
            address: None,
            transfer_output: Vec::new(),
            bootstrap_output: None,
        }
    }
}
