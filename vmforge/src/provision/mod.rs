//! Single-VM provisioning orchestration.
//!
//! The provisioning flow is table-driven: `execution_plan` selects the
//! stages for one run from the spec and options, and the generic pipeline
//! executor drives them with fail-fast semantics and per-phase timings.
//!
//! ```text
//! full plan:
//!   1. [disk_import ── iso_fetch]   (parallel when an ISO is requested)
//!   2. vm_create
//!   3. autostart                    (only when requested)
//!   4. vm_start                     (skip_bootstrap terminates here)
//!   5. await_address                (bounded: 100 attempts, 1s apart)
//!   6. await_service                (unbounded; each probe is bounded)
//!   7. bootstrap
//! ```
//!
//! There is no automatic rollback: a VM created before a later phase fails
//! stays on the host, and cleanup is the explicit `vm delete` operation.

mod context;
mod outcome;
mod phases;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::backend::VirtualizationBackend;
use crate::bootstrap::ConfigBootstrapper;
use crate::errors::ForgeResult;
use crate::logging::JobLogger;
use crate::pipeline::{BoxedPhase, ExecutionPlan, PipelineExecutor, Stage};
use crate::readiness::{ReadinessPoller, ReadinessProbe};
use crate::spec::VmSpec;
use crate::transfer::FileTransferClient;

pub use context::{ProvisionCtx, SharedCtx};
pub use outcome::{ProvisionOutcome, ProvisionStatus};

use phases::{
    AutostartPhase, AwaitAddressPhase, AwaitServicePhase, BootstrapPhase, CreateVmPhase,
    DiskImportPhase, IsoFetchPhase, StartVmPhase,
};

pub const DEFAULT_ADDRESS_ATTEMPTS: u32 = 100;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_SERVICE_PORT: u16 = 22;
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(10);

/// Bootstrap handoff parameters, carried through the pipeline untouched.
#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    pub run_list: Vec<String>,
    pub ssh_user: String,
    pub ssh_password: Option<String>,
    pub identity_file: Option<PathBuf>,
    /// Node name registered with the config server; VM name when absent.
    pub node_name: Option<String>,
    pub distro: String,
    pub template_file: Option<PathBuf>,
    pub bootstrap_version: Option<String>,
    pub environment: Option<String>,
    pub skip_host_key_verify: bool,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            run_list: Vec::new(),
            ssh_user: "root".to_string(),
            ssh_password: None,
            identity_file: None,
            node_name: None,
            distro: "ubuntu10.04-gems".to_string(),
            template_file: None,
            bootstrap_version: None,
            environment: None,
            skip_host_key_verify: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Stop after starting the VM; no address wait, no bootstrap.
    pub skip_bootstrap: bool,
    /// Fixed interval between address polls.
    pub poll_interval: Duration,
    /// Address acquisition budget; exceeding it is a timeout failure.
    pub address_attempts: u32,
    /// Service port probed for readiness.
    pub service_port: u16,
    /// Grace period between the first accepted probe and bootstrap.
    pub settle_delay: Duration,
    pub bootstrap: BootstrapOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            skip_bootstrap: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            address_attempts: DEFAULT_ADDRESS_ATTEMPTS,
            service_port: DEFAULT_SERVICE_PORT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            bootstrap: BootstrapOptions::default(),
        }
    }
}

/// Select the stages for one provisioning run.
fn execution_plan(spec: &VmSpec, opts: &PipelineOptions) -> ExecutionPlan<SharedCtx> {
    let mut stages: Vec<Stage<BoxedPhase<SharedCtx>>> = Vec::new();

    let mut prep: Vec<BoxedPhase<SharedCtx>> = Vec::new();
    if !spec.new_disk {
        prep.push(Box::new(DiskImportPhase));
    }
    if spec.iso_url.is_some() {
        prep.push(Box::new(IsoFetchPhase));
    }
    if !prep.is_empty() {
        stages.push(Stage::parallel(prep));
    }

    stages.push(Stage::sequential(vec![Box::new(CreateVmPhase)]));
    if spec.autostart {
        stages.push(Stage::sequential(vec![Box::new(AutostartPhase)]));
    }
    stages.push(Stage::sequential(vec![Box::new(StartVmPhase)]));

    if !opts.skip_bootstrap {
        stages.push(Stage::sequential(vec![Box::new(AwaitAddressPhase)]));
        stages.push(Stage::sequential(vec![Box::new(AwaitServicePhase)]));
        stages.push(Stage::sequential(vec![Box::new(BootstrapPhase)]));
    }

    ExecutionPlan::new(stages)
}

/// Runs the provisioning pipeline for one VM.
///
/// Collaborators are injected once at construction; the provisioner itself
/// is stateless across runs and can be shared between jobs.
pub struct Provisioner {
    backend: Arc<dyn VirtualizationBackend>,
    transfer: Arc<dyn FileTransferClient>,
    bootstrapper: Arc<dyn ConfigBootstrapper>,
    probe: Arc<dyn ReadinessProbe>,
    logger: Arc<JobLogger>,
}

impl Provisioner {
    pub fn new(
        backend: Arc<dyn VirtualizationBackend>,
        transfer: Arc<dyn FileTransferClient>,
        bootstrapper: Arc<dyn ConfigBootstrapper>,
        logger: Arc<JobLogger>,
    ) -> Self {
        Self {
            backend,
            transfer,
            bootstrapper,
            probe: Arc::new(ReadinessPoller::default()),
            logger,
        }
    }

    /// Replace the TCP readiness poller (used by tests).
    pub fn with_probe(mut self, probe: Arc<dyn ReadinessProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Run the full pipeline for `spec`.
    ///
    /// Validation failures return `Err` before any backend call; phase
    /// failures are folded into the outcome's `Failed` status together
    /// with the timings of every phase that completed.
    pub async fn provision(
        &self,
        spec: VmSpec,
        opts: PipelineOptions,
    ) -> ForgeResult<ProvisionOutcome> {
        spec.validate()?;

        let vm_name = spec.name.clone();
        let started_at = Utc::now();
        self.logger.info(&format!("Creating VM {vm_name}..."));

        let plan = execution_plan(&spec, &opts);
        let ctx: SharedCtx = Arc::new(Mutex::new(ProvisionCtx::new(
            spec,
            opts.clone(),
            Arc::clone(&self.backend),
            Arc::clone(&self.transfer),
            Arc::clone(&self.bootstrapper),
            Arc::clone(&self.probe),
            Arc::clone(&self.logger),
        )));

        let result = PipelineExecutor::execute(plan, Arc::clone(&ctx)).await;

        let ctx = ctx.lock().await;
        let outcome = match result {
            Ok(timings) => {
                let status = if opts.skip_bootstrap {
                    ProvisionStatus::SkippedBootstrap
                } else {
                    ProvisionStatus::Succeeded
                };
                self.logger.info(&format!("VM {vm_name} provisioned"));
                ProvisionOutcome {
                    vm_name,
                    address: ctx.address,
                    status,
                    timings,
                    transfer_output: ctx.transfer_output.clone(),
                    bootstrap_output: ctx.bootstrap_output.clone(),
                    started_at,
                    finished_at: Utc::now(),
                }
            }
            Err(failure) => {
                self.logger.error(&format!(
                    "VM {vm_name}: phase {} failed: {}",
                    failure.phase, failure.error
                ));
                ProvisionOutcome {
                    vm_name,
                    address: ctx.address,
                    status: ProvisionStatus::Failed {
                        phase: failure.phase,
                        reason: failure.error.to_string(),
                    },
                    timings: failure.completed,
                    transfer_output: ctx.transfer_output.clone(),
                    bootstrap_output: ctx.bootstrap_output.clone(),
                    started_at,
                    finished_at: Utc::now(),
                }
            }
        };

        Ok(outcome)
    }

    /// Like [`provision`](Self::provision), but with an optional wall-clock
    /// bound on the whole run (`--ssh-timeout`). There is no rollback on
    /// expiry; whatever the pipeline created stays on the host.
    pub async fn provision_within(
        &self,
        spec: VmSpec,
        opts: PipelineOptions,
        deadline: Option<Duration>,
    ) -> ForgeResult<ProvisionOutcome> {
        let Some(limit) = deadline else {
            return self.provision(spec, opts).await;
        };
        let vm_name = spec.name.clone();
        match tokio::time::timeout(limit, self.provision(spec, opts)).await {
            Ok(result) => result,
            Err(_) => {
                self.logger
                    .error(&format!("VM {vm_name}: gave up after {limit:?}"));
                Err(crate::errors::ForgeError::Deadline {
                    operation: format!("provisioning of VM {vm_name}"),
                    limit,
                })
            }
        }
    }
}
