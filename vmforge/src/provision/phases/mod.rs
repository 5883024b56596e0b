//! Provisioning phases.
//!
//! Each phase is a unit struct implementing `PipelinePhase<SharedCtx>`:
//! it reads its inputs under the context lock, releases the lock across
//! collaborator await points, then stores its outputs.

mod address;
mod bootstrap;
mod create;
mod disk;
mod service;

pub use address::AwaitAddressPhase;
pub use bootstrap::BootstrapPhase;
pub use create::{AutostartPhase, CreateVmPhase, StartVmPhase};
pub use disk::{DiskImportPhase, IsoFetchPhase};
pub use service::AwaitServicePhase;

use super::SharedCtx;

/// Log phase entry and return the VM name for later messages.
pub(super) async fn phase_start(ctx: &SharedCtx, phase: &str) -> String {
    let ctx = ctx.lock().await;
    tracing::debug!(vm = %ctx.spec.name, phase, "phase starting");
    ctx.spec.name.clone()
}
