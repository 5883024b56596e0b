//! Phases: VM creation, autostart registration, VM start.

use async_trait::async_trait;

use super::{SharedCtx, phase_start};
use crate::errors::{ForgeError, ForgeResult};
use crate::pipeline::PipelinePhase;

/// Define the VM on the backend from the normalized spec.
pub struct CreateVmPhase;

#[async_trait]
impl PipelinePhase<SharedCtx> for CreateVmPhase {
    async fn run(self: Box<Self>, ctx: SharedCtx) -> ForgeResult<()> {
        let vm_name = phase_start(&ctx, self.name()).await;

        let (backend, logger, spec) = {
            let ctx = ctx.lock().await;
            (ctx.backend.clone(), ctx.logger.clone(), ctx.spec.clone())
        };

        logger.info(&format!("Creating VM {vm_name} on the host..."));
        let handle = backend.create(&spec).await?;

        let mut ctx = ctx.lock().await;
        ctx.handle = Some(handle);
        Ok(())
    }

    fn name(&self) -> &str {
        "vm_create"
    }
}

/// Register the VM to start on host boot. Idempotent on the backend side.
pub struct AutostartPhase;

#[async_trait]
impl PipelinePhase<SharedCtx> for AutostartPhase {
    async fn run(self: Box<Self>, ctx: SharedCtx) -> ForgeResult<()> {
        let vm_name = phase_start(&ctx, self.name()).await;

        let (backend, logger) = {
            let ctx = ctx.lock().await;
            (ctx.backend.clone(), ctx.logger.clone())
        };

        logger.info(&format!("Registering {vm_name} for autostart"));
        backend.register_autostart(&vm_name).await
    }

    fn name(&self) -> &str {
        "autostart"
    }
}

/// Start the freshly created VM.
pub struct StartVmPhase;

#[async_trait]
impl PipelinePhase<SharedCtx> for StartVmPhase {
    async fn run(self: Box<Self>, ctx: SharedCtx) -> ForgeResult<()> {
        let vm_name = phase_start(&ctx, self.name()).await;

        let (backend, logger, handle) = {
            let ctx = ctx.lock().await;
            let handle = ctx
                .handle
                .clone()
                .ok_or_else(|| ForgeError::Internal("create phase must run first".into()))?;
            (ctx.backend.clone(), ctx.logger.clone(), handle)
        };

        logger.info(&format!("Starting VM {vm_name}..."));
        backend.start(&handle).await
    }

    fn name(&self) -> &str {
        "vm_start"
    }
}
