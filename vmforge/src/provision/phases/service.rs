//! Phase: wait for the service port to accept connections.

use async_trait::async_trait;

use super::{SharedCtx, phase_start};
use crate::errors::{ForgeError, ForgeResult};
use crate::pipeline::PipelinePhase;

/// Probe the acquired address until the service port accepts.
///
/// Unbounded at this level: each probe is individually bounded
/// and backs off when refused, and the CLI can wrap the whole pipeline in
/// an operator-facing timeout. After the first accepted probe a settle
/// delay gives sshd time to finish starting before the bootstrap connects.
pub struct AwaitServicePhase;

#[async_trait]
impl PipelinePhase<SharedCtx> for AwaitServicePhase {
    async fn run(self: Box<Self>, ctx: SharedCtx) -> ForgeResult<()> {
        let vm_name = phase_start(&ctx, self.name()).await;

        let (probe, logger, address, port, settle_delay) = {
            let ctx = ctx.lock().await;
            let address = ctx
                .address
                .ok_or_else(|| ForgeError::Internal("address phase must run first".into()))?;
            (
                ctx.probe.clone(),
                ctx.logger.clone(),
                address.to_string(),
                ctx.opts.service_port,
                ctx.opts.settle_delay,
            )
        };

        logger.info(&format!("Waiting for sshd on {vm_name} ({address})..."));
        let mut attempts = 0u64;
        while !probe.wait_for_port(&address, port).await {
            attempts += 1;
            tracing::trace!(vm = %vm_name, attempts, "service not ready yet");
        }

        tokio::time::sleep(settle_delay).await;
        logger.info(&format!("sshd on {vm_name} is accepting connections"));
        Ok(())
    }

    fn name(&self) -> &str {
        "await_service"
    }
}
