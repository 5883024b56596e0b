//! Phase: network address acquisition with a bounded retry budget.

use async_trait::async_trait;

use super::{SharedCtx, phase_start};
use crate::errors::{ForgeError, ForgeResult};
use crate::pipeline::PipelinePhase;

/// Poll the backend for the VM's assigned address.
///
/// Fixed poll interval, hard attempt budget. Transient backend errors are
/// logged and spend the same budget; exhausting it is a timeout failure
/// carrying the attempt count.
pub struct AwaitAddressPhase;

#[async_trait]
impl PipelinePhase<SharedCtx> for AwaitAddressPhase {
    async fn run(self: Box<Self>, ctx: SharedCtx) -> ForgeResult<()> {
        let vm_name = phase_start(&ctx, self.name()).await;

        let (backend, logger, handle, interval, attempts) = {
            let ctx = ctx.lock().await;
            let handle = ctx
                .handle
                .clone()
                .ok_or_else(|| ForgeError::Internal("create phase must run first".into()))?;
            (
                ctx.backend.clone(),
                ctx.logger.clone(),
                handle,
                ctx.opts.poll_interval,
                ctx.opts.address_attempts,
            )
        };

        logger.info(&format!("Waiting for {vm_name} to acquire an address..."));

        for attempt in 1..=attempts {
            match backend.address(&handle).await {
                Ok(Some(address)) => {
                    logger.info(&format!("VM IP address: {address}"));
                    let mut ctx = ctx.lock().await;
                    ctx.address = Some(address);
                    return Ok(());
                }
                Ok(None) => {
                    tracing::debug!(vm = %vm_name, attempt, "no address assigned yet");
                }
                Err(e) if e.is_transient() => {
                    tracing::debug!(vm = %vm_name, attempt, error = %e, "address query not ready");
                }
                Err(e) => return Err(e),
            }
            tokio::time::sleep(interval).await;
        }

        Err(ForgeError::Timeout {
            operation: format!("address of VM {vm_name}"),
            attempts,
        })
    }

    fn name(&self) -> &str {
        "await_address"
    }
}
