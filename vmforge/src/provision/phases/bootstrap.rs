//! Phase: configuration-management bootstrap handoff.

use async_trait::async_trait;

use super::{SharedCtx, phase_start};
use crate::bootstrap::BootstrapRequest;
use crate::errors::{ForgeError, ForgeResult};
use crate::pipeline::PipelinePhase;

/// Hand the reachable VM off to the config bootstrapper.
///
/// A failure here is reported but nothing is rolled back: the VM stays
/// running on the host.
pub struct BootstrapPhase;

#[async_trait]
impl PipelinePhase<SharedCtx> for BootstrapPhase {
    async fn run(self: Box<Self>, ctx: SharedCtx) -> ForgeResult<()> {
        let vm_name = phase_start(&ctx, self.name()).await;

        let (bootstrapper, logger, request) = {
            let ctx = ctx.lock().await;
            let address = ctx
                .address
                .ok_or_else(|| ForgeError::Internal("address phase must run first".into()))?;
            let opts = &ctx.opts.bootstrap;
            let request = BootstrapRequest {
                address: address.to_string(),
                ssh_user: opts.ssh_user.clone(),
                ssh_password: opts.ssh_password.clone(),
                identity_file: opts.identity_file.clone(),
                run_list: opts.run_list.clone(),
                node_name: opts.node_name.clone().unwrap_or_else(|| vm_name.clone()),
                distro: opts.distro.clone(),
                template_file: opts.template_file.clone(),
                bootstrap_version: opts.bootstrap_version.clone(),
                // Running the whole bootstrap through sudo is only needed
                // for non-root SSH users.
                use_sudo: opts.ssh_user != "root",
                skip_host_key_verify: opts.skip_host_key_verify,
                environment: opts.environment.clone(),
            };
            (ctx.bootstrapper.clone(), ctx.logger.clone(), request)
        };

        logger.info(&format!(
            "Bootstrapping node {} ({})...",
            request.node_name, request.address
        ));
        let report = bootstrapper.bootstrap(&request).await?;

        let succeeded = report.succeeded();
        let status = report.status;
        {
            let mut ctx = ctx.lock().await;
            ctx.bootstrap_output = Some(report.output);
        }

        if succeeded {
            Ok(())
        } else {
            Err(ForgeError::Bootstrap(format!(
                "bootstrap of {vm_name} exited with status {status}"
            )))
        }
    }

    fn name(&self) -> &str {
        "bootstrap"
    }
}
