//! Phases: disk image import and ISO fetch.

use async_trait::async_trait;

use super::{SharedCtx, phase_start};
use crate::errors::{ForgeError, ForgeResult};
use crate::pipeline::PipelinePhase;

/// Transfer the source disk image to its destination path on the host.
pub struct DiskImportPhase;

#[async_trait]
impl PipelinePhase<SharedCtx> for DiskImportPhase {
    async fn run(self: Box<Self>, ctx: SharedCtx) -> ForgeResult<()> {
        let vm_name = phase_start(&ctx, self.name()).await;

        let (transfer, logger, source, dest) = {
            let ctx = ctx.lock().await;
            let source = ctx.spec.disk_source.clone().ok_or_else(|| {
                ForgeError::Internal("disk import scheduled without a disk source".into())
            })?;
            (
                ctx.transfer.clone(),
                ctx.logger.clone(),
                source,
                ctx.spec.dest_disk_path(),
            )
        };

        logger.info(&format!("Importing VM disk for {vm_name}..."));
        transfer.upload(&source, &dest).await?;

        let mut ctx = ctx.lock().await;
        ctx.transfer_output
            .push(format!("uploaded {} -> {}", source.display(), dest.display()));
        Ok(())
    }

    fn name(&self) -> &str {
        "disk_import"
    }
}

/// Fetch the requested ISO by URL onto the host.
pub struct IsoFetchPhase;

#[async_trait]
impl PipelinePhase<SharedCtx> for IsoFetchPhase {
    async fn run(self: Box<Self>, ctx: SharedCtx) -> ForgeResult<()> {
        let vm_name = phase_start(&ctx, self.name()).await;

        let (transfer, logger, url, dest) = {
            let ctx = ctx.lock().await;
            let url = ctx.spec.iso_url.clone().ok_or_else(|| {
                ForgeError::Internal("iso fetch scheduled without an iso url".into())
            })?;
            let dest = ctx.spec.dest_iso_path().ok_or_else(|| {
                ForgeError::Internal("iso fetch scheduled without a destination".into())
            })?;
            (ctx.transfer.clone(), ctx.logger.clone(), url, dest)
        };

        logger.info(&format!("Fetching ISO for {vm_name}..."));
        transfer.remote_fetch(&url, &dest).await?;

        let mut ctx = ctx.lock().await;
        ctx.transfer_output
            .push(format!("fetched {} -> {}", url, dest.display()));
        Ok(())
    }

    fn name(&self) -> &str {
        "iso_fetch"
    }
}
