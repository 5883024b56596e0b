//! Phase trait for pipeline execution.

use async_trait::async_trait;

use crate::errors::ForgeResult;

/// One atomic unit of pipeline work.
///
/// Phases run with a shared context, cloned per phase (use interior
/// mutability for writes).
#[async_trait]
pub trait PipelinePhase<Ctx>: Send + Sync {
    async fn run(self: Box<Self>, ctx: Ctx) -> ForgeResult<()>;

    /// Stable phase name, used for timing lookups and logging.
    fn name(&self) -> &str;
}

pub type BoxedPhase<Ctx> = Box<dyn PipelinePhase<Ctx>>;
