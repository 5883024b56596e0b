//! Pipeline execution loop.

use std::time::Instant;

use futures::future::join_all;

use super::phase::BoxedPhase;
use super::stage::{ExecutionMode, Stage};
use super::timings::{PhaseTiming, PhaseTimings};
use crate::errors::ForgeError;

/// Ordered stages making up one pipeline run.
pub struct ExecutionPlan<Ctx> {
    stages: Vec<Stage<BoxedPhase<Ctx>>>,
}

impl<Ctx> ExecutionPlan<Ctx> {
    pub fn new(stages: Vec<Stage<BoxedPhase<Ctx>>>) -> Self {
        Self { stages }
    }
}

/// Error from a single phase, with the timings of everything that
/// completed before it.
#[derive(Debug)]
pub struct PhaseFailure {
    pub phase: String,
    pub error: ForgeError,
    pub completed: PhaseTimings,
}

pub struct PipelineExecutor;

impl PipelineExecutor {
    /// Run all stages in order. Fail-fast: the first phase error aborts
    /// every subsequent stage; phases already running in the same parallel
    /// stage are awaited before returning.
    pub async fn execute<Ctx>(
        plan: ExecutionPlan<Ctx>,
        ctx: Ctx,
    ) -> Result<PhaseTimings, PhaseFailure>
    where
        Ctx: Clone,
    {
        let total_start = Instant::now();
        let mut timings = PhaseTimings::default();

        for stage in plan.stages {
            let results = match stage.execution {
                ExecutionMode::Parallel => {
                    let futures = stage.phases.into_iter().map(|phase| {
                        let ctx = ctx.clone();
                        async move {
                            let name = phase.name().to_string();
                            let start = Instant::now();
                            let result = phase.run(ctx).await;
                            (name, start.elapsed(), result)
                        }
                    });
                    join_all(futures).await
                }
                ExecutionMode::Sequential => {
                    let mut results = Vec::with_capacity(stage.phases.len());
                    for phase in stage.phases {
                        let name = phase.name().to_string();
                        let start = Instant::now();
                        let result = phase.run(ctx.clone()).await;
                        let failed = result.is_err();
                        results.push((name, start.elapsed(), result));
                        if failed {
                            break;
                        }
                    }
                    results
                }
            };

            let mut failure: Option<(String, ForgeError)> = None;
            for (name, duration, result) in results {
                match result {
                    Ok(()) => {
                        tracing::debug!(phase = %name, ?duration, "phase completed");
                        timings.phases.push(PhaseTiming { name, duration });
                    }
                    Err(error) => {
                        tracing::warn!(phase = %name, %error, "phase failed");
                        if failure.is_none() {
                            failure = Some((name, error));
                        }
                    }
                }
            }

            if let Some((phase, error)) = failure {
                timings.total = total_start.elapsed();
                return Err(PhaseFailure {
                    phase,
                    error,
                    completed: timings,
                });
            }
        }

        timings.total = total_start.elapsed();
        Ok(timings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ForgeResult;
    use crate::pipeline::PipelinePhase;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Ctx = Arc<AtomicUsize>;

    struct Bump(&'static str);

    #[async_trait]
    impl PipelinePhase<Ctx> for Bump {
        async fn run(self: Box<Self>, ctx: Ctx) -> ForgeResult<()> {
            ctx.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &str {
            self.0
        }
    }

    struct Fail;

    #[async_trait]
    impl PipelinePhase<Ctx> for Fail {
        async fn run(self: Box<Self>, _ctx: Ctx) -> ForgeResult<()> {
            Err(ForgeError::Internal("boom".into()))
        }

        fn name(&self) -> &str {
            "fail"
        }
    }

    #[tokio::test]
    async fn stages_run_in_order_and_record_timings() {
        let plan: ExecutionPlan<Ctx> = ExecutionPlan::new(vec![
            Stage::sequential(vec![Box::new(Bump("a")) as _]),
            Stage::parallel(vec![Box::new(Bump("b")) as _, Box::new(Bump("c")) as _]),
        ]);
        let ctx: Ctx = Arc::new(AtomicUsize::new(0));

        let timings = PipelineExecutor::execute(plan, Arc::clone(&ctx))
            .await
            .unwrap();
        assert_eq!(ctx.load(Ordering::SeqCst), 3);
        assert_eq!(timings.phases.len(), 3);
        assert!(timings.duration_of("a").is_some());
    }

    #[tokio::test]
    async fn first_failure_aborts_later_stages() {
        let plan: ExecutionPlan<Ctx> = ExecutionPlan::new(vec![
            Stage::sequential(vec![Box::new(Bump("a")) as _]),
            Stage::sequential(vec![Box::new(Fail) as _]),
            Stage::sequential(vec![Box::new(Bump("never")) as _]),
        ]);
        let ctx: Ctx = Arc::new(AtomicUsize::new(0));

        let failure = PipelineExecutor::execute(plan, Arc::clone(&ctx))
            .await
            .unwrap_err();
        assert_eq!(failure.phase, "fail");
        assert_eq!(ctx.load(Ordering::SeqCst), 1);
        assert_eq!(failure.completed.phase_names(), vec!["a"]);
    }
}
