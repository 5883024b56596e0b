//! Batch scheduling: sequential file order, or a bounded worker pool.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::logging::JobLogger;

use super::{BatchJob, BatchSpec, JobResult, JobRunner};

pub const DEFAULT_MAX_PARALLEL: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    /// Jobs run one at a time, in file order.
    Sequential,
    /// All jobs are submitted at once; a semaphore caps how many run.
    Concurrent,
}

pub struct BatchOrchestrator {
    logger: Arc<JobLogger>,
    max_parallel: usize,
}

impl BatchOrchestrator {
    pub fn new(logger: Arc<JobLogger>, max_parallel: usize) -> Self {
        Self {
            logger,
            max_parallel: max_parallel.max(1),
        }
    }

    /// Run every entry of `spec` and return one result per entry.
    ///
    /// Entries that fail validation are reported and never scheduled; a
    /// scheduled job's failure never aborts the rest of the batch. The
    /// call returns only after every job has finished.
    pub async fn run_batch(
        &self,
        spec: BatchSpec,
        mode: BatchMode,
        runner: Arc<dyn JobRunner>,
    ) -> Vec<JobResult> {
        debug!(jobs = spec.len(), ?mode, "starting batch");
        let results = match mode {
            BatchMode::Sequential => self.run_sequential(spec, runner).await,
            BatchMode::Concurrent => self.run_concurrent(spec, runner).await,
        };
        let failed = results.iter().filter(|r| !r.is_success()).count();
        self.logger.info(&format!(
            "Batch finished: {} succeeded, {} failed",
            results.len() - failed,
            failed
        ));
        results
    }

    async fn run_sequential(
        &self,
        spec: BatchSpec,
        runner: Arc<dyn JobRunner>,
    ) -> Vec<JobResult> {
        let mut results = Vec::with_capacity(spec.len());
        for entry in &spec.entries {
            let result = match BatchJob::new(entry) {
                Ok(job) => job.run(runner.as_ref()).await,
                Err(err) => JobResult::rejected(&entry.name, &err),
            };
            self.report(&result);
            results.push(result);
        }
        results
    }

    async fn run_concurrent(
        &self,
        spec: BatchSpec,
        runner: Arc<dyn JobRunner>,
    ) -> Vec<JobResult> {
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut handles: Vec<(String, Option<JoinHandle<JobResult>>)> =
            Vec::with_capacity(spec.len());
        let mut rejected = Vec::new();

        for entry in &spec.entries {
            match BatchJob::new(entry) {
                Ok(job) => {
                    let runner = Arc::clone(&runner);
                    let semaphore = Arc::clone(&semaphore);
                    let handle = tokio::spawn(async move {
                        // Closing the semaphore is not part of the protocol,
                        // so acquisition cannot fail.
                        let _permit = semaphore.acquire_owned().await;
                        job.run(runner.as_ref()).await
                    });
                    handles.push((entry.name.clone(), Some(handle)));
                }
                Err(err) => {
                    let result = JobResult::rejected(&entry.name, &err);
                    self.report(&result);
                    rejected.push(result);
                    handles.push((entry.name.clone(), None));
                }
            }
        }

        let mut rejected = rejected.into_iter();
        let mut results = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let result = match handle {
                Some(handle) => match handle.await {
                    Ok(result) => {
                        self.report(&result);
                        result
                    }
                    Err(err) => {
                        warn!(job = %name, error = %err, "job task aborted");
                        JobResult {
                            name,
                            code: 1,
                            stdout: String::new(),
                            stderr: format!("job task aborted: {err}"),
                        }
                    }
                },
                None => rejected.next().unwrap_or_else(|| JobResult {
                    name,
                    code: 1,
                    stdout: String::new(),
                    stderr: "rejected before scheduling".to_string(),
                }),
            };
            results.push(result);
        }
        results
    }

    fn report(&self, result: &JobResult) {
        if result.is_success() {
            self.logger
                .info(&format!("Job {} finished", result.name));
            for line in result.stdout.lines() {
                self.logger.info(&format!("  {line}"));
            }
        } else {
            self.logger
                .error(&format!("Job {} failed: {}", result.name, result.stderr));
        }
    }
}
