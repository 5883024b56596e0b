//! Stage definition for table-driven pipeline execution.

/// Execution mode for a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Phases run concurrently; the stage completes when all have.
    Parallel,
    /// Phases run one after another.
    Sequential,
}

/// Ordered group of phases sharing an execution mode.
pub struct Stage<T> {
    pub phases: Vec<T>,
    pub execution: ExecutionMode,
}

impl<T> Stage<T> {
    pub fn parallel(phases: Vec<T>) -> Self {
        Self {
            phases,
            execution: ExecutionMode::Parallel,
        }
    }

    pub fn sequential(phases: Vec<T>) -> Self {
        Self {
            phases,
            execution: ExecutionMode::Sequential,
        }
    }
}
