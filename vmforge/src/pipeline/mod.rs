//! Generic table-driven phase pipeline.
//!
//! The provisioning flow is expressed as an ordered list of stages, each
//! holding one or more phases with an execution mode. The executor runs
//! stages in order, fails fast on the first phase error, and records a
//! duration per phase.
//!
//! ```text
//! ExecutionPlan → Stages → Phases
//!
//! - Stage: groups phases with an execution mode (parallel/sequential)
//! - Phase: atomic unit of work against a shared context
//! ```

mod executor;
mod phase;
mod stage;
mod timings;

pub use executor::{ExecutionPlan, PhaseFailure, PipelineExecutor};
pub use phase::{BoxedPhase, PipelinePhase};
pub use stage::{ExecutionMode, Stage};
pub use timings::{PhaseTiming, PhaseTimings};
