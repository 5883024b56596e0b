//! Per-phase timing collected by the executor.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PhaseTiming {
    pub name: String,
    pub duration: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct PhaseTimings {
    pub total: Duration,
    pub phases: Vec<PhaseTiming>,
}

impl PhaseTimings {
    pub fn duration_of(&self, name: &str) -> Option<Duration> {
        self.phases
            .iter()
            .find(|phase| phase.name == name)
            .map(|phase| phase.duration)
    }

    pub fn phase_names(&self) -> Vec<&str> {
        self.phases.iter().map(|p| p.name.as_str()).collect()
    }
}
