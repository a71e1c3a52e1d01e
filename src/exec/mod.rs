use graph::{ResourceRequest, TaskId};

/// Runs the task graph on the local host
mod local_runner;
pub use local_runner::LocalRunner;

/// Resubmits the current invocation to the batch queue
mod cluster;
pub use cluster::submit_to_cluster;

/// Run a single task's subprocess
mod run_cmd;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Task \"{task}\" requests {request}, but the whole pool is only {total}")]
    RequestExceedsPool {
        task: String,
        request: ResourceRequest,
        total: ResourceRequest,
    },
    #[error("{0} task(s) failed")]
    TasksFailed(usize),
    #[error("Run interrupted before completion")]
    Interrupted,
    #[error("Batch queue submission failed")]
    SubmissionFailed,
}

/// Terminal state of one task after a local run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// ran and exited zero
    Success,
    /// ran and exited non-zero (-1 when the exit code is unavailable)
    Failed(i32),
    /// never ran because a task it depends on failed
    UpstreamFailed,
    /// never finished because the run was cancelled
    Interrupted,
}

/// Per-task terminal states for one local run, indexed by task id.
#[derive(Debug)]
pub struct RunReport {
    outcomes: Vec<TaskOutcome>,
}

impl RunReport {
    fn new(outcomes: Vec<TaskOutcome>) -> Self {
        Self { outcomes }
    }

    pub fn outcome(&self, id: TaskId) -> TaskOutcome {
        self.outcomes[usize::from(id)]
    }

    /// Tasks that failed outright or were dragged down by an upstream failure.
    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TaskOutcome::Failed(_) | TaskOutcome::UpstreamFailed))
            .count()
    }

    pub fn was_interrupted(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(o, TaskOutcome::Interrupted))
    }
}
