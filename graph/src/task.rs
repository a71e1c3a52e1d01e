use std::path::PathBuf;

/// Index of a task within one run's graph.
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct TaskId(u32);

impl From<TaskId> for usize {
    fn from(id: TaskId) -> usize {
        id.0 as usize
    }
}

impl From<usize> for TaskId {
    fn from(val: usize) -> TaskId {
        Self(val as u32)
    }
}

/// Cores and memory one task needs while it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceRequest {
    pub cores: u32,
    pub mem_mb: u64,
}

impl ResourceRequest {
    pub fn new(cores: u32, mem_mb: u64) -> Self {
        Self { cores, mem_mb }
    }

    /// True if this request can be granted out of `avail`.
    pub fn fits_within(&self, avail: &ResourceRequest) -> bool {
        self.cores <= avail.cores && self.mem_mb <= avail.mem_mb
    }
}

impl std::fmt::Display for ResourceRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} cores, {} MB", self.cores, self.mem_mb)
    }
}

/// One unit of work: an external command plus everything the scheduler
/// needs to place it. Immutable once registered in the graph.
#[derive(Debug, Clone)]
pub struct Task {
    /// Stable key, `{stage}_{index}`; unique within a run.
    pub name: String,
    /// Shell command, run as `sh -c <command>`.
    pub command: String,
    /// Cores and memory reserved while the command runs.
    pub resources: ResourceRequest,
    /// Names of tasks that must succeed before this one may start.
    /// May include satisfied names with no runnable task behind them.
    pub deps: Vec<String>,
    /// Declared output artifacts; existence of all of them is what lets a
    /// later run skip this task.
    pub outputs: Vec<PathBuf>,
}
