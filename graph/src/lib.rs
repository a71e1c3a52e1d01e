mod task;
pub use task::{ResourceRequest, Task, TaskId};

mod graph;
pub use graph::TaskGraph;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Task \"{task}\" depends on unknown task \"{dep}\"")]
    UnknownDependency { task: String, dep: String },
    #[error("Duplicate task name \"{0}\"")]
    DuplicateTask(String),
    #[error("Dependency cycle involving task \"{0}\"")]
    DependencyCycle(String),
}
