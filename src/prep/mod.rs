use std::path::PathBuf;

/// The fixed pipeline stages, described as data.
mod stages;
pub use stages::{stage_defs, DepPolicy};

/// Walks the stage list over the artifact frontier, building the task graph.
mod expander;
pub use expander::{Actions, Expander};

/// Decides whether a task's declared outputs already satisfy it.
mod oracle;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Stage \"{0}\" has no input artifacts to expand")]
    EmptyFrontier(&'static str),
}

/// A file produced by one stage and consumed by the next stage's expansion.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// where the file will be on disk once its task has run
    pub path: PathBuf,
    /// the subset file this artifact descends from; for raw inputs and for
    /// subset outputs this is the path itself
    pub subset: PathBuf,
}

/// Artifacts produced by the most recently expanded stage, plus the names of
/// the tasks that produce them (runnable or already satisfied), in the same
/// order. Passed stage to stage by value so no stage can see a stale view.
#[derive(Debug, Default)]
pub struct Frontier {
    pub artifacts: Vec<Artifact>,
    pub tasks: Vec<String>,
}

impl Frontier {
    /// The initial frontier: the resolved input files, which no task produces.
    pub fn seed(inputs: Vec<PathBuf>) -> Self {
        let artifacts = inputs
            .into_iter()
            .map(|path| Artifact {
                subset: path.clone(),
                path,
            })
            .collect();
        Self {
            artifacts,
            tasks: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}
