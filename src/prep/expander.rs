use std::path::PathBuf;

use anyhow::{Context, Result};

use graph::{Task, TaskGraph, TaskId};

use crate::fs::Fs;
use crate::ui::Ui;

use super::stages::{Expansion, Rule, StageDef};
use super::{oracle, DepPolicy, Error, Frontier};

/// Record of what expansion decided, in expansion order: task names whose
/// outputs already exist, and the ids of tasks registered to run.
#[derive(Debug, Default)]
pub struct Actions {
    pub completed: Vec<String>,
    pub to_run: Vec<TaskId>,
}

impl Actions {
    pub fn has_tasks_to_run(&self) -> bool {
        !self.to_run.is_empty()
    }
}

/// Expands the stage list into graph tasks.
///
/// Stages are walked in order; each stage maps the previous stage's frontier
/// into tasks, asks the oracle which of them are already satisfied, and hands
/// the next frontier forward. Output dirs are created eagerly before a
/// stage's tasks are built so the oracle's existence checks are well-defined.
pub struct Expander<'a> {
    /// Filesystem interface
    fs: &'a Fs,
    /// User interface
    ui: &'a Ui,
    /// if true, expansion must not touch the filesystem
    dry_run: bool,
}

impl<'a> Expander<'a> {
    pub fn new(fs: &'a Fs, ui: &'a Ui, dry_run: bool) -> Self {
        Self { fs, ui, dry_run }
    }

    /// Expand all stages over `inputs`, registering runnable tasks in `graph`.
    pub fn expand(
        &self,
        stages: &[StageDef],
        inputs: Vec<PathBuf>,
        graph: &mut TaskGraph,
    ) -> Result<Actions> {
        let mut actions = Actions::default();
        let mut frontier = Frontier::seed(inputs);

        for stage in stages {
            self.ui.verbose_progress_debug("Expanding stage", stage.name);
            frontier = self
                .expand_stage(stage, frontier, graph, &mut actions)
                .with_context(|| format!("while expanding stage \"{}\"", stage.name))?;
            self.ui.done();
        }

        log::debug!(
            "expansion finished: {} tasks to run, {} already satisfied",
            actions.to_run.len(),
            actions.completed.len(),
        );
        Ok(actions)
    }

    fn expand_stage(
        &self,
        stage: &StageDef,
        frontier: Frontier,
        graph: &mut TaskGraph,
        actions: &mut Actions,
    ) -> Result<Frontier> {
        if frontier.is_empty() {
            return Err(Error::EmptyFrontier(stage.name).into());
        }

        self.create_stage_dirs(stage)?;

        let expansions = match &stage.rule {
            Rule::Compare => self.expand_pairs(&stage.rule, &frontier)?,
            rule => self.expand_items(rule, &frontier)?,
        };

        // Matching pairs expansion i with the task that produced artifact i,
        // so it needs one producer name per artifact:
        if matches!(stage.deps, DepPolicy::Matching) {
            debug_assert_eq!(frontier.tasks.len(), frontier.artifacts.len());
        }

        let mut next = Frontier::default();
        for (i, exp) in expansions.into_iter().enumerate() {
            let name = format!("{}_{}", stage.name, i);
            let deps = match stage.deps {
                DepPolicy::None => Vec::new(),
                DepPolicy::Matching => vec![frontier.tasks[i].clone()],
                DepPolicy::AllUpstream => frontier.tasks.clone(),
            };

            if oracle::should_skip(self.fs, &exp.outputs) {
                graph.mark_satisfied(name.clone());
                actions.completed.push(name.clone());
            } else {
                let id = graph.add_task(Task {
                    name: name.clone(),
                    command: exp.command,
                    resources: exp.resources,
                    deps,
                    outputs: exp.outputs,
                })?;
                actions.to_run.push(id);
            }

            next.tasks.push(name);
            next.artifacts.push(exp.artifact);
        }
        Ok(next)
    }

    fn expand_items(&self, rule: &Rule, frontier: &Frontier) -> Result<Vec<Expansion>> {
        let mut expansions = Vec::with_capacity(frontier.len());
        for item in &frontier.artifacts {
            expansions.push(rule.expand_item(self.fs, item)?);
        }
        Ok(expansions)
    }

    /// Full ordered cross product over (index, subset lineage), self-pairs
    /// included; pair i,j gets index `i * n + j` so names stay stable.
    fn expand_pairs(&self, rule: &Rule, frontier: &Frontier) -> Result<Vec<Expansion>> {
        let n = frontier.len();
        let mut expansions = Vec::with_capacity(n * n);
        for index in &frontier.artifacts {
            for inner in &frontier.artifacts {
                expansions.push(rule.expand_pair(self.fs, index, &inner.subset)?);
            }
        }
        Ok(expansions)
    }

    fn create_stage_dirs(&self, stage: &StageDef) -> Result<()> {
        for dir in stage.output_dirs() {
            let path = self.fs.stage_dir(dir);
            if self.dry_run {
                log::debug!("dry run; not creating stage dir {path:?}");
            } else if !self.fs.exists(&path) {
                self.ui.verbose_msg(&format!("Creating stage dir {path:?}"));
                self.fs
                    .create_dir(&path)
                    .with_context(|| format!("while creating stage dir for \"{}\"", stage.name))?;
            }
        }
        Ok(())
    }
}
