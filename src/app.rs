use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;

use graph::{ResourceRequest, TaskGraph};

use crate::exec::{self, LocalRunner, RunReport, TaskOutcome};
use crate::fs::Fs;
use crate::prep::{stage_defs, Actions, Expander};
use crate::resolve;
use crate::settings::{Backend, Settings};
use crate::ui::Ui;

/// This struct actually runs the command-line app.
pub struct App {
    /// Interpreted command line settings
    settings: Settings,
    /// Filesystem interface
    fs: Fs,
    /// User interface
    ui: Ui,
}

impl App {
    /// Create a new `App`.
    pub fn new(settings: Settings) -> Self {
        let fs = Fs::new(&settings.output, settings.dry_run);
        let ui = Ui::new(&settings);
        Self { settings, fs, ui }
    }

    /// Run the app: plan the pipeline, then execute it on the chosen backend.
    pub fn run(mut self) -> Result<()> {
        // cluster mode only relaunches this invocation on the queue; inputs
        // get resolved on the compute node when the job runs:
        if let Backend::Cluster { account } = &self.settings.backend {
            return exec::submit_to_cluster(&self.settings, account);
        }

        // resolve inputs before creating anything, so a bad query doesn't
        // leave an empty output tree behind:
        self.ui.verbose_progress("Resolving input files");
        let inputs = resolve::resolve_inputs(&self.fs, &self.settings.query)
            .context("while resolving input files")?;
        self.ui.done();

        if self.settings.verbose > 0 {
            eprintln!("Using output directory {:?}", self.settings.output);
        }
        self.fs.ensure_output_dir_exists(self.settings.verbose > 0)?;

        let (graph, actions) = self.expand_stages(inputs)?;

        if !actions.has_tasks_to_run() {
            eprintln!("{}", "No tasks to run; exiting.".green());
            return Ok(());
        }

        self.print_actions(&graph, &actions);

        if self.settings.dry_run {
            eprintln!("{}", "Dry run. Exiting without running tasks.".green());
            return Ok(());
        }

        self.run_graph(graph)
    }
}

// PLANNING ////////////////
impl App {
    fn expand_stages(&mut self, inputs: Vec<PathBuf>) -> Result<(TaskGraph, Actions)> {
        self.ui.start_timer();

        let stages = stage_defs(&self.settings);
        let n = inputs.len();
        // one subset and one count per input, plus the full compare square:
        let mut graph = TaskGraph::with_capacity(n * (2 + n));

        let expander = Expander::new(&self.fs, &self.ui, self.settings.dry_run);
        let actions = expander.expand(&stages, inputs, &mut graph)?;

        self.ui.print_elapsed("Stage expansion");
        if self.settings.verbose > 0 {
            eprintln!(
                "Planned {} tasks ({} already satisfied).",
                graph.len(),
                graph.satisfied_count(),
            );
        }

        Ok((graph, actions))
    }

    /// print list of planned tasks that are:
    /// - already complete, per the output oracle
    /// - to be run, with their resource requests
    fn print_actions(&self, graph: &TaskGraph, actions: &Actions) {
        if !actions.completed.is_empty() {
            eprintln!(
                "\nThe following tasks are {} and will not run:",
                "already complete".green()
            );
            for name in &actions.completed {
                eprintln!("{} {}", "COMPLETED".green(), name);
            }
        }

        if !actions.to_run.is_empty() {
            eprintln!("\nThe following tasks {}:", "will run".green());
            for &id in &actions.to_run {
                let task = graph.get(id);
                eprintln!("{} {} ({})", "RUN".green(), task.name, task.resources);
            }
        }
        eprintln!();
    }
}

// RUNNING /////////////////
impl App {
    fn run_graph(self, graph: TaskGraph) -> Result<()> {
        let log_dir = self.fs.run_log_dir(&util::alnum_token(8));
        let pool = ResourceRequest::new(self.settings.ppn, self.settings.mem);

        eprintln!("{}\n", "Starting pipeline execution.".magenta());

        let runner = LocalRunner::new(self.fs, self.ui, pool, log_dir);
        let report = runner.run(&graph).context("while running pipeline")?;

        print_summary(&graph, &report);

        if report.was_interrupted() {
            Err(exec::Error::Interrupted.into())
        } else {
            match report.failed_count() {
                0 => Ok(()),
                n => Err(exec::Error::TasksFailed(n).into()),
            }
        }
    }
}

/// One line per task with its terminal state, printed after the run.
fn print_summary(graph: &TaskGraph, report: &RunReport) {
    eprintln!("\n{}", "Pipeline summary:".magenta());
    for (id, task) in graph.iter() {
        let name = &task.name;
        match report.outcome(id) {
            TaskOutcome::Success => eprintln!("{} {name}", "SUCCEEDED".green()),
            TaskOutcome::Failed(code) => {
                eprintln!("{} {name} (exit code {code})", "FAILED".red())
            }
            TaskOutcome::UpstreamFailed => {
                eprintln!("{} {name} (upstream task failed)", "FAILED".red())
            }
            TaskOutcome::Interrupted => eprintln!("{} {name}", "INTERRUPTED".red()),
        }
    }
    if report.failed_count() == 0 && !report.was_interrupted() {
        eprintln!("\n{}", "Completed pipeline.".green());
    }
}
