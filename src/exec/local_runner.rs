use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Once;
use std::thread;

use anyhow::{bail, Context, Result};
use colored::Colorize;

use graph::{ResourceRequest, TaskGraph, TaskId};

use crate::fs::Fs;
use crate::ui::Ui;

use super::run_cmd::{run_cmd, CmdEnd};
use super::{Error, RunReport, TaskOutcome};

/// Raised by the signal handler; the scheduler stops starting tasks once it
/// is up, and every worker polls it so running children get killed.
static CANCEL: AtomicBool = AtomicBool::new(false);
static SIGNAL_HANDLER: Once = Once::new();

fn install_signal_handler() {
    SIGNAL_HANDLER.call_once(|| {
        if let Err(e) = ctrlc::set_handler(|| CANCEL.store(true, Ordering::SeqCst)) {
            log::warn!("couldn't install signal handler: {e}");
        }
    });
}

/// What a worker thread reports back to the scheduler loop.
type FinishEvent = (TaskId, TaskOutcome);

/// Cores and memory not currently claimed by a running task.
#[derive(Debug)]
struct ResourcePool {
    avail: ResourceRequest,
}

impl ResourcePool {
    fn new(total: ResourceRequest) -> Self {
        Self { avail: total }
    }

    fn fits(&self, request: &ResourceRequest) -> bool {
        request.fits_within(&self.avail)
    }

    fn acquire(&mut self, request: &ResourceRequest) {
        debug_assert!(self.fits(request));
        self.avail.cores -= request.cores;
        self.avail.mem_mb -= request.mem_mb;
    }

    fn release(&mut self, request: &ResourceRequest) {
        self.avail.cores += request.cores;
        self.avail.mem_mb += request.mem_mb;
    }
}

/// Mutable state for one run, touched only by the scheduler loop thread.
/// Workers report through the channel; nothing else is shared.
struct RunState {
    pool: ResourcePool,
    /// per task, how many of its runnable deps haven't succeeded yet
    indegree: Vec<usize>,
    /// per task, the runnable tasks that directly depend on it
    dependents: Vec<Vec<TaskId>>,
    /// dep-satisfied tasks waiting for pool headroom
    ready: Vec<TaskId>,
    outcomes: Vec<Option<TaskOutcome>>,
    done: usize,
    in_flight: usize,
}

impl RunState {
    fn new(graph: &TaskGraph, order: &[TaskId], total: ResourceRequest) -> Self {
        let n = graph.len();
        let mut indegree = vec![0usize; n];
        let mut dependents: Vec<Vec<TaskId>> = vec![Vec::new(); n];
        for &id in order {
            for dep in graph.runnable_deps(id) {
                indegree[usize::from(id)] += 1;
                dependents[usize::from(dep)].push(id);
            }
        }

        // seed the ready queue in topo order for deterministic starts:
        let ready = order
            .iter()
            .copied()
            .filter(|id| indegree[usize::from(*id)] == 0)
            .collect();

        Self {
            pool: ResourcePool::new(total),
            indegree,
            dependents,
            ready,
            outcomes: vec![None; n],
            done: 0,
            in_flight: 0,
        }
    }

    fn record(&mut self, id: TaskId, outcome: TaskOutcome) {
        let idx = usize::from(id);
        debug_assert!(self.outcomes[idx].is_none());
        self.outcomes[idx] = Some(outcome);
        self.done += 1;
    }

    /// Mark every not-yet-terminal task downstream of `id` as failed.
    /// None of them can be running or ready: their indegree only drops
    /// when a dep succeeds, and this dep didn't.
    fn fail_dependents(&mut self, id: TaskId) {
        let mut stack = self.dependents[usize::from(id)].clone();
        while let Some(next) = stack.pop() {
            let idx = usize::from(next);
            if self.outcomes[idx].is_none() {
                self.outcomes[idx] = Some(TaskOutcome::UpstreamFailed);
                self.done += 1;
                stack.extend(self.dependents[idx].iter().copied());
            }
        }
    }

    fn into_report(self) -> RunReport {
        let outcomes = self
            .outcomes
            .into_iter()
            .map(|o| o.unwrap_or(TaskOutcome::Interrupted))
            .collect();
        RunReport::new(outcomes)
    }
}

/// Runs a task graph on this host: a bounded pool of worker threads, each
/// owning one child process, gated by dependency completion and by the
/// resource pool. All scheduling decisions happen on the calling thread;
/// workers only run their command and report back.
pub struct LocalRunner {
    /// Filesystem interface
    fs: Fs,
    /// User interface
    ui: Ui,
    /// total core/memory budget for concurrently running tasks
    total: ResourceRequest,
    /// where per-task stdout/stderr logs land
    log_dir: PathBuf,
}

impl LocalRunner {
    pub fn new(fs: Fs, ui: Ui, total: ResourceRequest, log_dir: PathBuf) -> Self {
        Self {
            fs,
            ui,
            total,
            log_dir,
        }
    }

    pub fn run(&self, graph: &TaskGraph) -> Result<RunReport> {
        // also our acyclicity guard:
        let order = graph.topo_order()?;
        self.check_requests(graph, &order)?;

        if order.is_empty() {
            return Ok(RunReport::new(Vec::new()));
        }

        install_signal_handler();
        CANCEL.store(false, Ordering::SeqCst);

        eprintln!("Writing task logs to {:?}\n", self.log_dir);
        self.fs
            .create_dir(&self.log_dir)
            .context("creating task log dir")?;

        let (tx, rx) = channel::<FinishEvent>();
        let mut run = RunState::new(graph, &order, self.total);
        let total_tasks = order.len();

        while run.done < total_tasks {
            if CANCEL.load(Ordering::SeqCst) {
                eprintln!("\n{}", "Interrupted; stopping running tasks.".red());
                self.drain(&mut run, &rx, graph)?;
                break;
            }

            self.start_ready(&mut run, graph, &tx)?;
            if run.in_flight == 0 {
                // can't happen: requests are pre-checked against the total
                // pool, so an idle pool always fits some ready task
                bail!(
                    "scheduler stalled with {} of {} tasks finished",
                    run.done,
                    total_tasks
                );
            }

            let (id, outcome) = rx.recv().context("task worker channel closed early")?;
            self.finish(&mut run, graph, id, outcome);
        }

        Ok(run.into_report())
    }

    /// Every request must fit the total pool, or it could never start.
    fn check_requests(&self, graph: &TaskGraph, order: &[TaskId]) -> Result<()> {
        for &id in order {
            let task = graph.get(id);
            if !task.resources.fits_within(&self.total) {
                return Err(Error::RequestExceedsPool {
                    task: task.name.clone(),
                    request: task.resources,
                    total: self.total,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Start every ready task the pool can hold, in queue order.
    fn start_ready(
        &self,
        run: &mut RunState,
        graph: &TaskGraph,
        tx: &Sender<FinishEvent>,
    ) -> Result<()> {
        let mut i = 0;
        while i < run.ready.len() {
            let id = run.ready[i];
            if run.pool.fits(&graph.get(id).resources) {
                run.ready.remove(i);
                self.start(run, graph, id, tx)?;
            } else {
                i += 1;
            }
        }
        Ok(())
    }

    fn start(
        &self,
        run: &mut RunState,
        graph: &TaskGraph,
        id: TaskId,
        tx: &Sender<FinishEvent>,
    ) -> Result<()> {
        let task = graph.get(id);
        run.pool.acquire(&task.resources);
        run.in_flight += 1;

        eprintln!("{} {} ({})", "RUN".green(), task.name, task.resources);
        self.ui
            .verbose_msg(&format!("Pool now {}", run.pool.avail));
        log::debug!("task {}: {}", task.name, task.command);

        let out_file = self
            .fs
            .create_file(self.fs.task_stdout(&self.log_dir, &task.name))
            .context("creating task stdout log")?;
        let err_file = self
            .fs
            .create_file(self.fs.task_stderr(&self.log_dir, &task.name))
            .context("creating task stderr log")?;

        let command = task.command.clone();
        let name = task.name.clone();
        let tx = tx.clone();
        thread::spawn(move || {
            let outcome = match run_cmd(&command, out_file, err_file, &CANCEL) {
                Ok(CmdEnd::Exited(status)) if status.success() => TaskOutcome::Success,
                Ok(CmdEnd::Exited(status)) => TaskOutcome::Failed(status.code().unwrap_or(-1)),
                Ok(CmdEnd::Cancelled) => TaskOutcome::Interrupted,
                Err(e) => {
                    log::error!("task {name}: {e:#}");
                    TaskOutcome::Failed(-1)
                }
            };
            // if the scheduler is gone the run is already over:
            let _ = tx.send((id, outcome));
        });
        Ok(())
    }

    fn finish(&self, run: &mut RunState, graph: &TaskGraph, id: TaskId, outcome: TaskOutcome) {
        run.in_flight -= 1;
        run.pool.release(&graph.get(id).resources);
        self.print_outcome(graph, id, outcome);
        run.record(id, outcome);

        match outcome {
            TaskOutcome::Success => {
                let idx = usize::from(id);
                for i in 0..run.dependents[idx].len() {
                    let dep_id = run.dependents[idx][i];
                    let di = usize::from(dep_id);
                    run.indegree[di] -= 1;
                    if run.indegree[di] == 0 {
                        run.ready.push(dep_id);
                    }
                }
            }
            TaskOutcome::Failed(_) => {
                log::warn!(
                    "task \"{}\" failed; its dependents will not run",
                    graph.get(id).name
                );
                run.fail_dependents(id);
            }
            // remaining tasks are handled when the loop drains:
            TaskOutcome::Interrupted | TaskOutcome::UpstreamFailed => {}
        }
    }

    /// Wait for in-flight workers after a cancellation; they notice the flag
    /// and kill their children, so this is short.
    fn drain(
        &self,
        run: &mut RunState,
        rx: &Receiver<FinishEvent>,
        graph: &TaskGraph,
    ) -> Result<()> {
        while run.in_flight > 0 {
            let (id, outcome) = rx.recv().context("task worker channel closed early")?;
            run.in_flight -= 1;
            run.pool.release(&graph.get(id).resources);
            self.print_outcome(graph, id, outcome);
            run.record(id, outcome);
        }
        Ok(())
    }

    fn print_outcome(&self, graph: &TaskGraph, id: TaskId, outcome: TaskOutcome) {
        let name = &graph.get(id).name;
        match outcome {
            TaskOutcome::Success => eprintln!("{} {name}", "COMPLETED".green()),
            TaskOutcome::Failed(code) => {
                eprintln!("{} {name} (exit code {code})", "FAILED".red())
            }
            TaskOutcome::Interrupted => eprintln!("{} {name}", "INTERRUPTED".red()),
            // never sent by workers:
            TaskOutcome::UpstreamFailed => {}
        }
    }
}
