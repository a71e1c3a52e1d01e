use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use util::PathEncodingError;

use crate::settings::Settings;

use super::run_cmd::shell_cmd;
use super::Error;

const QSUB_JOB_NAME: &str = "kcross";
const QSUB_QUEUE: &str = "fluxod";
const CLUSTER_FLAG: &str = "--cluster";

/// Resubmit the current invocation to the batch queue via qsub.
///
/// The job re-runs this same executable with the same arguments, minus the
/// cluster flag, so it executes the pipeline locally on the compute node.
/// The conda environment holding the sequence tools is activated first;
/// it lives under the install prefix, next to this executable's bin dir.
pub fn submit_to_cluster(settings: &Settings, account: &str) -> Result<()> {
    let exe = env::current_exe().context("locating current executable")?;
    let args: Vec<String> = env::args().skip(1).collect();
    let line = build_submission(&exe, &args, settings, account)?;

    log::debug!("submitting: {line}");
    let status = shell_cmd(&line).status().context("running qsub")?;
    if !status.success() {
        return Err(Error::SubmissionFailed.into());
    }

    eprintln!("Launched pipeline on the batch queue.");
    Ok(())
}

/// The full shell line piped to qsub, built from the current invocation.
fn build_submission(
    exe: &Path,
    args: &[String],
    settings: &Settings,
    account: &str,
) -> Result<String> {
    let activate = activation_script(exe);

    let mut relaunch = vec![path_str(exe)?.to_owned()];
    relaunch.extend(args.iter().filter(|arg| *arg != CLUSTER_FLAG).cloned());

    let qsub = format!(
        "qsub -N {QSUB_JOB_NAME} -A {account} -q {QSUB_QUEUE} \
        -l nodes=1:ppn={ppn},mem={mem}mb,walltime={walltime}",
        ppn = settings.ppn,
        mem = settings.mem,
        walltime = settings.walltime,
    );

    Ok(format!(
        "echo \"source {} && {}\" | {}",
        path_str(&activate)?,
        relaunch.join(" "),
        qsub,
    ))
}

/// <prefix>/dependencies/miniconda/bin/activate, where the prefix is the
/// executable's dir, minus a trailing bin component if installed that way.
fn activation_script(exe: &Path) -> PathBuf {
    let mut prefix = exe.parent().unwrap_or_else(|| Path::new("."));
    if prefix.ends_with("bin") {
        prefix = prefix.parent().unwrap_or_else(|| Path::new("."));
    }
    prefix.join("dependencies/miniconda/bin/activate")
}

fn path_str(path: &Path) -> Result<&str, PathEncodingError> {
    path.to_str().ok_or(PathEncodingError)
}
