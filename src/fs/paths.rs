use std::path::{Path, PathBuf};

use util::PathEncodingError;

use super::Fs;

/// Per-stage output directories, relative to the output dir.
pub const SUBSET_DIR: &str = "subset";
pub const COUNTS_DIR: &str = "kmer_counts";
pub const KEPT_DIR: &str = "reads_kept";
pub const REJECTED_DIR: &str = "reads_rejected";
pub const LOGS_DIR: &str = "logs";

/// Utility fns for making common types of paths.
/// All paths produced here are children of the output dir;
/// file names are derived from the final component of an input path,
/// so non-UTF-8 names surface as `PathEncodingError`.
impl Fs {
    /// $OUTPUT/name
    pub fn stage_dir(&self, name: &str) -> PathBuf {
        self.output_prefix.join(name)
    }

    /// $OUTPUT/subset/subset_<basename>
    pub fn subset_file(&self, input: &Path) -> Result<PathBuf, PathEncodingError> {
        let name = file_name_str(input)?;
        let mut buf = self.stage_dir(SUBSET_DIR);
        buf.push(format!("subset_{name}"));
        Ok(buf)
    }

    /// $OUTPUT/kmer_counts/<subset_basename>.jf
    pub fn counts_file(&self, subset: &Path) -> Result<PathBuf, PathEncodingError> {
        let name = file_name_str(subset)?;
        let mut buf = self.stage_dir(COUNTS_DIR);
        buf.push(format!("{name}.jf"));
        Ok(buf)
    }

    /// $OUTPUT/reads_kept/<query_basename>_vs_<index_basename>
    pub fn kept_file(&self, query: &Path, index: &Path) -> Result<PathBuf, PathEncodingError> {
        self.vs_file(KEPT_DIR, query, index)
    }

    /// $OUTPUT/reads_rejected/<query_basename>_vs_<index_basename>
    pub fn rejected_file(&self, query: &Path, index: &Path) -> Result<PathBuf, PathEncodingError> {
        self.vs_file(REJECTED_DIR, query, index)
    }

    /// $OUTPUT/logs/runner_<token>
    pub fn run_log_dir(&self, token: &str) -> PathBuf {
        let mut buf = self.stage_dir(LOGS_DIR);
        buf.push(format!("runner_{token}"));
        buf
    }

    /// <run_log_dir>/<task>.out
    pub fn task_stdout(&self, log_dir: &Path, task: &str) -> PathBuf {
        log_dir.join(format!("{task}.out"))
    }

    /// <run_log_dir>/<task>.err
    pub fn task_stderr(&self, log_dir: &Path, task: &str) -> PathBuf {
        log_dir.join(format!("{task}.err"))
    }

    fn vs_file(&self, dir: &str, query: &Path, index: &Path) -> Result<PathBuf, PathEncodingError> {
        let query = file_name_str(query)?;
        let index = file_name_str(index)?;
        let mut buf = self.stage_dir(dir);
        buf.push(format!("{query}_vs_{index}"));
        Ok(buf)
    }
}

fn file_name_str(path: &Path) -> Result<&str, PathEncodingError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .ok_or(PathEncodingError)
}
