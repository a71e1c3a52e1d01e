use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use util::{HashMap, HashSet};

use crate::fs::Fs;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("No usable input files found in --query paths")]
    NoUsableInput,
}

/// Expand user-supplied query paths into a flat list of input files.
///
/// A directory contributes its direct regular-file entries (one level deep,
/// no filtering on names); a regular file contributes itself; anything else
/// gets a warning and is skipped. Resolved paths are canonicalized and
/// deduplicated, preserving first-seen order.
pub fn resolve_inputs(fs: &Fs, query: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::with_capacity(query.len());
    let mut seen = HashSet::default();

    for qry in query {
        let path = Path::new(qry);
        if path.is_dir() {
            let entries = fs
                .read_dir(path)
                .with_context(|| format!("while listing query directory {qry:?}"))?;
            for entry in entries {
                let entry_path = entry
                    .with_context(|| format!("while listing query directory {qry:?}"))?
                    .path();
                if entry_path.is_file() {
                    push_unique(&mut files, &mut seen, entry_path)?;
                }
            }
        } else if path.is_file() {
            push_unique(&mut files, &mut seen, path.to_path_buf())?;
        } else {
            log::warn!("--query {qry:?} is neither file nor directory; skipping");
        }
    }

    if files.is_empty() {
        return Err(Error::NoUsableInput.into());
    }
    warn_shared_basenames(&files);
    Ok(files)
}

/// Output paths are keyed by input file name, so distinct inputs sharing a
/// name land on the same subset, count, and compare files downstream.
fn warn_shared_basenames(files: &[PathBuf]) {
    let mut names: HashMap<&OsStr, &PathBuf> = HashMap::default();
    for path in files {
        if let Some(name) = path.file_name() {
            if let Some(prev) = names.insert(name, path) {
                log::warn!(
                    "query files {prev:?} and {path:?} share the name {name:?}; \
                    their outputs will overwrite each other"
                );
            }
        }
    }
}

fn push_unique(
    files: &mut Vec<PathBuf>,
    seen: &mut HashSet<PathBuf>,
    path: PathBuf,
) -> Result<()> {
    let path = path
        .canonicalize()
        .with_context(|| format!("while resolving input file {path:?}"))?;
    if seen.insert(path.clone()) {
        files.push(path);
    }
    Ok(())
}
