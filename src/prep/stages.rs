use std::path::{Path, PathBuf};

use graph::ResourceRequest;
use util::PathEncodingError;

use crate::fs::{Fs, COUNTS_DIR, KEPT_DIR, REJECTED_DIR, SUBSET_DIR};
use crate::settings::Settings;

use super::Artifact;

/// Subsetting and comparing are cheap bookkeeping work next to counting,
/// so they get a fixed request no matter how large the files are.
const LIGHT_CORES: u32 = 1;
const LIGHT_MEM_MB: u64 = 768;

/// A read is kept when at least `QUERY_MIN_FRAC` of its k-mers appear in the
/// index with count >= `QUERY_MIN_COUNT`.
const QUERY_MIN_COUNT: u32 = 1;
const QUERY_MIN_FRAC: &str = "0.8";

/// How a stage's tasks depend on the previous stage's tasks.
#[derive(Debug, Clone, Copy)]
pub enum DepPolicy {
    /// no upstream edges (the first stage)
    None,
    /// each task depends on the one task that produced its input artifact
    Matching,
    /// every task depends on every task of the previous stage.
    /// For the compare stage this is wider than the two real inputs,
    /// but it is never wrong, only slower to unlock.
    AllUpstream,
}

/// Per-artifact expansion rule for one stage.
#[derive(Debug)]
pub enum Rule {
    /// bound each input file to at most `max_seqs` records
    Subset { max_seqs: u64 },
    /// build a k-mer index from each subset file
    Count {
        kmer_size: u32,
        threads: u32,
        hash_size: String,
        mem_mb: u64,
    },
    /// query every subset file against every index, including its own
    Compare,
}

/// One stage of the pipeline: a name, a dependency policy, and a rule.
#[derive(Debug)]
pub struct StageDef {
    pub name: &'static str,
    pub deps: DepPolicy,
    pub rule: Rule,
}

impl StageDef {
    /// Output dirs this stage writes into, relative to the output dir.
    pub fn output_dirs(&self) -> &'static [&'static str] {
        match self.rule {
            Rule::Subset { .. } => &[SUBSET_DIR],
            Rule::Count { .. } => &[COUNTS_DIR],
            Rule::Compare => &[KEPT_DIR, REJECTED_DIR],
        }
    }
}

/// The fixed pipeline, in execution order. New stages slot in here without
/// touching the expander or the execution backend.
pub fn stage_defs(settings: &Settings) -> Vec<StageDef> {
    vec![
        StageDef {
            name: "subset",
            deps: DepPolicy::None,
            rule: Rule::Subset {
                max_seqs: settings.max_seqs,
            },
        },
        StageDef {
            name: "count",
            deps: DepPolicy::Matching,
            rule: Rule::Count {
                kmer_size: settings.kmer_size,
                threads: settings.ppn,
                hash_size: settings.hash_size.clone(),
                mem_mb: settings.mem,
            },
        },
        StageDef {
            name: "compare",
            deps: DepPolicy::AllUpstream,
            rule: Rule::Compare,
        },
    ]
}

/// One concrete task yielded by applying a rule to a frontier element:
/// the command to run, the files it must produce, the resources it may
/// claim, and the artifact it contributes to the next frontier.
#[derive(Debug)]
pub struct Expansion {
    pub command: String,
    pub outputs: Vec<PathBuf>,
    pub resources: ResourceRequest,
    pub artifact: Artifact,
}

impl Rule {
    /// Build the task for one frontier artifact (the per-item stages).
    pub fn expand_item(&self, fs: &Fs, item: &Artifact) -> Result<Expansion, PathEncodingError> {
        match self {
            Self::Subset { max_seqs } => {
                let out = fs.subset_file(&item.path)?;
                let command = format!(
                    "fa_subset -o {} -n {} -i fastq -t fastq {}",
                    path_str(&out)?,
                    max_seqs,
                    path_str(&item.path)?,
                );
                Ok(Expansion {
                    command,
                    outputs: vec![out.clone()],
                    resources: ResourceRequest::new(LIGHT_CORES, LIGHT_MEM_MB),
                    artifact: Artifact {
                        subset: out.clone(),
                        path: out,
                    },
                })
            }
            Self::Count {
                kmer_size,
                threads,
                hash_size,
                mem_mb,
            } => {
                let out = fs.counts_file(&item.path)?;
                let command = format!(
                    "jellyfish count -m {} -t {} -s {} -o {} {}",
                    kmer_size,
                    threads,
                    hash_size,
                    path_str(&out)?,
                    path_str(&item.path)?,
                );
                Ok(Expansion {
                    command,
                    outputs: vec![out.clone()],
                    resources: ResourceRequest::new(*threads, *mem_mb),
                    artifact: Artifact {
                        path: out,
                        subset: item.subset.clone(),
                    },
                })
            }
            Self::Compare => unreachable!("compare stage expands pairs, not single items"),
        }
    }

    /// Build the task for one (index, query) ordered pair (the cross stage).
    /// The query tool writes kept reads to stdout and rejected reads to
    /// stderr, so the command carries its own redirections.
    pub fn expand_pair(
        &self,
        fs: &Fs,
        index: &Artifact,
        query: &Path,
    ) -> Result<Expansion, PathEncodingError> {
        debug_assert!(matches!(self, Self::Compare));
        let kept = fs.kept_file(query, &index.path)?;
        let rejected = fs.rejected_file(query, &index.path)?;
        let command = format!(
            "query_per_read {} {} {} {} > {} 2> {}",
            QUERY_MIN_COUNT,
            QUERY_MIN_FRAC,
            path_str(&index.path)?,
            path_str(query)?,
            path_str(&kept)?,
            path_str(&rejected)?,
        );
        Ok(Expansion {
            command,
            resources: ResourceRequest::new(LIGHT_CORES, LIGHT_MEM_MB),
            artifact: Artifact {
                path: kept.clone(),
                subset: query.to_path_buf(),
            },
            outputs: vec![kept, rejected],
        })
    }
}

fn path_str(path: &Path) -> Result<&str, PathEncodingError> {
    path.to_str().ok_or(PathEncodingError)
}
