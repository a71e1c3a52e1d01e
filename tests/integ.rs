use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::Result;
use kcross::{App, Args, Settings};
use tempfile::{tempdir, TempDir};

/// Stand-ins for the sequence tools, written once to a shared dir that gets
/// prepended to PATH. Held in a static so the dir outlives every test.
static STUB_TOOLS: LazyLock<TempDir> = LazyLock::new(|| {
    let dir = tempdir().unwrap();

    // copies its input through, like a subset bigger than the file:
    write_stub(
        dir.path(),
        "fa_subset",
        r#"#!/bin/sh
out=""
input=""
while [ $# -gt 0 ]; do
    case "$1" in
        -o) out="$2"; shift 2 ;;
        -n|-i|-t) shift 2 ;;
        *) input="$1"; shift ;;
    esac
done
cat "$input" > "$out"
"#,
    );

    // fails on inputs containing "poison", otherwise writes a fake index:
    write_stub(
        dir.path(),
        "jellyfish",
        r#"#!/bin/sh
shift
out=""
input=""
while [ $# -gt 0 ]; do
    case "$1" in
        -o) out="$2"; shift 2 ;;
        -m|-t|-s) shift 2 ;;
        *) input="$1"; shift ;;
    esac
done
if grep -q poison "$input"; then
    exit 3
fi
echo "index of $input" > "$out"
"#,
    );

    // kept reads to stdout, rejected to stderr; the task command's own
    // redirections route them into the output files:
    write_stub(
        dir.path(),
        "query_per_read",
        r#"#!/bin/sh
echo "kept $3 $4"
echo "rejected $3 $4" >&2
"#,
    );

    let path = std::env::var("PATH").unwrap_or_default();
    std::env::set_var("PATH", format!("{}:{path}", dir.path().display()));
    dir
});

fn write_stub(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
}

fn basic_args(output: String) -> Args {
    Args {
        query: Vec::with_capacity(0),
        output,
        kmer_size: 20,
        max_seqs: 500_000,
        hash_size: String::from("100M"),
        ppn: 4,
        mem: 20_000,
        walltime: String::from("2:00:00"),
        cluster: false,
        account: None,
        dry_run: false,
        verbose: 1,
    }
}

fn stringify(path: &Path) -> String {
    path.to_str().unwrap().to_owned()
}

fn write_reads(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    stringify(&path)
}

fn run_pipeline(query: Vec<String>, output: &Path) -> Result<()> {
    // force the stub dir onto PATH before anything runs:
    let _ = STUB_TOOLS.path();

    let mut args = basic_args(stringify(output));
    args.query = query;
    let settings: Settings = args.try_into()?;
    App::new(settings).run()
}

fn count_entries(dir: &Path) -> usize {
    fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[test]
fn test_full_run_produces_cross_product() -> Result<()> {
    let inputs = tempdir()?;
    let a = write_reads(inputs.path(), "reads_a.fq", "@r1\nACGT\n+\nIIII\n");
    let b = write_reads(inputs.path(), "reads_b.fq", "@r2\nTTTT\n+\nIIII\n");
    let c = write_reads(inputs.path(), "reads_c.fq", "@r3\nGGGG\n+\nIIII\n");
    let output = tempdir()?;

    run_pipeline(vec![a, b, c], output.path())?;

    assert_eq!(count_entries(&output.path().join("subset")), 3);
    assert_eq!(count_entries(&output.path().join("kmer_counts")), 3);
    assert_eq!(count_entries(&output.path().join("reads_kept")), 9);
    assert_eq!(count_entries(&output.path().join("reads_rejected")), 9);

    // self-pair and cross-pair both present, named query-vs-index:
    let kept = output.path().join("reads_kept");
    assert!(kept.join("subset_reads_a.fq_vs_subset_reads_a.fq.jf").exists());
    assert!(kept.join("subset_reads_b.fq_vs_subset_reads_c.fq.jf").exists());

    let self_pair =
        fs::read_to_string(kept.join("subset_reads_a.fq_vs_subset_reads_a.fq.jf"))?;
    assert!(self_pair.starts_with("kept "));

    output.close()?;
    Ok(())
}

#[test]
fn test_rerun_schedules_nothing() -> Result<()> {
    let inputs = tempdir()?;
    let a = write_reads(inputs.path(), "reads_a.fq", "@r1\nACGT\n+\nIIII\n");
    let b = write_reads(inputs.path(), "reads_b.fq", "@r2\nTTTT\n+\nIIII\n");
    let output = tempdir()?;

    run_pipeline(vec![a.clone(), b.clone()], output.path())?;
    // second run finds every output in place and runs nothing:
    run_pipeline(vec![a, b], output.path())?;

    assert_eq!(count_entries(&output.path().join("subset")), 2);
    assert_eq!(count_entries(&output.path().join("reads_kept")), 4);
    // only the first run got as far as making a log dir:
    assert_eq!(count_entries(&output.path().join("logs")), 1);

    output.close()?;
    Ok(())
}

#[test]
fn test_unusable_query_fails_before_creating_output() {
    let outer = tempdir().unwrap();
    let output = outer.path().join("kcross_output");

    let err = run_pipeline(vec![String::from("/no/such/reads.fq")], &output).unwrap_err();

    assert!(format!("{err:#}").contains("No usable input"));
    assert!(!output.exists(), "failed resolution must not create output");
}

#[test]
fn test_cluster_without_account_is_rejected() {
    let mut args = basic_args(String::from("unused"));
    args.query = vec![String::from("reads.fq")];
    args.cluster = true;

    let err = Settings::try_from(args).unwrap_err();
    assert!(err.to_string().contains("account"));
}

#[test]
fn test_failed_count_blocks_compares_but_not_siblings() {
    let inputs = tempdir().unwrap();
    let good = write_reads(inputs.path(), "good.fq", "@r1\nACGT\n+\nIIII\n");
    let poison = write_reads(inputs.path(), "poison.fq", "poison\n");
    let output = tempdir().unwrap();

    let err = run_pipeline(vec![good, poison], output.path()).unwrap_err();
    assert!(format!("{err:#}").contains("failed"));

    // both subsets ran; only the good input got counted:
    assert_eq!(count_entries(&output.path().join("subset")), 2);
    assert!(output
        .path()
        .join("kmer_counts/subset_good.fq.jf")
        .exists());
    assert_eq!(count_entries(&output.path().join("kmer_counts")), 1);
    // every compare depends on all counts, so none of them ran:
    assert_eq!(count_entries(&output.path().join("reads_kept")), 0);
    assert_eq!(count_entries(&output.path().join("reads_rejected")), 0);
}

#[test]
fn test_dry_run_plans_without_touching_disk() -> Result<()> {
    let inputs = tempdir()?;
    let a = write_reads(inputs.path(), "reads_a.fq", "@r1\nACGT\n+\nIIII\n");
    let outer = tempdir()?;
    let output = outer.path().join("kcross_output");

    let _ = STUB_TOOLS.path();
    let mut args = basic_args(stringify(&output));
    args.query = vec![a];
    args.dry_run = true;
    let settings: Settings = args.try_into()?;
    App::new(settings).run()?;

    assert!(!output.exists(), "dry run must not create the output tree");
    Ok(())
}
