use clap::Parser;

const CMD_NAME: &str = "kx";
const DEFAULT_OUTPUT: &str = "kcross_output";

/// Stores our command-line args format.
#[derive(Parser)]
#[command(name = CMD_NAME, version, about = None, long_about = None)]
pub struct Args {
    /// Input fastq file or directory of them (repeatable)
    #[arg(short, long, value_name = "PATH")]
    pub query: Vec<String>,

    /// Output directory
    #[arg(short, long, value_name = "DIR", default_value = DEFAULT_OUTPUT)]
    #[arg(env = "KCROSS_OUTPUT")]
    pub output: String,

    /// K-mer length for the counting stage
    #[arg(short, long, value_name = "INT", default_value_t = 20)]
    pub kmer_size: u32,

    /// Max number of sequences kept per input file
    #[arg(short = 'x', long, value_name = "INT", default_value_t = 500_000)]
    pub max_seqs: u64,

    /// Counting tool hash size (passed through, e.g. "100M")
    #[arg(short = 's', long, value_name = "SIZE", default_value = "100M")]
    pub hash_size: String,

    /// Cores per counting task; also the local core budget
    #[arg(short, long, value_name = "INT", default_value_t = 4)]
    pub ppn: u32,

    /// Memory per counting task in MB; also the local memory budget
    #[arg(short, long, value_name = "MB", default_value_t = 20_000)]
    pub mem: u64,

    /// Walltime for the batch queue (passed through)
    #[arg(short, long, value_name = "HH:MM:SS", default_value = "2:00:00")]
    pub walltime: String,

    /// Submit this invocation to the batch queue instead of running locally
    #[arg(long)]
    pub cluster: bool,

    /// Batch queue account; required with --cluster
    #[arg(short, long, value_name = "ACCOUNT")]
    #[arg(env = "KCROSS_ACCOUNT")]
    pub account: Option<String>,

    /// Dry run; print info but don't modify anything.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Print additional debugging info (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
