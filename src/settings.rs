use std::path::PathBuf;

use anyhow::Result;

use crate::args::Args;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Max sequences per file (-x/--max-seqs) must be greater than zero")]
    ZeroMaxSeqs,
    #[error("Cores per task (-p/--ppn) must be at least 1")]
    ZeroPpn,
    #[error("Memory per task (-m/--mem) must be at least 1 MB")]
    ZeroMem,
    #[error("Cluster submission requires an account (-a/--account)")]
    MissingClusterAccount,
}

/// Representation of the '--cluster' and '-a' arg values
#[derive(Debug)]
pub enum Backend {
    /// run the task graph on this host
    Local,
    /// resubmit this invocation to the batch queue under `account`
    Cluster { account: String },
}

/// Settings are like Args, except all the logic has
/// been applied so e.g. defaults are added in.
#[derive(Debug)]
pub struct Settings {
    pub query: Vec<String>,
    pub output: PathBuf,
    pub kmer_size: u32,
    pub max_seqs: u64,
    pub hash_size: String,
    pub ppn: u32,
    pub mem: u64,
    pub walltime: String,
    pub backend: Backend,
    pub dry_run: bool,
    pub verbose: u8,
}

impl TryFrom<Args> for Settings {
    type Error = anyhow::Error;
    fn try_from(args: Args) -> Result<Self, Self::Error> {
        if args.max_seqs == 0 {
            return Err(Error::ZeroMaxSeqs.into());
        }
        if args.ppn == 0 {
            return Err(Error::ZeroPpn.into());
        }
        if args.mem == 0 {
            return Err(Error::ZeroMem.into());
        }

        let backend = if args.cluster {
            match args.account {
                Some(account) => Backend::Cluster { account },
                None => return Err(Error::MissingClusterAccount.into()),
            }
        } else {
            Backend::Local
        };

        // NB the output dir is not created or canonicalized here; input
        // resolution must be able to fail before it exists.
        let output = PathBuf::from(&args.output);

        Ok(Self {
            query: args.query,
            output,
            kmer_size: args.kmer_size,
            max_seqs: args.max_seqs,
            hash_size: args.hash_size,
            ppn: args.ppn,
            mem: args.mem,
            walltime: args.walltime,
            backend,
            dry_run: args.dry_run,
            verbose: args.verbose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic_args() -> Args {
        Args {
            query: vec![String::from("reads.fq")],
            output: String::from("out"),
            kmer_size: 20,
            max_seqs: 500_000,
            hash_size: String::from("100M"),
            ppn: 4,
            mem: 20_000,
            walltime: String::from("2:00:00"),
            cluster: false,
            account: None,
            dry_run: false,
            verbose: 0,
        }
    }

    #[test]
    fn test_zero_max_seqs_rejected() {
        let mut args = basic_args();
        args.max_seqs = 0;
        let err = Settings::try_from(args).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::ZeroMaxSeqs)));
    }

    #[test]
    fn test_cluster_requires_account() {
        let mut args = basic_args();
        args.cluster = true;
        let err = Settings::try_from(args).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::MissingClusterAccount)
        ));
    }

    #[test]
    fn test_cluster_with_account_accepted() {
        let mut args = basic_args();
        args.cluster = true;
        args.account = Some(String::from("lab0"));
        let settings = Settings::try_from(args).unwrap();
        assert!(matches!(settings.backend, Backend::Cluster { .. }));
    }

    #[test]
    fn test_account_without_cluster_is_ignored() {
        let mut args = basic_args();
        args.account = Some(String::from("lab0"));
        let settings = Settings::try_from(args).unwrap();
        assert!(matches!(settings.backend, Backend::Local));
    }
}
