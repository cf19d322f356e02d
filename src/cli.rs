use clap::builder::RangedU64ValueParser;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use vigil_config::{Config, HashingMode, ScanPolicy};

#[derive(Debug, Parser)]
#[command(name = "vigil", version)]
#[command(about = "Scan files, directories and archives against the VirusShare MD5 feed")]
pub struct Cli {
    /// File or directory to scan.
    pub path: PathBuf,

    /// Number of concurrent scan workers [default: available cores].
    #[arg(short = 'j', long, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub threads: Option<usize>,

    /// How files are handed out to workers.
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Where digests are computed.
    #[arg(long, value_enum)]
    pub hashing: Option<HashingArg>,

    /// Log progress instead of errors only.
    #[arg(short, long)]
    pub verbose: bool,

    /// Use the digest store as is, without validating or rebuilding it.
    #[arg(long)]
    pub bypass_checks: bool,

    /// Read configuration from this file instead of the default location.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Location of the digest store.
    #[arg(long, value_name = "FILE")]
    pub database: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum PolicyArg {
    /// Keep a bounded number of files in flight, refilling as they finish.
    Block,
    /// Discover everything first, then deal files out round-robin.
    Cycle,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum HashingArg {
    /// Hash on the async workers.
    Inline,
    /// Hash on the blocking thread pool.
    Threaded,
}

impl From<PolicyArg> for ScanPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Block => Self::Block,
            PolicyArg::Cycle => Self::Cycle,
        }
    }
}

impl From<HashingArg> for HashingMode {
    fn from(arg: HashingArg) -> Self {
        match arg {
            HashingArg::Inline => Self::Inline,
            HashingArg::Threaded => Self::Threaded,
        }
    }
}

impl Cli {
    /// Command-line flags win over every other configuration layer.
    pub fn apply(&self, config: &mut Config) {
        config.verbose |= self.verbose;
        config.store.bypass_validation |= self.bypass_checks;
        if let Some(threads) = self.threads {
            config.scan.threads = threads;
        }
        if let Some(policy) = self.policy {
            config.scan.policy = policy.into();
        }
        if let Some(hashing) = self.hashing {
            config.scan.hashing = hashing.into();
        }
        if let Some(database) = &self.database {
            config.store.path = database.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "vigil", "-j", "3", "--policy", "cycle", "--hashing", "inline", "-v", "--bypass-checks", "--database",
            "/tmp/d.db", "/srv",
        ])
        .unwrap();
        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(cli.path, PathBuf::from("/srv"));
        assert_eq!(config.scan.threads, 3);
        assert_eq!(config.scan.policy, ScanPolicy::Cycle);
        assert_eq!(config.scan.hashing, HashingMode::Inline);
        assert!(config.verbose);
        assert!(config.store.bypass_validation);
        assert_eq!(config.store.path, PathBuf::from("/tmp/d.db"));
    }

    #[test]
    fn test_defaults_left_alone() {
        let cli = Cli::try_parse_from(["vigil", "/srv"]).unwrap();
        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config, Config::default());
    }

    #[rstest]
    #[case::zero_threads(&["vigil", "-j", "0", "/srv"])]
    #[case::unknown_policy(&["vigil", "--policy", "random", "/srv"])]
    #[case::no_path(&["vigil"])]
    fn test_rejected(#[case] args: &[&str]) {
        assert!(Cli::try_parse_from(args).is_err());
    }
}
