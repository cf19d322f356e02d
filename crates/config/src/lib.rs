//! Configuration for vigil.
//!
//! Every component receives its slice of [`Config`] at construction time;
//! there is no global state. That makes it trivial to run several isolated
//! instances side by side, which the test-suites of the other crates rely on
//! (one temporary store per test).
//!
//! Values are layered with [`figment`], later layers winning:
//!
//! 1. Built-in defaults ([`Config::default`]).
//! 2. A configuration file: either the one passed explicitly, or
//!    `config.toml` in the platform configuration directory if it exists.
//!    TOML, YAML and JSON are supported, picked by file extension.
//! 3. Environment variables prefixed with `VIGIL_`, using `__` to reach into
//!    nested tables (`VIGIL_SCAN__THREADS=4`).
//!
//! Command-line flags are applied on top by the binary.

pub mod error;
mod load;
mod policy;

pub use crate::policy::{HashingMode, ScanPolicy};
use crate::error::{ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Row count of the complete VirusShare feed (shards 0 to 487), minus the
/// blank digest.
pub const DEFAULT_EXPECTED_ROWS: u64 = 41_746_428;
pub const DEFAULT_SHARDS: u32 = 488;
pub const DEFAULT_URL_TEMPLATE: &str = "https://virusshare.com/hashfiles/VirusShare_{shard}.md5";

const APPLICATION: &str = "vigil";
const DATABASE_FILENAME: &str = "definitions.db";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Emit informational logs instead of errors only.
    pub verbose: bool,
    pub store: StoreConfig,
    pub feed: FeedConfig,
    pub scan: ScanConfig,
}

/// Where the digest database lives and how it is validated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    /// A store is valid if, and only if, it has exactly this many rows.
    pub expected_rows: u64,
    /// How many times a failed build (or a build that doesn't validate) is
    /// attempted before giving up.
    pub max_build_attempts: u32,
    /// Skip validation (and therefore rebuilding) entirely.
    pub bypass_validation: bool,
}

/// The remote digest feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Shard URL; `{shard}` is replaced by the zero-padded shard index.
    pub url_template: String,
    pub shards: u32,
    /// Maximum number of shard downloads in flight.
    pub concurrency: usize,
    /// Per-request timeout, in seconds.
    pub timeout_secs: u64,
    pub retry: RetryConfig,
}

/// Retry behaviour for transient network failures.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per shard, including the first. `None` retries forever.
    pub max_attempts: Option<u32>,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

/// Scan behaviour.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Number of concurrent scan workers.
    pub threads: usize,
    pub policy: ScanPolicy,
    pub hashing: HashingMode,
    /// Containers nested deeper than this are not expanded.
    pub max_archive_depth: usize,
    /// Also digest container files themselves, not only their members.
    pub digest_containers: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            expected_rows: DEFAULT_EXPECTED_ROWS,
            max_build_attempts: 3,
            bypass_validation: false,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            shards: DEFAULT_SHARDS,
            concurrency: 8,
            timeout_secs: 120,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: Some(10),
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            threads: std::thread::available_parallelism().map(usize::from).unwrap_or(1),
            policy: ScanPolicy::default(),
            hashing: HashingMode::default(),
            max_archive_depth: 16,
            digest_containers: false,
        }
    }
}

impl FeedConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Config {
    /// Reject values that would make the core misbehave rather than fail.
    pub fn validate(&self) -> Result<()> {
        if self.scan.threads < 1 {
            exn::bail!(ErrorKind::Invalid("scan.threads", "must be at least 1".to_string()));
        }
        if self.feed.concurrency < 1 {
            exn::bail!(ErrorKind::Invalid("feed.concurrency", "must be at least 1".to_string()));
        }
        if self.feed.shards < 1 {
            exn::bail!(ErrorKind::Invalid("feed.shards", "must be at least 1".to_string()));
        }
        if !self.feed.url_template.contains("{shard}") {
            exn::bail!(ErrorKind::Invalid("feed.url_template", "must contain `{shard}`".to_string()));
        }
        if self.store.max_build_attempts < 1 {
            exn::bail!(ErrorKind::Invalid("store.max_build_attempts", "must be at least 1".to_string()));
        }
        if self.feed.retry.max_attempts == Some(0) {
            exn::bail!(ErrorKind::Invalid("feed.retry.max_attempts", "must be at least 1".to_string()));
        }
        if !(self.feed.retry.multiplier >= 1.0) {
            exn::bail!(ErrorKind::Invalid("feed.retry.multiplier", "must be at least 1.0".to_string()));
        }
        Ok(())
    }
}

/// `definitions.db` inside the platform data directory, or the current
/// directory when no home directory can be determined.
pub fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("", "", APPLICATION)
        .map(|dirs| dirs.data_dir().join(DATABASE_FILENAME))
        .unwrap_or_else(|| PathBuf::from(DATABASE_FILENAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.feed.shards, 488);
        assert_eq!(config.feed.concurrency, 8);
        assert_eq!(config.store.expected_rows, 41_746_428);
        assert!(config.scan.threads >= 1);
        assert!(config.store.path.ends_with("definitions.db"));
    }

    #[rstest]
    #[case::zero_threads(|c: &mut Config| c.scan.threads = 0, "scan.threads")]
    #[case::zero_fetches(|c: &mut Config| c.feed.concurrency = 0, "feed.concurrency")]
    #[case::zero_shards(|c: &mut Config| c.feed.shards = 0, "feed.shards")]
    #[case::no_placeholder(|c: &mut Config| c.feed.url_template = "https://example.com".into(), "feed.url_template")]
    #[case::zero_builds(|c: &mut Config| c.store.max_build_attempts = 0, "store.max_build_attempts")]
    #[case::zero_attempts(|c: &mut Config| c.feed.retry.max_attempts = Some(0), "feed.retry.max_attempts")]
    #[case::shrinking_backoff(|c: &mut Config| c.feed.retry.multiplier = 0.5, "feed.retry.multiplier")]
    fn test_validate_rejects(#[case] mutate: fn(&mut Config), #[case] field: &str) {
        let mut config = Config::default();
        mutate(&mut config);
        let err = config.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(f, _) if *f == field));
    }

    #[test]
    fn test_unbounded_retries_are_valid() {
        let mut config = Config::default();
        config.feed.retry.max_attempts = None;
        config.validate().unwrap();
    }
}
