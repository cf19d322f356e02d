use crate::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// How discovered scan tasks are assigned to workers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanPolicy {
    /// One shared, load-balanced pool. Workers pull whatever is ready next,
    /// so one huge file only ever occupies one slot.
    #[default]
    Block,
    /// Tasks are dealt round-robin to a fixed set of workers before anything
    /// runs, and each worker chews through its own list one at a time.
    Cycle,
}

/// Where the CPU-bound part of digesting a file runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashingMode {
    /// Read and hash on the async runtime's worker threads.
    Inline,
    /// Read and hash on the blocking thread pool.
    #[default]
    Threaded,
}

impl ScanPolicy {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Cycle => "cycle",
        }
    }
}

impl HashingMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Threaded => "threaded",
        }
    }
}

impl Display for ScanPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl Display for HashingMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ScanPolicy {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "block" => Ok(Self::Block),
            "cycle" => Ok(Self::Cycle),
            _ => exn::bail!(ErrorKind::UnknownVariant(s.to_string())),
        }
    }
}

impl FromStr for HashingMode {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inline" => Ok(Self::Inline),
            "threaded" | "thread" => Ok(Self::Threaded),
            _ => exn::bail!(ErrorKind::UnknownVariant(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("block", ScanPolicy::Block)]
    #[case("CYCLE", ScanPolicy::Cycle)]
    fn test_policy_from_str(#[case] input: &str, #[case] expected: ScanPolicy) {
        assert_eq!(input.parse::<ScanPolicy>().unwrap(), expected);
        assert_eq!(expected.to_string(), input.to_lowercase());
    }

    #[rstest]
    #[case("inline", HashingMode::Inline)]
    #[case("threaded", HashingMode::Threaded)]
    #[case("thread", HashingMode::Threaded)]
    fn test_hashing_from_str(#[case] input: &str, #[case] expected: HashingMode) {
        assert_eq!(input.parse::<HashingMode>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_variant() {
        assert!("round-robin".parse::<ScanPolicy>().is_err());
        assert!("gpu".parse::<HashingMode>().is_err());
    }
}
