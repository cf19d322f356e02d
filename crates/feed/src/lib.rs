//! The VirusShare digest feed, and the builder that turns it into a store.
//!
//! The feed is a numbered list of shards, each a newline-delimited list of
//! MD5 digests with `#` comments. [`DatabaseBuilder`] fetches every shard of a
//! [`FeedSource`] concurrently and writes them into a fresh
//! [`vigil_store::HashStore`]; [`ensure_database`] wraps that in the
//! validate-or-rebuild loop run before every scan.

mod builder;
pub mod error;
mod http;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod retry;
mod source;

pub use crate::builder::{BuildEvent, DatabaseBuilder, ensure_database};
pub use crate::http::HttpFeed;
#[cfg(any(test, feature = "mock"))]
pub use crate::mock::MockFeed;
pub use crate::retry::RetryPolicy;
pub use crate::source::{FeedSource, parse_shard};
