//! SQLite store of known-malicious content digests.
//!
//! The store is a single table of MD5 digests with an index on the digest
//! column. It is written exactly once, by the database builder, into a
//! staging file that is renamed into place when complete; from then on it is
//! opened read-only by as many scan workers as there are.
//!
//! # Integrity
//! There is no checksum of the file. A store is considered valid if, and only
//! if, it exists and its row count equals the expected count for the feed
//! (see [`HashStore::validate`]). Anything else means "rebuild".

mod db;
pub mod error;
mod store;

pub use crate::db::Database;
pub use crate::store::HashStore;

/// MD5 of zero bytes. It's in the feed, and every empty file on the planet
/// would match it, so it never makes it into a finished store.
pub const BLANK_DIGEST: &str = "d41d8cd98f00b204e9800998ecf8427e";
