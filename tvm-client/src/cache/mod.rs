//! Two-tier credential cache
//!
//! - [`MemoryCache`]: process-lifetime map, shared by every client that
//!   holds the same handle
//! - [`FileCache`]: one JSON document on disk, shared by convention across
//!   processes pointed at the same path
//!
//! Both tiers are keyed by [`derive_cache_key`] and neither checks expiry on
//! its own; that is [`is_valid`]'s job.

mod expiry;
mod file;
mod key;
mod memory;

pub use expiry::{EXPIRY_SKEW_MS, is_valid, is_valid_at};
pub use file::FileCache;
pub use key::derive_cache_key;
pub use memory::MemoryCache;
