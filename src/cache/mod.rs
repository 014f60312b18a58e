//! Caching layers
//!
//! - [`layout`]: deterministic directory names; a directory's existence is a cache hit
//! - [`http`]: URL-keyed cache of registry responses

pub mod http;
pub mod layout;

pub use http::{CachedResponse, HttpCache};
