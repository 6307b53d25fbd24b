//! Data module: materialized array buffers and the array cache.

pub mod array_cache;
pub mod buffer;

pub use array_cache::{ArrayCache, ArrayLoader, CacheKey, CachePattern, Field, KeyType};
pub use buffer::{ArrayValues, CachedArray};
