//! ArrayCache: byte-bounded LRU store of materialized arrays.
//!
//! Entries are keyed by [`CacheKey`] and handed out as `Arc<CachedArray>`, so
//! a caller may keep a buffer alive across later cache calls without the
//! cache ever aliasing its own storage mutably. Eviction is strict
//! least-recently-used: each hit or insert stamps the entry with the next
//! value of a monotonic counter and the smallest stamp is evicted first.
//!
//! Misses are filled through an [`ArrayLoader`]; a failed load inserts
//! nothing and leaves every other entry untouched.

use crate::catalog::array::VariableScope;
use crate::catalog::object::{ArrayIndex, ObjectIndex, ObjectType, TimeIndex};
use crate::data::buffer::CachedArray;
use crate::mesh_error::ExodusError;
use crate::topology::cache::{GenerationTracked, InvalidateCache};
use hashbrown::HashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Default byte budget: 128 MiB.
pub const DEFAULT_CAPACITY_BYTES: usize = 128 * 1024 * 1024;

/// What kind of array a key names.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyType {
    /// A result array of a variable scope.
    Result(VariableScope),
    /// 0-based node connectivity of a block.
    Connectivity(ObjectType),
    /// One attribute of a block; the key's array field is the attribute index.
    Attribute(ObjectType),
    Map(ObjectType),
    /// Point coordinates, padded to three components.
    Coordinates,
    /// Generated per-cell owner ids.
    ObjectIds,
    /// Generated per-cell global element ids.
    GlobalElementIds,
    /// Generated per-point global node ids.
    GlobalNodeIds,
}

impl KeyType {
    /// Keys whose contents depend on the cell layout or squeeze mode rather
    /// than on stored data alone.
    pub fn is_derived(self) -> bool {
        matches!(
            self,
            KeyType::ObjectIds | KeyType::GlobalElementIds | KeyType::GlobalNodeIds
        )
    }
}

/// Exact address of one cached array. `time == None` marks a
/// time-invariant array.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub time: Option<TimeIndex>,
    pub key_type: KeyType,
    pub object: ObjectIndex,
    pub array: ArrayIndex,
}

impl CacheKey {
    pub fn new(time: Option<TimeIndex>, key_type: KeyType, object: ObjectIndex, array: ArrayIndex) -> Self {
        CacheKey {
            time,
            key_type,
            object,
            array,
        }
    }

    /// Time-invariant key with object and array zero.
    pub fn global(key_type: KeyType) -> Self {
        CacheKey::new(None, key_type, ObjectIndex(0), ArrayIndex(0))
    }
}

/// A field of a [`CachePattern`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Field<T> {
    Any,
    Exactly(T),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Any
    }
}

impl<T: PartialEq> Field<T> {
    #[inline]
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Field::Any => true,
            Field::Exactly(v) => v == value,
        }
    }
}

/// Wildcard key used by [`ArrayCache::invalidate`].
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct CachePattern {
    pub time: Field<Option<TimeIndex>>,
    pub key_type: Field<KeyType>,
    pub object: Field<ObjectIndex>,
    pub array: Field<ArrayIndex>,
}

impl CachePattern {
    /// Pattern matching every key.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn key_type(key_type: KeyType) -> Self {
        CachePattern {
            key_type: Field::Exactly(key_type),
            ..Self::default()
        }
    }

    pub fn matches(&self, key: &CacheKey) -> bool {
        self.time.matches(&key.time)
            && self.key_type.matches(&key.key_type)
            && self.object.matches(&key.object)
            && self.array.matches(&key.array)
    }
}

/// Source of array contents for cache misses.
pub trait ArrayLoader {
    /// Materialize the array addressed by `key`.
    ///
    /// Multi-component arrays must be read completely or not at all.
    fn load(&self, key: &CacheKey) -> Result<CachedArray, ExodusError>;
}

#[derive(Debug)]
struct Entry {
    data: Arc<CachedArray>,
    bytes: usize,
    stamp: u64,
}

/// Byte-bounded LRU cache of arrays.
///
/// # Invariants
/// - `used` equals the sum of `bytes` over all entries.
/// - `recency` holds exactly one stamp per entry.
/// - After any insert, `used <= capacity` unless the only remaining entry
///   is the one just inserted.
#[derive(Debug)]
pub struct ArrayCache {
    capacity: usize,
    used: usize,
    clock: u64,
    entries: HashMap<CacheKey, Entry>,
    recency: BTreeMap<u64, CacheKey>,
    observed_generation: Option<u64>,
    hits: u64,
    misses: u64,
}

impl Default for ArrayCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY_BYTES)
    }
}

impl ArrayCache {
    pub fn new(capacity_bytes: usize) -> Self {
        ArrayCache {
            capacity: capacity_bytes,
            used: 0,
            clock: 0,
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            observed_generation: None,
            hits: 0,
            misses: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn used_bytes(&self) -> usize {
        self.used
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(hits, misses)` since construction.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Change the byte budget and evict down to it immediately.
    pub fn set_capacity(&mut self, capacity_bytes: usize) {
        self.capacity = capacity_bytes;
        self.evict_to(capacity_bytes, None);
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Look up `key`, marking it most recently used.
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<CachedArray>> {
        let stamp = self.tick();
        let entry = self.entries.get_mut(key)?;
        self.recency.remove(&entry.stamp);
        entry.stamp = stamp;
        self.recency.insert(stamp, *key);
        Some(Arc::clone(&entry.data))
    }

    /// Insert or replace `key`, then evict least recently used entries until
    /// the budget holds. The new entry itself is never evicted by its own
    /// insertion.
    pub fn insert(&mut self, key: CacheKey, array: CachedArray) -> Arc<CachedArray> {
        self.remove(&key);
        let bytes = array.byte_size();
        let data = Arc::new(array);
        let stamp = self.tick();
        self.entries.insert(
            key,
            Entry {
                data: Arc::clone(&data),
                bytes,
                stamp,
            },
        );
        self.recency.insert(stamp, key);
        self.used += bytes;
        self.evict_to(self.capacity, Some(key));
        data
    }

    /// Cached value of `key`, loading it through `loader` on a miss.
    ///
    /// # Errors
    /// Whatever `loader` returns; no entry is created in that case.
    pub fn get_or_load<L: ArrayLoader + ?Sized>(
        &mut self,
        key: CacheKey,
        loader: &L,
    ) -> Result<Arc<CachedArray>, ExodusError> {
        self.get_or_insert_with(key, || loader.load(&key))
    }

    /// Like [`get_or_load`](Self::get_or_load) with a closure as the loader.
    pub fn get_or_insert_with<F>(&mut self, key: CacheKey, make: F) -> Result<Arc<CachedArray>, ExodusError>
    where
        F: FnOnce() -> Result<CachedArray, ExodusError>,
    {
        if let Some(hit) = self.get(&key) {
            self.hits += 1;
            log::trace!("cache hit {key:?}");
            return Ok(hit);
        }
        self.misses += 1;
        log::trace!("cache miss {key:?}");
        let array = make()?;
        Ok(self.insert(key, array))
    }

    pub fn remove(&mut self, key: &CacheKey) -> Option<Arc<CachedArray>> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.stamp);
        self.used -= entry.bytes;
        Some(entry.data)
    }

    /// Remove every entry matching `pattern`. Returns how many were removed.
    pub fn invalidate(&mut self, pattern: &CachePattern) -> usize {
        let doomed: Vec<CacheKey> = self
            .entries
            .keys()
            .filter(|k| pattern.matches(k))
            .copied()
            .collect();
        for key in &doomed {
            self.remove(key);
        }
        if !doomed.is_empty() {
            log::debug!("invalidated {} cache entries", doomed.len());
        }
        doomed.len()
    }

    /// Drop every derived entry.
    pub fn invalidate_derived(&mut self) -> usize {
        let doomed: Vec<CacheKey> = self
            .entries
            .keys()
            .filter(|k| k.key_type.is_derived())
            .copied()
            .collect();
        for key in &doomed {
            self.remove(key);
        }
        doomed.len()
    }

    /// Bring the cache in line with catalog generation `generation`,
    /// dropping derived entries if it advanced. Returns whether anything was
    /// dropped or the generation was new.
    pub fn sync_generation(&mut self, generation: u64) -> bool {
        if self.observed_generation == Some(generation) {
            return false;
        }
        self.invalidate_derived();
        self.observed_generation = Some(generation);
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
        self.used = 0;
    }

    fn evict_to(&mut self, budget: usize, keep: Option<CacheKey>) {
        let mut evicted = 0usize;
        while self.used > budget {
            let victim = self
                .recency
                .values()
                .find(|k| Some(**k) != keep)
                .copied();
            let Some(victim) = victim else {
                break;
            };
            self.remove(&victim);
            evicted += 1;
        }
        if evicted > 0 {
            log::debug!(
                "evicted {evicted} cache entries; {} of {} bytes in use",
                self.used,
                self.capacity
            );
        }
    }
}

impl InvalidateCache for ArrayCache {
    fn invalidate_cache(&mut self) {
        self.clear();
        self.observed_generation = None;
    }
}

impl GenerationTracked for ArrayCache {
    fn observed_generation(&self) -> Option<u64> {
        self.observed_generation
    }
}
