//! Invalidation hooks for state derived from the object catalog.

/// Anything holding state computed from the catalog (assembled topology,
/// cached arrays) implements this.
pub trait InvalidateCache {
    /// Drop all derived state so the next request recomputes it.
    fn invalidate_cache(&mut self);
}

impl<T: InvalidateCache + ?Sized> InvalidateCache for Box<T> {
    #[inline]
    fn invalidate_cache(&mut self) {
        (**self).invalidate_cache();
    }
}

/// Derived state that remembers which catalog generation it was built from.
pub trait GenerationTracked: InvalidateCache {
    /// Generation last observed, or `None` when nothing has been built.
    fn observed_generation(&self) -> Option<u64>;

    /// True when `current` differs from the observed generation.
    #[inline]
    fn is_stale(&self, current: u64) -> bool {
        self.observed_generation() != Some(current)
    }
}
