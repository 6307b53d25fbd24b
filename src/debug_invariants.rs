use crate::mesh_error::ExodusError;

/// Structures with checkable internal invariants (grid offset partition,
/// point map density, topology row offsets).
pub trait DebugInvariants {
    /// Panic on a violated invariant in debug builds or with the
    /// `check-invariants` feature.
    fn debug_assert_invariants(&self);
    /// Check invariants and return the first violation found.
    fn validate_invariants(&self) -> Result<(), ExodusError>;
}

/// Run a fallible invariant check and panic with context when it fails.
/// Compiled out of release builds unless `check-invariants` is enabled.
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        if let Err(e) = $expr {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}
