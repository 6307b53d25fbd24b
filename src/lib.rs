#![cfg_attr(docsrs, feature(doc_cfg))]
//! # exodus-sieve
//!
//! exodus-sieve is the metadata, caching and assembly core of an Exodus-style
//! finite-element mesh reader. A model stored as blocks, sets, maps and flat
//! per-object result variables is presented as one coherent, time-indexed
//! mesh whose arrays are grouped into scalars, vectors, symmetric tensors and
//! integration-point fields.
//!
//! ## Layers
//! - [`io`]: the [`RawStore`](io::RawStore) trait plus an in-memory and a
//!   line-oriented text store.
//! - [`catalog`]: object and array catalogs, truth tables and glomming.
//! - [`data`]: the LRU array cache and materialized buffers.
//! - [`topology`]: cell shapes, point squeezing and connectivity assembly.
//! - [`reader`]: the [`ExodusReader`](reader::ExodusReader) façade and output
//!   assembly.
//!
//! ## Determinism
//!
//! Objects are laid out by ascending user id, arrays are glommed left to
//! right and cells are emitted in a fixed type order, so the same model and
//! the same status settings always produce byte-identical output.
//!
//! ## Invariant checks
//!
//! Grid offsets, point maps and assembled topologies implement
//! [`DebugInvariants`]. Checks run in debug builds and, in release builds,
//! with the `check-invariants` feature.

pub mod catalog;
pub mod data;
pub mod debug_invariants;
pub mod io;
pub mod mesh_error;
pub mod reader;
pub mod topology;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::catalog::array::{
        ArrayDescriptor, ArraySource, GlomKind, StorageKind, TruthTable, VariableScope,
    };
    pub use crate::catalog::object::{ArrayIndex, ObjectIndex, ObjectType, TimeIndex, UserId};
    pub use crate::data::array_cache::{ArrayCache, ArrayLoader, CacheKey, CachePattern, KeyType};
    pub use crate::data::buffer::{ArrayValues, CachedArray};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::io::RawStore;
    pub use crate::io::exodus::AsciiExodusStore;
    pub use crate::io::memory::InMemoryStore;
    pub use crate::mesh_error::ExodusError;
    pub use crate::reader::{DataArray, ExodusReader, OutputMesh, ReaderConfig, SharedReader};
    pub use crate::topology::cell_type::CellType;
    pub use crate::topology::connectivity::Topology;
}

#[cfg(test)]
mod layout {
    use crate::data::array_cache::CacheKey;
    use static_assertions::assert_impl_all;

    assert_impl_all!(CacheKey: Copy, Eq, std::hash::Hash, Send, Sync);
    assert_impl_all!(crate::reader::ExodusReader<crate::io::memory::InMemoryStore>: Send);
}
