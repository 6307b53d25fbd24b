//! Metadata catalogs: objects (blocks, sets, maps) and the result arrays
//! defined on them.

pub mod array;
pub mod arrays;
pub mod glom;
pub mod object;
pub mod objects;

pub use array::{ArrayDescriptor, ArraySource, GlomKind, StorageKind, TruthTable, VariableScope};
pub use arrays::ArrayCatalog;
pub use object::{ArrayIndex, ObjectIndex, ObjectKind, ObjectType, TimeIndex, UserId};
pub use objects::ObjectCatalog;
