//! Object types, index newtypes, and per-object descriptors.
//!
//! Exodus-style stores group their entities into twelve object types: three
//! kinds of blocks, five kinds of sets and four kinds of maps. Objects are
//! addressed by their position in file order ([`ObjectIndex`]), which stays
//! valid for the lifetime of a loaded catalog; the user-assigned [`UserId`]
//! is only used for presentation order.

use crate::topology::cell_type::CellType;
use std::fmt;

/// File-assigned object identifier. Unique within an object type, not dense.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct UserId(pub i64);

/// Position of an object within its type, in file order.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct ObjectIndex(pub u32);

/// Position of an array descriptor within its scope.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct ArrayIndex(pub u32);

/// Zero-based time step index.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct TimeIndex(pub usize);

impl ObjectIndex {
    #[inline]
    pub fn get(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn from_usize(i: usize) -> Self {
        ObjectIndex(i as u32)
    }
}

impl ArrayIndex {
    #[inline]
    pub fn get(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn from_usize(i: usize) -> Self {
        ArrayIndex(i as u32)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Broad class of an object type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObjectClass {
    Block,
    Set,
    Map,
}

/// The twelve object types of an Exodus-style model, in file enumeration order.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub enum ObjectType {
    EdgeBlock,
    FaceBlock,
    ElemBlock,
    NodeSet,
    EdgeSet,
    FaceSet,
    SideSet,
    ElemSet,
    NodeMap,
    EdgeMap,
    FaceMap,
    ElemMap,
}

impl ObjectType {
    /// All types in the order metadata is enumerated from the store.
    pub const ALL: [ObjectType; 12] = [
        ObjectType::EdgeBlock,
        ObjectType::FaceBlock,
        ObjectType::ElemBlock,
        ObjectType::NodeSet,
        ObjectType::EdgeSet,
        ObjectType::FaceSet,
        ObjectType::SideSet,
        ObjectType::ElemSet,
        ObjectType::NodeMap,
        ObjectType::EdgeMap,
        ObjectType::FaceMap,
        ObjectType::ElemMap,
    ];

    /// Types that contribute cells, in the order their cells are concatenated
    /// into the output mesh: element, face, edge blocks, then sets.
    pub const CONNECTIVITY_ORDER: [ObjectType; 8] = [
        ObjectType::ElemBlock,
        ObjectType::FaceBlock,
        ObjectType::EdgeBlock,
        ObjectType::ElemSet,
        ObjectType::SideSet,
        ObjectType::FaceSet,
        ObjectType::EdgeSet,
        ObjectType::NodeSet,
    ];

    pub fn class(self) -> ObjectClass {
        match self {
            ObjectType::EdgeBlock | ObjectType::FaceBlock | ObjectType::ElemBlock => {
                ObjectClass::Block
            }
            ObjectType::NodeSet
            | ObjectType::EdgeSet
            | ObjectType::FaceSet
            | ObjectType::SideSet
            | ObjectType::ElemSet => ObjectClass::Set,
            ObjectType::NodeMap | ObjectType::EdgeMap | ObjectType::FaceMap | ObjectType::ElemMap => {
                ObjectClass::Map
            }
        }
    }

    #[inline]
    pub fn is_block(self) -> bool {
        self.class() == ObjectClass::Block
    }

    #[inline]
    pub fn is_set(self) -> bool {
        self.class() == ObjectClass::Set
    }

    #[inline]
    pub fn is_map(self) -> bool {
        self.class() == ObjectClass::Map
    }

    /// Block type whose cells an edge/face/element set references.
    pub fn referenced_block_type(self) -> Option<ObjectType> {
        match self {
            ObjectType::EdgeSet => Some(ObjectType::EdgeBlock),
            ObjectType::FaceSet => Some(ObjectType::FaceBlock),
            ObjectType::ElemSet => Some(ObjectType::ElemBlock),
            _ => None,
        }
    }

    /// Block type a map renumbers, or `None` for node maps.
    pub fn mapped_block_type(self) -> Option<ObjectType> {
        match self {
            ObjectType::EdgeMap => Some(ObjectType::EdgeBlock),
            ObjectType::FaceMap => Some(ObjectType::FaceBlock),
            ObjectType::ElemMap => Some(ObjectType::ElemBlock),
            _ => None,
        }
    }

    /// Human readable name, e.g. `"element block"`.
    pub fn name(self) -> &'static str {
        match self {
            ObjectType::EdgeBlock => "edge block",
            ObjectType::FaceBlock => "face block",
            ObjectType::ElemBlock => "element block",
            ObjectType::NodeSet => "node set",
            ObjectType::EdgeSet => "edge set",
            ObjectType::FaceSet => "face set",
            ObjectType::SideSet => "side set",
            ObjectType::ElemSet => "element set",
            ObjectType::NodeMap => "node map",
            ObjectType::EdgeMap => "edge map",
            ObjectType::FaceMap => "face map",
            ObjectType::ElemMap => "element map",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fields shared by every object.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectDescriptor {
    pub id: UserId,
    pub name: String,
    /// Number of entries (elements, nodes, sides, ...).
    pub size: usize,
    pub enabled: bool,
}

/// A named per-entry attribute stored on a block.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeDescriptor {
    pub name: String,
    pub enabled: bool,
}

/// Block metadata.
///
/// `grid_offset` is `Some` exactly when the block is enabled and holds the
/// position of its first cell in the assembled output.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockDescriptor {
    pub base: ObjectDescriptor,
    pub type_name: String,
    /// Nodes, edges and faces per entry.
    pub bounds_per_entry: [u32; 3],
    pub attributes: Vec<AttributeDescriptor>,
    /// `None` when the type name is not a supported cell kind.
    pub cell_shape: Option<CellType>,
    /// 1-based position of the first entry in the file-wide numbering of this type.
    pub file_offset: usize,
    pub grid_offset: Option<usize>,
}

/// Set metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct SetDescriptor {
    pub base: ObjectDescriptor,
    pub distribution_factor_count: usize,
    pub file_offset: usize,
    pub grid_offset: Option<usize>,
}

/// Map metadata. `base.size` is the model's entity count for the mapped type.
#[derive(Clone, Debug, PartialEq)]
pub struct MapDescriptor {
    pub base: ObjectDescriptor,
}

/// Closed set of object kinds held by the catalog.
#[derive(Clone, Debug, PartialEq)]
pub enum ObjectKind {
    Block(BlockDescriptor),
    Set(SetDescriptor),
    Map(MapDescriptor),
}

impl ObjectKind {
    pub fn base(&self) -> &ObjectDescriptor {
        match self {
            ObjectKind::Block(b) => &b.base,
            ObjectKind::Set(s) => &s.base,
            ObjectKind::Map(m) => &m.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut ObjectDescriptor {
        match self {
            ObjectKind::Block(b) => &mut b.base,
            ObjectKind::Set(s) => &mut s.base,
            ObjectKind::Map(m) => &mut m.base,
        }
    }

    /// Output position of the first cell, for enabled blocks and sets.
    pub fn grid_offset(&self) -> Option<usize> {
        match self {
            ObjectKind::Block(b) => b.grid_offset,
            ObjectKind::Set(s) => s.grid_offset,
            ObjectKind::Map(_) => None,
        }
    }

    pub fn file_offset(&self) -> Option<usize> {
        match self {
            ObjectKind::Block(b) => Some(b.file_offset),
            ObjectKind::Set(s) => Some(s.file_offset),
            ObjectKind::Map(_) => None,
        }
    }

    pub(crate) fn set_grid_offset(&mut self, offset: Option<usize>) {
        match self {
            ObjectKind::Block(b) => b.grid_offset = offset,
            ObjectKind::Set(s) => s.grid_offset = offset,
            ObjectKind::Map(_) => {}
        }
    }

    pub fn as_block(&self) -> Option<&BlockDescriptor> {
        match self {
            ObjectKind::Block(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_block_mut(&mut self) -> Option<&mut BlockDescriptor> {
        match self {
            ObjectKind::Block(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&SetDescriptor> {
        match self {
            ObjectKind::Set(s) => Some(s),
            _ => None,
        }
    }
}
