//! Raw store interface.
//!
//! A raw store is the low-level side of an Exodus-style model: it enumerates
//! objects and variables and hands back flat numeric buffers on demand. The
//! catalog, cache and assembly layers only talk to a store through
//! [`RawStore`], so a binary backend, the in-memory [`memory::InMemoryStore`]
//! and the text [`exodus::AsciiExodusStore`] are interchangeable.
//!
//! Conventions shared by every implementation:
//! - node, entry and variable numbers handed out by the store are 1-based;
//! - time indices are 0-based;
//! - results are read one variable of one object at one time step.

pub mod exodus;
pub mod memory;

use crate::catalog::array::{TruthTable, VariableScope};
use crate::catalog::object::{ObjectType, TimeIndex, UserId};
use crate::mesh_error::ExodusError;

/// Model-wide header values.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelParams {
    pub title: String,
    /// Spatial dimension (1, 2 or 3).
    pub dimension: usize,
    pub num_nodes: usize,
    pub num_edges: usize,
    pub num_faces: usize,
    pub num_elems: usize,
}

impl ModelParams {
    /// Entity count renumbered by a map of type `t`.
    pub fn entity_count(&self, t: ObjectType) -> usize {
        match t {
            ObjectType::NodeMap => self.num_nodes,
            ObjectType::EdgeMap => self.num_edges,
            ObjectType::FaceMap => self.num_faces,
            ObjectType::ElemMap => self.num_elems,
            _ => 0,
        }
    }
}

/// Per-object parameters. Block-only fields are zero/empty for sets and maps.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ObjectParams {
    /// Number of entries.
    pub size: usize,
    /// Element type name of a block, e.g. `HEX8`.
    pub type_name: String,
    pub nodes_per_entry: usize,
    pub edges_per_entry: usize,
    pub faces_per_entry: usize,
    pub attribute_count: usize,
    pub distribution_factor_count: usize,
}

/// Members of an edge, face or element set.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SetEntries {
    /// 1-based entity numbers in the file-wide numbering of the referenced type.
    pub entries: Vec<i64>,
    /// Per-entry orientation; empty when the set carries none.
    pub orientations: Vec<i32>,
}

/// Node listing of a side set: one count per side, then all nodes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SideSetNodes {
    pub nodes_per_side: Vec<usize>,
    /// 1-based node numbers, `nodes_per_side.iter().sum()` of them.
    pub nodes: Vec<i64>,
}

/// Backing store of an Exodus-style model.
///
/// Every method reports backend failures as an [`ExodusError`]; callers
/// decide whether a failure is fatal.
pub trait RawStore {
    fn model_params(&self) -> Result<ModelParams, ExodusError>;

    fn time_values(&self) -> Result<Vec<f64>, ExodusError>;

    /// Ids of all objects of type `t`, in file order.
    fn object_ids(&self, t: ObjectType) -> Result<Vec<UserId>, ExodusError>;

    /// Names parallel to [`RawStore::object_ids`]. May contain blanks.
    fn object_names(&self, t: ObjectType) -> Result<Vec<String>, ExodusError>;

    fn object_params(&self, t: ObjectType, id: UserId) -> Result<ObjectParams, ExodusError>;

    /// Attribute names of one block.
    fn attribute_names(&self, t: ObjectType, id: UserId) -> Result<Vec<String>, ExodusError>;

    /// Flat result variable list of one scope.
    fn variable_names(&self, scope: VariableScope) -> Result<Vec<String>, ExodusError>;

    /// Object-by-variable truth table of one block or set type.
    fn truth_table(&self, t: ObjectType) -> Result<TruthTable, ExodusError>;

    /// One variable (1-based `variable`) of one object at one time step.
    /// `object` is `None` for nodal variables.
    fn read_array(
        &self,
        scope: VariableScope,
        object: Option<UserId>,
        variable: u32,
        time: TimeIndex,
    ) -> Result<Vec<f64>, ExodusError>;

    /// Entry-major node connectivity of a block, 1-based.
    fn read_connectivity(&self, t: ObjectType, id: UserId) -> Result<Vec<i64>, ExodusError>;

    /// Members of a node, edge, face or element set.
    fn read_set(&self, t: ObjectType, id: UserId) -> Result<SetEntries, ExodusError>;

    fn read_side_set_nodes(&self, id: UserId) -> Result<SideSetNodes, ExodusError>;

    /// One attribute (0-based) of a block, one value per entry.
    fn read_attribute(
        &self,
        t: ObjectType,
        id: UserId,
        attribute: usize,
    ) -> Result<Vec<f64>, ExodusError>;

    fn read_map(&self, t: ObjectType, id: UserId) -> Result<Vec<i64>, ExodusError>;

    /// One coordinate column per spatial dimension.
    fn read_coordinates(&self) -> Result<Vec<Vec<f64>>, ExodusError>;

    /// Release backend resources. Reads after `close` may fail.
    fn close(&mut self) {}
}

impl<T: RawStore + ?Sized> RawStore for Box<T> {
    fn model_params(&self) -> Result<ModelParams, ExodusError> {
        (**self).model_params()
    }
    fn time_values(&self) -> Result<Vec<f64>, ExodusError> {
        (**self).time_values()
    }
    fn object_ids(&self, t: ObjectType) -> Result<Vec<UserId>, ExodusError> {
        (**self).object_ids(t)
    }
    fn object_names(&self, t: ObjectType) -> Result<Vec<String>, ExodusError> {
        (**self).object_names(t)
    }
    fn object_params(&self, t: ObjectType, id: UserId) -> Result<ObjectParams, ExodusError> {
        (**self).object_params(t, id)
    }
    fn attribute_names(&self, t: ObjectType, id: UserId) -> Result<Vec<String>, ExodusError> {
        (**self).attribute_names(t, id)
    }
    fn variable_names(&self, scope: VariableScope) -> Result<Vec<String>, ExodusError> {
        (**self).variable_names(scope)
    }
    fn truth_table(&self, t: ObjectType) -> Result<TruthTable, ExodusError> {
        (**self).truth_table(t)
    }
    fn read_array(
        &self,
        scope: VariableScope,
        object: Option<UserId>,
        variable: u32,
        time: TimeIndex,
    ) -> Result<Vec<f64>, ExodusError> {
        (**self).read_array(scope, object, variable, time)
    }
    fn read_connectivity(&self, t: ObjectType, id: UserId) -> Result<Vec<i64>, ExodusError> {
        (**self).read_connectivity(t, id)
    }
    fn read_set(&self, t: ObjectType, id: UserId) -> Result<SetEntries, ExodusError> {
        (**self).read_set(t, id)
    }
    fn read_side_set_nodes(&self, id: UserId) -> Result<SideSetNodes, ExodusError> {
        (**self).read_side_set_nodes(id)
    }
    fn read_attribute(
        &self,
        t: ObjectType,
        id: UserId,
        attribute: usize,
    ) -> Result<Vec<f64>, ExodusError> {
        (**self).read_attribute(t, id, attribute)
    }
    fn read_map(&self, t: ObjectType, id: UserId) -> Result<Vec<i64>, ExodusError> {
        (**self).read_map(t, id)
    }
    fn read_coordinates(&self) -> Result<Vec<Vec<f64>>, ExodusError> {
        (**self).read_coordinates()
    }
    fn close(&mut self) {
        (**self).close()
    }
}
