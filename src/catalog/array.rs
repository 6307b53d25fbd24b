//! Array descriptors and truth tables.

use crate::catalog::object::ObjectType;
use crate::mesh_error::ExodusError;
use itertools::Itertools;
use std::fmt;

/// Which variable list an array belongs to.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub enum VariableScope {
    /// Point (nodal) variables. Defined everywhere.
    Nodal,
    /// Per-object variables of one block or set type.
    Object(ObjectType),
}

impl fmt::Display for VariableScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableScope::Nodal => f.write_str("nodal"),
            VariableScope::Object(t) => write!(f, "{t}"),
        }
    }
}

/// How raw variables were aggregated into one array.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum GlomKind {
    Scalar,
    Vector2,
    Vector3,
    SymmetricTensor,
    IntegrationPoint,
}

/// Numeric storage of a materialized array.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum StorageKind {
    Float64,
    Int64,
}

/// Where an array's values come from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ArraySource {
    Result,
    Attribute,
    Map,
    Generated,
}

/// One (possibly multi-component) array as presented to consumers.
///
/// # Invariants
/// - `constituent_names.len() == constituent_indices.len() == component_count`
/// - `defined_on.len()` equals the number of objects in the scope (1 for nodal).
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayDescriptor {
    pub name: String,
    pub component_count: usize,
    pub glom_kind: GlomKind,
    pub storage_kind: StorageKind,
    pub source: ArraySource,
    pub enabled: bool,
    pub constituent_names: Vec<String>,
    /// 1-based positions in the store's flat variable list.
    pub constituent_indices: Vec<u32>,
    /// Truth bitmap indexed by object index within the scope's type.
    pub defined_on: Vec<bool>,
}

impl ArrayDescriptor {
    /// Single-component result array for raw variable `index` (0-based).
    pub fn scalar(name: &str, index: usize, truth: &TruthTable) -> Self {
        ArrayDescriptor {
            name: name.to_string(),
            component_count: 1,
            glom_kind: GlomKind::Scalar,
            storage_kind: StorageKind::Float64,
            source: ArraySource::Result,
            enabled: false,
            constituent_names: vec![name.to_string()],
            constituent_indices: vec![index as u32 + 1],
            defined_on: truth.column(index),
        }
    }

    pub fn is_defined_on(&self, object: usize) -> bool {
        self.defined_on.get(object).copied().unwrap_or(false)
    }
}

/// Object-by-variable booleans recording which variables are stored where.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TruthTable {
    objects: usize,
    variables: usize,
    cells: Vec<bool>,
}

impl TruthTable {
    /// Table with every entry set to `value`.
    pub fn filled(objects: usize, variables: usize, value: bool) -> Self {
        TruthTable {
            objects,
            variables,
            cells: vec![value; objects * variables],
        }
    }

    /// Build from object-major rows.
    ///
    /// # Errors
    /// `MetadataRead` when the rows are ragged.
    pub fn from_rows(rows: Vec<Vec<bool>>) -> Result<Self, ExodusError> {
        let objects = rows.len();
        let variables = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != variables) {
            return Err(ExodusError::metadata(None, "ragged truth table"));
        }
        Ok(TruthTable {
            objects,
            variables,
            cells: rows.into_iter().flatten().collect(),
        })
    }

    #[inline]
    pub fn objects(&self) -> usize {
        self.objects
    }

    #[inline]
    pub fn variables(&self) -> usize {
        self.variables
    }

    /// Entry for `(object, variable)`; out-of-range entries read as `false`.
    #[inline]
    pub fn get(&self, object: usize, variable: usize) -> bool {
        if object >= self.objects || variable >= self.variables {
            return false;
        }
        self.cells[object * self.variables + variable]
    }

    pub fn set(&mut self, object: usize, variable: usize, value: bool) {
        if object < self.objects && variable < self.variables {
            self.cells[object * self.variables + variable] = value;
        }
    }

    /// Per-object values for one variable.
    pub fn column(&self, variable: usize) -> Vec<bool> {
        (0..self.objects).map(|o| self.get(o, variable)).collect()
    }

    /// True when all listed variables (0-based) have identical columns.
    pub fn columns_match(&self, variables: &[usize]) -> bool {
        !variables.is_empty() && variables.iter().map(|&v| self.column(v)).all_equal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truth_table_rows_and_columns() {
        let tt = TruthTable::from_rows(vec![vec![true, false, true], vec![true, true, true]])
            .unwrap();
        assert_eq!(tt.objects(), 2);
        assert_eq!(tt.variables(), 3);
        assert_eq!(tt.column(1), vec![false, true]);
        assert!(tt.columns_match(&[0, 2]));
        assert!(!tt.columns_match(&[0, 1]));
        assert!(!tt.get(5, 0));
    }

    #[test]
    fn ragged_rows_rejected() {
        let err = TruthTable::from_rows(vec![vec![true], vec![true, false]]).unwrap_err();
        assert!(matches!(err, ExodusError::MetadataRead { .. }));
    }

    #[test]
    fn scalar_descriptor_is_consistent() {
        let tt = TruthTable::filled(3, 2, true);
        let d = ArrayDescriptor::scalar("Temp", 1, &tt);
        assert_eq!(d.constituent_indices, vec![2]);
        assert_eq!(d.defined_on.len(), 3);
        assert_eq!(d.component_count, d.constituent_names.len());
        assert!(!d.enabled);
    }
}
