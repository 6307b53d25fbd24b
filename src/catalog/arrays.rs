//! Array catalog: glommed descriptors per variable scope.

use crate::catalog::array::{ArrayDescriptor, TruthTable, VariableScope};
use crate::catalog::glom::{glom, normalize_names};
use crate::catalog::object::{ArrayIndex, ObjectIndex, ObjectType};
use crate::io::RawStore;
use crate::mesh_error::ExodusError;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default)]
struct ScopeArrays {
    arrays: Vec<ArrayDescriptor>,
    truth: TruthTable,
}

/// Result arrays of every scope of one model.
#[derive(Clone, Debug, Default)]
pub struct ArrayCatalog {
    scopes: BTreeMap<VariableScope, ScopeArrays>,
}

impl ArrayCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.scopes.clear();
    }

    /// Read the variable names and truth table of `scope` and glom them.
    ///
    /// `object_count` is the number of objects of the scope's type (ignored
    /// for nodal variables). A truth table whose shape disagrees with the
    /// catalog is replaced by an all-true table and reported in `warnings`,
    /// as are rejected integration-point runs.
    ///
    /// # Errors
    /// `MetadataRead` when the variable names cannot be read; the scope is
    /// left without arrays.
    pub fn load_scope<S: RawStore + ?Sized>(
        &mut self,
        store: &S,
        scope: VariableScope,
        object_count: usize,
        warnings: &mut Vec<String>,
    ) -> Result<usize, ExodusError> {
        self.scopes.remove(&scope);
        let names = normalize_names(store.variable_names(scope)?);
        if names.is_empty() {
            return Ok(0);
        }
        let truth = match scope {
            VariableScope::Nodal => TruthTable::filled(1, names.len(), true),
            VariableScope::Object(t) => match store.truth_table(t) {
                Ok(tt) if tt.objects() == object_count && tt.variables() == names.len() => tt,
                Ok(tt) => {
                    let msg = format!(
                        "{t} truth table is {}x{}, expected {object_count}x{}; assuming all defined",
                        tt.objects(),
                        tt.variables(),
                        names.len()
                    );
                    log::warn!("{msg}");
                    warnings.push(msg);
                    TruthTable::filled(object_count, names.len(), true)
                }
                Err(e) => {
                    let msg = format!("{t} truth table unreadable ({e}); assuming all defined");
                    log::warn!("{msg}");
                    warnings.push(msg);
                    TruthTable::filled(object_count, names.len(), true)
                }
            },
        };
        let glommed = glom(&names, &truth);
        warnings.extend(glommed.warnings);
        let count = glommed.arrays.len();
        log::debug!("{scope}: {} variables glommed into {count} arrays", names.len());
        self.scopes.insert(
            scope,
            ScopeArrays {
                arrays: glommed.arrays,
                truth,
            },
        );
        Ok(count)
    }

    pub fn count(&self, scope: VariableScope) -> usize {
        self.scopes.get(&scope).map_or(0, |s| s.arrays.len())
    }

    pub fn arrays(&self, scope: VariableScope) -> &[ArrayDescriptor] {
        self.scopes.get(&scope).map_or(&[], |s| s.arrays.as_slice())
    }

    /// # Errors
    /// `IndexOutOfRange` for an invalid `index`.
    pub fn get(&self, scope: VariableScope, index: ArrayIndex) -> Result<&ArrayDescriptor, ExodusError> {
        let arrays = self.arrays(scope);
        arrays.get(index.get()).ok_or(ExodusError::IndexOutOfRange {
            what: "array",
            index: index.get(),
            len: arrays.len(),
        })
    }

    fn get_mut(
        &mut self,
        scope: VariableScope,
        index: ArrayIndex,
    ) -> Result<&mut ArrayDescriptor, ExodusError> {
        let scope_arrays = self.scopes.entry(scope).or_default();
        let len = scope_arrays.arrays.len();
        scope_arrays
            .arrays
            .get_mut(index.get())
            .ok_or(ExodusError::IndexOutOfRange {
                what: "array",
                index: index.get(),
                len,
            })
    }

    pub fn index_by_name(&self, scope: VariableScope, name: &str) -> Option<ArrayIndex> {
        self.arrays(scope)
            .iter()
            .position(|a| a.name == name)
            .map(ArrayIndex::from_usize)
    }

    /// Enabled arrays of `scope` in catalog order.
    pub fn enabled(&self, scope: VariableScope) -> impl Iterator<Item = (ArrayIndex, &ArrayDescriptor)> + '_ {
        self.arrays(scope)
            .iter()
            .enumerate()
            .filter(|(_, a)| a.enabled)
            .map(|(i, a)| (ArrayIndex::from_usize(i), a))
    }

    /// Returns whether the status changed.
    pub fn set_status(
        &mut self,
        scope: VariableScope,
        index: ArrayIndex,
        enabled: bool,
    ) -> Result<bool, ExodusError> {
        let array = self.get_mut(scope, index)?;
        let changed = array.enabled != enabled;
        array.enabled = enabled;
        Ok(changed)
    }

    pub fn set_all_status(&mut self, scope: VariableScope, enabled: bool) {
        if let Some(s) = self.scopes.get_mut(&scope) {
            s.arrays.iter_mut().for_each(|a| a.enabled = enabled);
        }
    }

    /// Raw truth table of one block or set type.
    pub fn truth(&self, t: ObjectType) -> Option<&TruthTable> {
        self.scopes.get(&VariableScope::Object(t)).map(|s| &s.truth)
    }

    /// Record that `array` turned out not to be stored on `object`: clears
    /// its defined-on bit and the truth entries of all its constituents.
    pub fn clear_truth(
        &mut self,
        scope: VariableScope,
        array: ArrayIndex,
        object: ObjectIndex,
    ) -> Result<(), ExodusError> {
        let scope_arrays = self.scopes.entry(scope).or_default();
        let len = scope_arrays.arrays.len();
        let desc = scope_arrays
            .arrays
            .get_mut(array.get())
            .ok_or(ExodusError::IndexOutOfRange {
                what: "array",
                index: array.get(),
                len,
            })?;
        if let Some(bit) = desc.defined_on.get_mut(object.get()) {
            *bit = false;
        }
        for &v in &desc.constituent_indices {
            scope_arrays
                .truth
                .set(object.get(), (v as usize).saturating_sub(1), false);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::array::GlomKind;
    use crate::io::memory::{FailPoint, InMemoryStore};

    fn store() -> InMemoryStore {
        let eb = VariableScope::Object(ObjectType::ElemBlock);
        let mut s = InMemoryStore::new("arrays", 3);
        s.add_nodes(&[[0.0; 3]; 4])
            .add_block(ObjectType::ElemBlock, 1, "a", "TET4", 4, vec![1, 2, 3, 4])
            .add_block(ObjectType::ElemBlock, 2, "b", "TET4", 4, vec![1, 2, 3, 4])
            .set_variables(VariableScope::Nodal, &["VelX", "VelY", "VelZ", " "])
            .set_variables(eb, &["P", "Q"])
            .set_result(eb, Some(1), 1, 0, vec![1.0])
            .set_result(eb, Some(2), 1, 0, vec![2.0])
            .set_result(eb, Some(2), 2, 0, vec![3.0]);
        s
    }

    #[test]
    fn nodal_scope_globs_and_names_blanks() {
        let mut cat = ArrayCatalog::new();
        let mut w = Vec::new();
        assert_eq!(cat.load_scope(&store(), VariableScope::Nodal, 1, &mut w).unwrap(), 2);
        let arrays = cat.arrays(VariableScope::Nodal);
        assert_eq!(arrays[0].glom_kind, GlomKind::Vector3);
        assert_eq!(arrays[1].name, "null_3");
        assert_eq!(cat.index_by_name(VariableScope::Nodal, "Vel"), Some(ArrayIndex(0)));
    }

    #[test]
    fn truth_repair_clears_bits() {
        let eb = VariableScope::Object(ObjectType::ElemBlock);
        let mut cat = ArrayCatalog::new();
        let mut w = Vec::new();
        cat.load_scope(&store(), eb, 2, &mut w).unwrap();
        assert_eq!(cat.arrays(eb)[1].defined_on, vec![false, true]);
        cat.clear_truth(eb, ArrayIndex(0), ObjectIndex(1)).unwrap();
        assert_eq!(cat.arrays(eb)[0].defined_on, vec![true, false]);
        assert!(!cat.truth(ObjectType::ElemBlock).unwrap().get(1, 0));
    }

    #[test]
    fn mismatched_truth_table_is_replaced() {
        let eb = VariableScope::Object(ObjectType::ElemBlock);
        let mut s = store();
        s.set_truth_table(ObjectType::ElemBlock, TruthTable::filled(1, 2, false));
        let mut cat = ArrayCatalog::new();
        let mut w = Vec::new();
        cat.load_scope(&s, eb, 2, &mut w).unwrap();
        assert_eq!(w.len(), 1);
        assert!(cat.arrays(eb).iter().all(|a| a.defined_on == vec![true, true]));
    }

    #[test]
    fn status_toggles() {
        let mut cat = ArrayCatalog::new();
        let mut w = Vec::new();
        cat.load_scope(&store(), VariableScope::Nodal, 1, &mut w).unwrap();
        assert!(cat.set_status(VariableScope::Nodal, ArrayIndex(0), true).unwrap());
        assert!(!cat.set_status(VariableScope::Nodal, ArrayIndex(0), true).unwrap());
        assert_eq!(cat.enabled(VariableScope::Nodal).count(), 1);
        cat.set_all_status(VariableScope::Nodal, true);
        assert_eq!(cat.enabled(VariableScope::Nodal).count(), 2);
        assert!(cat.set_status(VariableScope::Nodal, ArrayIndex(9), true).is_err());
    }

    #[test]
    fn unreadable_names_leave_scope_empty() {
        let mut s = store();
        s.fail(FailPoint::VariableNames(VariableScope::Nodal));
        let mut cat = ArrayCatalog::new();
        let mut w = Vec::new();
        assert!(cat.load_scope(&s, VariableScope::Nodal, 1, &mut w).is_err());
        assert_eq!(cat.count(VariableScope::Nodal), 0);
    }
}
