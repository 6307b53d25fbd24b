//! Raw-store-backed loader used on cache misses.

use crate::catalog::array::VariableScope;
use crate::catalog::arrays::ArrayCatalog;
use crate::catalog::object::{ObjectIndex, ObjectType, TimeIndex, UserId};
use crate::catalog::objects::ObjectCatalog;
use crate::data::array_cache::{ArrayLoader, CacheKey, KeyType};
use crate::data::buffer::{CachedArray, interleave};
use crate::io::{ModelParams, RawStore, SetEntries, SideSetNodes};
use crate::mesh_error::ExodusError;
use crate::topology::connectivity::ConnectivitySource;

/// Resolves cache keys against the catalogs and reads through the store.
pub(crate) struct StoreLoader<'a, S: RawStore + ?Sized> {
    pub store: &'a S,
    pub model: &'a ModelParams,
    pub objects: &'a ObjectCatalog,
    pub arrays: &'a ArrayCatalog,
}

impl<S: RawStore + ?Sized> StoreLoader<'_, S> {
    fn user_id(&self, t: ObjectType, index: ObjectIndex) -> Result<UserId, ExodusError> {
        Ok(self.objects.object(t, index)?.base().id)
    }

    fn result(&self, key: &CacheKey, scope: VariableScope) -> Result<CachedArray, ExodusError> {
        let time = key.time.ok_or_else(|| {
            ExodusError::array_read(format!("{scope} array {}", key.array.0), "result arrays need a time step")
        })?;
        let desc = self.arrays.get(scope, key.array)?;
        let (object, expected) = match scope {
            VariableScope::Nodal => (None, self.model.num_nodes),
            VariableScope::Object(t) => {
                let obj = self.objects.object(t, key.object)?;
                (Some(obj.base().id), obj.base().size)
            }
        };
        let columns = desc
            .constituent_indices
            .iter()
            .map(|&v| {
                let col = self.store.read_array(scope, object, v, time)?;
                if col.len() != expected {
                    return Err(ExodusError::array_read(
                        format!("{} at step {}", desc.name, time.0),
                        format!("{} values, expected {expected}", col.len()),
                    ));
                }
                Ok(col)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CachedArray::real(desc.component_count, interleave(&columns)?))
    }

    fn connectivity(&self, t: ObjectType, index: ObjectIndex) -> Result<CachedArray, ExodusError> {
        let obj = self.objects.object(t, index)?;
        let block = obj
            .as_block()
            .ok_or_else(|| ExodusError::array_read(format!("{t}"), "not a block"))?;
        let npe = block.bounds_per_entry[0] as usize;
        let raw = self.store.read_connectivity(t, block.base.id)?;
        if raw.len() != npe * block.base.size {
            return Err(ExodusError::array_read(
                format!("{t} {} connectivity", block.base.id),
                format!("{} node references, expected {}", raw.len(), npe * block.base.size),
            ));
        }
        let num_nodes = self.model.num_nodes;
        let zero_based = raw
            .into_iter()
            .map(|n| {
                if n >= 1 && (n as usize) <= num_nodes {
                    Ok(n - 1)
                } else {
                    Err(ExodusError::InvalidPointReference { raw: n, num_nodes })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CachedArray::integer(npe, zero_based))
    }

    fn coordinates(&self) -> Result<CachedArray, ExodusError> {
        let mut columns = self.store.read_coordinates()?;
        columns.resize(3, vec![0.0; self.model.num_nodes]);
        columns.truncate(3);
        Ok(CachedArray::real(3, interleave(&columns)?))
    }
}

impl<S: RawStore + ?Sized> ArrayLoader for StoreLoader<'_, S> {
    fn load(&self, key: &CacheKey) -> Result<CachedArray, ExodusError> {
        match key.key_type {
            KeyType::Result(scope) => self.result(key, scope),
            KeyType::Connectivity(t) => self.connectivity(t, key.object),
            KeyType::Attribute(t) => {
                let id = self.user_id(t, key.object)?;
                Ok(CachedArray::real(1, self.store.read_attribute(t, id, key.array.get())?))
            }
            KeyType::Map(t) => {
                let id = self.user_id(t, key.object)?;
                Ok(CachedArray::integer(1, self.store.read_map(t, id)?))
            }
            KeyType::Coordinates => self.coordinates(),
            KeyType::ObjectIds | KeyType::GlobalElementIds | KeyType::GlobalNodeIds => Err(
                ExodusError::array_read(format!("{:?}", key.key_type), "generated arrays are not stored"),
            ),
        }
    }
}

impl<S: RawStore + ?Sized> ConnectivitySource for StoreLoader<'_, S> {
    fn set_entries(&self, t: ObjectType, index: ObjectIndex) -> Result<SetEntries, ExodusError> {
        let id = self.user_id(t, index)?;
        self.store.read_set(t, id)
    }

    fn side_set_nodes(&self, index: ObjectIndex) -> Result<SideSetNodes, ExodusError> {
        let id = self.user_id(ObjectType::SideSet, index)?;
        self.store.read_side_set_nodes(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::object::ArrayIndex;
    use crate::io::memory::{FailPoint, InMemoryStore};

    fn setup(store: &InMemoryStore) -> (ModelParams, ObjectCatalog, ArrayCatalog) {
        let model = store.model_params().unwrap();
        let mut objects = ObjectCatalog::new();
        let mut arrays = ArrayCatalog::new();
        let mut w = Vec::new();
        for t in ObjectType::ALL {
            objects.load_objects(store, t, &model, &mut w).unwrap();
        }
        arrays.load_scope(store, VariableScope::Nodal, 1, &mut w).unwrap();
        (model, objects, arrays)
    }

    fn store() -> InMemoryStore {
        let mut s = InMemoryStore::new("loader", 2);
        s.add_nodes(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])
            .add_block(ObjectType::ElemBlock, 1, "", "TRI3", 3, vec![1, 2, 3])
            .set_variables(VariableScope::Nodal, &["UX", "UY"])
            .set_result(VariableScope::Nodal, None, 1, 0, vec![1.0, 2.0, 3.0])
            .set_result(VariableScope::Nodal, None, 2, 0, vec![4.0, 5.0, 6.0]);
        s
    }

    #[test]
    fn vector_components_are_interleaved() {
        let s = store();
        let (model, objects, arrays) = setup(&s);
        let l = StoreLoader { store: &s, model: &model, objects: &objects, arrays: &arrays };
        let key = CacheKey::new(
            Some(TimeIndex(0)),
            KeyType::Result(VariableScope::Nodal),
            ObjectIndex(0),
            ArrayIndex(0),
        );
        let a = l.load(&key).unwrap();
        assert_eq!(a.components, 2);
        assert_eq!(a.as_real().unwrap(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn partial_component_failure_aborts_array() {
        let mut s = store();
        s.fail(FailPoint::Result { scope: VariableScope::Nodal, object: None, variable: 2 });
        let (model, objects, arrays) = setup(&s);
        let l = StoreLoader { store: &s, model: &model, objects: &objects, arrays: &arrays };
        let key = CacheKey::new(
            Some(TimeIndex(0)),
            KeyType::Result(VariableScope::Nodal),
            ObjectIndex(0),
            ArrayIndex(0),
        );
        assert!(matches!(l.load(&key), Err(ExodusError::ArrayRead { .. })));
    }

    #[test]
    fn connectivity_is_zero_based_and_coordinates_padded() {
        let s = store();
        let (model, objects, arrays) = setup(&s);
        let l = StoreLoader { store: &s, model: &model, objects: &objects, arrays: &arrays };
        let conn = l
            .load(&CacheKey::new(None, KeyType::Connectivity(ObjectType::ElemBlock), ObjectIndex(0), ArrayIndex(0)))
            .unwrap();
        assert_eq!(conn.as_integer().unwrap(), &[0, 1, 2]);
        let xyz = l.load(&CacheKey::global(KeyType::Coordinates)).unwrap();
        assert_eq!(xyz.components, 3);
        assert_eq!(&xyz.as_real().unwrap()[3..6], &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn out_of_range_node_is_rejected() {
        let mut s = InMemoryStore::new("bad", 2);
        s.add_nodes(&[[0.0; 3]; 2])
            .add_block(ObjectType::ElemBlock, 1, "", "BAR2", 2, vec![1, 5]);
        let (model, objects, arrays) = setup(&s);
        let l = StoreLoader { store: &s, model: &model, objects: &objects, arrays: &arrays };
        let err = l
            .load(&CacheKey::new(None, KeyType::Connectivity(ObjectType::ElemBlock), ObjectIndex(0), ArrayIndex(0)))
            .unwrap_err();
        assert_eq!(err, ExodusError::InvalidPointReference { raw: 5, num_nodes: 2 });
    }
}
