//! In-memory raw store.
//!
//! [`InMemoryStore`] holds a complete model in plain vectors. It is built
//! with `add_*` calls, backs the text store, and lets tests inject backend
//! failures with [`InMemoryStore::fail`].

use crate::catalog::array::{TruthTable, VariableScope};
use crate::catalog::object::{ObjectType, TimeIndex, UserId};
use crate::io::{ModelParams, ObjectParams, RawStore, SetEntries, SideSetNodes};
use crate::mesh_error::ExodusError;
use hashbrown::{HashMap, HashSet};
use std::collections::BTreeMap;

/// A backend call that should fail, for exercising degraded paths.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FailPoint {
    ModelParams,
    ObjectIds(ObjectType),
    VariableNames(VariableScope),
    AttributeNames(ObjectType, UserId),
    Connectivity(ObjectType, UserId),
    Set(ObjectType, UserId),
    Result {
        scope: VariableScope,
        object: Option<UserId>,
        variable: u32,
    },
    Coordinates,
}

#[derive(Clone, Debug, Default)]
struct StoredObject {
    id: UserId,
    name: String,
    params: ObjectParams,
    connectivity: Vec<i64>,
    set: SetEntries,
    sides: SideSetNodes,
    attributes: Vec<(String, Vec<f64>)>,
    map: Vec<i64>,
}

type ResultKey = (VariableScope, Option<UserId>, u32, usize);

/// A complete model held in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    title: String,
    dimension: usize,
    coordinates: Vec<Vec<f64>>,
    times: Vec<f64>,
    objects: BTreeMap<ObjectType, Vec<StoredObject>>,
    variables: BTreeMap<VariableScope, Vec<String>>,
    results: HashMap<ResultKey, Vec<f64>>,
    truth_overrides: BTreeMap<ObjectType, TruthTable>,
    failures: HashSet<FailPoint>,
    closed: bool,
}

impl InMemoryStore {
    /// Empty model of the given spatial dimension.
    pub fn new(title: impl Into<String>, dimension: usize) -> Self {
        InMemoryStore {
            title: title.into(),
            dimension,
            coordinates: vec![Vec::new(); dimension],
            ..Default::default()
        }
    }

    /// Append nodes; only the first `dimension` coordinates of each are kept.
    pub fn add_nodes(&mut self, nodes: &[[f64; 3]]) -> &mut Self {
        for node in nodes {
            for (col, &v) in self.coordinates.iter_mut().zip(node.iter()) {
                col.push(v);
            }
        }
        self
    }

    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.title = title.to_string();
        self
    }

    pub fn set_times(&mut self, times: Vec<f64>) -> &mut Self {
        self.times = times;
        self
    }

    fn num_nodes(&self) -> usize {
        self.coordinates.first().map_or(0, Vec::len)
    }

    fn push(&mut self, t: ObjectType, obj: StoredObject) -> &mut Self {
        self.objects.entry(t).or_default().push(obj);
        self
    }

    /// Add a block of `t` whose entry-major 1-based `connectivity` has
    /// `nodes_per_entry` nodes per entry.
    pub fn add_block(
        &mut self,
        t: ObjectType,
        id: i64,
        name: &str,
        type_name: &str,
        nodes_per_entry: usize,
        connectivity: Vec<i64>,
    ) -> &mut Self {
        let size = connectivity.len().checked_div(nodes_per_entry).unwrap_or(0);
        self.push(
            t,
            StoredObject {
                id: UserId(id),
                name: name.to_string(),
                params: ObjectParams {
                    size,
                    type_name: type_name.to_string(),
                    nodes_per_entry,
                    ..Default::default()
                },
                connectivity,
                ..Default::default()
            },
        )
    }

    /// Add an empty block with an explicit entry count and no connectivity.
    pub fn add_sized_block(
        &mut self,
        t: ObjectType,
        id: i64,
        type_name: &str,
        nodes_per_entry: usize,
        size: usize,
    ) -> &mut Self {
        self.push(
            t,
            StoredObject {
                id: UserId(id),
                params: ObjectParams {
                    size,
                    type_name: type_name.to_string(),
                    nodes_per_entry,
                    ..Default::default()
                },
                ..Default::default()
            },
        )
    }

    /// Attach a named per-entry attribute to an existing block.
    pub fn add_attribute(&mut self, t: ObjectType, id: i64, name: &str, values: Vec<f64>) -> &mut Self {
        if let Some(obj) = self.find_mut(t, UserId(id)) {
            obj.attributes.push((name.to_string(), values));
            obj.params.attribute_count = obj.attributes.len();
        }
        self
    }

    pub fn add_node_set(&mut self, id: i64, name: &str, nodes: Vec<i64>) -> &mut Self {
        self.add_set(ObjectType::NodeSet, id, name, nodes, Vec::new())
    }

    /// Add a node, edge, face or element set. `orientations` may be empty.
    pub fn add_set(
        &mut self,
        t: ObjectType,
        id: i64,
        name: &str,
        entries: Vec<i64>,
        orientations: Vec<i32>,
    ) -> &mut Self {
        self.push(
            t,
            StoredObject {
                id: UserId(id),
                name: name.to_string(),
                params: ObjectParams {
                    size: entries.len(),
                    ..Default::default()
                },
                set: SetEntries {
                    entries,
                    orientations,
                },
                ..Default::default()
            },
        )
    }

    pub fn add_side_set(
        &mut self,
        id: i64,
        name: &str,
        nodes_per_side: Vec<usize>,
        nodes: Vec<i64>,
    ) -> &mut Self {
        self.push(
            ObjectType::SideSet,
            StoredObject {
                id: UserId(id),
                name: name.to_string(),
                params: ObjectParams {
                    size: nodes_per_side.len(),
                    ..Default::default()
                },
                sides: SideSetNodes {
                    nodes_per_side,
                    nodes,
                },
                ..Default::default()
            },
        )
    }

    pub fn add_map(&mut self, t: ObjectType, id: i64, name: &str, values: Vec<i64>) -> &mut Self {
        self.push(
            t,
            StoredObject {
                id: UserId(id),
                name: name.to_string(),
                params: ObjectParams {
                    size: values.len(),
                    ..Default::default()
                },
                map: values,
                ..Default::default()
            },
        )
    }

    pub fn set_variables(&mut self, scope: VariableScope, names: &[&str]) -> &mut Self {
        self.variables
            .insert(scope, names.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Store one variable (1-based) of one object at one time step.
    pub fn set_result(
        &mut self,
        scope: VariableScope,
        object: Option<i64>,
        variable: u32,
        time: usize,
        values: Vec<f64>,
    ) -> &mut Self {
        self.results
            .insert((scope, object.map(UserId), variable, time), values);
        self
    }

    /// Replace the derived truth table of `t`.
    pub fn set_truth_table(&mut self, t: ObjectType, table: TruthTable) -> &mut Self {
        self.truth_overrides.insert(t, table);
        self
    }

    pub fn fail(&mut self, point: FailPoint) -> &mut Self {
        self.failures.insert(point);
        self
    }

    fn check(&self, point: FailPoint) -> Result<(), ExodusError> {
        if self.closed {
            return Err(ExodusError::Io("store is closed".into()));
        }
        if self.failures.contains(&point) {
            return Err(ExodusError::Io(format!("injected failure: {point:?}")));
        }
        Ok(())
    }

    fn list(&self, t: ObjectType) -> &[StoredObject] {
        self.objects.get(&t).map_or(&[], Vec::as_slice)
    }

    fn find(&self, t: ObjectType, id: UserId) -> Result<&StoredObject, ExodusError> {
        self.list(t).iter().find(|o| o.id == id).ok_or_else(|| {
            ExodusError::array_read(format!("{t} {id}"), "no such object")
        })
    }

    fn find_mut(&mut self, t: ObjectType, id: UserId) -> Option<&mut StoredObject> {
        self.objects.get_mut(&t)?.iter_mut().find(|o| o.id == id)
    }

    fn total_size(&self, t: ObjectType) -> usize {
        self.list(t).iter().map(|o| o.params.size).sum()
    }
}

impl RawStore for InMemoryStore {
    fn model_params(&self) -> Result<ModelParams, ExodusError> {
        self.check(FailPoint::ModelParams)
            .map_err(|e| ExodusError::metadata(None, e.to_string()))?;
        Ok(ModelParams {
            title: self.title.clone(),
            dimension: self.dimension,
            num_nodes: self.num_nodes(),
            num_edges: self.total_size(ObjectType::EdgeBlock),
            num_faces: self.total_size(ObjectType::FaceBlock),
            num_elems: self.total_size(ObjectType::ElemBlock),
        })
    }

    fn time_values(&self) -> Result<Vec<f64>, ExodusError> {
        Ok(self.times.clone())
    }

    fn object_ids(&self, t: ObjectType) -> Result<Vec<UserId>, ExodusError> {
        self.check(FailPoint::ObjectIds(t))
            .map_err(|e| ExodusError::metadata(Some(t), e.to_string()))?;
        Ok(self.list(t).iter().map(|o| o.id).collect())
    }

    fn object_names(&self, t: ObjectType) -> Result<Vec<String>, ExodusError> {
        Ok(self.list(t).iter().map(|o| o.name.clone()).collect())
    }

    fn object_params(&self, t: ObjectType, id: UserId) -> Result<ObjectParams, ExodusError> {
        self.find(t, id)
            .map(|o| o.params.clone())
            .map_err(|e| ExodusError::metadata(Some(t), e.to_string()))
    }

    fn attribute_names(&self, t: ObjectType, id: UserId) -> Result<Vec<String>, ExodusError> {
        self.check(FailPoint::AttributeNames(t, id))?;
        Ok(self
            .find(t, id)?
            .attributes
            .iter()
            .map(|(n, _)| n.clone())
            .collect())
    }

    fn variable_names(&self, scope: VariableScope) -> Result<Vec<String>, ExodusError> {
        let t = match scope {
            VariableScope::Nodal => None,
            VariableScope::Object(t) => Some(t),
        };
        self.check(FailPoint::VariableNames(scope))
            .map_err(|e| ExodusError::metadata(t, e.to_string()))?;
        Ok(self.variables.get(&scope).cloned().unwrap_or_default())
    }

    fn truth_table(&self, t: ObjectType) -> Result<TruthTable, ExodusError> {
        if let Some(tt) = self.truth_overrides.get(&t) {
            return Ok(tt.clone());
        }
        let scope = VariableScope::Object(t);
        let nvars = self.variables.get(&scope).map_or(0, Vec::len);
        let rows = self
            .list(t)
            .iter()
            .map(|o| {
                (1..=nvars as u32)
                    .map(|v| {
                        self.results
                            .keys()
                            .any(|&(s, obj, var, _)| s == scope && obj == Some(o.id) && var == v)
                    })
                    .collect()
            })
            .collect();
        TruthTable::from_rows(rows)
    }

    fn read_array(
        &self,
        scope: VariableScope,
        object: Option<UserId>,
        variable: u32,
        time: TimeIndex,
    ) -> Result<Vec<f64>, ExodusError> {
        let what = || format!("{scope} variable {variable} at step {}", time.0);
        self.check(FailPoint::Result {
            scope,
            object,
            variable,
        })
        .map_err(|e| ExodusError::array_read(what(), e.to_string()))?;
        self.results
            .get(&(scope, object, variable, time.0))
            .cloned()
            .ok_or_else(|| ExodusError::array_read(what(), "no values stored"))
    }

    fn read_connectivity(&self, t: ObjectType, id: UserId) -> Result<Vec<i64>, ExodusError> {
        self.check(FailPoint::Connectivity(t, id))
            .map_err(|e| ExodusError::array_read(format!("{t} {id} connectivity"), e.to_string()))?;
        let obj = self.find(t, id)?;
        if obj.connectivity.len() != obj.params.size * obj.params.nodes_per_entry {
            return Err(ExodusError::array_read(
                format!("{t} {id} connectivity"),
                "block has no stored connectivity",
            ));
        }
        Ok(obj.connectivity.clone())
    }

    fn read_set(&self, t: ObjectType, id: UserId) -> Result<SetEntries, ExodusError> {
        self.check(FailPoint::Set(t, id))
            .map_err(|e| ExodusError::array_read(format!("{t} {id}"), e.to_string()))?;
        Ok(self.find(t, id)?.set.clone())
    }

    fn read_side_set_nodes(&self, id: UserId) -> Result<SideSetNodes, ExodusError> {
        self.check(FailPoint::Set(ObjectType::SideSet, id))
            .map_err(|e| ExodusError::array_read(format!("side set {id}"), e.to_string()))?;
        Ok(self.find(ObjectType::SideSet, id)?.sides.clone())
    }

    fn read_attribute(
        &self,
        t: ObjectType,
        id: UserId,
        attribute: usize,
    ) -> Result<Vec<f64>, ExodusError> {
        self.find(t, id)?
            .attributes
            .get(attribute)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| {
                ExodusError::array_read(format!("{t} {id} attribute {attribute}"), "no such attribute")
            })
    }

    fn read_map(&self, t: ObjectType, id: UserId) -> Result<Vec<i64>, ExodusError> {
        Ok(self.find(t, id)?.map.clone())
    }

    fn read_coordinates(&self) -> Result<Vec<Vec<f64>>, ExodusError> {
        self.check(FailPoint::Coordinates)
            .map_err(|e| ExodusError::array_read("coordinates", e.to_string()))?;
        Ok(self.coordinates.clone())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
