//! Output assembly: one coherent mesh for one time step.
//!
//! Cell arrays are global buffers over the assembled cells. Each enabled
//! object that defines an array contributes its slice at
//! `[grid_offset, grid_offset + size)`; every other range stays zero. Point
//! arrays are gathered through the topology's point map.

use crate::catalog::array::{ArraySource, StorageKind, VariableScope};
use crate::catalog::arrays::ArrayCatalog;
use crate::catalog::object::{ArrayIndex, ObjectIndex, ObjectType, TimeIndex};
use crate::catalog::objects::ObjectCatalog;
use crate::data::array_cache::{ArrayCache, ArrayLoader, CacheKey, KeyType};
use crate::data::buffer::{ArrayValues, CachedArray};
use crate::io::ModelParams;
use crate::mesh_error::ExodusError;
use crate::reader::config::ReaderConfig;
use crate::topology::connectivity::Topology;
use std::sync::Arc;

pub const OBJECT_ID_ARRAY: &str = "ObjectId";
pub const GLOBAL_ELEMENT_ID_ARRAY: &str = "GlobalElementId";
pub const GLOBAL_NODE_ID_ARRAY: &str = "GlobalNodeId";

const BLOCK_TYPES: [ObjectType; 3] = [
    ObjectType::ElemBlock,
    ObjectType::FaceBlock,
    ObjectType::EdgeBlock,
];
const MAP_TYPES: [ObjectType; 4] = [
    ObjectType::NodeMap,
    ObjectType::ElemMap,
    ObjectType::FaceMap,
    ObjectType::EdgeMap,
];

/// A named array attached to the output mesh.
#[derive(Clone, Debug, PartialEq)]
pub struct DataArray {
    pub name: String,
    pub components: usize,
    pub source: ArraySource,
    pub values: ArrayValues,
}

impl DataArray {
    pub fn tuples(&self) -> usize {
        self.values.len().checked_div(self.components).unwrap_or(0)
    }

    pub fn as_real(&self) -> Option<&[f64]> {
        match &self.values {
            ArrayValues::Real(v) => Some(v),
            ArrayValues::Integer(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<&[i64]> {
        match &self.values {
            ArrayValues::Integer(v) => Some(v),
            ArrayValues::Real(_) => None,
        }
    }
}

/// The assembled mesh of one time step.
#[derive(Clone, Debug)]
pub struct OutputMesh {
    pub time_index: TimeIndex,
    /// `0.0` for models without time steps.
    pub time_value: f64,
    pub points: Vec<[f64; 3]>,
    /// Shared with the reader until the next rebuild.
    pub topology: Arc<Topology>,
    pub point_data: Vec<DataArray>,
    pub cell_data: Vec<DataArray>,
}

impl OutputMesh {
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    pub fn num_cells(&self) -> usize {
        self.topology.num_cells()
    }

    pub fn point_array(&self, name: &str) -> Option<&DataArray> {
        self.point_data.iter().find(|a| a.name == name)
    }

    pub fn cell_array(&self, name: &str) -> Option<&DataArray> {
        self.cell_data.iter().find(|a| a.name == name)
    }
}

/// Catalog changes discovered while assembling, applied by the reader
/// once the borrowed catalogs are released.
#[derive(Debug, Default)]
pub(crate) struct CatalogRepairs {
    /// Arrays found missing on objects their truth table claims.
    pub truth: Vec<(VariableScope, ArrayIndex, ObjectIndex)>,
    /// Arrays whose shape conflicts with an earlier scope's array of the same name.
    pub disabled: Vec<(VariableScope, ArrayIndex)>,
}

/// Borrowed view of everything the assembler reads.
pub(crate) struct OutputContext<'a, L: ArrayLoader + ?Sized> {
    pub loader: &'a L,
    pub model: &'a ModelParams,
    pub objects: &'a ObjectCatalog,
    pub arrays: &'a ArrayCatalog,
    pub config: &'a ReaderConfig,
}

fn warn(warnings: &mut Vec<String>, msg: String) {
    log::warn!("{msg}");
    warnings.push(msg);
}

/// Pick the tuples of `raw` in order from `values`.
fn gather(values: &ArrayValues, components: usize, raw: &[usize]) -> ArrayValues {
    fn pick<T: Copy + Default>(src: &[T], c: usize, raw: &[usize]) -> Vec<T> {
        let mut out = Vec::with_capacity(raw.len() * c);
        for &r in raw {
            match src.get(r * c..(r + 1) * c) {
                Some(t) => out.extend_from_slice(t),
                None => out.extend(std::iter::repeat_n(T::default(), c)),
            }
        }
        out
    }
    match values {
        ArrayValues::Real(v) => ArrayValues::Real(pick(v, components, raw)),
        ArrayValues::Integer(v) => ArrayValues::Integer(pick(v, components, raw)),
    }
}

/// Cell array of one name, merged across object types.
struct MergedArray {
    name: String,
    components: usize,
    members: Vec<(ObjectType, ArrayIndex)>,
}

impl<L: ArrayLoader + ?Sized> OutputContext<'_, L> {
    /// Assemble the mesh at `time` on top of `topology`.
    ///
    /// # Errors
    /// `ArrayRead` when the coordinates cannot be read. Every other read
    /// failure degrades to zeros or a missing array plus a warning.
    pub fn assemble(
        &self,
        cache: &mut ArrayCache,
        topology: Arc<Topology>,
        time: TimeIndex,
        time_value: f64,
        warnings: &mut Vec<String>,
    ) -> Result<(OutputMesh, CatalogRepairs), ExodusError> {
        let mut repairs = CatalogRepairs::default();
        let raw_points = topology.raw_points();
        let points = self.points(cache, &raw_points, time, warnings)?;
        let mut point_data = self.point_arrays(cache, &raw_points, time, warnings);
        let mut cell_data = self.cell_arrays(cache, time, &mut repairs, warnings);
        cell_data.extend(self.attribute_arrays(cache, warnings));
        let (node_maps, cell_maps) = self.map_arrays(cache, &raw_points, warnings);
        point_data.extend(node_maps);
        cell_data.extend(cell_maps);
        self.procedural_arrays(cache, &raw_points, &mut point_data, &mut cell_data, warnings);
        Ok((
            OutputMesh {
                time_index: time,
                time_value,
                points,
                topology,
                point_data,
                cell_data,
            },
            repairs,
        ))
    }

    fn num_cells(&self) -> usize {
        self.objects.number_of_cells()
    }

    fn points(
        &self,
        cache: &mut ArrayCache,
        raw_points: &[usize],
        time: TimeIndex,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<[f64; 3]>, ExodusError> {
        let coords = cache.get_or_load(CacheKey::global(KeyType::Coordinates), self.loader)?;
        let xyz = coords
            .as_real()
            .ok_or_else(|| ExodusError::array_read("coordinates", "not real-valued"))?;
        let disp = if self.config.apply_displacements {
            self.displacement(cache, time, warnings)
        } else {
            None
        };
        let scale = self.config.displacement_magnitude;
        Ok(raw_points
            .iter()
            .map(|&r| {
                let mut p = [0.0; 3];
                if let Some(base) = xyz.get(r * 3..r * 3 + 3) {
                    p.copy_from_slice(base);
                }
                if let Some(d) = &disp {
                    let c = d.components;
                    if let Some(v) = d.as_real().and_then(|v| v.get(r * c..(r + 1) * c)) {
                        p.iter_mut().zip(v).for_each(|(x, dx)| *x += scale * dx);
                    }
                }
                p
            })
            .collect())
    }

    /// First nodal vector named `DISP*` with one component per model axis.
    fn displacement(
        &self,
        cache: &mut ArrayCache,
        time: TimeIndex,
        warnings: &mut Vec<String>,
    ) -> Option<Arc<CachedArray>> {
        let dim = self.model.dimension;
        let (i, desc) = self
            .arrays
            .arrays(VariableScope::Nodal)
            .iter()
            .enumerate()
            .find(|(_, a)| {
                a.component_count == dim
                    && (2..=3).contains(&dim)
                    && a.name.to_ascii_uppercase().starts_with("DISP")
            })?;
        let key = CacheKey::new(
            Some(time),
            KeyType::Result(VariableScope::Nodal),
            ObjectIndex(0),
            ArrayIndex::from_usize(i),
        );
        match cache.get_or_load(key, self.loader) {
            Ok(a) => Some(a),
            Err(e) => {
                warn(warnings, format!("displacement `{}` unavailable: {e}", desc.name));
                None
            }
        }
    }

    fn point_arrays(
        &self,
        cache: &mut ArrayCache,
        raw_points: &[usize],
        time: TimeIndex,
        warnings: &mut Vec<String>,
    ) -> Vec<DataArray> {
        let mut out = Vec::new();
        for (index, desc) in self.arrays.enabled(VariableScope::Nodal) {
            let key = CacheKey::new(
                Some(time),
                KeyType::Result(VariableScope::Nodal),
                ObjectIndex(0),
                index,
            );
            match cache.get_or_load(key, self.loader) {
                Ok(a) => out.push(DataArray {
                    name: desc.name.clone(),
                    components: a.components,
                    source: ArraySource::Result,
                    values: gather(&a.values, a.components, raw_points),
                }),
                Err(e) => warn(warnings, format!("point array `{}` skipped: {e}", desc.name)),
            }
        }
        out
    }

    /// Group enabled result arrays of all block and set types by name. The
    /// first type (in connectivity order) fixes the component count; later
    /// types that disagree are disabled.
    fn merge_cell_arrays(
        &self,
        repairs: &mut CatalogRepairs,
        warnings: &mut Vec<String>,
    ) -> Vec<MergedArray> {
        let mut merged: Vec<MergedArray> = Vec::new();
        for t in ObjectType::CONNECTIVITY_ORDER {
            for (index, desc) in self.arrays.enabled(VariableScope::Object(t)) {
                match merged.iter_mut().find(|m| m.name == desc.name) {
                    Some(m) if m.components != desc.component_count => {
                        let err = ExodusError::InconsistentSchema {
                            array: desc.name.clone(),
                            reason: format!(
                                "{t} has {} components, earlier types have {}; {t} contribution disabled",
                                desc.component_count, m.components
                            ),
                        };
                        warn(warnings, err.to_string());
                        repairs.disabled.push((VariableScope::Object(t), index));
                    }
                    Some(m) => m.members.push((t, index)),
                    None => merged.push(MergedArray {
                        name: desc.name.clone(),
                        components: desc.component_count,
                        members: vec![(t, index)],
                    }),
                }
            }
        }
        merged
    }

    fn cell_arrays(
        &self,
        cache: &mut ArrayCache,
        time: TimeIndex,
        repairs: &mut CatalogRepairs,
        warnings: &mut Vec<String>,
    ) -> Vec<DataArray> {
        let ncells = self.num_cells();
        let merged = self.merge_cell_arrays(repairs, warnings);
        let mut out = Vec::with_capacity(merged.len());
        for m in merged {
            let c = m.components;
            let mut values = ArrayValues::zeros(StorageKind::Float64, ncells * c);
            for &(t, array) in &m.members {
                let Ok(desc) = self.arrays.get(VariableScope::Object(t), array) else {
                    continue;
                };
                for (object, obj) in self.objects.enabled(t) {
                    if !desc.is_defined_on(object.get()) {
                        continue;
                    }
                    let (Some(offset), size) = (obj.grid_offset(), obj.base().size) else {
                        continue;
                    };
                    let key = CacheKey::new(Some(time), KeyType::Result(VariableScope::Object(t)), object, array);
                    match cache.get_or_load(key, self.loader) {
                        Ok(a) => {
                            if a.components != c || !values.copy_from(offset * c, &a.values, 0, size * c) {
                                warn(
                                    warnings,
                                    format!("`{}` on {t} {} has the wrong shape; zero filled", m.name, obj.base().id),
                                );
                            }
                        }
                        Err(e) => {
                            warn(
                                warnings,
                                format!("`{}` on {t} {} unreadable ({e}); marked undefined", m.name, obj.base().id),
                            );
                            repairs.truth.push((VariableScope::Object(t), array, object));
                        }
                    }
                }
            }
            out.push(DataArray {
                name: m.name,
                components: c,
                source: ArraySource::Result,
                values,
            });
        }
        out
    }

    fn attribute_arrays(&self, cache: &mut ArrayCache, warnings: &mut Vec<String>) -> Vec<DataArray> {
        let ncells = self.num_cells();
        let mut out: Vec<DataArray> = Vec::new();
        for t in BLOCK_TYPES {
            for (object, obj) in self.objects.enabled(t) {
                let (Some(block), Some(offset)) = (obj.as_block(), obj.grid_offset()) else {
                    continue;
                };
                for (a, attr) in block.attributes.iter().enumerate().filter(|(_, a)| a.enabled) {
                    let key = CacheKey::new(None, KeyType::Attribute(t), object, ArrayIndex::from_usize(a));
                    let data = match cache.get_or_load(key, self.loader) {
                        Ok(d) => d,
                        Err(e) => {
                            warn(warnings, format!("attribute `{}` of {t} {}: {e}", attr.name, block.base.id));
                            continue;
                        }
                    };
                    let pos = match out.iter().position(|d| d.name == attr.name) {
                        Some(p) => p,
                        None => {
                            out.push(DataArray {
                                name: attr.name.clone(),
                                components: 1,
                                source: ArraySource::Attribute,
                                values: ArrayValues::zeros(StorageKind::Float64, ncells),
                            });
                            out.len() - 1
                        }
                    };
                    if !out[pos].values.copy_from(offset, &data.values, 0, block.base.size) {
                        warn(
                            warnings,
                            format!("attribute `{}` of {t} {} has the wrong length", attr.name, block.base.id),
                        );
                    }
                }
            }
        }
        out
    }

    fn map_data(
        &self,
        cache: &mut ArrayCache,
        t: ObjectType,
        index: ObjectIndex,
    ) -> Result<Arc<CachedArray>, ExodusError> {
        cache.get_or_load(CacheKey::new(None, KeyType::Map(t), index, ArrayIndex(0)), self.loader)
    }

    /// Copy each enabled block's file range of `map` onto its grid range.
    fn subset_onto_blocks(
        &self,
        block_type: ObjectType,
        map_name: &str,
        map: &ArrayValues,
        warnings: &mut Vec<String>,
    ) -> ArrayValues {
        let mut values = ArrayValues::zeros(StorageKind::Int64, self.num_cells());
        for (_, obj) in self.objects.enabled(block_type) {
            if let (Some(b), Some(offset)) = (obj.as_block(), obj.grid_offset()) {
                if !values.copy_from(offset, map, b.file_offset - 1, b.base.size) {
                    warn(
                        warnings,
                        format!("map `{map_name}` does not cover {block_type} {}; zero filled", b.base.id),
                    );
                }
            }
        }
        values
    }

    fn map_arrays(
        &self,
        cache: &mut ArrayCache,
        raw_points: &[usize],
        warnings: &mut Vec<String>,
    ) -> (Vec<DataArray>, Vec<DataArray>) {
        let (mut point, mut cell) = (Vec::new(), Vec::new());
        for t in MAP_TYPES {
            for (index, obj) in self.objects.enabled(t) {
                let data = match self.map_data(cache, t, index) {
                    Ok(d) => d,
                    Err(e) => {
                        warn(warnings, format!("{t} `{}` skipped: {e}", obj.base().name));
                        continue;
                    }
                };
                let name = obj.base().name.clone();
                match t.mapped_block_type() {
                    None => point.push(DataArray {
                        name,
                        components: 1,
                        source: ArraySource::Map,
                        values: gather(&data.values, 1, raw_points),
                    }),
                    Some(block_type) => cell.push(DataArray {
                        values: self.subset_onto_blocks(block_type, &name, &data.values, warnings),
                        name,
                        components: 1,
                        source: ArraySource::Map,
                    }),
                }
            }
        }
        (point, cell)
    }

    /// First map of type `t` from the store, or the identity `1..=count`.
    fn id_map(&self, cache: &mut ArrayCache, t: ObjectType, warnings: &mut Vec<String>) -> ArrayValues {
        let count = self.model.entity_count(t);
        if self.objects.count(t) > 0 {
            match self.map_data(cache, t, ObjectIndex(0)) {
                Ok(m) => return m.values.clone(),
                Err(e) => warn(warnings, format!("{t} unreadable ({e}); using identity ids")),
            }
        }
        ArrayValues::Integer((1..=count as i64).collect())
    }

    fn procedural_arrays(
        &self,
        cache: &mut ArrayCache,
        raw_points: &[usize],
        point_data: &mut Vec<DataArray>,
        cell_data: &mut Vec<DataArray>,
        warnings: &mut Vec<String>,
    ) {
        let generated = |name: &str, a: &CachedArray| DataArray {
            name: name.to_string(),
            components: a.components,
            source: ArraySource::Generated,
            values: a.values.clone(),
        };
        if self.config.generate_object_id_array {
            let built = cache.get_or_insert_with(CacheKey::global(KeyType::ObjectIds), || {
                Ok(self.object_ids())
            });
            if let Ok(a) = built {
                cell_data.push(generated(OBJECT_ID_ARRAY, &a));
            }
        }
        if self.config.generate_global_element_ids {
            let key = CacheKey::global(KeyType::GlobalElementIds);
            let a = match cache.get(&key) {
                Some(a) => a,
                None => {
                    let map = self.id_map(cache, ObjectType::ElemMap, warnings);
                    let ids = self.subset_onto_blocks(ObjectType::ElemBlock, GLOBAL_ELEMENT_ID_ARRAY, &map, warnings);
                    cache.insert(key, CachedArray { components: 1, values: ids })
                }
            };
            cell_data.push(generated(GLOBAL_ELEMENT_ID_ARRAY, &a));
        }
        if self.config.generate_global_node_ids {
            let key = CacheKey::global(KeyType::GlobalNodeIds);
            let a = match cache.get(&key) {
                Some(a) => a,
                None => {
                    let map = self.id_map(cache, ObjectType::NodeMap, warnings);
                    let ids = gather(&map, 1, raw_points);
                    cache.insert(key, CachedArray { components: 1, values: ids })
                }
            };
            point_data.push(generated(GLOBAL_NODE_ID_ARRAY, &a));
        }
    }

    /// User id of the owning block or set of every cell.
    fn object_ids(&self) -> CachedArray {
        let mut ids = vec![0i64; self.num_cells()];
        for t in ObjectType::CONNECTIVITY_ORDER {
            for (_, obj) in self.objects.enabled(t) {
                if let Some(offset) = obj.grid_offset() {
                    let end = (offset + obj.base().size).min(ids.len());
                    ids[offset.min(end)..end].fill(obj.base().id.0);
                }
            }
        }
        CachedArray::integer(1, ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_picks_tuples_in_order() {
        let v = ArrayValues::Real(vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5]);
        assert_eq!(gather(&v, 2, &[2, 0]), ArrayValues::Real(vec![2.0, 2.5, 0.0, 0.5]));
        let ids = ArrayValues::Integer(vec![10, 20, 30]);
        assert_eq!(gather(&ids, 1, &[1, 7]), ArrayValues::Integer(vec![20, 0]));
    }

    #[test]
    fn data_array_accessors() {
        let a = DataArray {
            name: "v".into(),
            components: 3,
            source: ArraySource::Result,
            values: ArrayValues::Real(vec![0.0; 6]),
        };
        assert_eq!(a.tuples(), 2);
        assert!(a.as_integer().is_none());
    }
}
