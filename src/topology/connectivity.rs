//! Connectivity assembly: concatenating per-object cells into one topology.
//!
//! Cells are emitted in the same order the catalog assigns grid offsets:
//! element, face and edge blocks, then element, side, face, edge and node
//! sets, each type in ascending user-id order, disabled objects skipped.
//! Cell `i` of the result therefore belongs to the object whose grid range
//! contains `i`.

use crate::catalog::object::{ArrayIndex, ObjectIndex, ObjectKind, ObjectType, UserId};
use crate::catalog::objects::ObjectCatalog;
use crate::data::array_cache::{ArrayCache, ArrayLoader, CacheKey, KeyType};
use crate::data::buffer::CachedArray;
use crate::debug_invariants::DebugInvariants;
use crate::io::{SetEntries, SideSetNodes};
use crate::mesh_error::ExodusError;
use crate::topology::cache::{GenerationTracked, InvalidateCache};
use crate::topology::cell_type::CellType;
use crate::topology::point_map::PointMap;
use hashbrown::HashMap;
use std::sync::Arc;

/// Store access needed beyond cached block connectivity.
pub trait ConnectivitySource: ArrayLoader {
    fn set_entries(&self, t: ObjectType, index: ObjectIndex) -> Result<SetEntries, ExodusError>;
    fn side_set_nodes(&self, index: ObjectIndex) -> Result<SideSetNodes, ExodusError>;
}

/// Assembled cells in compressed-row form.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Topology {
    /// `offsets[i]..offsets[i + 1]` indexes `connectivity` for cell `i`.
    pub offsets: Vec<usize>,
    /// Output point ids.
    pub connectivity: Vec<usize>,
    pub shapes: Vec<CellType>,
    /// Present when points were squeezed.
    pub point_map: Option<PointMap>,
    pub num_points: usize,
}

impl Topology {
    fn new(num_nodes: usize, squeeze: bool) -> Self {
        Topology {
            offsets: vec![0],
            connectivity: Vec::new(),
            shapes: Vec::new(),
            point_map: squeeze.then(|| PointMap::new(num_nodes)),
            num_points: num_nodes,
        }
    }

    #[inline]
    pub fn num_cells(&self) -> usize {
        self.shapes.len()
    }

    pub fn cell(&self, i: usize) -> Option<&[usize]> {
        let lo = *self.offsets.get(i)?;
        let hi = *self.offsets.get(i + 1)?;
        self.connectivity.get(lo..hi)
    }

    /// Raw 0-based node behind output point `p`.
    pub fn raw_point(&self, p: usize) -> usize {
        match &self.point_map {
            Some(pm) => pm.raw_ids().get(p).copied().unwrap_or(p),
            None => p,
        }
    }

    /// Raw node of every output point, in output order.
    pub fn raw_points(&self) -> Vec<usize> {
        match &self.point_map {
            Some(pm) => pm.raw_ids().to_vec(),
            None => (0..self.num_points).collect(),
        }
    }

    fn map_point(&mut self, raw: usize) -> Result<usize, ExodusError> {
        match &mut self.point_map {
            Some(pm) => pm.assign(raw),
            None if raw < self.num_points => Ok(raw),
            None => Err(ExodusError::InvalidPointReference {
                raw: raw as i64 + 1,
                num_nodes: self.num_points,
            }),
        }
    }

    /// Append one cell of raw 0-based nodes.
    fn push_cell(&mut self, shape: CellType, raw: &[i64]) -> Result<(), ExodusError> {
        for &r in raw {
            let r = usize::try_from(r).map_err(|_| ExodusError::InvalidPointReference {
                raw: r + 1,
                num_nodes: self.num_points,
            })?;
            let p = self.map_point(r)?;
            self.connectivity.push(p);
        }
        self.shapes.push(shape);
        self.offsets.push(self.connectivity.len());
        Ok(())
    }

    fn finish(&mut self) {
        if let Some(pm) = &self.point_map {
            self.num_points = pm.len();
        }
    }
}

impl DebugInvariants for Topology {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "Topology");
    }

    fn validate_invariants(&self) -> Result<(), ExodusError> {
        if self.offsets.len() != self.shapes.len() + 1
            || self.offsets.last().copied() != Some(self.connectivity.len())
        {
            return Err(ExodusError::array_read("topology", "offsets do not match cells"));
        }
        if let Some(&bad) = self.connectivity.iter().find(|&&p| p >= self.num_points) {
            return Err(ExodusError::InvalidPointReference {
                raw: bad as i64,
                num_nodes: self.num_points,
            });
        }
        match &self.point_map {
            Some(pm) => pm.validate_invariants(),
            None => Ok(()),
        }
    }
}

/// Lifecycle of the assembled topology.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AssemblyState {
    Invalid,
    Building,
    Valid,
}

/// Result of one build attempt.
#[derive(Clone, Debug)]
pub enum BuildOutcome {
    Built(Arc<Topology>),
    /// The store could not provide an object; disable it and rebuild.
    Missing {
        object_type: ObjectType,
        index: ObjectIndex,
        error: ExodusError,
    },
}

/// Builds and holds the topology for one `(generation, squeeze)` pair.
#[derive(Debug)]
pub struct ConnectivityAssembler {
    state: AssemblyState,
    observed: Option<(u64, bool)>,
    topology: Option<Arc<Topology>>,
}

impl Default for ConnectivityAssembler {
    fn default() -> Self {
        ConnectivityAssembler {
            state: AssemblyState::Invalid,
            observed: None,
            topology: None,
        }
    }
}

fn missing(t: ObjectType, index: ObjectIndex, error: ExodusError) -> BuildOutcome {
    BuildOutcome::Missing {
        object_type: t,
        index,
        error,
    }
}

impl ConnectivityAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn state(&self) -> AssemblyState {
        self.state
    }

    /// The current topology if it was built for this generation and mode.
    pub fn current(&self, generation: u64, squeeze: bool) -> Option<Arc<Topology>> {
        match (self.state, self.observed) {
            (AssemblyState::Valid, Some(obs)) if obs == (generation, squeeze) => {
                self.topology.clone()
            }
            _ => None,
        }
    }

    /// Return the topology for the catalog's current state, building it if
    /// the generation or squeeze mode changed since the last build.
    ///
    /// A block or set the store cannot provide stops the build and is
    /// reported as [`BuildOutcome::Missing`]; the assembler stays `Invalid`.
    ///
    /// # Errors
    /// Only for failures that cannot be attributed to a single object.
    pub fn ensure<S: ConnectivitySource + ?Sized>(
        &mut self,
        catalog: &ObjectCatalog,
        cache: &mut ArrayCache,
        source: &S,
        num_nodes: usize,
        squeeze: bool,
        warnings: &mut Vec<String>,
    ) -> Result<BuildOutcome, ExodusError> {
        if let Some(topo) = self.current(catalog.generation(), squeeze) {
            return Ok(BuildOutcome::Built(topo));
        }
        self.invalidate_cache();
        self.state = AssemblyState::Building;
        let mut topo = Topology::new(num_nodes, squeeze);
        for t in ObjectType::CONNECTIVITY_ORDER {
            for (index, obj) in catalog.enabled(t) {
                let before = topo.num_cells();
                let outcome = match obj {
                    ObjectKind::Block(b) => {
                        let shape = b.cell_shape.unwrap_or(CellType::Empty);
                        self.append_block(&mut topo, cache, source, t, index, shape)
                    }
                    ObjectKind::Set(_) => {
                        self.append_set(&mut topo, catalog, cache, source, t, index, warnings)
                    }
                    ObjectKind::Map(_) => Ok(()),
                };
                let expected = obj.base().size;
                let outcome = outcome.and_then(|()| {
                    let got = topo.num_cells() - before;
                    if got == expected {
                        Ok(())
                    } else {
                        Err(ExodusError::array_read(
                            format!("{t} {}", obj.base().id),
                            format!("produced {got} cells, expected {expected}"),
                        ))
                    }
                });
                if let Err(error) = outcome {
                    self.state = AssemblyState::Invalid;
                    return Ok(missing(t, index, error));
                }
            }
        }
        topo.finish();
        crate::debug_invariants!(topo.validate_invariants(), "assembled topology");
        log::debug!(
            "connectivity rebuilt: {} cells, {} points{}",
            topo.num_cells(),
            topo.num_points,
            if squeeze { " (squeezed)" } else { "" }
        );
        let topo = Arc::new(topo);
        self.topology = Some(Arc::clone(&topo));
        self.observed = Some((catalog.generation(), squeeze));
        self.state = AssemblyState::Valid;
        Ok(BuildOutcome::Built(topo))
    }

    fn block_connectivity<S: ConnectivitySource + ?Sized>(
        cache: &mut ArrayCache,
        source: &S,
        t: ObjectType,
        index: ObjectIndex,
    ) -> Result<Arc<CachedArray>, ExodusError> {
        let key = CacheKey::new(None, KeyType::Connectivity(t), index, ArrayIndex(0));
        cache.get_or_load(key, source)
    }

    fn append_block<S: ConnectivitySource + ?Sized>(
        &self,
        topo: &mut Topology,
        cache: &mut ArrayCache,
        source: &S,
        t: ObjectType,
        index: ObjectIndex,
        shape: CellType,
    ) -> Result<(), ExodusError> {
        let conn = Self::block_connectivity(cache, source, t, index)?;
        let nodes = conn
            .as_integer()
            .ok_or_else(|| ExodusError::array_read(format!("{t} connectivity"), "not integer"))?;
        let npe = conn.components;
        let keep = npe.min(shape.points_per_cell());
        let mut cell = Vec::with_capacity(keep);
        for entry in nodes.chunks(npe.max(1)) {
            cell.clear();
            cell.extend_from_slice(&entry[..keep.min(entry.len())]);
            shape.canonicalize(&mut cell);
            topo.push_cell(shape, &cell)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn append_set<S: ConnectivitySource + ?Sized>(
        &self,
        topo: &mut Topology,
        catalog: &ObjectCatalog,
        cache: &mut ArrayCache,
        source: &S,
        t: ObjectType,
        index: ObjectIndex,
        warnings: &mut Vec<String>,
    ) -> Result<(), ExodusError> {
        let set_id = catalog.object(t, index)?.base().id;
        match t {
            ObjectType::NodeSet => {
                let set = source.set_entries(t, index)?;
                for &node in &set.entries {
                    topo.push_cell(CellType::Vertex, &[node - 1])?;
                }
            }
            ObjectType::SideSet => {
                let sides = source.side_set_nodes(index)?;
                let mut at = 0;
                for &count in &sides.nodes_per_side {
                    let raw = sides.nodes.get(at..at + count).ok_or_else(|| {
                        ExodusError::array_read(format!("side set {set_id}"), "node list too short")
                    })?;
                    at += count;
                    let shape = CellType::from_side_node_count(count);
                    if shape == CellType::Empty {
                        warn(warnings, format!("side set {set_id}: side with {count} nodes has no cell shape"));
                        topo.push_cell(CellType::Empty, &[])?;
                        continue;
                    }
                    let zero_based: Vec<i64> = raw.iter().map(|n| n - 1).collect();
                    topo.push_cell(shape, &zero_based)?;
                }
            }
            _ => self.append_entity_set(topo, catalog, cache, source, t, index, set_id, warnings)?,
        }
        Ok(())
    }

    /// Copy cells of an edge, face or element set out of the owning blocks.
    #[allow(clippy::too_many_arguments)]
    fn append_entity_set<S: ConnectivitySource + ?Sized>(
        &self,
        topo: &mut Topology,
        catalog: &ObjectCatalog,
        cache: &mut ArrayCache,
        source: &S,
        t: ObjectType,
        index: ObjectIndex,
        set_id: UserId,
        warnings: &mut Vec<String>,
    ) -> Result<(), ExodusError> {
        let Some(block_type) = t.referenced_block_type() else {
            return Ok(());
        };
        let set = source.set_entries(t, index)?;
        let mut owners: Vec<Option<(ObjectIndex, usize)>> = Vec::with_capacity(set.entries.len());
        let mut buffers: HashMap<ObjectIndex, Arc<CachedArray>> = HashMap::new();
        for &entry in &set.entries {
            let owner = catalog.owning_block(block_type, entry);
            if let Some((block, _)) = owner {
                if !buffers.contains_key(&block) {
                    let conn = Self::block_connectivity(cache, source, block_type, block)?;
                    buffers.insert(block, conn);
                }
            }
            owners.push(owner);
        }
        let mut cell = Vec::new();
        for (k, owner) in owners.into_iter().enumerate() {
            let Some((block, local)) = owner else {
                warn(
                    warnings,
                    format!("{t} {set_id}: entry {} is not in any {block_type}", set.entries[k]),
                );
                topo.push_cell(CellType::Empty, &[])?;
                continue;
            };
            let shape = catalog
                .object(block_type, block)?
                .as_block()
                .and_then(|b| b.cell_shape)
                .unwrap_or(CellType::Empty);
            let conn = &buffers[&block];
            let nodes = conn
                .as_integer()
                .ok_or_else(|| ExodusError::array_read(format!("{block_type} connectivity"), "not integer"))?;
            let npe = conn.components;
            let keep = npe.min(shape.points_per_cell());
            let start = local * npe;
            let entry = nodes.get(start..start + keep).ok_or(ExodusError::IndexOutOfRange {
                what: "block connectivity entry",
                index: local,
                len: nodes.len() / npe.max(1),
            })?;
            cell.clear();
            cell.extend_from_slice(entry);
            shape.canonicalize(&mut cell);
            if set.orientations.get(k).is_some_and(|&o| o < 0) {
                cell.reverse();
            }
            topo.push_cell(shape, &cell)?;
        }
        Ok(())
    }
}

fn warn(warnings: &mut Vec<String>, msg: String) {
    log::warn!("{msg}");
    warnings.push(msg);
}

impl InvalidateCache for ConnectivityAssembler {
    fn invalidate_cache(&mut self) {
        self.state = AssemblyState::Invalid;
        self.observed = None;
        self.topology = None;
    }
}

impl GenerationTracked for ConnectivityAssembler {
    fn observed_generation(&self) -> Option<u64> {
        self.observed.map(|(g, _)| g)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::memory::{FailPoint, InMemoryStore};
    use crate::io::{ModelParams, RawStore};

    /// Minimal loader over an in-memory store, mirroring the reader's.
    struct Source<'a> {
        store: &'a InMemoryStore,
        catalog: &'a ObjectCatalog,
    }

    impl ArrayLoader for Source<'_> {
        fn load(&self, key: &CacheKey) -> Result<CachedArray, ExodusError> {
            let KeyType::Connectivity(t) = key.key_type else {
                return Err(ExodusError::array_read("key", "unsupported"));
            };
            let obj = self.catalog.object(t, key.object)?;
            let npe = obj.as_block().map_or(1, |b| b.bounds_per_entry[0] as usize);
            let raw = self.store.read_connectivity(t, obj.base().id)?;
            Ok(CachedArray::integer(npe, raw.iter().map(|n| n - 1).collect()))
        }
    }

    impl ConnectivitySource for Source<'_> {
        fn set_entries(&self, t: ObjectType, index: ObjectIndex) -> Result<SetEntries, ExodusError> {
            self.store.read_set(t, self.catalog.object(t, index)?.base().id)
        }
        fn side_set_nodes(&self, index: ObjectIndex) -> Result<SideSetNodes, ExodusError> {
            let id = self.catalog.object(ObjectType::SideSet, index)?.base().id;
            self.store.read_side_set_nodes(id)
        }
    }

    fn strip() -> InMemoryStore {
        // three quads in a row, nodes 1..8
        let mut s = InMemoryStore::new("strip", 2);
        let nodes: Vec<[f64; 3]> = (0..4)
            .flat_map(|i| [[i as f64, 0.0, 0.0], [i as f64, 1.0, 0.0]])
            .collect();
        s.add_nodes(&nodes)
            .add_block(ObjectType::ElemBlock, 3, "right", "QUAD4", 4, vec![5, 7, 8, 6])
            .add_block(ObjectType::ElemBlock, 1, "left", "QUAD4", 4, vec![1, 3, 4, 2, 3, 5, 6, 4])
            .add_node_set(1, "corner", vec![8])
            .add_set(ObjectType::ElemSet, 2, "pick", vec![3, 1], vec![1, -1])
            .add_side_set(4, "bottom", vec![2, 5], vec![1, 3, 1, 2, 3, 4, 5]);
        s
    }

    fn catalog(store: &InMemoryStore) -> (ObjectCatalog, ModelParams) {
        let model = store.model_params().unwrap();
        let mut cat = ObjectCatalog::new();
        let mut w = Vec::new();
        for t in ObjectType::ALL {
            cat.load_objects(store, t, &model, &mut w).unwrap();
        }
        (cat, model)
    }

    fn build(
        store: &InMemoryStore,
        cat: &ObjectCatalog,
        asm: &mut ConnectivityAssembler,
        cache: &mut ArrayCache,
        squeeze: bool,
    ) -> (BuildOutcome, Vec<String>) {
        let src = Source { store, catalog: cat };
        let mut w = Vec::new();
        let out = asm.ensure(cat, cache, &src, 8, squeeze, &mut w).unwrap();
        (out, w)
    }

    #[test]
    fn blocks_in_user_id_order_without_squeeze() {
        let s = strip();
        let (cat, _) = catalog(&s);
        let mut asm = ConnectivityAssembler::new();
        let mut cache = ArrayCache::default();
        let (BuildOutcome::Built(topo), _) = build(&s, &cat, &mut asm, &mut cache, false) else {
            panic!("build failed");
        };
        assert_eq!(topo.num_cells(), 3);
        assert_eq!(topo.cell(0).unwrap(), &[0, 2, 3, 1]);
        assert_eq!(topo.cell(2).unwrap(), &[4, 6, 7, 5]);
        assert_eq!(topo.num_points, 8);
        assert_eq!(asm.state(), AssemblyState::Valid);
    }

    #[test]
    fn squeeze_renumbers_by_first_reference() {
        let s = strip();
        let (mut cat, _) = catalog(&s);
        cat.set_status(ObjectType::ElemBlock, ObjectIndex(1), false).unwrap();
        let mut asm = ConnectivityAssembler::new();
        let mut cache = ArrayCache::default();
        let (BuildOutcome::Built(topo), _) = build(&s, &cat, &mut asm, &mut cache, true) else {
            panic!("build failed");
        };
        assert_eq!(topo.num_cells(), 1);
        assert_eq!(topo.cell(0).unwrap(), &[0, 1, 2, 3]);
        assert_eq!(topo.num_points, 4);
        assert_eq!(topo.raw_points(), vec![4, 6, 7, 5]);
    }

    #[test]
    fn sets_follow_blocks() {
        let s = strip();
        let (mut cat, _) = catalog(&s);
        for t in [ObjectType::NodeSet, ObjectType::ElemSet, ObjectType::SideSet] {
            cat.set_status(t, ObjectIndex(0), true).unwrap();
        }
        let mut asm = ConnectivityAssembler::new();
        let mut cache = ArrayCache::default();
        let (BuildOutcome::Built(topo), warnings) = build(&s, &cat, &mut asm, &mut cache, false)
        else {
            panic!("build failed");
        };
        // 3 block cells, elem set (2), side set (2), node set (1)
        assert_eq!(topo.num_cells(), 8);
        // entry 3 is the second cell of block 1; entry 1 is block 3, reversed
        assert_eq!(topo.cell(3).unwrap(), &[2, 4, 5, 3]);
        assert_eq!(topo.cell(4).unwrap(), &[5, 7, 6, 4]);
        assert_eq!(topo.shapes[5], CellType::Segment);
        assert_eq!(topo.shapes[6], CellType::Empty);
        assert_eq!(topo.cell(7).unwrap(), &[7]);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn rebuild_only_when_generation_or_mode_changes() {
        let s = strip();
        let (mut cat, _) = catalog(&s);
        let mut asm = ConnectivityAssembler::new();
        let mut cache = ArrayCache::default();
        let (BuildOutcome::Built(a), _) = build(&s, &cat, &mut asm, &mut cache, false) else {
            panic!()
        };
        let (BuildOutcome::Built(b), _) = build(&s, &cat, &mut asm, &mut cache, false) else {
            panic!()
        };
        assert!(Arc::ptr_eq(&a, &b));
        assert!(asm.current(cat.generation(), true).is_none());
        cat.set_status(ObjectType::NodeSet, ObjectIndex(0), true).unwrap();
        assert!(asm.is_stale(cat.generation()));
        let (BuildOutcome::Built(c), _) = build(&s, &cat, &mut asm, &mut cache, false) else {
            panic!()
        };
        assert_eq!(c.num_cells(), 4);
    }

    #[test]
    fn missing_block_is_reported() {
        let mut s = strip();
        s.fail(FailPoint::Connectivity(ObjectType::ElemBlock, UserId(3)));
        let (cat, _) = catalog(&s);
        let mut asm = ConnectivityAssembler::new();
        let mut cache = ArrayCache::default();
        let (out, _) = build(&s, &cat, &mut asm, &mut cache, false);
        match out {
            BuildOutcome::Missing {
                object_type, index, ..
            } => {
                assert_eq!(object_type, ObjectType::ElemBlock);
                assert_eq!(index, ObjectIndex(0));
            }
            BuildOutcome::Built(_) => panic!("expected a missing block"),
        }
        assert_eq!(asm.state(), AssemblyState::Invalid);
    }

    #[test]
    fn short_block_buffer_fails_the_set() {
        let mut s = strip();
        s.add_sized_block(ObjectType::ElemBlock, 9, "QUAD4", 4, 2)
            .add_set(ObjectType::ElemSet, 6, "", vec![5], vec![1]);
        let (mut cat, _) = catalog(&s);
        cat.set_status(ObjectType::ElemBlock, ObjectIndex(2), false).unwrap();
        cat.set_status(ObjectType::ElemSet, ObjectIndex(1), true).unwrap();
        let mut asm = ConnectivityAssembler::new();
        let mut cache = ArrayCache::default();
        // block 9 holds file entries 4..=5 but only its first cell is buffered
        let key = CacheKey::new(None, KeyType::Connectivity(ObjectType::ElemBlock), ObjectIndex(2), ArrayIndex(0));
        cache.insert(key, CachedArray::integer(4, vec![0, 1, 2, 3]));
        let (out, _) = build(&s, &cat, &mut asm, &mut cache, false);
        match out {
            BuildOutcome::Missing {
                object_type, error, ..
            } => {
                assert_eq!(object_type, ObjectType::ElemSet);
                assert!(matches!(error, ExodusError::IndexOutOfRange { index: 1, len: 1, .. }));
            }
            BuildOutcome::Built(_) => panic!("expected the set to fail"),
        }
    }

    #[test]
    fn quadratic_hex_is_canonicalized() {
        let mut s = InMemoryStore::new("hex20", 3);
        s.add_nodes(&[[0.0; 3]; 20])
            .add_block(ObjectType::ElemBlock, 1, "", "HEX20", 20, (1..=20).collect());
        let (cat, _) = catalog(&s);
        let src = Source { store: &s, catalog: &cat };
        let mut asm = ConnectivityAssembler::new();
        let mut cache = ArrayCache::default();
        let mut w = Vec::new();
        let BuildOutcome::Built(topo) = asm.ensure(&cat, &mut cache, &src, 20, false, &mut w).unwrap()
        else {
            panic!()
        };
        let cell = topo.cell(0).unwrap();
        assert_eq!(&cell[12..16], &[16, 17, 18, 19]);
        assert_eq!(&cell[16..20], &[12, 13, 14, 15]);
    }
}
