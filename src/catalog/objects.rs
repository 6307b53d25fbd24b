//! Object catalog: per-type descriptor lists, sorted views and grid offsets.
//!
//! Objects are stored in file order and addressed by [`ObjectIndex`]. A
//! second, per-type permutation orders them by ascending [`UserId`]; that
//! view drives presentation and the layout of the assembled mesh.
//!
//! Every status change of a block or set recomputes the grid offsets of all
//! block and set types in one prefix-sum pass and advances the catalog
//! generation. Derived state (cached topology, procedural arrays) compares
//! the generation it was built from against [`ObjectCatalog::generation`].

use crate::catalog::object::{
    AttributeDescriptor, BlockDescriptor, MapDescriptor, ObjectDescriptor, ObjectIndex,
    ObjectKind, ObjectType, SetDescriptor, UserId,
};
use crate::debug_invariants::DebugInvariants;
use crate::io::{ModelParams, RawStore};
use crate::mesh_error::ExodusError;
use crate::topology::cell_type::CellType;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default)]
struct TypeObjects {
    objects: Vec<ObjectKind>,
    /// File-order indices sorted by ascending user id.
    sorted: Vec<ObjectIndex>,
}

/// Catalog of all blocks, sets and maps of one model.
#[derive(Clone, Debug, Default)]
pub struct ObjectCatalog {
    types: BTreeMap<ObjectType, TypeObjects>,
    generation: u64,
    number_of_cells: usize,
}

fn placeholder_name(t: ObjectType, id: UserId, size: usize, type_name: &str) -> String {
    if t.is_block() {
        format!("Unnamed block ID: {id} Type: {type_name} Size: {size}")
    } else if t.is_set() {
        format!("Unnamed set ID: {id} Size: {size}")
    } else {
        format!("Unnamed map ID: {id}")
    }
}

impl ObjectCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every object. The generation still advances so that derived
    /// state built from the old catalog is never mistaken for current.
    pub fn clear(&mut self) {
        self.types.clear();
        self.number_of_cells = 0;
        self.generation += 1;
    }

    /// Read every object of type `t` from `store`, replacing any previously
    /// loaded objects of that type.
    ///
    /// Blank names get placeholders and default status is applied: element
    /// blocks on, edge and face blocks off, sets off, the first map of each
    /// map type on. Blocks with an unsupported type name are kept but never
    /// enabled; each one adds a message to `warnings`.
    ///
    /// # Errors
    /// `MetadataRead` for `t` when the store cannot enumerate or describe its
    /// objects. The type is left empty; other types are unaffected.
    pub fn load_objects<S: RawStore + ?Sized>(
        &mut self,
        store: &S,
        t: ObjectType,
        model: &ModelParams,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<ObjectDescriptor>, ExodusError> {
        self.types.remove(&t);
        let as_metadata = |e: ExodusError| match e {
            ExodusError::MetadataRead { .. } => e,
            other => ExodusError::metadata(Some(t), other.to_string()),
        };
        let ids = store.object_ids(t).map_err(as_metadata)?;
        let mut names = store.object_names(t).map_err(as_metadata)?;
        names.resize(ids.len(), String::new());

        let mut objects = Vec::with_capacity(ids.len());
        let mut file_offset = 1;
        for (k, (&id, raw_name)) in ids.iter().zip(&names).enumerate() {
            let params = store.object_params(t, id).map_err(as_metadata)?;
            let name = match raw_name.trim() {
                "" => placeholder_name(t, id, params.size, &params.type_name),
                n => n.to_string(),
            };
            let mut base = ObjectDescriptor {
                id,
                name,
                size: params.size,
                enabled: false,
            };
            let kind = if t.is_block() {
                let cell_shape =
                    CellType::from_block_type(&params.type_name, params.nodes_per_entry, params.size);
                if cell_shape.is_none() {
                    let msg = format!(
                        "{t} {id}: unsupported element type `{}` with {} nodes",
                        params.type_name, params.nodes_per_entry
                    );
                    log::warn!("{msg}");
                    warnings.push(msg);
                }
                base.enabled = t == ObjectType::ElemBlock && cell_shape.is_some();
                let attributes = if params.attribute_count > 0 {
                    let mut attr_names = match store.attribute_names(t, id) {
                        Ok(names) => names,
                        Err(e) => {
                            let msg = format!("{t} {id}: attribute names unavailable: {e}");
                            log::warn!("{msg}");
                            warnings.push(msg);
                            Vec::new()
                        }
                    };
                    attr_names.resize(params.attribute_count, String::new());
                    attr_names
                        .into_iter()
                        .enumerate()
                        .map(|(a, n)| AttributeDescriptor {
                            name: match n.trim() {
                                "" => format!("attribute_{a}"),
                                s => s.to_string(),
                            },
                            enabled: false,
                        })
                        .collect()
                } else {
                    Vec::new()
                };
                let block = BlockDescriptor {
                    base,
                    type_name: params.type_name.clone(),
                    bounds_per_entry: [
                        params.nodes_per_entry as u32,
                        params.edges_per_entry as u32,
                        params.faces_per_entry as u32,
                    ],
                    attributes,
                    cell_shape,
                    file_offset,
                    grid_offset: None,
                };
                file_offset += params.size;
                ObjectKind::Block(block)
            } else if t.is_set() {
                let set = SetDescriptor {
                    base,
                    distribution_factor_count: params.distribution_factor_count,
                    file_offset,
                    grid_offset: None,
                };
                file_offset += params.size;
                ObjectKind::Set(set)
            } else {
                base.size = model.entity_count(t);
                base.enabled = k == 0;
                ObjectKind::Map(MapDescriptor { base })
            };
            objects.push(kind);
        }

        let mut sorted: Vec<ObjectIndex> = (0..objects.len()).map(ObjectIndex::from_usize).collect();
        sorted.sort_by_key(|i| objects[i.get()].base().id);
        let bases = objects.iter().map(|o| o.base().clone()).collect();
        self.types.insert(t, TypeObjects { objects, sorted });
        if !t.is_map() {
            self.recompute_grid_offsets();
            self.generation += 1;
        }
        Ok(bases)
    }

    /// Counter advanced by every change that alters the cell layout.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Total number of cells contributed by enabled blocks and sets.
    #[inline]
    pub fn number_of_cells(&self) -> usize {
        self.number_of_cells
    }

    pub fn count(&self, t: ObjectType) -> usize {
        self.types.get(&t).map_or(0, |e| e.objects.len())
    }

    /// All objects of `t` in file order.
    pub fn objects(&self, t: ObjectType) -> &[ObjectKind] {
        self.types.get(&t).map_or(&[], |e| e.objects.as_slice())
    }

    /// File-order indices of `t` sorted by ascending user id.
    pub fn sorted(&self, t: ObjectType) -> &[ObjectIndex] {
        self.types.get(&t).map_or(&[], |e| e.sorted.as_slice())
    }

    /// # Errors
    /// `IndexOutOfRange` when `index` is not a valid file-order index.
    pub fn object(&self, t: ObjectType, index: ObjectIndex) -> Result<&ObjectKind, ExodusError> {
        let objs = self.objects(t);
        objs.get(index.get()).ok_or(ExodusError::IndexOutOfRange {
            what: "object",
            index: index.get(),
            len: objs.len(),
        })
    }

    fn object_mut(&mut self, t: ObjectType, index: ObjectIndex) -> Result<&mut ObjectKind, ExodusError> {
        let entry = self.types.entry(t).or_default();
        let len = entry.objects.len();
        entry.objects.get_mut(index.get()).ok_or(ExodusError::IndexOutOfRange {
            what: "object",
            index: index.get(),
            len,
        })
    }

    /// File-order index of the `k`-th object of `t` by ascending user id.
    ///
    /// # Errors
    /// `IndexOutOfRange` when `k >= count(t)`.
    pub fn sorted_index(&self, t: ObjectType, k: usize) -> Result<ObjectIndex, ExodusError> {
        let sorted = self.sorted(t);
        sorted.get(k).copied().ok_or(ExodusError::IndexOutOfRange {
            what: "sorted object",
            index: k,
            len: sorted.len(),
        })
    }

    /// Position of `index` in the sorted view.
    pub fn sorted_position(&self, t: ObjectType, index: ObjectIndex) -> Option<usize> {
        self.sorted(t).iter().position(|&i| i == index)
    }

    pub fn index_by_id(&self, t: ObjectType, id: UserId) -> Option<ObjectIndex> {
        self.objects(t)
            .iter()
            .position(|o| o.base().id == id)
            .map(ObjectIndex::from_usize)
    }

    pub fn index_by_name(&self, t: ObjectType, name: &str) -> Option<ObjectIndex> {
        self.objects(t)
            .iter()
            .position(|o| o.base().name == name)
            .map(ObjectIndex::from_usize)
    }

    /// Enabled objects of `t` in ascending user-id order.
    pub fn enabled(&self, t: ObjectType) -> impl Iterator<Item = (ObjectIndex, &ObjectKind)> + '_ {
        let objects = self.objects(t);
        self.sorted(t)
            .iter()
            .map(move |&i| (i, &objects[i.get()]))
            .filter(|(_, o)| o.base().enabled)
    }

    /// Enable or disable one object. Returns whether anything changed.
    ///
    /// Changing a block or set recomputes all grid offsets and advances the
    /// generation; maps only flip their flag. Blocks with no supported cell
    /// shape cannot be enabled and report `Ok(false)`.
    ///
    /// # Errors
    /// `IndexOutOfRange` for an invalid `index`.
    pub fn set_status(
        &mut self,
        t: ObjectType,
        index: ObjectIndex,
        enabled: bool,
    ) -> Result<bool, ExodusError> {
        let obj = self.object_mut(t, index)?;
        if obj.base().enabled == enabled {
            return Ok(false);
        }
        if enabled && obj.as_block().is_some_and(|b| b.cell_shape.is_none()) {
            log::warn!("{t} {} has no supported cell shape; not enabling", obj.base().id);
            return Ok(false);
        }
        obj.base_mut().enabled = enabled;
        if !t.is_map() {
            self.recompute_grid_offsets();
            self.generation += 1;
            crate::debug_invariants!(self.validate_invariants(), "grid offsets after status change");
        }
        Ok(true)
    }

    /// Enable or disable one attribute of a block.
    ///
    /// # Errors
    /// `IndexOutOfRange` for an invalid object or attribute index.
    pub fn set_attribute_status(
        &mut self,
        t: ObjectType,
        index: ObjectIndex,
        attribute: usize,
        enabled: bool,
    ) -> Result<bool, ExodusError> {
        let block = self
            .object_mut(t, index)?
            .as_block_mut()
            .ok_or(ExodusError::IndexOutOfRange {
                what: "attribute",
                index: attribute,
                len: 0,
            })?;
        let len = block.attributes.len();
        let attr = block
            .attributes
            .get_mut(attribute)
            .ok_or(ExodusError::IndexOutOfRange {
                what: "attribute",
                index: attribute,
                len,
            })?;
        let changed = attr.enabled != enabled;
        attr.enabled = enabled;
        Ok(changed)
    }

    /// Assign grid offsets to every enabled block and set: block types first,
    /// then set types, each in ascending user-id order.
    pub fn recompute_grid_offsets(&mut self) {
        let mut next = 0;
        for t in ObjectType::CONNECTIVITY_ORDER {
            let Some(entry) = self.types.get_mut(&t) else {
                continue;
            };
            for &i in &entry.sorted {
                let obj = &mut entry.objects[i.get()];
                if obj.base().enabled {
                    obj.set_grid_offset(Some(next));
                    next += obj.base().size;
                } else {
                    obj.set_grid_offset(None);
                }
            }
        }
        self.number_of_cells = next;
    }

    /// Owning block of a 1-based file-wide entry number of block type `t`,
    /// with the entry's 0-based position inside that block.
    pub fn owning_block(&self, t: ObjectType, entry: i64) -> Option<(ObjectIndex, usize)> {
        if entry < 1 {
            return None;
        }
        let entry = entry as usize;
        self.objects(t).iter().enumerate().find_map(|(i, o)| {
            let b = o.as_block()?;
            (entry >= b.file_offset && entry < b.file_offset + b.base.size)
                .then(|| (ObjectIndex::from_usize(i), entry - b.file_offset))
        })
    }
}

impl DebugInvariants for ObjectCatalog {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "ObjectCatalog");
    }

    /// Enabled blocks and sets must tile `[0, number_of_cells)` exactly;
    /// disabled ones must carry no offset.
    fn validate_invariants(&self) -> Result<(), ExodusError> {
        let mut ranges = Vec::new();
        for (t, entry) in &self.types {
            for obj in &entry.objects {
                match (obj.base().enabled, obj.grid_offset()) {
                    (true, Some(off)) => ranges.push((off, obj.base().size)),
                    (false, None) => {}
                    (_, _) if t.is_map() => {}
                    (enabled, off) => {
                        return Err(ExodusError::metadata(
                            Some(*t),
                            format!("object {} enabled={enabled} has offset {off:?}", obj.base().id),
                        ));
                    }
                }
            }
        }
        ranges.sort_unstable();
        let mut expect = 0;
        for (off, size) in ranges {
            if off != expect {
                return Err(ExodusError::metadata(
                    None,
                    format!("grid offset {off} leaves a gap or overlap at {expect}"),
                ));
            }
            expect += size;
        }
        if expect != self.number_of_cells {
            return Err(ExodusError::metadata(
                None,
                format!("offsets cover {expect} cells, catalog reports {}", self.number_of_cells),
            ));
        }
        Ok(())
    }
}
