//! `ExodusReader`: metadata queries, status toggles and per-step output.
//!
//! The reader owns a [`RawStore`] together with the object and array
//! catalogs, the array cache and the connectivity assembler. Objects are
//! addressed by their position in ascending user-id order, arrays by their
//! position in the glommed list of a [`VariableScope`].
//!
//! Recoverable problems never abort a request. They are logged through
//! `log::warn!` and collected; see [`ExodusReader::warnings`].
//!
//! ```
//! use exodus_sieve::prelude::*;
//!
//! let mut store = InMemoryStore::new("two triangles", 2);
//! store
//!     .add_nodes(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]])
//!     .add_block(ObjectType::ElemBlock, 1, "tris", "TRI3", 3, vec![1, 2, 3, 1, 3, 4]);
//! let mut reader = ExodusReader::new(store);
//! reader.load_metadata()?;
//! let mesh = reader.assemble_output(TimeIndex(0))?;
//! assert_eq!(mesh.num_cells(), 2);
//! # Ok::<(), ExodusError>(())
//! ```

pub mod config;
pub(crate) mod loader;
pub mod output;

pub use config::ReaderConfig;
pub use output::{DataArray, OutputMesh};

use crate::catalog::array::VariableScope;
use crate::catalog::arrays::ArrayCatalog;
use crate::catalog::object::{ArrayIndex, ObjectIndex, ObjectType, TimeIndex, UserId};
use crate::catalog::objects::ObjectCatalog;
use crate::data::array_cache::{ArrayCache, CacheKey, CachePattern, Field, KeyType};
use crate::io::exodus::AsciiExodusStore;
use crate::io::{ModelParams, RawStore};
use crate::mesh_error::ExodusError;
use crate::topology::cache::InvalidateCache;
use crate::topology::connectivity::{BuildOutcome, ConnectivityAssembler, Topology};
use loader::StoreLoader;
use output::{CatalogRepairs, OutputContext};
use std::path::Path;
use std::sync::Arc;

/// A reader shared between threads. Every request takes the lock for its
/// whole duration.
pub type SharedReader<S> = Arc<parking_lot::Mutex<ExodusReader<S>>>;

/// Catalog, cache and assembly state over one raw store.
pub struct ExodusReader<S: RawStore> {
    store: S,
    config: ReaderConfig,
    loaded: bool,
    model: ModelParams,
    times: Vec<f64>,
    objects: ObjectCatalog,
    arrays: ArrayCatalog,
    cache: ArrayCache,
    connectivity: ConnectivityAssembler,
    warnings: Vec<String>,
}

impl ExodusReader<AsciiExodusStore> {
    /// Open a text model and load its metadata.
    ///
    /// # Errors
    /// `FileOpen` when the file is missing or malformed. Metadata problems
    /// that only affect one object type are warnings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ExodusError> {
        let mut reader = ExodusReader::new(AsciiExodusStore::open(path)?);
        reader.load_metadata()?;
        Ok(reader)
    }
}

fn warn(warnings: &mut Vec<String>, msg: String) {
    log::warn!("{msg}");
    warnings.push(msg);
}

impl<S: RawStore> ExodusReader<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, ReaderConfig::default())
    }

    pub fn with_config(store: S, config: ReaderConfig) -> Self {
        ExodusReader {
            store,
            cache: ArrayCache::new(config.cache_capacity_bytes),
            config,
            loaded: false,
            model: ModelParams::default(),
            times: Vec::new(),
            objects: ObjectCatalog::new(),
            arrays: ArrayCatalog::new(),
            connectivity: ConnectivityAssembler::new(),
            warnings: Vec::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Read the model header, every object type and every variable scope.
    ///
    /// Replaces any previously loaded state. An object type or variable
    /// scope the store cannot describe is skipped with a warning.
    ///
    /// # Errors
    /// `MetadataRead` only when the model header itself is unreadable.
    pub fn load_metadata(&mut self) -> Result<(), ExodusError> {
        self.reset();
        self.model = self
            .store
            .model_params()
            .map_err(|e| ExodusError::metadata(None, e.to_string()))?;
        self.times = match self.store.time_values() {
            Ok(t) => t,
            Err(e) => {
                warn(&mut self.warnings, format!("time values unreadable ({e}); no time steps"));
                Vec::new()
            }
        };
        for t in ObjectType::ALL {
            if let Err(e) = self.objects.load_objects(&self.store, t, &self.model, &mut self.warnings) {
                warn(&mut self.warnings, format!("{t} skipped: {e}"));
            }
        }
        let scopes = std::iter::once(VariableScope::Nodal).chain(
            ObjectType::CONNECTIVITY_ORDER
                .into_iter()
                .map(VariableScope::Object),
        );
        for scope in scopes {
            let count = match scope {
                VariableScope::Nodal => 1,
                VariableScope::Object(t) => self.objects.count(t),
            };
            if let Err(e) = self.arrays.load_scope(&self.store, scope, count, &mut self.warnings) {
                warn(&mut self.warnings, format!("{scope} variables skipped: {e}"));
            }
        }
        self.loaded = true;
        log::debug!(
            "metadata loaded: `{}`, {} nodes, {} time steps, {} cells enabled",
            self.model.title,
            self.model.num_nodes,
            self.times.len(),
            self.objects.number_of_cells()
        );
        Ok(())
    }

    /// Drop all catalogs, cached arrays and topology. Configuration is kept.
    pub fn reset(&mut self) {
        self.loaded = false;
        self.model = ModelParams::default();
        self.times.clear();
        self.objects.clear();
        self.arrays.clear();
        self.cache.clear();
        self.connectivity.invalidate_cache();
        self.warnings.clear();
    }

    /// Reset and release the store.
    pub fn close(&mut self) {
        self.reset();
        self.store.close();
    }

    // ---------------------------------------------------------------
    // Model
    // ---------------------------------------------------------------

    pub fn title(&self) -> &str {
        &self.model.title
    }

    pub fn dimension(&self) -> usize {
        self.model.dimension
    }

    /// Points the next output will carry: the squeezed count when squeezing
    /// and a topology is current, otherwise every model node.
    pub fn number_of_nodes(&self) -> usize {
        if self.config.squeeze_points {
            if let Some(topo) = self.connectivity.current(self.objects.generation(), true) {
                return topo.num_points;
            }
        }
        self.model.num_nodes
    }

    pub fn number_of_cells(&self) -> usize {
        self.objects.number_of_cells()
    }

    pub fn number_of_time_steps(&self) -> usize {
        self.times.len()
    }

    pub fn time_values(&self) -> &[f64] {
        &self.times
    }

    // ---------------------------------------------------------------
    // Objects, by position in ascending user-id order
    // ---------------------------------------------------------------

    pub fn object_count(&self, t: ObjectType) -> usize {
        self.objects.count(t)
    }

    fn object_at(&self, t: ObjectType, k: usize) -> Result<&crate::catalog::object::ObjectKind, ExodusError> {
        let index = self.objects.sorted_index(t, k)?;
        self.objects.object(t, index)
    }

    pub fn object_id(&self, t: ObjectType, k: usize) -> Result<UserId, ExodusError> {
        Ok(self.object_at(t, k)?.base().id)
    }

    pub fn object_name(&self, t: ObjectType, k: usize) -> Result<&str, ExodusError> {
        Ok(&self.object_at(t, k)?.base().name)
    }

    pub fn object_size(&self, t: ObjectType, k: usize) -> Result<usize, ExodusError> {
        Ok(self.object_at(t, k)?.base().size)
    }

    pub fn object_status(&self, t: ObjectType, k: usize) -> Result<bool, ExodusError> {
        Ok(self.object_at(t, k)?.base().enabled)
    }

    /// Sorted position of the object called `name`.
    pub fn object_index_by_name(&self, t: ObjectType, name: &str) -> Option<usize> {
        let index = self.objects.index_by_name(t, name)?;
        self.objects.sorted_position(t, index)
    }

    /// Enable or disable the `k`-th object of `t`.
    ///
    /// # Errors
    /// `IndexOutOfRange` when `k` is not below [`object_count`](Self::object_count).
    pub fn set_status(&mut self, t: ObjectType, k: usize, enabled: bool) -> Result<(), ExodusError> {
        let index = self.objects.sorted_index(t, k)?;
        if self.objects.set_status(t, index, enabled)? {
            self.cache.sync_generation(self.objects.generation());
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Block attributes
    // ---------------------------------------------------------------

    fn block_at(&self, t: ObjectType, k: usize) -> Result<&crate::catalog::object::BlockDescriptor, ExodusError> {
        self.object_at(t, k)?
            .as_block()
            .ok_or(ExodusError::IndexOutOfRange {
                what: "block",
                index: k,
                len: 0,
            })
    }

    pub fn attribute_count(&self, t: ObjectType, k: usize) -> Result<usize, ExodusError> {
        Ok(self.block_at(t, k)?.attributes.len())
    }

    fn attribute_at(
        &self,
        t: ObjectType,
        k: usize,
        a: usize,
    ) -> Result<&crate::catalog::object::AttributeDescriptor, ExodusError> {
        let attrs = &self.block_at(t, k)?.attributes;
        attrs.get(a).ok_or(ExodusError::IndexOutOfRange {
            what: "attribute",
            index: a,
            len: attrs.len(),
        })
    }

    /// Position of the attribute called `name` on the `k`-th block of `t`.
    pub fn attribute_index(&self, t: ObjectType, k: usize, name: &str) -> Option<usize> {
        self.block_at(t, k).ok()?.attributes.iter().position(|a| a.name == name)
    }

    pub fn attribute_name(&self, t: ObjectType, k: usize, a: usize) -> Result<&str, ExodusError> {
        Ok(&self.attribute_at(t, k, a)?.name)
    }

    pub fn attribute_status(&self, t: ObjectType, k: usize, a: usize) -> Result<bool, ExodusError> {
        Ok(self.attribute_at(t, k, a)?.enabled)
    }

    pub fn set_attribute_status(
        &mut self,
        t: ObjectType,
        k: usize,
        a: usize,
        enabled: bool,
    ) -> Result<(), ExodusError> {
        let index = self.objects.sorted_index(t, k)?;
        if self.objects.set_attribute_status(t, index, a, enabled)? && !enabled {
            self.cache.invalidate(&CachePattern {
                key_type: Field::Exactly(KeyType::Attribute(t)),
                object: Field::Exactly(index),
                array: Field::Exactly(ArrayIndex::from_usize(a)),
                ..CachePattern::any()
            });
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Result arrays
    // ---------------------------------------------------------------

    pub fn array_count(&self, scope: VariableScope) -> usize {
        self.arrays.count(scope)
    }

    pub fn array_name(&self, scope: VariableScope, i: usize) -> Result<&str, ExodusError> {
        Ok(&self.arrays.get(scope, ArrayIndex::from_usize(i))?.name)
    }

    pub fn array_components(&self, scope: VariableScope, i: usize) -> Result<usize, ExodusError> {
        Ok(self.arrays.get(scope, ArrayIndex::from_usize(i))?.component_count)
    }

    pub fn array_status(&self, scope: VariableScope, i: usize) -> Result<bool, ExodusError> {
        Ok(self.arrays.get(scope, ArrayIndex::from_usize(i))?.enabled)
    }

    pub fn array_index_by_name(&self, scope: VariableScope, name: &str) -> Option<usize> {
        self.arrays.index_by_name(scope, name).map(ArrayIndex::get)
    }

    /// Full descriptor of one array, including its constituents.
    pub fn array_descriptor(
        &self,
        scope: VariableScope,
        i: usize,
    ) -> Result<&crate::catalog::array::ArrayDescriptor, ExodusError> {
        self.arrays.get(scope, ArrayIndex::from_usize(i))
    }

    /// Values of array `i` on one entry across every time step, one tuple
    /// per step.
    ///
    /// `entry` is 0-based: a node number for [`VariableScope::Nodal`],
    /// otherwise a position in the file-wide numbering of the scope's
    /// object type. The array does not need to be enabled. Whole steps are
    /// read through the cache.
    ///
    /// # Errors
    /// `MetadataRead` before [`load_metadata`](Self::load_metadata),
    /// `IndexOutOfRange` for a bad array or entry, and `ArrayRead` when the
    /// owning object does not store the array or a step cannot be read.
    pub fn time_series(&mut self, scope: VariableScope, entry: usize, i: usize) -> Result<Vec<f64>, ExodusError> {
        if !self.loaded {
            return Err(ExodusError::metadata(None, "metadata not loaded"));
        }
        let array = ArrayIndex::from_usize(i);
        let desc = self.arrays.get(scope, array)?;
        let (object, local) = match scope {
            VariableScope::Nodal if entry < self.model.num_nodes => (ObjectIndex(0), entry),
            VariableScope::Nodal => {
                return Err(ExodusError::IndexOutOfRange {
                    what: "node",
                    index: entry,
                    len: self.model.num_nodes,
                });
            }
            VariableScope::Object(t) => {
                let owner = self.objects.objects(t).iter().enumerate().find_map(|(k, o)| {
                    let first = o.file_offset()? - 1;
                    (entry >= first && entry < first + o.base().size).then_some((k, entry - first))
                });
                let (k, local) = owner.ok_or(ExodusError::IndexOutOfRange {
                    what: "entry",
                    index: entry,
                    len: self.objects.objects(t).iter().map(|o| o.base().size).sum(),
                })?;
                if !desc.is_defined_on(k) {
                    return Err(ExodusError::array_read(
                        format!("{} on {t} {}", desc.name, self.objects.objects(t)[k].base().id),
                        "not stored on this object",
                    ));
                }
                (ObjectIndex::from_usize(k), local)
            }
        };
        let components = desc.component_count;
        let loader = StoreLoader {
            store: &self.store,
            model: &self.model,
            objects: &self.objects,
            arrays: &self.arrays,
        };
        let mut series = Vec::with_capacity(self.times.len() * components);
        for step in 0..self.times.len() {
            let key = CacheKey::new(Some(TimeIndex(step)), KeyType::Result(scope), object, array);
            let data = self.cache.get_or_load(key, &loader)?;
            let tuple = data
                .as_real()
                .and_then(|v| v.get(local * components..(local + 1) * components))
                .ok_or_else(|| {
                    ExodusError::array_read(format!("array {i} at step {step}"), "entry outside the stored values")
                })?;
            series.extend_from_slice(tuple);
        }
        Ok(series)
    }

    /// Enable or disable one array. Disabling drops its cached values.
    pub fn set_array_status(&mut self, scope: VariableScope, i: usize, enabled: bool) -> Result<(), ExodusError> {
        let index = ArrayIndex::from_usize(i);
        if self.arrays.set_status(scope, index, enabled)? && !enabled {
            self.cache.invalidate(&CachePattern {
                key_type: Field::Exactly(KeyType::Result(scope)),
                array: Field::Exactly(index),
                ..CachePattern::any()
            });
        }
        Ok(())
    }

    pub fn set_all_array_status(&mut self, scope: VariableScope, enabled: bool) {
        self.arrays.set_all_status(scope, enabled);
        if !enabled {
            self.cache.invalidate(&CachePattern::key_type(KeyType::Result(scope)));
        }
    }

    // ---------------------------------------------------------------
    // Configuration
    // ---------------------------------------------------------------

    /// Switch point squeezing. The topology and derived arrays are rebuilt
    /// on the next request.
    pub fn set_squeeze_points(&mut self, squeeze: bool) {
        if self.config.squeeze_points != squeeze {
            self.config.squeeze_points = squeeze;
            self.connectivity.invalidate_cache();
            self.cache.invalidate_derived();
        }
    }

    pub fn set_apply_displacements(&mut self, apply: bool) {
        self.config.apply_displacements = apply;
    }

    pub fn set_displacement_magnitude(&mut self, magnitude: f64) {
        self.config.displacement_magnitude = magnitude;
    }

    pub fn set_generate_object_id_array(&mut self, on: bool) {
        self.config.generate_object_id_array = on;
        if !on {
            self.cache.invalidate(&CachePattern::key_type(KeyType::ObjectIds));
        }
    }

    pub fn set_generate_global_element_ids(&mut self, on: bool) {
        self.config.generate_global_element_ids = on;
        if !on {
            self.cache.invalidate(&CachePattern::key_type(KeyType::GlobalElementIds));
        }
    }

    pub fn set_generate_global_node_ids(&mut self, on: bool) {
        self.config.generate_global_node_ids = on;
        if !on {
            self.cache.invalidate(&CachePattern::key_type(KeyType::GlobalNodeIds));
        }
    }

    /// Change the cache budget, evicting down to it immediately.
    pub fn set_cache_capacity(&mut self, bytes: usize) {
        self.config.cache_capacity_bytes = bytes;
        self.cache.set_capacity(bytes);
    }

    /// Cache hits and misses so far.
    pub fn cache_stats(&self) -> (u64, u64) {
        self.cache.stats()
    }

    pub fn cache_used_bytes(&self) -> usize {
        self.cache.used_bytes()
    }

    // ---------------------------------------------------------------
    // Output
    // ---------------------------------------------------------------

    /// Build (or reuse) the topology, disabling objects the store cannot
    /// provide until a build succeeds.
    fn ensure_topology(&mut self) -> Result<Arc<Topology>, ExodusError> {
        loop {
            self.cache.sync_generation(self.objects.generation());
            let loader = StoreLoader {
                store: &self.store,
                model: &self.model,
                objects: &self.objects,
                arrays: &self.arrays,
            };
            let outcome = self.connectivity.ensure(
                &self.objects,
                &mut self.cache,
                &loader,
                self.model.num_nodes,
                self.config.squeeze_points,
                &mut self.warnings,
            )?;
            match outcome {
                BuildOutcome::Built(topo) => return Ok(topo),
                BuildOutcome::Missing {
                    object_type,
                    index,
                    error,
                } => {
                    let id = self.objects.object(object_type, index)?.base().id;
                    warn(
                        &mut self.warnings,
                        format!("{object_type} {id} unavailable ({error}); disabled"),
                    );
                    if !self.objects.set_status(object_type, index, false)? {
                        return Err(error);
                    }
                }
            }
        }
    }

    fn apply_repairs(&mut self, repairs: CatalogRepairs) {
        for (scope, array, object) in repairs.truth {
            if let Err(e) = self.arrays.clear_truth(scope, array, object) {
                log::debug!("truth repair skipped: {e}");
            }
        }
        for (scope, array) in repairs.disabled {
            if let Err(e) = self.arrays.set_status(scope, array, false) {
                log::debug!("schema repair skipped: {e}");
            }
        }
    }

    /// Assemble the mesh of time step `time`.
    ///
    /// Models without time steps accept `TimeIndex(0)`.
    ///
    /// # Errors
    /// `MetadataRead` before [`load_metadata`](Self::load_metadata),
    /// `IndexOutOfRange` for a bad time step and `ArrayRead` when the
    /// coordinates cannot be read. Everything else degrades with a warning.
    pub fn assemble_output(&mut self, time: TimeIndex) -> Result<OutputMesh, ExodusError> {
        if !self.loaded {
            return Err(ExodusError::metadata(None, "metadata not loaded"));
        }
        let steps = self.times.len().max(1);
        if time.0 >= steps {
            return Err(ExodusError::IndexOutOfRange {
                what: "time step",
                index: time.0,
                len: steps,
            });
        }
        let topology = self.ensure_topology()?;
        let time_value = self.times.get(time.0).copied().unwrap_or(0.0);
        let loader = StoreLoader {
            store: &self.store,
            model: &self.model,
            objects: &self.objects,
            arrays: &self.arrays,
        };
        let ctx = OutputContext {
            loader: &loader,
            model: &self.model,
            objects: &self.objects,
            arrays: &self.arrays,
            config: &self.config,
        };
        let (mesh, repairs) = ctx.assemble(&mut self.cache, topology, time, time_value, &mut self.warnings)?;
        self.apply_repairs(repairs);
        Ok(mesh)
    }

    /// Every warning recorded since the last metadata load.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }
}

impl<S: RawStore> InvalidateCache for ExodusReader<S> {
    /// Drop cached arrays and topology; catalogs are kept.
    fn invalidate_cache(&mut self) {
        self.cache.clear();
        self.connectivity.invalidate_cache();
    }
}
