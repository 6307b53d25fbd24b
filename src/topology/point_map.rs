//! PointMap: dense renumbering of referenced points ("squeeze").

use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::ExodusError;

/// Maps raw 0-based file node numbers to dense output point ids, assigned in
/// order of first reference.
///
/// # Invariants
/// - An assigned entry never changes until [`PointMap::reset`].
/// - Assigned ids are exactly `0..len()`, and `raw_ids()[id]` is the raw
///   node that received `id`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointMap {
    forward: Vec<Option<usize>>,
    reverse: Vec<usize>,
}

impl PointMap {
    /// Map over `num_nodes` raw nodes with nothing assigned.
    pub fn new(num_nodes: usize) -> Self {
        PointMap {
            forward: vec![None; num_nodes],
            reverse: Vec::new(),
        }
    }

    pub fn reset(&mut self, num_nodes: usize) {
        self.forward.clear();
        self.forward.resize(num_nodes, None);
        self.reverse.clear();
    }

    /// Output id of `raw`, assigning the next free id on first reference.
    ///
    /// # Errors
    /// `InvalidPointReference` when `raw` is outside the model's nodes.
    pub fn assign(&mut self, raw: usize) -> Result<usize, ExodusError> {
        let num_nodes = self.forward.len();
        let slot = self
            .forward
            .get_mut(raw)
            .ok_or(ExodusError::InvalidPointReference {
                raw: raw as i64 + 1,
                num_nodes,
            })?;
        Ok(*slot.get_or_insert_with(|| {
            self.reverse.push(raw);
            self.reverse.len() - 1
        }))
    }

    #[inline]
    pub fn get(&self, raw: usize) -> Option<usize> {
        self.forward.get(raw).copied().flatten()
    }

    /// Number of assigned points.
    #[inline]
    pub fn len(&self) -> usize {
        self.reverse.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }

    /// Raw node of each output point, indexed by output id.
    #[inline]
    pub fn raw_ids(&self) -> &[usize] {
        &self.reverse
    }

    pub fn num_raw(&self) -> usize {
        self.forward.len()
    }
}

impl DebugInvariants for PointMap {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "PointMap");
    }

    fn validate_invariants(&self) -> Result<(), ExodusError> {
        let assigned = self.forward.iter().filter(|f| f.is_some()).count();
        if assigned != self.reverse.len() {
            return Err(ExodusError::InvalidPointReference {
                raw: assigned as i64,
                num_nodes: self.reverse.len(),
            });
        }
        for (id, &raw) in self.reverse.iter().enumerate() {
            if self.get(raw) != Some(id) {
                return Err(ExodusError::InvalidPointReference {
                    raw: raw as i64 + 1,
                    num_nodes: self.forward.len(),
                });
            }
        }
        Ok(())
    }
}
