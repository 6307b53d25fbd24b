//! Materialized array buffers.

use crate::catalog::array::StorageKind;
use crate::mesh_error::ExodusError;

/// Flat values of one array, tuple-major.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ArrayValues {
    Real(Vec<f64>),
    Integer(Vec<i64>),
}

impl ArrayValues {
    pub fn len(&self) -> usize {
        match self {
            ArrayValues::Real(v) => v.len(),
            ArrayValues::Integer(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn storage_kind(&self) -> StorageKind {
        match self {
            ArrayValues::Real(_) => StorageKind::Float64,
            ArrayValues::Integer(_) => StorageKind::Int64,
        }
    }

    /// Zero-filled values of the given kind.
    pub fn zeros(kind: StorageKind, len: usize) -> Self {
        match kind {
            StorageKind::Float64 => ArrayValues::Real(vec![0.0; len]),
            StorageKind::Int64 => ArrayValues::Integer(vec![0; len]),
        }
    }

    /// Copy `src[src_range]` into `self` starting at `dst`. Kinds must agree.
    pub(crate) fn copy_from(
        &mut self,
        dst: usize,
        src: &ArrayValues,
        src_start: usize,
        len: usize,
    ) -> bool {
        match (self, src) {
            (ArrayValues::Real(d), ArrayValues::Real(s)) => copy_range(d, dst, s, src_start, len),
            (ArrayValues::Integer(d), ArrayValues::Integer(s)) => {
                copy_range(d, dst, s, src_start, len)
            }
            _ => false,
        }
    }
}

fn copy_range<T: Copy>(dst: &mut [T], at: usize, src: &[T], from: usize, len: usize) -> bool {
    match (dst.get_mut(at..at + len), src.get(from..from + len)) {
        (Some(d), Some(s)) => {
            d.copy_from_slice(s);
            true
        }
        _ => false,
    }
}

/// One array as held by the cache: `components` values per tuple.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CachedArray {
    pub components: usize,
    pub values: ArrayValues,
}

impl CachedArray {
    pub fn real(components: usize, values: Vec<f64>) -> Self {
        CachedArray {
            components,
            values: ArrayValues::Real(values),
        }
    }

    pub fn integer(components: usize, values: Vec<i64>) -> Self {
        CachedArray {
            components,
            values: ArrayValues::Integer(values),
        }
    }

    /// Number of tuples.
    pub fn tuples(&self) -> usize {
        self.values.len().checked_div(self.components).unwrap_or(0)
    }

    /// Bytes charged against the cache budget.
    pub fn byte_size(&self) -> usize {
        match &self.values {
            ArrayValues::Real(v) => v.len() * std::mem::size_of::<f64>(),
            ArrayValues::Integer(v) => v.len() * std::mem::size_of::<i64>(),
        }
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

/// Interleave equally long component columns into one tuple-major buffer.
///
/// # Errors
/// `ArrayRead` when the columns differ in length.
pub fn interleave(columns: &[Vec<f64>]) -> Result<Vec<f64>, ExodusError> {
    let Some(first) = columns.first() else {
        return Ok(Vec::new());
    };
    let n = first.len();
    if let Some(bad) = columns.iter().find(|c| c.len() != n) {
        return Err(ExodusError::array_read(
            "component columns",
            format!("lengths differ ({n} vs {})", bad.len()),
        ));
    }
    if columns.len() == 1 {
        return Ok(first.clone());
    }
    let mut out = Vec::with_capacity(n * columns.len());
    for i in 0..n {
        out.extend(columns.iter().map(|c| c[i]));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleave_is_tuple_major() {
        let v = interleave(&[vec![1.0, 2.0], vec![10.0, 20.0], vec![100.0, 200.0]]).unwrap();
        assert_eq!(v, vec![1.0, 10.0, 100.0, 2.0, 20.0, 200.0]);
    }

    #[test]
    fn interleave_rejects_ragged_columns() {
        assert!(interleave(&[vec![1.0], vec![]]).is_err());
        assert!(interleave(&[]).unwrap().is_empty());
    }

    #[test]
    fn sizes_and_copies() {
        let a = CachedArray::real(3, vec![0.0; 6]);
        assert_eq!(a.tuples(), 2);
        assert_eq!(a.byte_size(), 48);
        let mut dst = ArrayValues::zeros(StorageKind::Int64, 4);
        assert!(dst.copy_from(1, &ArrayValues::Integer(vec![7, 8, 9]), 1, 2));
        assert_eq!(dst, ArrayValues::Integer(vec![0, 8, 9, 0]));
        assert!(!dst.copy_from(3, &ArrayValues::Integer(vec![7, 8]), 0, 2));
        assert!(!dst.copy_from(0, &ArrayValues::Real(vec![1.0]), 0, 1));
    }
}
