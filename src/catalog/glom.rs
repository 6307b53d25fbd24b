//! Glomming: grouping single-component result variables into multi-component
//! arrays.
//!
//! The raw variable list of one scope is scanned left to right. At each
//! position the strongest applicable rule wins and the scan advances past the
//! names it consumed; there is no backtracking.
//!
//! 1. Symmetric tensor: six consecutive names `P` + `{XX,YY,ZZ,XY,YZ,XZ}`
//!    (any order, case-insensitive axis letters, identical prefix `P`).
//! 2. Vector: two or three consecutive names `P` + `X`, `P` + `Y`[, `P` + `Z`],
//!    in that order.
//! 3. Integration point: a run of `<field>_<shape>_GP<digits>` names sharing
//!    field and shape, validated against a complete tensor-product point grid.
//!    A run that fails validation is emitted as scalars and reported.
//! 4. Scalar.
//!
//! Every glommed run also requires identical truth-table columns; a mismatch
//! silently falls through to the next rule.

use crate::catalog::array::{ArrayDescriptor, ArraySource, GlomKind, StorageKind, TruthTable};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static TENSOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+)([XxYyZz])([XxYyZz])$").unwrap());
static VECTOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+)([XxYyZz])$").unwrap());
static GAUSS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*)_([^_]*)_GP([0-9]+)$").unwrap());

const TENSOR_COMPONENTS: usize = 6;

/// Result of glomming one scope's variable list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Glommed {
    pub arrays: Vec<ArrayDescriptor>,
    /// Integration-point runs that were rejected, one message per run.
    pub warnings: Vec<String>,
}

/// Trim raw variable names and replace blank ones with `null_<i>`.
pub fn normalize_names(raw: Vec<String>) -> Vec<String> {
    raw.into_iter()
        .enumerate()
        .map(|(i, n)| {
            let t = n.trim();
            if t.is_empty() {
                format!("null_{i}")
            } else {
                t.to_string()
            }
        })
        .collect()
}

/// Group `names` into array descriptors using `truth` for the defined-on
/// bitmaps. Deterministic: equal inputs yield equal outputs.
pub fn glom(names: &[String], truth: &TruthTable) -> Glommed {
    let mut out = Glommed::default();
    let mut i = 0;
    while i < names.len() {
        if let Some(desc) = try_tensor(names, i, truth) {
            i += desc.component_count;
            out.arrays.push(desc);
            continue;
        }
        if let Some(desc) = try_vector(names, i, truth) {
            i += desc.component_count;
            out.arrays.push(desc);
            continue;
        }
        match try_integration_point(names, i, truth) {
            Some(PointRun::Glommed(desc)) => {
                i += desc.component_count;
                out.arrays.push(desc);
            }
            Some(PointRun::Invalid { len, reason }) => {
                let msg = format!("integration point field `{}` not glommed: {reason}", names[i]);
                log::warn!("{msg}");
                out.warnings.push(msg);
                push_scalars(&mut out, names, i, len, truth);
                i += len;
            }
            Some(PointRun::Split(len)) => {
                push_scalars(&mut out, names, i, len, truth);
                i += len;
            }
            None => {
                out.arrays.push(ArrayDescriptor::scalar(&names[i], i, truth));
                i += 1;
            }
        }
    }
    out
}

fn push_scalars(out: &mut Glommed, names: &[String], start: usize, len: usize, truth: &TruthTable) {
    for k in start..start + len {
        out.arrays.push(ArrayDescriptor::scalar(&names[k], k, truth));
    }
}

fn composite(
    name: &str,
    kind: GlomKind,
    names: &[String],
    start: usize,
    len: usize,
    truth: &TruthTable,
) -> ArrayDescriptor {
    ArrayDescriptor {
        name: name.to_string(),
        component_count: len,
        glom_kind: kind,
        storage_kind: StorageKind::Float64,
        source: ArraySource::Result,
        enabled: false,
        constituent_names: names[start..start + len].to_vec(),
        constituent_indices: (start..start + len).map(|k| k as u32 + 1).collect(),
        defined_on: truth.column(start),
    }
}

fn truth_agrees(truth: &TruthTable, start: usize, len: usize) -> bool {
    let cols: Vec<usize> = (start..start + len).collect();
    truth.columns_match(&cols)
}

fn try_tensor(names: &[String], start: usize, truth: &TruthTable) -> Option<ArrayDescriptor> {
    let caps = TENSOR_RE.captures(&names[start])?;
    let prefix = caps.get(1)?.as_str();
    if start + TENSOR_COMPONENTS > names.len() {
        return None;
    }
    let mut pairs = BTreeSet::new();
    for name in &names[start..start + TENSOR_COMPONENTS] {
        let c = TENSOR_RE.captures(name)?;
        if c.get(1)?.as_str() != prefix {
            return None;
        }
        let a = axis(c.get(2)?.as_str())?;
        let b = axis(c.get(3)?.as_str())?;
        pairs.insert((a.min(b), a.max(b)));
    }
    let expected: BTreeSet<(u8, u8)> =
        [(0, 0), (1, 1), (2, 2), (0, 1), (1, 2), (0, 2)].into_iter().collect();
    if pairs != expected || !truth_agrees(truth, start, TENSOR_COMPONENTS) {
        return None;
    }
    Some(composite(
        prefix,
        GlomKind::SymmetricTensor,
        names,
        start,
        TENSOR_COMPONENTS,
        truth,
    ))
}

fn try_vector(names: &[String], start: usize, truth: &TruthTable) -> Option<ArrayDescriptor> {
    let caps = VECTOR_RE.captures(&names[start])?;
    let prefix = caps.get(1)?.as_str();
    let mut len = 0;
    for (k, name) in names[start..].iter().take(3).enumerate() {
        let Some(c) = VECTOR_RE.captures(name) else {
            break;
        };
        let same_prefix = c.get(1).is_some_and(|m| m.as_str() == prefix);
        let in_order = c.get(2).and_then(|m| axis(m.as_str())) == Some(k as u8);
        if !same_prefix || !in_order {
            break;
        }
        len += 1;
    }
    if len < 2 || !truth_agrees(truth, start, len) {
        return None;
    }
    let kind = if len == 2 {
        GlomKind::Vector2
    } else {
        GlomKind::Vector3
    };
    Some(composite(prefix, kind, names, start, len, truth))
}

/// Outcome for a run of two or more integration-point names.
enum PointRun {
    Glommed(ArrayDescriptor),
    /// The suffixes do not form a complete point set.
    Invalid { len: usize, reason: String },
    /// Constituents are stored on different objects; kept as scalars.
    Split(usize),
}

/// `None` when the rule does not apply at all.
fn try_integration_point(names: &[String], start: usize, truth: &TruthTable) -> Option<PointRun> {
    let caps = GAUSS_RE.captures(&names[start])?;
    let field = caps.get(1)?.as_str();
    let shape = caps.get(2)?.as_str();
    let mut digits: Vec<&str> = Vec::new();
    for name in &names[start..] {
        let Some(c) = GAUSS_RE.captures(name) else {
            break;
        };
        match (c.get(1), c.get(2), c.get(3)) {
            (Some(f), Some(s), Some(d)) if f.as_str() == field && s.as_str() == shape => {
                digits.push(d.as_str());
            }
            _ => break,
        }
    }
    let len = digits.len();
    if len < 2 {
        return None;
    }
    if let Err(reason) = verify_point_grid(shape, &digits) {
        return Some(PointRun::Invalid { len, reason });
    }
    if !truth_agrees(truth, start, len) {
        return Some(PointRun::Split(len));
    }
    Some(PointRun::Glommed(composite(
        field,
        GlomKind::IntegrationPoint,
        names,
        start,
        len,
        truth,
    )))
}

fn axis(s: &str) -> Option<u8> {
    match s {
        "X" | "x" => Some(0),
        "Y" | "y" => Some(1),
        "Z" | "z" => Some(2),
        _ => None,
    }
}

/// Parametric dimension implied by an element shape tag.
fn shape_dimension(tag: &str) -> Option<usize> {
    let upper = tag.to_ascii_uppercase();
    match upper.get(..3).unwrap_or(upper.as_str()) {
        "HEX" | "TET" | "WED" | "PYR" => Some(3),
        "QUA" | "TRI" | "SHE" => Some(2),
        "BAR" | "BEA" | "TRU" | "EDG" => Some(1),
        _ => None,
    }
}

/// Check that the `GP` suffixes of a run enumerate a complete point set.
///
/// When every suffix has exactly `dim` digits (and `dim > 1`), each digit is a
/// 0-based coordinate along one axis and the run must cover the full
/// `(max_r+1) x (max_s+1) x ...` grid once. Otherwise each suffix is a point
/// number: the numbers must be a contiguous range starting at 0 or 1 whose
/// length is `k^dim`.
fn verify_point_grid(shape: &str, digits: &[&str]) -> Result<(), String> {
    let first_len = digits.first().map_or(0, |d| d.len());
    let dim = match shape_dimension(shape) {
        Some(d) => d,
        None => {
            if digits.iter().any(|d| d.len() != first_len) {
                return Err("suffixes have differing lengths".into());
            }
            first_len
        }
    };
    if dim == 0 || dim > 3 {
        return Err(format!("integration dimension {dim} is outside 1..=3"));
    }
    let n = digits.len();

    if dim > 1 && digits.iter().all(|d| d.len() == dim) {
        let coords: Vec<Vec<u32>> = digits
            .iter()
            .map(|d| d.chars().filter_map(|c| c.to_digit(10)).collect())
            .collect();
        let mut extent = vec![0u32; dim];
        for c in &coords {
            for (e, &v) in extent.iter_mut().zip(c) {
                *e = (*e).max(v);
            }
        }
        let expected: usize = extent.iter().map(|&m| m as usize + 1).product();
        if expected != n {
            return Err(format!(
                "{n} points but the integration order implies {expected}"
            ));
        }
        if !coords.iter().all_unique() {
            return Err("duplicate integration points".into());
        }
        return Ok(());
    }

    let mut numbers = Vec::with_capacity(n);
    for d in digits {
        let v: u64 = d
            .parse()
            .map_err(|_| format!("point number `{d}` is not an integer"))?;
        numbers.push(v);
    }
    numbers.sort_unstable();
    if numbers.windows(2).any(|w| w[0] == w[1]) {
        return Err("duplicate integration points".into());
    }
    let base = numbers[0];
    if base > 1 {
        return Err(format!("point numbering starts at {base}"));
    }
    if numbers[n - 1] - base + 1 != n as u64 {
        return Err("point numbering has gaps".into());
    }
    let per_axis = (1..=n).find(|k| k.pow(dim as u32) >= n).unwrap_or(n);
    if per_axis.pow(dim as u32) != n {
        return Err(format!("{n} points do not form a {dim}-dimensional grid"));
    }
    Ok(())
}
