//! Line-oriented text raw store.
//!
//! The format is a plain-text rendering of an Exodus model, one record per
//! line. Blank lines and lines starting with `#` are ignored.
//!
//! ```text
//! EXODUS
//! TITLE two hexes
//! DIM 3
//! NODES 12
//! 0 0 0
//! ...
//! TIMES 2 0.0 0.5
//! BLOCK elem 1 HEX8 8 2 body
//! 1 2 3 4 5 6 7 8
//! 2 9 10 3 6 11 12 7
//! SET node 3 2 inlet
//! 1 2
//! SET side 4 1
//! 4
//! 1 2 6 5
//! SET elem 5 1
//! 2
//! -1
//! MAP elem 1 2 elem_num_map
//! 101 102
//! ATTRIBUTE elem 1 thickness
//! 0.5 0.25
//! VARIABLES nodal 3 DispX DispY DispZ
//! RESULT nodal - 1 0
//! 0 0 0 0 0 0 0 0 0 0 0 0
//! RESULT elem_block 1 1 0
//! 1.0 2.0
//! END
//! ```
//!
//! `SET` bodies: node sets give one line of node numbers; edge, face and
//! element sets give a line of entries and a line of orientations; side sets
//! give a line of per-side node counts and a line of nodes. Names are the
//! remainder of the header line and may be empty.

use crate::catalog::array::{TruthTable, VariableScope};
use crate::catalog::object::{ObjectType, TimeIndex, UserId};
use crate::io::memory::InMemoryStore;
use crate::io::{ModelParams, ObjectParams, RawStore, SetEntries, SideSetNodes};
use crate::mesh_error::ExodusError;
use std::io::Read;
use std::path::Path;
use std::str::{FromStr, Lines};

/// Raw store parsed from the text format.
#[derive(Clone, Debug)]
pub struct AsciiExodusStore {
    path: String,
    inner: InMemoryStore,
}

fn parse_err(msg: impl Into<String>) -> ExodusError {
    ExodusError::Parse(msg.into())
}

fn parse_token<T: FromStr>(token: Option<&str>, what: &str) -> Result<T, ExodusError> {
    token
        .ok_or_else(|| parse_err(format!("missing {what}")))?
        .parse::<T>()
        .map_err(|_| parse_err(format!("invalid {what}")))
}

fn parse_values<T: FromStr>(line: &str, expected: usize, what: &str) -> Result<Vec<T>, ExodusError> {
    let values = line
        .split_whitespace()
        .map(|t| t.parse::<T>().map_err(|_| parse_err(format!("invalid {what} `{t}`"))))
        .collect::<Result<Vec<T>, _>>()?;
    if values.len() != expected {
        return Err(parse_err(format!(
            "expected {expected} {what} values, found {}",
            values.len()
        )));
    }
    Ok(values)
}

fn block_type(token: &str) -> Result<ObjectType, ExodusError> {
    match token {
        "elem" => Ok(ObjectType::ElemBlock),
        "face" => Ok(ObjectType::FaceBlock),
        "edge" => Ok(ObjectType::EdgeBlock),
        _ => Err(parse_err(format!("unknown block kind `{token}`"))),
    }
}

fn set_type(token: &str) -> Result<ObjectType, ExodusError> {
    match token {
        "node" => Ok(ObjectType::NodeSet),
        "edge" => Ok(ObjectType::EdgeSet),
        "face" => Ok(ObjectType::FaceSet),
        "side" => Ok(ObjectType::SideSet),
        "elem" => Ok(ObjectType::ElemSet),
        _ => Err(parse_err(format!("unknown set kind `{token}`"))),
    }
}

fn map_type(token: &str) -> Result<ObjectType, ExodusError> {
    match token {
        "node" => Ok(ObjectType::NodeMap),
        "edge" => Ok(ObjectType::EdgeMap),
        "face" => Ok(ObjectType::FaceMap),
        "elem" => Ok(ObjectType::ElemMap),
        _ => Err(parse_err(format!("unknown map kind `{token}`"))),
    }
}

fn scope(token: &str) -> Result<VariableScope, ExodusError> {
    let t = match token {
        "nodal" => return Ok(VariableScope::Nodal),
        "elem_block" => ObjectType::ElemBlock,
        "face_block" => ObjectType::FaceBlock,
        "edge_block" => ObjectType::EdgeBlock,
        "node_set" => ObjectType::NodeSet,
        "edge_set" => ObjectType::EdgeSet,
        "face_set" => ObjectType::FaceSet,
        "side_set" => ObjectType::SideSet,
        "elem_set" => ObjectType::ElemSet,
        _ => return Err(parse_err(format!("unknown variable scope `{token}`"))),
    };
    Ok(VariableScope::Object(t))
}

/// Next non-blank, non-comment line.
fn next_record<'a>(lines: &mut Lines<'a>) -> Option<&'a str> {
    lines
        .by_ref()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
}

fn body<'a>(lines: &mut Lines<'a>, what: &str) -> Result<&'a str, ExodusError> {
    next_record(lines).ok_or_else(|| parse_err(format!("missing {what} line")))
}

/// Remainder of a header line after `skip` whitespace-separated tokens.
fn trailing_name(line: &str, skip: usize) -> String {
    line.split_whitespace().skip(skip).collect::<Vec<_>>().join(" ")
}

impl AsciiExodusStore {
    /// Open and parse a text store.
    ///
    /// # Errors
    /// `FileOpen` when the file cannot be read or is not a valid text store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ExodusError> {
        let path_str = path.as_ref().display().to_string();
        let to_open_err = |e: ExodusError| ExodusError::FileOpen {
            path: path_str.clone(),
            reason: e.to_string(),
        };
        let file = std::fs::File::open(path.as_ref()).map_err(|e| to_open_err(e.into()))?;
        let mut store = Self::read(file).map_err(to_open_err)?;
        store.path = path_str;
        Ok(store)
    }

    /// Parse a text store from any reader.
    pub fn read<R: Read>(mut reader: R) -> Result<Self, ExodusError> {
        let mut contents = String::new();
        reader.read_to_string(&mut contents)?;
        Self::parse(&contents)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn parse(contents: &str) -> Result<Self, ExodusError> {
        let mut lines = contents.lines();
        let header = next_record(&mut lines).ok_or_else(|| parse_err("missing exodus header"))?;
        if header != "EXODUS" {
            return Err(parse_err("invalid exodus header"));
        }

        let mut title = String::new();
        let mut dimension: Option<usize> = None;
        let mut store: Option<InMemoryStore> = None;
        let mut ended = false;

        while let Some(line) = next_record(&mut lines) {
            let mut parts = line.split_whitespace();
            let keyword = parts.next().unwrap_or_default();
            if keyword == "TITLE" {
                title = trailing_name(line, 1);
                if let Some(s) = store.as_mut() {
                    s.set_title(&title);
                }
                continue;
            }
            if keyword == "DIM" {
                let dim: usize = parse_token(parts.next(), "dimension")?;
                if dim == 0 || dim > 3 {
                    return Err(parse_err(format!("unsupported coordinate dimension: {dim}")));
                }
                dimension = Some(dim);
                store = Some(InMemoryStore::new(title.clone(), dim));
                continue;
            }
            if keyword == "END" {
                ended = true;
                break;
            }
            let s = store
                .as_mut()
                .ok_or_else(|| parse_err(format!("`{keyword}` before DIM declaration")))?;
            let dim = dimension.unwrap_or(3);
            match keyword {
                "NODES" => {
                    let count: usize = parse_token(parts.next(), "node count")?;
                    let mut nodes = Vec::with_capacity(count);
                    for _ in 0..count {
                        let coords: Vec<f64> = parse_values(body(&mut lines, "node")?, dim, "coordinate")?;
                        let mut xyz = [0.0; 3];
                        xyz[..dim].copy_from_slice(&coords);
                        nodes.push(xyz);
                    }
                    s.add_nodes(&nodes);
                }
                "TIMES" => {
                    let count: usize = parse_token(parts.next(), "time count")?;
                    let rest = parts.collect::<Vec<_>>().join(" ");
                    s.set_times(parse_values(&rest, count, "time")?);
                }
                "BLOCK" => {
                    let t = block_type(parts.next().unwrap_or_default())?;
                    let id: i64 = parse_token(parts.next(), "block id")?;
                    let type_name = parts
                        .next()
                        .ok_or_else(|| parse_err("missing block topology"))?
                        .to_string();
                    let npe: usize = parse_token(parts.next(), "nodes per entry")?;
                    let size: usize = parse_token(parts.next(), "entry count")?;
                    let name = trailing_name(line, 6);
                    let mut conn = Vec::with_capacity(size * npe);
                    for _ in 0..size {
                        conn.extend(parse_values::<i64>(body(&mut lines, "entry")?, npe, "node")?);
                    }
                    s.add_block(t, id, &name, &type_name, npe, conn);
                }
                "SET" => {
                    let t = set_type(parts.next().unwrap_or_default())?;
                    let id: i64 = parse_token(parts.next(), "set id")?;
                    let size: usize = parse_token(parts.next(), "set size")?;
                    let name = trailing_name(line, 4);
                    match t {
                        ObjectType::NodeSet => {
                            let nodes = parse_values(body(&mut lines, "set")?, size, "node")?;
                            s.add_node_set(id, &name, nodes);
                        }
                        ObjectType::SideSet => {
                            let counts: Vec<usize> =
                                parse_values(body(&mut lines, "side count")?, size, "side count")?;
                            let total = counts.iter().sum();
                            let nodes = parse_values(body(&mut lines, "side node")?, total, "node")?;
                            s.add_side_set(id, &name, counts, nodes);
                        }
                        _ => {
                            let entries = parse_values(body(&mut lines, "set")?, size, "entry")?;
                            let orient =
                                parse_values(body(&mut lines, "orientation")?, size, "orientation")?;
                            s.add_set(t, id, &name, entries, orient);
                        }
                    }
                }
                "MAP" => {
                    let t = map_type(parts.next().unwrap_or_default())?;
                    let id: i64 = parse_token(parts.next(), "map id")?;
                    let len: usize = parse_token(parts.next(), "map length")?;
                    let name = trailing_name(line, 4);
                    let values = parse_values(body(&mut lines, "map")?, len, "map")?;
                    s.add_map(t, id, &name, values);
                }
                "ATTRIBUTE" => {
                    let t = block_type(parts.next().unwrap_or_default())?;
                    let id: i64 = parse_token(parts.next(), "block id")?;
                    let name = trailing_name(line, 3);
                    let values: Vec<f64> = body(&mut lines, "attribute")?
                        .split_whitespace()
                        .map(|v| v.parse().map_err(|_| parse_err("invalid attribute value")))
                        .collect::<Result<_, _>>()?;
                    s.add_attribute(t, id, &name, values);
                }
                "VARIABLES" => {
                    let sc = scope(parts.next().unwrap_or_default())?;
                    let count: usize = parse_token(parts.next(), "variable count")?;
                    let names: Vec<&str> = parts.collect();
                    if names.len() != count {
                        return Err(parse_err(format!(
                            "expected {count} variable names, found {}",
                            names.len()
                        )));
                    }
                    s.set_variables(sc, &names);
                }
                "RESULT" => {
                    let sc = scope(parts.next().unwrap_or_default())?;
                    let object = match parts.next() {
                        Some("-") => None,
                        tok => Some(parse_token::<i64>(tok, "result object")?),
                    };
                    let variable: u32 = parse_token(parts.next(), "variable index")?;
                    let time: usize = parse_token(parts.next(), "time index")?;
                    let values: Vec<f64> = body(&mut lines, "result")?
                        .split_whitespace()
                        .map(|v| v.parse().map_err(|_| parse_err("invalid result value")))
                        .collect::<Result<_, _>>()?;
                    s.set_result(sc, object, variable, time, values);
                }
                other => return Err(parse_err(format!("unknown section `{other}`"))),
            }
        }
        if !ended {
            return Err(parse_err("missing END"));
        }
        let inner = store.ok_or_else(|| parse_err("missing DIM declaration"))?;
        Ok(AsciiExodusStore {
            path: String::new(),
            inner,
        })
    }
}

impl RawStore for AsciiExodusStore {
    fn model_params(&self) -> Result<ModelParams, ExodusError> {
        self.inner.model_params()
    }
    fn time_values(&self) -> Result<Vec<f64>, ExodusError> {
        self.inner.time_values()
    }
    fn object_ids(&self, t: ObjectType) -> Result<Vec<UserId>, ExodusError> {
        self.inner.object_ids(t)
    }
    fn object_names(&self, t: ObjectType) -> Result<Vec<String>, ExodusError> {
        self.inner.object_names(t)
    }
    fn object_params(&self, t: ObjectType, id: UserId) -> Result<ObjectParams, ExodusError> {
        self.inner.object_params(t, id)
    }
    fn attribute_names(&self, t: ObjectType, id: UserId) -> Result<Vec<String>, ExodusError> {
        self.inner.attribute_names(t, id)
    }
    fn variable_names(&self, scope: VariableScope) -> Result<Vec<String>, ExodusError> {
        self.inner.variable_names(scope)
    }
    fn truth_table(&self, t: ObjectType) -> Result<TruthTable, ExodusError> {
        self.inner.truth_table(t)
    }
    fn read_array(
        &self,
        scope: VariableScope,
        object: Option<UserId>,
        variable: u32,
        time: TimeIndex,
    ) -> Result<Vec<f64>, ExodusError> {
        self.inner.read_array(scope, object, variable, time)
    }
    fn read_connectivity(&self, t: ObjectType, id: UserId) -> Result<Vec<i64>, ExodusError> {
        self.inner.read_connectivity(t, id)
    }
    fn read_set(&self, t: ObjectType, id: UserId) -> Result<SetEntries, ExodusError> {
        self.inner.read_set(t, id)
    }
    fn read_side_set_nodes(&self, id: UserId) -> Result<SideSetNodes, ExodusError> {
        self.inner.read_side_set_nodes(id)
    }
    fn read_attribute(
        &self,
        t: ObjectType,
        id: UserId,
        attribute: usize,
    ) -> Result<Vec<f64>, ExodusError> {
        self.inner.read_attribute(t, id, attribute)
    }
    fn read_map(&self, t: ObjectType, id: UserId) -> Result<Vec<i64>, ExodusError> {
        self.inner.read_map(t, id)
    }
    fn read_coordinates(&self) -> Result<Vec<Vec<f64>>, ExodusError> {
        self.inner.read_coordinates()
    }
    fn close(&mut self) {
        self.inner.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_TRIS: &str = "EXODUS
TITLE two triangles
DIM 2
NODES 4
0 0
1 0
1 1
0 1
TIMES 1 0.0
BLOCK elem 7 TRI3 3 2 skin
1 2 3
1 3 4
SET node 1 2
2 4
VARIABLES elem_block 1 P
RESULT elem_block 7 1 0
1.0 2.0
END
";

    #[test]
    fn parses_model_and_block() {
        let store = AsciiExodusStore::read(TWO_TRIS.as_bytes()).unwrap();
        let m = store.model_params().unwrap();
        assert_eq!(m.title, "two triangles");
        assert_eq!(m.dimension, 2);
        assert_eq!(m.num_nodes, 4);
        assert_eq!(m.num_elems, 2);
        assert_eq!(store.object_names(ObjectType::ElemBlock).unwrap(), vec!["skin"]);
        assert_eq!(
            store.read_connectivity(ObjectType::ElemBlock, UserId(7)).unwrap(),
            vec![1, 2, 3, 1, 3, 4]
        );
        assert_eq!(
            store.read_set(ObjectType::NodeSet, UserId(1)).unwrap().entries,
            vec![2, 4]
        );
    }

    #[test]
    fn rejects_bad_header() {
        let err = AsciiExodusStore::read("MESH\nEND\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ExodusError::Parse(ref m) if m.contains("header")));
    }

    #[test]
    fn rejects_short_connectivity() {
        let text = TWO_TRIS.replace("1 3 4\n", "1 3\n");
        assert!(AsciiExodusStore::read(text.as_bytes()).is_err());
    }

    #[test]
    fn missing_file_is_file_open_error() {
        let err = AsciiExodusStore::open("/nonexistent/model.exo.txt").unwrap_err();
        assert!(err.is_fatal());
    }
}
