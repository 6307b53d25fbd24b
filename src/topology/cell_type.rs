//! Cell type metadata for assembled cells.

/// Canonical cell shapes produced by the connectivity assembler.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum CellType {
    /// Placeholder for entries with no supported shape.
    Empty,
    /// 0D vertex.
    Vertex,
    /// 1D segment/edge.
    Segment,
    /// 3-node segment.
    QuadraticSegment,
    /// 2D simplex (triangle).
    Triangle,
    /// 6-node triangle.
    QuadraticTriangle,
    /// 2D tensor-product cell (quad).
    Quadrilateral,
    /// 8-node serendipity quad.
    QuadraticQuadrilateral,
    /// 9-node Lagrange quad.
    BiquadraticQuadrilateral,
    /// 3D simplex (tet).
    Tetrahedron,
    /// 10-node tet.
    QuadraticTetrahedron,
    /// 3D pyramid.
    Pyramid,
    /// 3D wedge/prism.
    Prism,
    /// 3D tensor-product cell (hex).
    Hexahedron,
    /// 20-node serendipity hex.
    QuadraticHexahedron,
    /// 27-node Lagrange hex.
    TriquadraticHexahedron,
}

impl Default for CellType {
    fn default() -> Self {
        CellType::Vertex
    }
}

impl CellType {
    /// Returns the topological dimension of the cell.
    pub fn dimension(self) -> u8 {
        match self {
            CellType::Empty | CellType::Vertex => 0,
            CellType::Segment | CellType::QuadraticSegment => 1,
            CellType::Triangle
            | CellType::QuadraticTriangle
            | CellType::Quadrilateral
            | CellType::QuadraticQuadrilateral
            | CellType::BiquadraticQuadrilateral => 2,
            CellType::Tetrahedron
            | CellType::QuadraticTetrahedron
            | CellType::Pyramid
            | CellType::Prism
            | CellType::Hexahedron
            | CellType::QuadraticHexahedron
            | CellType::TriquadraticHexahedron => 3,
        }
    }

    /// Number of points in the canonical node ordering.
    pub fn points_per_cell(self) -> usize {
        match self {
            CellType::Empty => 0,
            CellType::Vertex => 1,
            CellType::Segment => 2,
            CellType::QuadraticSegment | CellType::Triangle => 3,
            CellType::Quadrilateral | CellType::Tetrahedron => 4,
            CellType::Pyramid => 5,
            CellType::QuadraticTriangle | CellType::Prism => 6,
            CellType::QuadraticQuadrilateral | CellType::Hexahedron => 8,
            CellType::BiquadraticQuadrilateral => 9,
            CellType::QuadraticTetrahedron => 10,
            CellType::QuadraticHexahedron => 20,
            CellType::TriquadraticHexahedron => 27,
        }
    }

    /// Derive the cell shape of a block from its element type name and the
    /// number of nodes stored per entry.
    ///
    /// Matching uses the upper-cased three-letter prefix of `type_name`, the
    /// convention Exodus writers follow (`HEX8`, `HEX20`, `SHELL4`, ...).
    /// Returns `None` for unsupported types. Empty `NULL` blocks map to
    /// [`CellType::Empty`].
    pub fn from_block_type(type_name: &str, nodes_per_entry: usize, size: usize) -> Option<Self> {
        let upper = type_name.trim().to_ascii_uppercase();
        let prefix = upper.get(..3).unwrap_or(upper.as_str());
        let quadratic = match (prefix, nodes_per_entry) {
            ("TRI", 6) => Some(CellType::QuadraticTriangle),
            ("SHE", 8) | ("SHE", 9) | ("QUA", 8) => Some(CellType::QuadraticQuadrilateral),
            ("QUA", 9) => Some(CellType::BiquadraticQuadrilateral),
            ("TET", 10) | ("TET", 11) => Some(CellType::QuadraticTetrahedron),
            ("HEX", 20) | ("HEX", 21) => Some(CellType::QuadraticHexahedron),
            ("HEX", 27) => Some(CellType::TriquadraticHexahedron),
            ("TRU", 3) | ("BEA", 3) | ("BAR", 3) | ("EDG", 3) => Some(CellType::QuadraticSegment),
            _ => None,
        };
        if quadratic.is_some() {
            return quadratic;
        }
        match prefix {
            "CIR" | "SPH" => Some(CellType::Vertex),
            "BAR" | "TRU" | "BEA" | "EDG" => Some(CellType::Segment),
            "TRI" => Some(CellType::Triangle),
            "QUA" => Some(CellType::Quadrilateral),
            "TET" => Some(CellType::Tetrahedron),
            "PYR" => Some(CellType::Pyramid),
            "WED" => Some(CellType::Prism),
            "HEX" => Some(CellType::Hexahedron),
            "SHE" if nodes_per_entry == 3 => Some(CellType::Triangle),
            "SHE" if nodes_per_entry == 4 => Some(CellType::Quadrilateral),
            _ if upper.starts_with("STRAIGHT") && nodes_per_entry == 2 => Some(CellType::Segment),
            _ if upper.starts_with("NULL") && size == 0 => Some(CellType::Empty),
            _ => None,
        }
    }

    /// Shape of a side-set side given its node count.
    pub fn from_side_node_count(nodes: usize) -> Self {
        match nodes {
            1 => CellType::Vertex,
            2 => CellType::Segment,
            3 => CellType::Triangle,
            4 => CellType::Quadrilateral,
            6 => CellType::QuadraticTriangle,
            8 => CellType::QuadraticQuadrilateral,
            9 => CellType::BiquadraticQuadrilateral,
            _ => CellType::Empty,
        }
    }

    /// Reorder one cell's nodes from file order into canonical order in place.
    ///
    /// Only the serendipity and Lagrange hexahedra differ: their two rings of
    /// four mid-edge nodes (12..16 and 16..20) are stored the other way round.
    pub fn canonicalize(self, nodes: &mut [i64]) {
        if matches!(
            self,
            CellType::QuadraticHexahedron | CellType::TriquadraticHexahedron
        ) && nodes.len() >= 20
        {
            let (lo, hi) = nodes[12..20].split_at_mut(4);
            lo.swap_with_slice(hi);
        }
    }
}
