//! Mesh topology: cell shapes, point squeezing and connectivity assembly.

pub mod cache;
pub mod cell_type;
pub mod connectivity;
pub mod point_map;

pub use cache::{GenerationTracked, InvalidateCache};
pub use cell_type::CellType;
pub use connectivity::{AssemblyState, BuildOutcome, ConnectivityAssembler, Topology};
pub use point_map::PointMap;
