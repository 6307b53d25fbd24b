//! Reader options.

use crate::data::array_cache::DEFAULT_CAPACITY_BYTES;

/// Options controlling caching and output assembly.
///
/// Deserializes from partial documents; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Array cache byte budget.
    pub cache_capacity_bytes: usize,
    /// Emit only points referenced by enabled cells, densely renumbered.
    pub squeeze_points: bool,
    /// Deform points by the `DISP*` nodal vector when one exists.
    pub apply_displacements: bool,
    pub displacement_magnitude: f64,
    /// Add an `ObjectId` cell array holding each cell's owner id.
    pub generate_object_id_array: bool,
    pub generate_global_element_ids: bool,
    pub generate_global_node_ids: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            cache_capacity_bytes: DEFAULT_CAPACITY_BYTES,
            squeeze_points: true,
            apply_displacements: true,
            displacement_magnitude: 1.0,
            generate_object_id_array: true,
            generate_global_element_ids: false,
            generate_global_node_ids: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: ReaderConfig =
            serde_json::from_str(r#"{ "squeeze_points": false, "displacement_magnitude": 2.5 }"#)
                .unwrap();
        assert!(!cfg.squeeze_points);
        assert_eq!(cfg.displacement_magnitude, 2.5);
        assert_eq!(cfg.cache_capacity_bytes, 128 * 1024 * 1024);
        assert!(cfg.generate_object_id_array);
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = ReaderConfig {
            generate_global_node_ids: true,
            ..ReaderConfig::default()
        };
        let text = serde_json::to_string(&cfg).unwrap();
        let back: ReaderConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back, cfg);
    }
}
