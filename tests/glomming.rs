mod common;

use common::loaded;
use exodus_sieve::catalog::glom::{glom, normalize_names};
use exodus_sieve::prelude::*;
use proptest::prelude::*;

fn hexes() -> InMemoryStore {
    let corners: Vec<[f64; 3]> = (0..12)
        .map(|i| [(i % 2) as f64, ((i / 2) % 2) as f64, (i / 4) as f64])
        .collect();
    let mut s = InMemoryStore::new("hexes", 3);
    s.add_nodes(&corners).add_block(
        ObjectType::ElemBlock,
        1,
        "hexes",
        "HEX8",
        8,
        vec![1, 2, 4, 3, 5, 6, 8, 7, 5, 6, 8, 7, 9, 10, 12, 11],
    );
    s
}

#[test]
fn integration_points_and_vectors_through_the_reader() {
    let elem = VariableScope::Object(ObjectType::ElemBlock);
    let nodal = VariableScope::Nodal;
    let gp: Vec<String> = (1..=8).map(|k| format!("Stress_Hex_GP{k}")).collect();
    let gp_refs: Vec<&str> = gp.iter().map(String::as_str).collect();
    let mut s = hexes();
    s.set_variables(elem, &gp_refs)
        .set_variables(nodal, &["DispX", "DispY", "DispZ", "Temp"]);
    for k in 1..=8u32 {
        s.set_result(elem, Some(1), k, 0, vec![k as f64, 10.0 * k as f64]);
    }
    for k in 1..=4u32 {
        s.set_result(nodal, None, k, 0, vec![0.0; 12]);
    }
    let mut r = loaded(s);

    assert_eq!(r.array_count(elem), 1);
    let d = r.array_descriptor(elem, 0).unwrap();
    assert_eq!(d.glom_kind, GlomKind::IntegrationPoint);
    assert_eq!(d.component_count, 8);
    assert_eq!(d.constituent_indices, (1..=8).collect::<Vec<u32>>());

    assert_eq!(r.array_count(nodal), 2);
    assert_eq!(r.array_name(nodal, 0).unwrap(), "Disp");
    assert_eq!(r.array_descriptor(nodal, 0).unwrap().glom_kind, GlomKind::Vector3);
    assert_eq!(r.array_index_by_name(nodal, "Temp"), Some(1));

    r.set_all_array_status(elem, true);
    let mesh = r.assemble_output(TimeIndex(0)).unwrap();
    let stress = mesh.cell_array("Stress").unwrap();
    assert_eq!(stress.components, 8);
    let v = stress.as_real().unwrap();
    assert_eq!(&v[..8], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    assert_eq!(v[8], 10.0);
}

#[test]
fn tensor_split_across_objects_stays_scalar() {
    let names: Vec<String> = ["SXX", "SYY", "SZZ", "SXY", "SYZ", "SXZ"]
        .iter()
        .map(|n| n.to_string())
        .collect();
    let mut truth = TruthTable::filled(2, names.len(), true);
    let whole = glom(&names, &truth);
    assert_eq!(whole.arrays.len(), 1);
    assert_eq!(whole.arrays[0].glom_kind, GlomKind::SymmetricTensor);

    truth.set(1, 4, false);
    let split = glom(&names, &truth);
    assert_eq!(split.arrays.len(), 6);
    assert!(split.arrays.iter().all(|a| a.glom_kind == GlomKind::Scalar));
    assert_eq!(split.arrays[4].defined_on, vec![true, false]);
    assert!(split.warnings.is_empty());
}

#[test]
fn side_with_unknown_node_count_becomes_empty_cell() {
    let mut s = hexes();
    s.add_side_set(3, "faces", vec![4, 5], vec![1, 2, 4, 3, 9, 10, 12, 11, 5]);
    let mut r = loaded(s);
    r.set_status(ObjectType::SideSet, 0, true).unwrap();

    let mesh = r.assemble_output(TimeIndex(0)).unwrap();
    assert_eq!(mesh.num_cells(), 4);
    assert_eq!(mesh.topology.shapes[2], CellType::Quadrilateral);
    assert_eq!(mesh.topology.shapes[3], CellType::Empty);
    assert!(mesh.topology.cell(3).unwrap().is_empty());
    let ids = mesh.cell_array("ObjectId").unwrap().as_integer().unwrap();
    assert_eq!(&ids[2..], &[3, 3]);
    assert_eq!(r.warnings().len(), 1);
    assert!(r.warnings()[0].contains("side with 5 nodes"));
}

#[test]
fn blank_variable_names_are_numbered() {
    let names = normalize_names(vec!["  Temp ".into(), "   ".into(), "P".into()]);
    assert_eq!(names, vec!["Temp", "null_1", "P"]);
}

fn name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("VelX".to_string()),
        Just("VelY".to_string()),
        Just("VelZ".to_string()),
        Just("SXX".to_string()),
        Just("SYY".to_string()),
        Just("SZZ".to_string()),
        Just("SXY".to_string()),
        Just("SYZ".to_string()),
        Just("SXZ".to_string()),
        (1u32..10).prop_map(|k| format!("E_Quad_GP{k}")),
        "[a-z]{1,4}",
    ]
}

proptest! {
    #[test]
    fn glomming_is_deterministic_and_covers_every_name(
        names in proptest::collection::vec(name_strategy(), 0..24),
        objects in 1usize..4,
        seed in any::<u64>(),
    ) {
        let mut truth = TruthTable::filled(objects, names.len(), true);
        for v in 0..names.len() {
            for o in 0..objects {
                if (seed >> ((v * objects + o) % 64)) & 1 == 1 && v % 3 == 0 {
                    truth.set(o, v, false);
                }
            }
        }
        let a = glom(&names, &truth);
        let b = glom(&names, &truth);
        prop_assert_eq!(&a.arrays, &b.arrays);

        let covered: Vec<u32> = a.arrays.iter().flat_map(|d| d.constituent_indices.clone()).collect();
        prop_assert_eq!(covered, (1..=names.len() as u32).collect::<Vec<_>>());
        for d in &a.arrays {
            prop_assert_eq!(d.constituent_names.len(), d.component_count);
            prop_assert_eq!(d.defined_on.len(), objects);
            let cols: Vec<usize> = d.constituent_indices.iter().map(|&i| i as usize - 1).collect();
            prop_assert!(truth.columns_match(&cols));
        }
    }
}
