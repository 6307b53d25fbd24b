mod common;

use common::{bars, line_nodes, loaded, scenario};
use exodus_sieve::io::memory::FailPoint;
use exodus_sieve::prelude::*;

const ELEM: VariableScope = VariableScope::Object(ObjectType::ElemBlock);

#[test]
fn grid_offsets_follow_user_ids() {
    let mut r = loaded(scenario());
    r.set_status(ObjectType::NodeSet, 0, true).unwrap();
    assert_eq!(r.number_of_cells(), 33);

    let mesh = r.assemble_output(TimeIndex(0)).unwrap();
    assert_eq!(mesh.num_cells(), 33);
    let ids = mesh.cell_array("ObjectId").unwrap().as_integer().unwrap();
    assert!(ids[..20].iter().all(|&i| i == 2));
    assert!(ids[20..30].iter().all(|&i| i == 5));
    assert!(ids[30..].iter().all(|&i| i == 1));
    assert_eq!(mesh.topology.shapes[32], CellType::Vertex);
}

#[test]
fn undefined_objects_are_zero_padded() {
    let mut s = scenario();
    let p: Vec<f64> = (0..10).map(|i| i as f64 + 0.5).collect();
    s.set_variables(ELEM, &["P"])
        .set_result(ELEM, Some(5), 1, 0, p.clone());
    let mut r = loaded(s);
    r.set_status(ObjectType::NodeSet, 0, true).unwrap();
    assert!(r.assemble_output(TimeIndex(0)).unwrap().cell_array("P").is_none());
    r.set_array_status(ELEM, 0, true).unwrap();

    let mesh = r.assemble_output(TimeIndex(0)).unwrap();
    let values = mesh.cell_array("P").unwrap().as_real().unwrap();
    assert_eq!(values.len(), 33);
    assert!(values[..20].iter().all(|&v| v == 0.0));
    assert_eq!(&values[20..30], p.as_slice());
    assert!(values[30..].iter().all(|&v| v == 0.0));
    assert!(r.warnings().is_empty());
}

#[test]
fn unreadable_array_repairs_truth_table() {
    let mut s = scenario();
    s.set_variables(ELEM, &["P"])
        .set_result(ELEM, Some(5), 1, 0, vec![1.0; 10])
        .set_truth_table(
            ObjectType::ElemBlock,
            TruthTable::from_rows(vec![vec![true], vec![true]]).unwrap(),
        );
    let mut r = loaded(s);
    r.set_all_array_status(ELEM, true);
    assert!(r.array_descriptor(ELEM, 0).unwrap().defined_on[1]);

    let mesh = r.assemble_output(TimeIndex(0)).unwrap();
    let values = mesh.cell_array("P").unwrap().as_real().unwrap();
    assert!(values[..20].iter().all(|&v| v == 0.0));
    assert!(values[20..].iter().all(|&v| v == 1.0));
    // block id 2 is second in file order
    assert!(!r.array_descriptor(ELEM, 0).unwrap().defined_on[1]);
    assert_eq!(r.warnings().len(), 1);

    r.take_warnings();
    r.assemble_output(TimeIndex(0)).unwrap();
    assert!(r.warnings().is_empty());
}

#[test]
fn conflicting_shapes_disable_later_type() {
    let mut s = scenario();
    let set = VariableScope::Object(ObjectType::ElemSet);
    s.add_set(ObjectType::ElemSet, 9, "picked", vec![1, 2], Vec::new())
        .set_variables(ELEM, &["T"])
        .set_variables(set, &["TX", "TY"])
        .set_result(ELEM, Some(5), 1, 0, vec![3.0; 10])
        .set_result(ELEM, Some(2), 1, 0, vec![4.0; 20])
        .set_result(set, Some(9), 1, 0, vec![0.0; 2])
        .set_result(set, Some(9), 2, 0, vec![0.0; 2]);
    let mut r = loaded(s);
    r.set_status(ObjectType::ElemSet, 0, true).unwrap();
    r.set_all_array_status(ELEM, true);
    r.set_all_array_status(set, true);
    assert_eq!(r.array_components(set, 0).unwrap(), 2);

    let mesh = r.assemble_output(TimeIndex(0)).unwrap();
    let t = mesh.cell_array("T").unwrap();
    assert_eq!(t.components, 1);
    assert_eq!(t.tuples(), 32);
    assert!(!r.array_status(set, 0).unwrap());
    assert!(r.warnings().iter().any(|w| w.contains("inconsistent schema")));
}

#[test]
fn displacement_deforms_points() {
    let mut s = scenario();
    let nodal = VariableScope::Nodal;
    s.set_variables(nodal, &["DISPL_X", "DISPL_Y"])
        .set_result(nodal, None, 1, 1, vec![0.5; 31])
        .set_result(nodal, None, 2, 1, vec![-1.0; 31])
        .set_result(nodal, None, 1, 0, vec![0.0; 31])
        .set_result(nodal, None, 2, 0, vec![0.0; 31]);
    let mut r = loaded(s);
    assert_eq!(r.array_name(nodal, 0).unwrap(), "DISPL_");
    r.set_displacement_magnitude(2.0);

    let mesh = r.assemble_output(TimeIndex(1)).unwrap();
    assert_eq!(mesh.time_value, 1.0);
    assert_eq!(mesh.points[0], [1.0, -2.0, 0.0]);
    assert_eq!(mesh.points[3], [4.0, -2.0, 0.0]);

    r.set_apply_displacements(false);
    r.set_array_status(nodal, 0, true).unwrap();
    let mesh = r.assemble_output(TimeIndex(1)).unwrap();
    assert_eq!(mesh.points[3], [3.0, 0.0, 0.0]);
    let disp = mesh.point_array("DISPL_").unwrap();
    assert_eq!(disp.components, 2);
    assert_eq!(&disp.as_real().unwrap()[..2], &[0.5, -1.0]);
}

#[test]
fn maps_follow_file_numbering() {
    let mut s = scenario();
    let node_ids: Vec<i64> = (1..=31).map(|i| 1000 + i).collect();
    let elem_ids: Vec<i64> = (1..=30).map(|i| 100 + i).collect();
    s.add_map(ObjectType::NodeMap, 1, "node_num_map", node_ids)
        .add_map(ObjectType::ElemMap, 1, "elem_num_map", elem_ids);
    let mut r = loaded(s);
    r.set_status(ObjectType::ElemBlock, 0, false).unwrap();

    let mesh = r.assemble_output(TimeIndex(0)).unwrap();
    // only block id 5 (file entries 1..=10) remains
    let elem = mesh.cell_array("elem_num_map").unwrap().as_integer().unwrap();
    assert_eq!(elem, (101..=110).collect::<Vec<i64>>().as_slice());
    let nodes = mesh.point_array("node_num_map").unwrap().as_integer().unwrap();
    assert_eq!(nodes.len(), 11);
    assert_eq!(nodes[0], 1021);
}

#[test]
fn truncated_element_map_warns_per_block() {
    let mut s = scenario();
    s.add_map(ObjectType::ElemMap, 1, "elem_num_map", (101..=115).collect());
    let mut r = loaded(s);

    let mesh = r.assemble_output(TimeIndex(0)).unwrap();
    let elem = mesh.cell_array("elem_num_map").unwrap().as_integer().unwrap();
    // block id 2 needs file entries 11..=30, past the end of the map
    assert!(elem[..20].iter().all(|&v| v == 0));
    assert_eq!(&elem[20..], (101..=110).collect::<Vec<i64>>().as_slice());
    assert_eq!(r.warnings().len(), 1);
    assert!(r.warnings()[0].contains("`elem_num_map` does not cover element block 2"));
}

#[test]
fn generated_ids_without_maps_are_identity() {
    let mut r = loaded(scenario());
    r.set_generate_global_element_ids(true);
    r.set_generate_global_node_ids(true);

    let mesh = r.assemble_output(TimeIndex(0)).unwrap();
    let elem = mesh.cell_array("GlobalElementId").unwrap().as_integer().unwrap();
    // block id 2 holds file entries 11..=30 and comes first in the output
    assert_eq!(elem[0], 11);
    assert_eq!(elem[19], 30);
    assert_eq!(elem[20], 1);
    let nodes = mesh.point_array("GlobalNodeId").unwrap().as_integer().unwrap();
    assert_eq!(nodes, (1..=31).collect::<Vec<i64>>().as_slice());

    r.set_status(ObjectType::ElemBlock, 1, false).unwrap();
    let mesh = r.assemble_output(TimeIndex(0)).unwrap();
    let elem = mesh.cell_array("GlobalElementId").unwrap().as_integer().unwrap();
    assert_eq!(elem, (1..=20).map(|i| i + 10).collect::<Vec<i64>>().as_slice());
    assert_eq!(mesh.point_array("GlobalNodeId").unwrap().tuples(), 21);
}

#[test]
fn attributes_are_time_invariant_cell_arrays() {
    let mut s = scenario();
    s.add_attribute(ObjectType::ElemBlock, 5, " area ", vec![2.0; 10]);
    let mut r = loaded(s);
    // block id 5 is the second by user id
    assert_eq!(r.attribute_count(ObjectType::ElemBlock, 1).unwrap(), 1);
    assert_eq!(r.attribute_name(ObjectType::ElemBlock, 1, 0).unwrap(), "area");
    assert!(r.assemble_output(TimeIndex(0)).unwrap().cell_array("area").is_none());

    r.set_attribute_status(ObjectType::ElemBlock, 1, 0, true).unwrap();
    let mesh = r.assemble_output(TimeIndex(1)).unwrap();
    let area = mesh.cell_array("area").unwrap();
    assert_eq!(area.source, ArraySource::Attribute);
    let v = area.as_real().unwrap();
    assert!(v[..20].iter().all(|&x| x == 0.0));
    assert!(v[20..].iter().all(|&x| x == 2.0));
}

#[test]
fn repeated_requests_hit_the_cache() {
    let mut s = scenario();
    s.set_variables(ELEM, &["P"])
        .set_result(ELEM, Some(5), 1, 0, vec![1.0; 10])
        .set_result(ELEM, Some(2), 1, 0, vec![2.0; 20]);
    let mut r = loaded(s);
    r.set_all_array_status(ELEM, true);
    let first = r.assemble_output(TimeIndex(0)).unwrap();
    let (_, misses) = r.cache_stats();
    let second = r.assemble_output(TimeIndex(0)).unwrap();
    let (hits, misses_after) = r.cache_stats();
    assert_eq!(misses, misses_after);
    assert!(hits > 0);
    assert!(std::sync::Arc::ptr_eq(&first.topology, &second.topology));
    assert_eq!(first.cell_array("P"), second.cell_array("P"));

    r.set_cache_capacity(0);
    assert_eq!(r.cache_used_bytes(), 0);
    let third = r.assemble_output(TimeIndex(0)).unwrap();
    assert_eq!(first.cell_array("P"), third.cell_array("P"));
}

#[test]
fn missing_object_degrades_and_recovers_offsets() {
    let mut s = scenario();
    s.fail(FailPoint::Set(ObjectType::NodeSet, UserId(1)));
    let mut r = loaded(s);
    r.set_status(ObjectType::NodeSet, 0, true).unwrap();

    let mesh = r.assemble_output(TimeIndex(0)).unwrap();
    assert_eq!(mesh.num_cells(), 30);
    assert!(!r.object_status(ObjectType::NodeSet, 0).unwrap());
    assert_eq!(r.number_of_cells(), 30);
    assert!(r.warnings().iter().any(|w| w.contains("node set 1")));
}

#[test]
fn unreadable_coordinates_fail_the_request() {
    let mut s = scenario();
    s.fail(FailPoint::Coordinates);
    let mut r = loaded(s);
    assert!(matches!(
        r.assemble_output(TimeIndex(0)),
        Err(ExodusError::ArrayRead { .. })
    ));
}

#[test]
fn squeeze_keeps_only_referenced_points() {
    let mut s = InMemoryStore::new("sparse", 2);
    s.add_nodes(&line_nodes(40))
        .add_block(ObjectType::ElemBlock, 1, "", "BAR2", 2, bars(30, 3));
    let mut r = loaded(s);

    let mesh = r.assemble_output(TimeIndex(0)).unwrap();
    assert_eq!(mesh.num_points(), 4);
    assert_eq!(mesh.points[0], [29.0, 0.0, 0.0]);
    assert_eq!(mesh.topology.cell(2).unwrap(), &[2, 3]);

    r.set_squeeze_points(false);
    let mesh = r.assemble_output(TimeIndex(0)).unwrap();
    assert_eq!(mesh.num_points(), 40);
    assert_eq!(mesh.topology.cell(2).unwrap(), &[31, 32]);
}
