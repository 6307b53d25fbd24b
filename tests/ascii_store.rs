use exodus_sieve::prelude::*;
use std::path::PathBuf;

const MODEL: &str = "EXODUS
# two quads side by side, one side set on the bottom edge
TITLE plate
DIM 2
NODES 6
0 0
1 0
2 0
0 1
1 1
2 1
TIMES 2 0.0 0.25
BLOCK elem 10 QUAD4 4 1 left
1 2 5 4
BLOCK elem 20 QUAD4 4 1 right
2 3 6 5
SET side 3 2 bottom
2 2
1 2 2 3
SET node 4 2
4 6
MAP elem 1 2 elem_num_map
501 502
ATTRIBUTE elem 20 thickness
0.5
VARIABLES elem_block 2 VelX VelY
RESULT elem_block 10 1 0
1.0
RESULT elem_block 10 2 0
2.0
RESULT elem_block 20 1 0
3.0
RESULT elem_block 20 2 0
4.0
END
";

fn write_model(tag: &str, text: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "exodus-sieve-{tag}-{}.exo.txt",
        std::process::id()
    ));
    std::fs::write(&path, text).expect("write model");
    path
}

#[test]
fn open_loads_metadata_and_assembles() {
    let path = write_model("plate", MODEL);
    let mut r = ExodusReader::open(&path).expect("open");
    std::fs::remove_file(&path).ok();

    assert_eq!(r.title(), "plate");
    assert_eq!(r.dimension(), 2);
    assert_eq!(r.time_values(), &[0.0, 0.25]);
    assert_eq!(r.object_count(ObjectType::SideSet), 1);
    assert_eq!(r.object_name(ObjectType::NodeSet, 0).unwrap(), "Unnamed set ID: 4 Size: 2");
    assert_eq!(r.attribute_name(ObjectType::ElemBlock, 1, 0).unwrap(), "thickness");

    let elem = VariableScope::Object(ObjectType::ElemBlock);
    r.set_all_array_status(elem, true);
    r.set_status(ObjectType::SideSet, 0, true).unwrap();
    let mesh = r.assemble_output(TimeIndex(0)).unwrap();
    assert_eq!(mesh.num_cells(), 4);
    assert_eq!(mesh.topology.shapes[2], CellType::Segment);
    let vel = mesh.cell_array("Vel").unwrap();
    assert_eq!(vel.components, 2);
    assert_eq!(vel.as_real().unwrap(), &[1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 0.0, 0.0]);
    let map = mesh.cell_array("elem_num_map").unwrap();
    assert_eq!(map.as_integer().unwrap(), &[501, 502, 0, 0]);
    assert!(r.warnings().is_empty());
}

#[test]
fn missing_file_is_fatal() {
    let err = ExodusReader::open("/definitely/not/here.exo.txt").err().unwrap();
    assert!(matches!(err, ExodusError::FileOpen { .. }));
    assert!(err.is_fatal());
}

#[test]
fn syntax_errors_are_reported_as_open_failures() {
    let path = write_model("broken", &MODEL.replace("NODES 6", "NODES six"));
    let err = ExodusReader::open(&path).err().unwrap();
    std::fs::remove_file(&path).ok();
    match err {
        ExodusError::FileOpen { reason, .. } => assert!(reason.contains("parse error")),
        other => panic!("unexpected {other:?}"),
    }
}
