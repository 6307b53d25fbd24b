#![allow(dead_code)]

use exodus_sieve::prelude::*;

/// Nodes `1..=n` along the x axis at `x = i - 1`.
pub fn line_nodes(n: usize) -> Vec<[f64; 3]> {
    (0..n).map(|i| [i as f64, 0.0, 0.0]).collect()
}

/// Two-node bars `(i, i + 1)` for `i` in `first..first + count`.
pub fn bars(first: i64, count: i64) -> Vec<i64> {
    (first..first + count).flat_map(|i| [i, i + 1]).collect()
}

/// Block id 5 (10 bars) stored before block id 2 (20 bars), plus node set
/// id 1 with three nodes. 31 nodes in total.
pub fn scenario() -> InMemoryStore {
    let mut s = InMemoryStore::new("scenario", 2);
    s.add_nodes(&line_nodes(31))
        .set_times(vec![0.0, 1.0])
        .add_block(ObjectType::ElemBlock, 5, "five", "BAR2", 2, bars(21, 10))
        .add_block(ObjectType::ElemBlock, 2, "two", "BAR2", 2, bars(1, 20))
        .add_node_set(1, "ends", vec![1, 2, 3]);
    s
}

pub fn loaded(store: InMemoryStore) -> ExodusReader<InMemoryStore> {
    let mut r = ExodusReader::new(store);
    r.load_metadata().expect("metadata");
    r
}
