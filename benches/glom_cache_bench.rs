use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use exodus_sieve::catalog::glom::glom;
use exodus_sieve::prelude::*;

fn variable_names(fields: usize) -> Vec<String> {
    let mut names = Vec::new();
    for f in 0..fields {
        for axis in ["X", "Y", "Z"] {
            names.push(format!("Vel{f}{axis}"));
        }
        for pair in ["XX", "YY", "ZZ", "XY", "YZ", "XZ"] {
            names.push(format!("S{f}{pair}"));
        }
        for k in 1..=8 {
            names.push(format!("E{f}_Hex_GP{k}"));
        }
        names.push(format!("T{f}"));
    }
    names
}

fn bench_glom(c: &mut Criterion) {
    let mut group = c.benchmark_group("glom");
    for &fields in &[10usize, 100] {
        let names = variable_names(fields);
        let truth = TruthTable::filled(16, names.len(), true);
        group.bench_with_input(BenchmarkId::new("mixed_names", fields), &fields, |b, _| {
            b.iter(|| black_box(glom(&names, &truth)));
        });
    }
    group.finish();
}

/// Bars over a line of nodes, one nodal scalar per step.
fn model(blocks: i64, steps: usize) -> InMemoryStore {
    let per_block = 1000;
    let num_nodes = (blocks * per_block + 1) as usize;
    let nodes: Vec<[f64; 3]> = (0..num_nodes).map(|i| [i as f64, 0.0, 0.0]).collect();
    let mut s = InMemoryStore::new("bench", 1);
    s.add_nodes(&nodes)
        .set_times((0..steps).map(|t| t as f64).collect())
        .set_variables(VariableScope::Nodal, &["Temp"]);
    for b in 0..blocks {
        let first = b * per_block + 1;
        let conn = (first..first + per_block).flat_map(|i| [i, i + 1]).collect();
        s.add_block(ObjectType::ElemBlock, b + 1, "", "BAR2", 2, conn);
    }
    for t in 0..steps {
        s.set_result(VariableScope::Nodal, None, 1, t, vec![t as f64; num_nodes]);
    }
    s
}

fn bench_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("assemble_output");
    let steps = 8;
    let mut reader = ExodusReader::new(model(8, steps));
    reader.load_metadata().expect("metadata");
    reader.set_array_status(VariableScope::Nodal, 0, true).expect("array");

    group.bench_function("warm_cache", |b| {
        b.iter(|| black_box(reader.assemble_output(TimeIndex(0)).expect("assemble")));
    });

    group.bench_function("cycle_steps_small_cache", |b| {
        reader.set_cache_capacity(256 * 1024);
        let mut t = 0;
        b.iter(|| {
            t = (t + 1) % steps;
            black_box(reader.assemble_output(TimeIndex(t)).expect("assemble"))
        });
    });
    group.finish();
}

criterion_group!(benches, bench_glom, bench_assembly);
criterion_main!(benches);
