use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use soft7::graph::Graph;

/// Path discovery over a layered graph with redundant many-to-many edges,
/// the shape that makes the exhaustive search expensive.
fn path_search(c: &mut Criterion) {
    let mut graph = Graph::new();
    let layers = 5;
    let width = 3;
    for layer in 0..layers {
        for from in 0..width {
            for to in 0..width {
                graph.append(
                    &format!("n{}_{}", layer, from),
                    "linksTo",
                    &format!("n{}_{}", layer + 1, to),
                );
            }
        }
    }

    c.bench_function("path across 5 layers", |bencher| {
        bencher.iter(|| {
            black_box(graph.path(
                "n0_0",
                &format!("n{}_0", layers),
                Some(&["linksTo"]),
                None,
            ))
        })
    });

    c.bench_function("match with wildcards", |bencher| {
        bencher.iter(|| black_box(graph.matches(Some("n0_0"), None, None).count()))
    });
}

criterion_group!(benches, path_search);
criterion_main!(benches);
