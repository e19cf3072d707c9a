use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use multifront::algs::communicator::NoComm;
use multifront::algs::pull::pull;
use multifront::data::sparse::DistSparseMatrix;
use multifront::topology::analysis::{Dissection, DissectionNode, adjacency_from_entries, analyze};

// 1) 5-point Laplacian pattern on an n × n grid with random symmetric values
fn grid_matrix(n: usize, seed: u64) -> (DistSparseMatrix<f64>, Vec<(usize, usize)>) {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut a = DistSparseMatrix::zeros(n * n, n * n, 0, 1);
    let mut edges = Vec::new();
    for y in 0..n {
        for x in 0..n {
            let i = x + n * y;
            a.queue_update(i, i, 4.0).unwrap();
            for j in [(x + 1 < n).then(|| i + 1), (y + 1 < n).then(|| i + n)].into_iter().flatten() {
                let v = -rng.gen_range(0.5..1.5);
                a.queue_update(i, j, v).unwrap();
                a.queue_update(j, i, v).unwrap();
                edges.push((i, j));
            }
        }
    }
    a.process_queues();
    (a, edges)
}

// 2) nested dissection by alternating line separators
fn dissect(nodes: &mut Vec<DissectionNode>, n: usize, xs: (usize, usize), ys: (usize, usize)) -> usize {
    let (w, h) = (xs.1 - xs.0, ys.1 - ys.0);
    let id = nodes.len();
    nodes.push(DissectionNode::default());
    let cells = |xs: (usize, usize), ys: (usize, usize)| -> Vec<usize> {
        (ys.0..ys.1)
            .flat_map(|y| (xs.0..xs.1).map(move |x| x + n * y))
            .collect()
    };
    if w.max(h) < 8 {
        nodes[id].inds = cells(xs, ys);
        return id;
    }
    let (sep, left, right) = if w >= h {
        let mid = xs.0 + w / 2;
        (cells((mid, mid + 1), ys), ((xs.0, mid), ys), ((mid + 1, xs.1), ys))
    } else {
        let mid = ys.0 + h / 2;
        (cells(xs, (mid, mid + 1)), (xs, (ys.0, mid)), (xs, (mid + 1, ys.1)))
    };
    let l = dissect(nodes, n, left.0, left.1);
    let r = dissect(nodes, n, right.0, right.1);
    nodes[id] = DissectionNode {
        inds: sep,
        children: vec![l, r],
    };
    id
}

fn bench_pull_unpack(c: &mut Criterion) {
    let mut group = c.benchmark_group("pull_unpack");
    for &n in &[16usize, 32, 64] {
        let (a, edges) = grid_matrix(n, 42);
        let mut nodes = Vec::new();
        let root = dissect(&mut nodes, n, (0, n), (0, n));
        let d = Dissection { nodes, root };
        let an = analyze(&d, &adjacency_from_entries(n * n, edges), 0, 1).unwrap();
        let map = an.reordering();

        group.bench_with_input(BenchmarkId::new("pull", n), &n, |b, _| {
            b.iter(|| pull(&a, &map, &an.tree, false, &NoComm).unwrap())
        });
        let fronts = pull(&a, &map, &an.tree, false, &NoComm).unwrap();
        group.bench_with_input(BenchmarkId::new("unpack", n), &n, |b, _| {
            b.iter(|| fronts.unpack(&an.tree, &NoComm).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pull_unpack);
criterion_main!(benches);
