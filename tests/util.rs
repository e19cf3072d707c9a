#![allow(dead_code)]
use itertools::iproduct;
use multifront::{
    algs::communicator::ThreadComm,
    data::sparse::DistSparseMatrix,
    topology::analysis::{Dissection, DissectionNode, adjacency_from_entries},
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Run `f` on every rank of a fresh `p`-rank thread world and collect the
/// results in rank order.
pub fn run_ranks<T, F>(p: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(ThreadComm) -> T + Sync,
{
    let f = &f;
    std::thread::scope(|s| {
        let handles: Vec<_> = ThreadComm::world(p)
            .into_iter()
            .map(|comm| s.spawn(move || f(comm)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

/// Indices of the `xs × ys` block of an `nx`-wide grid graph, row by row.
fn region(nx: usize, xs: (usize, usize), ys: (usize, usize)) -> Vec<usize> {
    iproduct!(ys.0..ys.1, xs.0..xs.1)
        .map(|(y, x)| x + nx * y)
        .collect()
}

fn bisect(
    nodes: &mut Vec<DissectionNode>,
    nx: usize,
    xs: (usize, usize),
    ys: (usize, usize),
    depth: usize,
) -> usize {
    let (w, h) = (xs.1 - xs.0, ys.1 - ys.0);
    let id = nodes.len();
    nodes.push(DissectionNode::default());
    if depth == 0 || w.max(h) < 3 {
        nodes[id].inds = region(nx, xs, ys);
        return id;
    }
    let (sep, (lx, ly), (rx, ry)) = if w >= h {
        let mid = xs.0 + w / 2;
        (
            region(nx, (mid, mid + 1), ys),
            ((xs.0, mid), ys),
            ((mid + 1, xs.1), ys),
        )
    } else {
        let mid = ys.0 + h / 2;
        (
            region(nx, xs, (mid, mid + 1)),
            (xs, (ys.0, mid)),
            (xs, (mid + 1, ys.1)),
        )
    };
    let left = bisect(nodes, nx, lx, ly, depth - 1);
    let right = bisect(nodes, nx, rx, ry, depth - 1);
    nodes[id] = DissectionNode {
        inds: sep,
        children: vec![left, right],
    };
    id
}

/// Nested dissection of the `nx × ny` grid graph, `depth` levels of line
/// separators.
pub fn grid_dissection(nx: usize, ny: usize, depth: usize) -> Dissection {
    let mut nodes = Vec::new();
    let root = bisect(&mut nodes, nx, (0, nx), (0, ny), depth);
    Dissection { nodes, root }
}

/// Edges of the 5-point stencil on an `nx × ny` grid, each once with `i < j`.
pub fn grid_edges(nx: usize, ny: usize) -> Vec<(usize, usize)> {
    let mut edges = Vec::new();
    for (y, x) in iproduct!(0..ny, 0..nx) {
        let i = x + nx * y;
        if x + 1 < nx {
            edges.push((i, i + 1));
        }
        if y + 1 < ny {
            edges.push((i, i + nx));
        }
    }
    edges
}

pub fn grid_adjacency(nx: usize, ny: usize) -> Vec<Vec<usize>> {
    adjacency_from_entries(nx * ny, grid_edges(nx, ny))
}

/// Entries of a random symmetric matrix on the grid pattern: diagonal plus
/// both directions of every edge, values in `[1, 10)`.
pub fn random_symmetric(nx: usize, ny: usize, seed: u64) -> Vec<(usize, usize, f64)> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let n = nx * ny;
    let mut entries: Vec<_> = (0..n).map(|i| (i, i, rng.gen_range(1.0..10.0))).collect();
    for (i, j) in grid_edges(nx, ny) {
        let v = rng.gen_range(1.0..10.0);
        entries.push((i, j, v));
        entries.push((j, i, v));
    }
    entries
}

/// This rank's block of rows of an `n × n` matrix given by global entries.
pub fn distribute(
    n: usize,
    entries: &[(usize, usize, f64)],
    rank: usize,
    p: usize,
) -> DistSparseMatrix<f64> {
    let mut a = DistSparseMatrix::zeros(n, n, rank, p);
    for &(i, j, v) in entries.iter() {
        if a.row_owner(i) == rank {
            a.queue_update(i, j, v).unwrap();
        }
    }
    a.process_queues();
    a
}

/// Lower triangle of `P A Pᵀ`, sorted by (row, col).
pub fn reordered_lower(entries: &[(usize, usize, f64)], perm: &[usize]) -> Vec<(usize, usize, f64)> {
    let mut out: Vec<_> = entries
        .iter()
        .map(|&(i, j, v)| (perm[i], perm[j], v))
        .filter(|&(i, j, _)| i >= j)
        .collect();
    out.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
    out
}

/// All entries of per-rank matrices, sorted by (row, col).
pub fn gather(parts: &[DistSparseMatrix<f64>]) -> Vec<(usize, usize, f64)> {
    let mut out: Vec<_> = parts.iter().flat_map(|a| a.local_entries()).collect();
    out.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
    out
}
