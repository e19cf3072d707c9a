mod util;
use util::*;

use multifront::algs::communicator::{Communicator, NoComm};
use multifront::algs::pull::pull;
use multifront::data::dist_map::DistMap;
use multifront::data::sparse::DistSparseMatrix;
use multifront::front_error::FrontError;
use multifront::topology::analysis::{Dissection, analyze};
use multifront::topology::tree::{NodeId, NodeInfo, NodeKind, SymbolicNode, SymbolicTree};
use proptest::prelude::*;

fn example() -> Vec<(usize, usize, f64)> {
    vec![
        (0, 0, 2.0),
        (1, 1, 2.0),
        (2, 2, 2.0),
        (3, 3, 2.0),
        (0, 2, 1.0),
        (2, 0, 1.0),
    ]
}

#[test]
fn four_by_four_round_trip() {
    let a = distribute(4, &example(), 0, 1);
    let tree = SymbolicTree::single(vec![0, 1, 2, 3]);
    let map = DistMap::identity(4, 0, 1);
    let fronts = pull(&a, &map, &tree, false, &NoComm).unwrap();
    let b = fronts.unpack(&tree, &NoComm).unwrap();
    let got: Vec<_> = b.local_entries().collect();
    assert_eq!(
        got,
        vec![
            (0, 0, 2.0),
            (1, 1, 2.0),
            (2, 0, 1.0),
            (2, 2, 2.0),
            (3, 3, 2.0)
        ]
    );
}

#[test]
fn leaf_only_tree_moves_diagonal_block_only() {
    let entries = random_symmetric(3, 1, 7);
    let a = distribute(3, &entries, 0, 1);
    let an = analyze(&Dissection::single(3), &grid_adjacency(3, 1), 0, 1).unwrap();
    let fronts = pull(&a, &an.reordering(), &an.tree, false, &NoComm).unwrap();
    assert_eq!(fronts.num_bottom_left_local_entries(), 0);
    let b = fronts.unpack(&an.tree, &NoComm).unwrap();
    assert_eq!(gather(&[b]), reordered_lower(&entries, &an.perm));
}

#[test]
fn serial_nested_dissection_round_trip() {
    let (nx, ny) = (5, 4);
    let entries = random_symmetric(nx, ny, 11);
    let an = analyze(&grid_dissection(nx, ny, 2), &grid_adjacency(nx, ny), 0, 1).unwrap();
    let a = distribute(nx * ny, &entries, 0, 1);
    let fronts = pull(&a, &an.reordering(), &an.tree, false, &NoComm).unwrap();
    let b = fronts.unpack(&an.tree, &NoComm).unwrap();
    assert_eq!(gather(&[b]), reordered_lower(&entries, &an.perm));
}

fn round_trip_on(p: usize, nx: usize, ny: usize, seed: u64) {
    let entries = random_symmetric(nx, ny, seed);
    let d = grid_dissection(nx, ny, 3);
    let adj = grid_adjacency(nx, ny);
    let perm = analyze(&d, &adj, 0, 1).unwrap().perm;
    let parts = run_ranks(p, |comm| {
        let (rank, size) = (comm.rank(), comm.size());
        let an = analyze(&d, &adj, rank, size).unwrap();
        let a = distribute(nx * ny, &entries, rank, size);
        let fronts = pull(&a, &an.reordering(), &an.tree, false, &comm).unwrap();
        fronts.unpack(&an.tree, &comm).unwrap()
    });
    assert_eq!(gather(&parts), reordered_lower(&entries, &perm));
}

#[test]
fn distributed_round_trip() {
    for p in 2..=4 {
        round_trip_on(p, 6, 6, 3 + p as u64);
    }
}

#[test]
fn unpack_output_is_distributed_by_rows() {
    let (nx, ny) = (6, 5);
    let entries = random_symmetric(nx, ny, 5);
    let d = grid_dissection(nx, ny, 3);
    let adj = grid_adjacency(nx, ny);
    let parts: Vec<DistSparseMatrix<f64>> = run_ranks(3, |comm| {
        let an = analyze(&d, &adj, comm.rank(), comm.size()).unwrap();
        let a = distribute(nx * ny, &entries, comm.rank(), comm.size());
        let fronts = pull(&a, &an.reordering(), &an.tree, false, &comm).unwrap();
        fronts.unpack(&an.tree, &comm).unwrap()
    });
    for (rank, b) in parts.iter().enumerate() {
        assert_eq!(b.height(), nx * ny);
        assert!(b.local_entries().all(|(i, _, _)| b.row_owner(i) == rank));
    }
}

#[test]
fn missing_lower_index_is_a_defect() {
    // leaf {0} claims no coupling with {1}, but the matrix has A(1, 0)
    let nodes = vec![
        SymbolicNode {
            parent: Some(NodeId::new(1)),
            inds: vec![0],
            info: NodeInfo {
                size: 1,
                off: 0,
                ..NodeInfo::default()
            },
            kind: NodeKind::Local { children: vec![] },
        },
        SymbolicNode {
            parent: None,
            inds: vec![1],
            info: NodeInfo {
                size: 1,
                off: 1,
                ..NodeInfo::default()
            },
            kind: NodeKind::Local {
                children: vec![NodeId::new(0)],
            },
        },
    ];
    let tree = SymbolicTree::from_nodes(nodes, NodeId::new(1)).unwrap();
    let a = distribute(2, &[(0, 0, 1.0), (0, 1, 3.0), (1, 0, 3.0), (1, 1, 1.0)], 0, 1);
    let map = DistMap::identity(2, 0, 1);
    assert_eq!(
        pull(&a, &map, &tree, false, &NoComm).unwrap_err(),
        FrontError::MissingLowerIndex { node: 0, target: 1 }
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn round_trip_any_grid(nx in 3usize..7, ny in 3usize..7, depth in 0usize..3, seed in any::<u64>()) {
        let entries = random_symmetric(nx, ny, seed);
        let an = analyze(&grid_dissection(nx, ny, depth), &grid_adjacency(nx, ny), 0, 1).unwrap();
        let a = distribute(nx * ny, &entries, 0, 1);
        let fronts = pull(&a, &an.reordering(), &an.tree, false, &NoComm).unwrap();
        let b = fronts.unpack(&an.tree, &NoComm).unwrap();
        prop_assert_eq!(gather(&[b]), reordered_lower(&entries, &an.perm));
    }
}
