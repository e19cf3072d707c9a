mod util;
use util::*;

use multifront::topology::analysis::{SymbolicAnalysis, analyze};
use multifront::topology::grid::Grid;
use multifront::DebugInvariants;

#[test]
fn analysis_survives_json() {
    let (nx, ny) = (5, 4);
    let an = analyze(&grid_dissection(nx, ny, 2), &grid_adjacency(nx, ny), 1, 2).unwrap();
    let json = serde_json::to_string(&an).unwrap();
    let back: SymbolicAnalysis = serde_json::from_str(&json).unwrap();
    assert_eq!(back, an);
    back.tree.validate_invariants().unwrap();
    assert_eq!(back.reordering().local_images(), an.reordering().local_images());
}

#[test]
fn grid_survives_json() {
    let g = Grid::new(multifront::topology::grid::Team::world(6, 4));
    let back: Grid = serde_json::from_str(&serde_json::to_string(&g).unwrap()).unwrap();
    assert_eq!((back.row(), back.col()), (0, 2));
    assert_eq!(back, g);
}

#[test]
fn every_index_is_eliminated_once() {
    let (nx, ny) = (6, 6);
    for p in 1..=4 {
        let an = analyze(&grid_dissection(nx, ny, 3), &grid_adjacency(nx, ny), p - 1, p).unwrap();
        let mut seen = an.perm.clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..nx * ny).collect::<Vec<_>>());
        assert_eq!(an.tree.dimension(), nx * ny);
    }
}
