//! Pull: move the entries of a distributed sparse matrix into a frontal tree.
//!
//! Every process walks its part of the elimination tree and asks the owners
//! of the matrix rows it needs for them. The owners answer with the row
//! entries and their reordered columns; the requester then walks the tree a
//! second time in the same order and drops each entry into its front.
//!
//! Exchanges, in order:
//! 1. counts of requested rows, then the row indices,
//! 2. per-row entry counts,
//! 3. values, then reordered target columns.
//!
//! All entry points are collective over the world of `comm`.

use std::time::Instant;

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::exchange::{all_to_all_counts, all_to_all_indices, all_to_all_v, scan};
use crate::algs::traversal::{OwnedColumn, RankCursor, owned_columns};
use crate::algs::wire::Phase;
use crate::data::dist_map::DistMap;
use crate::data::scalar::Scalar;
use crate::data::sparse::DistSparseMatrix;
use crate::front::{FrontNode, FrontTree, FrontType};
use crate::front_error::FrontError;
use crate::topology::grid::Team;
use crate::topology::tree::SymbolicTree;

/// Default tag of [`pull`].
pub const PULL_TAG: CommTag = CommTag::new(0x5055);
/// Default tag of [`FrontTree::pull_update`].
pub const PULL_UPDATE_TAG: CommTag = CommTag::new(0x5056);

/// Sorted, deduplicated copy of `inds`.
fn sort_unique(inds: &[usize]) -> Vec<usize> {
    let mut unique = inds.to_vec();
    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;
        unique.par_sort_unstable();
    }
    #[cfg(not(feature = "rayon"))]
    unique.sort_unstable();
    unique.dedup();
    unique
}

/// Phases used by one flavour of the row exchange.
struct Phases {
    row_counts: Phase,
    rows: Phase,
    row_lengths: Phase,
    values: Phase,
    targets: Phase,
}

const PULL_PHASES: Phases = Phases {
    row_counts: Phase::PullRowCounts,
    rows: Phase::PullRows,
    row_lengths: Phase::PullRowLengths,
    values: Phase::PullValues,
    targets: Phase::PullTargets,
};

const PULL_UPDATE_PHASES: Phases = Phases {
    row_counts: Phase::PullUpdateRowCounts,
    rows: Phase::PullUpdateRows,
    row_lengths: Phase::PullUpdateRowLengths,
    values: Phase::PullUpdateValues,
    targets: Phase::PullUpdateTargets,
};

/// Rows this process asked for and rows it has to serve.
struct RowRequests {
    owned: Vec<OwnedColumn>,
    /// Rows requested from each rank.
    recv_row_sizes: Vec<usize>,
    /// Rows each rank requested from us.
    send_row_sizes: Vec<usize>,
    /// Requested rows grouped by requesting rank.
    send_rows: Vec<usize>,
}

/// Entries packed for the requesters, grouped by rank then by row.
struct Payload<F> {
    row_lengths: Vec<usize>,
    entry_sizes: Vec<usize>,
    values: Vec<F>,
    targets: Vec<usize>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Placement {
    Set,
    Update,
}

fn world_team<C: Communicator>(comm: &C) -> Team {
    Team::world(comm.size(), comm.rank())
}

fn check_matrix<F: Scalar, C: Communicator>(
    a: &DistSparseMatrix<F>,
    reordering: &DistMap,
    comm: &C,
) -> Result<(), FrontError> {
    if a.comm_size() != comm.size() {
        return Err(FrontError::GridMismatch {
            side: "matrix communicator",
            expected: comm.size(),
            got: a.comm_size(),
        });
    }
    if a.local_height() != reordering.num_local_sources() {
        return Err(FrontError::StructuralMismatch {
            local_height: a.local_height(),
            sources: reordering.num_local_sources(),
        });
    }
    Ok(())
}

fn request_rows<F: Scalar, C: Communicator>(
    a: &DistSparseMatrix<F>,
    tree: &SymbolicTree,
    comm: &C,
    team: &Team,
    tag: CommTag,
    phases: &Phases,
) -> Result<RowRequests, FrontError> {
    let owned = owned_columns(tree);
    let mut recv_row_sizes = vec![0usize; team.size()];
    for col in &owned {
        if col.orig >= a.height() {
            return Err(FrontError::IndexOutOfRange {
                index: col.orig,
                len: a.height(),
            });
        }
        recv_row_sizes[a.row_owner(col.orig)] += 1;
    }
    let (recv_row_offs, num_recv_rows) = scan(&recv_row_sizes);
    let mut cursor = RankCursor::new(recv_row_offs);
    let mut recv_rows = vec![0usize; num_recv_rows];
    for col in &owned {
        recv_rows[cursor.next(a.row_owner(col.orig))] = col.orig;
    }
    cursor.check_consumed("row request pack", &recv_row_sizes)?;

    let send_row_sizes = all_to_all_counts(comm, team, tag, phases.row_counts, &recv_row_sizes)?;
    let send_rows = all_to_all_indices(
        comm,
        team,
        tag,
        phases.rows,
        &recv_rows,
        &recv_row_sizes,
        &send_row_sizes,
    )?;
    Ok(RowRequests {
        owned,
        recv_row_sizes,
        send_row_sizes,
        send_rows,
    })
}

/// Local row of a requested global row; requests must target our rows.
fn requested_local_row<F: Scalar>(a: &DistSparseMatrix<F>, i: usize) -> Result<usize, FrontError> {
    if a.row_owner(i) != a.rank() || i >= a.height() {
        return Err(FrontError::NonLocalRow {
            row: i,
            rank: a.rank(),
        });
    }
    Ok(i - a.first_local_row())
}

fn exchange_payload<F: Scalar, C: Communicator>(
    comm: &C,
    team: &Team,
    tag: CommTag,
    phases: &Phases,
    req: &RowRequests,
    payload: Payload<F>,
) -> Result<(Vec<usize>, Vec<usize>, Vec<F>, Vec<usize>), FrontError> {
    let recv_row_lengths = all_to_all_indices(
        comm,
        team,
        tag,
        phases.row_lengths,
        &payload.row_lengths,
        &req.send_row_sizes,
        &req.recv_row_sizes,
    )?;
    let (recv_row_offs, _) = scan(&req.recv_row_sizes);
    let recv_entry_sizes: Vec<usize> = recv_row_offs
        .iter()
        .zip(&req.recv_row_sizes)
        .map(|(&off, &n)| recv_row_lengths[off..off + n].iter().sum())
        .collect();
    let values = all_to_all_v(
        comm,
        team,
        tag,
        phases.values,
        &payload.values,
        &payload.entry_sizes,
        &recv_entry_sizes,
    )?;
    let targets = all_to_all_indices(
        comm,
        team,
        tag,
        phases.targets,
        &payload.targets,
        &payload.entry_sizes,
        &recv_entry_sizes,
    )?;
    Ok((recv_row_lengths, recv_entry_sizes, values, targets))
}

/// Second walk: drop every received entry into its front.
#[allow(clippy::too_many_arguments)]
fn place_entries<F: Scalar>(
    fronts: &mut FrontTree<F>,
    tree: &SymbolicTree,
    a: &DistSparseMatrix<F>,
    req: &RowRequests,
    row_lengths: &[usize],
    entry_sizes: &[usize],
    values: &[F],
    targets: &[usize],
    placement: Placement,
) -> Result<usize, FrontError> {
    let (row_offs, _) = scan(&req.recv_row_sizes);
    let (entry_offs, _) = scan(entry_sizes);
    let mut rows = RankCursor::new(row_offs);
    let mut entries = RankCursor::new(entry_offs);
    let mut placed = 0usize;

    for col in &req.owned {
        let q = a.row_owner(col.orig);
        let num_entries = row_lengths[rows.next(q)];
        let start = entries.advance(q, num_entries);
        let info = tree.info(col.node);
        let (off, size, t) = (info.off, info.size, col.t);
        for k in start..start + num_entries {
            let (value, target) = (values[k], targets[k]);
            if target < off + t {
                continue;
            }
            let row = if target < off + size {
                target - off
            } else {
                let pos = info
                    .orig_lower_struct
                    .binary_search(&target)
                    .map_err(|_| FrontError::MissingLowerIndex {
                        node: col.node.index(),
                        target,
                    })?;
                info.orig_lower_rel_inds[pos]
            };
            match (fronts.node_mut(col.node), placement) {
                (FrontNode::Local(f), Placement::Set) => f.l.set(row, t, value),
                (FrontNode::Local(f), Placement::Update) => f.l.update(row, t, value),
                (FrontNode::Dist(f), Placement::Set) => f.l2d.set(row, t, value),
                (FrontNode::Dist(f), Placement::Update) => f.l2d.update(row, t, value),
            }
            placed += 1;
        }
    }
    rows.check_consumed("row placement", &req.recv_row_sizes)?;
    entries.check_consumed("entry placement", entry_sizes)?;
    Ok(placed)
}

/// Build the frontal tree of `tree` from the entries of `a`.
///
/// `reordering` maps original indices to elimination order. Only entries on
/// or below the diagonal of each front are kept; with `conjugate` the values
/// are conjugated on the way. Collective over the world of `comm`.
pub fn pull<F, C>(
    a: &DistSparseMatrix<F>,
    reordering: &DistMap,
    tree: &SymbolicTree,
    conjugate: bool,
    comm: &C,
) -> Result<FrontTree<F>, FrontError>
where
    F: Scalar,
    C: Communicator,
{
    pull_with_tag(a, reordering, tree, conjugate, comm, PULL_TAG)
}

pub fn pull_with_tag<F, C>(
    a: &DistSparseMatrix<F>,
    reordering: &DistMap,
    tree: &SymbolicTree,
    conjugate: bool,
    comm: &C,
    tag: CommTag,
) -> Result<FrontTree<F>, FrontError>
where
    F: Scalar,
    C: Communicator,
{
    check_matrix(a, reordering, comm)?;
    #[cfg(feature = "strict-invariants")]
    crate::debug_invariants::DebugInvariants::validate_invariants(tree)?;
    let team = world_team(comm);
    let rank = comm.rank();

    // 1) unique columns, and where each entry sits among them
    let t0 = Instant::now();
    let unique_cols = sort_unique(a.local_cols());
    let col_offs: Vec<usize> = a
        .local_cols()
        .iter()
        .map(|j| unique_cols.partition_point(|u| u < j))
        .collect();
    log::debug!("pull[{rank}]: column sort took {:?}", t0.elapsed());

    // 2) translate rows and unique columns
    let t0 = Instant::now();
    let mut mapped_sources: Vec<usize> = (0..a.local_height()).map(|k| a.global_row(k)).collect();
    reordering.translate_with_tag(comm, &mut mapped_sources, tag)?;
    let mut mapped_targets = unique_cols;
    reordering.translate_with_tag(comm, &mut mapped_targets, tag)?;
    log::debug!("pull[{rank}]: translation took {:?}", t0.elapsed());

    // 3) ask for our rows
    let t0 = Instant::now();
    let req = request_rows(a, tree, comm, &team, tag, &PULL_PHASES)?;
    log::debug!(
        "pull[{rank}]: row requests ({} rows) took {:?}",
        req.owned.len(),
        t0.elapsed()
    );

    // 4) serve the rows asked of us, lower half only
    let t0 = Instant::now();
    let mut payload = Payload {
        row_lengths: Vec::with_capacity(req.send_rows.len()),
        entry_sizes: vec![0usize; team.size()],
        values: Vec::new(),
        targets: Vec::new(),
    };
    let (send_row_offs, _) = scan(&req.send_row_sizes);
    for (q, (&off, &n)) in send_row_offs.iter().zip(&req.send_row_sizes).enumerate() {
        for &i in &req.send_rows[off..off + n] {
            let i_loc = requested_local_row(a, i)?;
            let j_reord = mapped_sources[i_loc];
            let row_off = a.entry_offset(i_loc);
            let mut length = 0usize;
            for e in row_off..row_off + a.num_connections(i_loc) {
                let i_reord = mapped_targets[col_offs[e]];
                if i_reord >= j_reord {
                    let value = a.value(e);
                    payload.values.push(if conjugate { value.conj() } else { value });
                    payload.targets.push(i_reord);
                    length += 1;
                }
            }
            payload.row_lengths.push(length);
            payload.entry_sizes[q] += length;
        }
    }
    log::debug!(
        "pull[{rank}]: packed {} entries in {:?}",
        payload.values.len(),
        t0.elapsed()
    );

    // 5) row lengths, values, targets
    let t0 = Instant::now();
    let (row_lengths, entry_sizes, values, targets) =
        exchange_payload(comm, &team, tag, &PULL_PHASES, &req, payload)?;
    log::debug!("pull[{rank}]: entry exchange took {:?}", t0.elapsed());

    // 6) place
    let t0 = Instant::now();
    let mut fronts = FrontTree::zeros(tree);
    fronts.set_flags(FrontType::Symm2d, conjugate);
    let placed = place_entries(
        &mut fronts,
        tree,
        a,
        &req,
        &row_lengths,
        &entry_sizes,
        &values,
        &targets,
        Placement::Set,
    )?;
    log::debug!(
        "pull[{rank}]: placed {placed} of {} received entries in {:?}",
        values.len(),
        t0.elapsed()
    );
    Ok(fronts)
}

impl<F: Scalar> FrontTree<F> {
    /// Build the frontal tree of `tree` from `a`; see [`pull`].
    pub fn pull<C: Communicator>(
        a: &DistSparseMatrix<F>,
        reordering: &DistMap,
        tree: &SymbolicTree,
        conjugate: bool,
        comm: &C,
    ) -> Result<Self, FrontError> {
        pull(a, reordering, tree, conjugate, comm)
    }

    /// Add the entries of `a` into the existing fronts.
    ///
    /// The fronts must have been pulled from `tree` before. Rows travel in
    /// full and the per-front triangle filter drops the strictly upper
    /// entries, so on a symmetric pattern the result matches [`pull`] on
    /// zeroed fronts. Values are conjugated when the root front is Hermitian.
    /// Collective over the world of `comm`.
    pub fn pull_update<C: Communicator>(
        &mut self,
        a: &DistSparseMatrix<F>,
        reordering: &DistMap,
        tree: &SymbolicTree,
        comm: &C,
    ) -> Result<(), FrontError> {
        self.pull_update_with_tag(a, reordering, tree, comm, PULL_UPDATE_TAG)
    }

    pub fn pull_update_with_tag<C: Communicator>(
        &mut self,
        a: &DistSparseMatrix<F>,
        reordering: &DistMap,
        tree: &SymbolicTree,
        comm: &C,
        tag: CommTag,
    ) -> Result<(), FrontError> {
        check_matrix(a, reordering, comm)?;
        self.check_shape(tree)?;
        let team = world_team(comm);
        let rank = comm.rank();
        let conjugate = self.is_hermitian();

        let t0 = Instant::now();
        let targets = sort_unique(a.local_cols());
        let mut mapped_targets = targets.clone();
        reordering.translate_with_tag(comm, &mut mapped_targets, tag)?;
        log::debug!("pull_update[{rank}]: translation took {:?}", t0.elapsed());

        let req = request_rows(a, tree, comm, &team, tag, &PULL_UPDATE_PHASES)?;

        let mut payload = Payload {
            row_lengths: Vec::with_capacity(req.send_rows.len()),
            entry_sizes: vec![0usize; team.size()],
            values: Vec::new(),
            targets: Vec::new(),
        };
        let (send_row_offs, _) = scan(&req.send_row_sizes);
        for (q, (&off, &n)) in send_row_offs.iter().zip(&req.send_row_sizes).enumerate() {
            for &i in &req.send_rows[off..off + n] {
                let i_loc = requested_local_row(a, i)?;
                let row_off = a.entry_offset(i_loc);
                let num_connections = a.num_connections(i_loc);
                for e in row_off..row_off + num_connections {
                    let value = a.value(e);
                    let pos = targets.partition_point(|&u| u < a.col(e));
                    payload.values.push(if conjugate { value.conj() } else { value });
                    payload.targets.push(mapped_targets[pos]);
                }
                payload.row_lengths.push(num_connections);
                payload.entry_sizes[q] += num_connections;
            }
        }

        let t0 = Instant::now();
        let (row_lengths, entry_sizes, values, recv_targets) =
            exchange_payload(comm, &team, tag, &PULL_UPDATE_PHASES, &req, payload)?;
        log::debug!("pull_update[{rank}]: entry exchange took {:?}", t0.elapsed());

        let placed = place_entries(
            self,
            tree,
            a,
            &req,
            &row_lengths,
            &entry_sizes,
            &values,
            &recv_targets,
            Placement::Update,
        )?;
        log::trace!("pull_update[{rank}]: accumulated {placed} entries");
        Ok(())
    }
}
