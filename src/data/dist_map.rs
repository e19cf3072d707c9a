//! Block-distributed permutation of global indices.
//!
//! Rank `r` stores the images of the sources it owns under the same block row
//! distribution as [`DistSparseMatrix`](crate::data::sparse::DistSparseMatrix),
//! so the map built for an `n × n` matrix lines up with its local rows.
//! Translating an arbitrary index therefore needs a round trip to the owner;
//! [`DistMap::translate`] batches that into three exchanges.

use std::time::Instant;

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::exchange::{all_to_all_counts, all_to_all_indices, scan};
use crate::algs::wire::Phase;
use crate::front_error::FrontError;
use crate::topology::grid::Team;

/// Default tag for standalone [`DistMap::translate`] calls.
pub const MAP_TAG: CommTag = CommTag::new(0x4D50);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DistMap {
    num_sources: usize,
    rank: usize,
    comm_size: usize,
    /// Images of `first_local_source() ..` in order.
    local: Vec<usize>,
}

impl DistMap {
    /// The identity map on `num_sources` indices.
    pub fn identity(num_sources: usize, rank: usize, comm_size: usize) -> Self {
        let mut map = Self {
            num_sources,
            rank,
            comm_size: comm_size.max(1),
            local: Vec::new(),
        };
        let first = map.first_local_source();
        map.local = (first..first + map.num_local_sources()).collect();
        map
    }

    /// Keep this rank's slice of a replicated permutation `perm[i] = image of i`.
    pub fn from_global(perm: &[usize], rank: usize, comm_size: usize) -> Self {
        let mut map = Self::identity(perm.len(), rank, comm_size);
        let first = map.first_local_source();
        map.local = perm[first..first + map.num_local_sources()].to_vec();
        map
    }

    /// Build from the images of the locally owned sources.
    pub fn from_local(
        num_sources: usize,
        rank: usize,
        comm_size: usize,
        local: Vec<usize>,
    ) -> Result<Self, FrontError> {
        let mut map = Self::identity(num_sources, rank, comm_size);
        if local.len() != map.num_local_sources() {
            return Err(FrontError::StructuralMismatch {
                local_height: map.num_local_sources(),
                sources: local.len(),
            });
        }
        if let Some(&bad) = local.iter().find(|&&i| i >= num_sources) {
            return Err(FrontError::IndexOutOfRange {
                index: bad,
                len: num_sources,
            });
        }
        map.local = local;
        Ok(map)
    }

    #[inline]
    pub fn num_sources(&self) -> usize {
        self.num_sources
    }

    #[inline]
    fn blocksize(&self) -> usize {
        self.num_sources / self.comm_size
    }

    #[inline]
    pub fn first_local_source(&self) -> usize {
        self.rank * self.blocksize()
    }

    #[inline]
    pub fn num_local_sources(&self) -> usize {
        if self.rank + 1 < self.comm_size {
            self.blocksize()
        } else {
            self.num_sources - (self.comm_size - 1) * self.blocksize()
        }
    }

    /// Rank storing the image of source `i`.
    #[inline]
    pub fn row_owner(&self, i: usize) -> usize {
        let bs = self.blocksize();
        if bs == 0 {
            self.comm_size - 1
        } else {
            (i / bs).min(self.comm_size - 1)
        }
    }

    /// Image of the `k`-th local source.
    #[inline]
    pub fn get_local(&self, k: usize) -> usize {
        self.local[k]
    }

    pub fn local_images(&self) -> &[usize] {
        &self.local
    }

    /// Replace every entry of `inds` by its image, in place.
    ///
    /// Collective over the world of `comm`: every rank must call it, even with
    /// an empty slice.
    pub fn translate<C: Communicator>(&self, comm: &C, inds: &mut [usize]) -> Result<(), FrontError> {
        self.translate_with_tag(comm, inds, MAP_TAG)
    }

    pub fn translate_with_tag<C: Communicator>(
        &self,
        comm: &C,
        inds: &mut [usize],
        tag: CommTag,
    ) -> Result<(), FrontError> {
        let t0 = Instant::now();
        let team = Team::world(self.comm_size, self.rank);
        if let Some(&bad) = inds.iter().find(|&&i| i >= self.num_sources) {
            return Err(FrontError::IndexOutOfRange {
                index: bad,
                len: self.num_sources,
            });
        }

        // 1) how many requests go to each owner
        let mut send_counts = vec![0usize; self.comm_size];
        for &i in inds.iter() {
            send_counts[self.row_owner(i)] += 1;
        }
        let (send_offs, total_send) = scan(&send_counts);
        let mut cursor = send_offs.clone();
        let mut requests = vec![0usize; total_send];
        for &i in inds.iter() {
            let q = self.row_owner(i);
            requests[cursor[q]] = i;
            cursor[q] += 1;
        }

        // 2) exchange requests
        let recv_counts = all_to_all_counts(comm, &team, tag, Phase::MapRequestCounts, &send_counts)?;
        let asked = all_to_all_indices(
            comm,
            &team,
            tag,
            Phase::MapRequests,
            &requests,
            &send_counts,
            &recv_counts,
        )?;

        // 3) answer from the local slice; replies keep the request order
        let first = self.first_local_source();
        let mut replies = Vec::with_capacity(asked.len());
        for i in asked {
            if i < first || i - first >= self.local.len() {
                return Err(FrontError::NonLocalRow {
                    row: i,
                    rank: self.rank,
                });
            }
            replies.push(self.local[i - first]);
        }
        let images = all_to_all_indices(
            comm,
            &team,
            tag,
            Phase::MapReplies,
            &replies,
            &recv_counts,
            &send_counts,
        )?;

        // 4) scatter back, walking the sources in the packing order
        let mut cursor = send_offs;
        for i in inds.iter_mut() {
            let q = self.row_owner(*i);
            *i = images[cursor[q]];
            cursor[q] += 1;
        }
        log::trace!(
            "DistMap::translate: rank {} translated {} indices in {:?}",
            self.rank,
            total_send,
            t0.elapsed()
        );
        Ok(())
    }
}
