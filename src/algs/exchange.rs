//! Varying-count all-to-all over a [`Team`].
//!
//! Stage helpers in the style of a two-step completion: first
//! [`all_to_all_counts`] tells every member how many records to expect, then
//! [`all_to_all_v`] moves the records themselves. Every frame is prefixed by a
//! [`WireHdr`] naming the collective [`Phase`]; a member that is executing a
//! different phase is reported as [`FrontError::CollectiveMismatch`].
//!
//! All functions are collective over `team`: every member must call them, in
//! the same order, with the same tag, even when it has nothing to send.

use bytemuck::Pod;
use std::mem::size_of;

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::wire::{Phase, WIRE_VERSION, WireCount, WireHdr, WireIndex, cast_slice, read_records};
use crate::front_error::FrontError;
use crate::topology::grid::Team;

/// Exclusive prefix sum: returns `(offsets, total)`.
pub fn scan(sizes: &[usize]) -> (Vec<usize>, usize) {
    let mut offs = Vec::with_capacity(sizes.len());
    let mut total = 0usize;
    for &s in sizes {
        offs.push(total);
        total += s;
    }
    (offs, total)
}

/// Send `payloads[q]` (holding `counts[q]` records) to team member `q` and
/// return, per member, the announced record count and the raw payload.
pub fn all_to_all_payloads<C>(
    comm: &C,
    team: &Team,
    tag: CommTag,
    phase: Phase,
    mut payloads: Vec<Vec<u8>>,
    counts: &[usize],
) -> Result<Vec<(usize, Vec<u8>)>, FrontError>
where
    C: Communicator,
{
    let n = team.size();
    debug_assert_eq!(payloads.len(), n);
    debug_assert_eq!(counts.len(), n);
    let me = team.rank();

    let frame = |payload: &[u8], count: usize| {
        let mut buf = Vec::with_capacity(WireHdr::SIZE + payload.len());
        buf.extend_from_slice(bytemuck::bytes_of(&WireHdr::new(phase, count)));
        buf.extend_from_slice(payload);
        buf
    };

    // 1) own frame never leaves the process
    let mut own = Some(frame(&payloads[me], counts[me]));

    // 2) everything else through the communicator, in team order
    let mut peers = Vec::with_capacity(n.saturating_sub(1));
    let mut sends = Vec::with_capacity(n.saturating_sub(1));
    for q in (0..n).filter(|&q| q != me) {
        peers.push(team.world_rank(q));
        sends.push(frame(&payloads[q], counts[q]));
        payloads[q] = Vec::new();
    }
    let mut received = comm.exchange(&peers, tag.as_u16(), &sends).into_iter();

    // 3) decode; all handles are complete, so early returns are safe
    let mut out = Vec::with_capacity(n);
    for q in 0..n {
        let raw = if q == me {
            own.take()
        } else {
            received.next().flatten()
        };
        let neighbor = team.world_rank(q);
        let raw = raw.ok_or_else(|| FrontError::CommError {
            neighbor,
            reason: format!("no data received for phase {phase:?}"),
        })?;
        if raw.len() < WireHdr::SIZE {
            return Err(FrontError::BufferSizeMismatch {
                neighbor,
                expected: WireHdr::SIZE,
                got: raw.len(),
            });
        }
        let hdr: WireHdr = bytemuck::pod_read_unaligned(&raw[..WireHdr::SIZE]);
        if hdr.version() != WIRE_VERSION {
            return Err(FrontError::WireVersion {
                neighbor,
                got: hdr.version(),
            });
        }
        if hdr.kind() != phase as u16 {
            return Err(FrontError::CollectiveMismatch {
                neighbor,
                expected: phase as u16,
                got: hdr.kind(),
            });
        }
        out.push((hdr.count(), raw[WireHdr::SIZE..].to_vec()));
    }
    Ok(out)
}

/// Tell every member how many records it will receive from us; returns how
/// many we will receive from each member.
pub fn all_to_all_counts<C>(
    comm: &C,
    team: &Team,
    tag: CommTag,
    phase: Phase,
    send_counts: &[usize],
) -> Result<Vec<usize>, FrontError>
where
    C: Communicator,
{
    let payloads = send_counts
        .iter()
        .map(|&c| cast_slice(std::slice::from_ref(&WireCount::new(c))).to_vec())
        .collect();
    let ones = vec![1usize; team.size()];
    let frames = all_to_all_payloads(comm, team, tag, phase, payloads, &ones)?;
    let mut recv_counts = Vec::with_capacity(frames.len());
    for (q, (_, bytes)) in frames.into_iter().enumerate() {
        if bytes.len() != size_of::<WireCount>() {
            return Err(FrontError::BufferSizeMismatch {
                neighbor: team.world_rank(q),
                expected: size_of::<WireCount>(),
                got: bytes.len(),
            });
        }
        let cnt: WireCount = bytemuck::pod_read_unaligned(&bytes);
        recv_counts.push(cnt.get());
    }
    log::trace!(
        "[{phase:?}] team rank {} sends {:?} receives {:?}",
        team.rank(),
        send_counts,
        recv_counts
    );
    Ok(recv_counts)
}

/// Move `send` (packed contiguously by destination, `send_counts[q]` records
/// for member `q`) and return the records received, packed by source.
///
/// `recv_counts` must come from a prior [`all_to_all_counts`]; any disagreement
/// with what a source actually sent is an accounting error.
pub fn all_to_all_v<T, C>(
    comm: &C,
    team: &Team,
    tag: CommTag,
    phase: Phase,
    send: &[T],
    send_counts: &[usize],
    recv_counts: &[usize],
) -> Result<Vec<T>, FrontError>
where
    T: Pod,
    C: Communicator,
{
    let (send_offs, total_send) = scan(send_counts);
    if total_send != send.len() {
        return Err(FrontError::AccountingMismatch {
            stage: "all_to_all_v send",
            rank: team.rank(),
            expected: total_send,
            got: send.len(),
        });
    }
    let payloads = send_offs
        .iter()
        .zip(send_counts)
        .map(|(&off, &cnt)| cast_slice(&send[off..off + cnt]).to_vec())
        .collect();
    let frames = all_to_all_payloads(comm, team, tag, phase, payloads, send_counts)?;

    let (_, total_recv) = scan(recv_counts);
    let mut out = Vec::with_capacity(total_recv);
    for (q, (count, bytes)) in frames.into_iter().enumerate() {
        if count != recv_counts[q] {
            return Err(FrontError::AccountingMismatch {
                stage: "all_to_all_v recv",
                rank: team.world_rank(q),
                expected: recv_counts[q],
                got: count,
            });
        }
        if bytes.len() != count * size_of::<T>() {
            return Err(FrontError::BufferSizeMismatch {
                neighbor: team.world_rank(q),
                expected: count * size_of::<T>(),
                got: bytes.len(),
            });
        }
        out.extend(read_records::<T>(&bytes));
    }
    Ok(out)
}

/// [`all_to_all_v`] for global indices.
pub fn all_to_all_indices<C>(
    comm: &C,
    team: &Team,
    tag: CommTag,
    phase: Phase,
    send: &[usize],
    send_counts: &[usize],
    recv_counts: &[usize],
) -> Result<Vec<usize>, FrontError>
where
    C: Communicator,
{
    let wire: Vec<WireIndex> = send.iter().map(|&i| WireIndex::of(i)).collect();
    let got = all_to_all_v(comm, team, tag, phase, &wire, send_counts, recv_counts)?;
    Ok(got.iter().map(WireIndex::get).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;

    #[test]
    fn scan_is_exclusive() {
        assert_eq!(scan(&[2, 0, 3]), (vec![0, 2, 2], 5));
        assert_eq!(scan(&[]), (vec![], 0));
    }

    #[test]
    fn single_rank_loops_back() {
        let team = Team::world(1, 0);
        let tag = CommTag::new(0x10);
        let counts = all_to_all_counts(&NoComm, &team, tag, Phase::PullRowCounts, &[3]).unwrap();
        assert_eq!(counts, vec![3]);
        let got =
            all_to_all_indices(&NoComm, &team, tag, Phase::PullRows, &[5, 1, 9], &[3], &counts)
                .unwrap();
        assert_eq!(got, vec![5, 1, 9]);
    }

    #[test]
    fn announced_count_must_match() {
        let team = Team::world(1, 0);
        let res = all_to_all_v(
            &NoComm,
            &team,
            CommTag::new(0x11),
            Phase::PullValues,
            &[1.0f64, 2.0],
            &[2],
            &[1],
        );
        assert!(matches!(res, Err(FrontError::AccountingMismatch { .. })));
    }
}
