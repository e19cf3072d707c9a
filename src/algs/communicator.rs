//! Thin façade over intra-process (threads) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! Point-to-point handles are **waitable**; [`Communicator::exchange`] builds a
//! personalized all-to-all out of them and is the only pattern the frontal
//! algorithms use. Every rank in the peer list must call `exchange` with the
//! same tag, otherwise the run hangs.

use bytes::Bytes;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Barrier};

/// Typed message tag. Each collective entry point takes one of these so that
/// independent operations in flight never match each other's messages.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CommTag(pub u16);

impl CommTag {
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// A tag `delta` steps after this one (wrapping).
    pub const fn offset(self, delta: u16) -> Self {
        Self(self.0.wrapping_add(delta))
    }
}

/// Message passing interface.
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    /// This process' rank in the world.
    fn rank(&self) -> usize;
    /// Number of ranks in the world.
    fn size(&self) -> usize;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16) -> Self::RecvHandle;

    /// Block until every rank of the world reached the barrier.
    fn barrier(&self);

    /// Send `sends[k]` to `peers[k]` and receive one message from each of
    /// `peers`, returned in the same order. `peers` must not contain this rank.
    ///
    /// Receives are posted before sends and every send handle is drained
    /// before returning.
    fn exchange(&self, peers: &[usize], tag: u16, sends: &[Vec<u8>]) -> Vec<Option<Vec<u8>>> {
        let recvs: Vec<Self::RecvHandle> = peers.iter().map(|&p| self.irecv(p, tag)).collect();
        let pending: Vec<Self::SendHandle> = peers
            .iter()
            .zip(sends)
            .map(|(&p, buf)| self.isend(p, tag, buf))
            .collect();
        let out = recvs.into_iter().map(Wait::wait).collect();
        for send in pending {
            let _ = send.wait();
        }
        out
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Compile-time no-op comm for pure serial runs: a world of one rank.
///
/// Self-messages never reach the communicator (the exchange layer short-circuits
/// them), so the point-to-point calls are no-ops.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16) {}
    fn barrier(&self) {}
}

// --- ThreadComm: intra-process / multi-thread ---
type Key = (usize, usize, u16); // (src, dst, tag)

#[derive(Debug)]
struct ThreadWorld {
    mailbox: DashMap<Key, VecDeque<Bytes>>,
    barrier: Barrier,
    size: usize,
}

/// One rank of an in-process world; ranks are meant to run on separate threads.
///
/// Messages between a given `(src, dst, tag)` triple are delivered in FIFO
/// order, which is what lets consecutive collectives reuse one tag.
#[derive(Clone, Debug)]
pub struct ThreadComm {
    rank: usize,
    world: Arc<ThreadWorld>,
}

impl ThreadComm {
    /// Create all `size` ranks of a fresh world sharing one mailbox.
    pub fn world(size: usize) -> Vec<ThreadComm> {
        let world = Arc::new(ThreadWorld {
            mailbox: DashMap::new(),
            barrier: Barrier::new(size.max(1)),
            size,
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                world: world.clone(),
            })
            .collect()
    }
}

pub struct LocalHandle {
    world: Arc<ThreadWorld>,
    key: Key,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        loop {
            if let Some(mut queue) = self.world.mailbox.get_mut(&self.key) {
                if let Some(bytes) = queue.pop_front() {
                    return Some(bytes.to_vec());
                }
            }
            std::thread::yield_now();
        }
    }
}

impl Communicator for ThreadComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.world.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        let key = (self.rank, peer, tag);
        self.world
            .mailbox
            .entry(key)
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16) -> Self::RecvHandle {
        LocalHandle {
            world: self.world.clone(),
            key: (peer, self.rank, tag),
        }
    }

    fn barrier(&self) {
        self.world.barrier.wait();
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Communicator, Wait};
    use crate::front_error::FrontError;
    use mpi::environment::Universe;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    /// World communicator backed by MPI.
    ///
    /// `isend`/`irecv` are blocking here; the collective [`Communicator::exchange`]
    /// is overridden with scoped non-blocking sends so large messages cannot
    /// deadlock.
    pub struct MpiComm {
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
        _universe: Universe,
    }

    impl MpiComm {
        pub fn new() -> Result<Self, FrontError> {
            let universe = mpi::initialize().ok_or_else(|| FrontError::CommError {
                neighbor: 0,
                reason: "MPI initialization failed".into(),
            })?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Ok(Self {
                world,
                rank,
                size,
                _universe: universe,
            })
        }
    }

    pub struct MpiHandle(Option<Vec<u8>>);

    impl Wait for MpiHandle {
        fn wait(self) -> Option<Vec<u8>> {
            self.0
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiHandle;
        type RecvHandle = MpiHandle;

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiHandle {
            self.world
                .process_at_rank(peer as i32)
                .send_with_tag(buf, i32::from(tag));
            MpiHandle(None)
        }

        fn irecv(&self, peer: usize, tag: u16) -> MpiHandle {
            let (msg, _status) = self
                .world
                .process_at_rank(peer as i32)
                .receive_vec_with_tag::<u8>(i32::from(tag));
            MpiHandle(Some(msg))
        }

        fn barrier(&self) {
            self.world.barrier();
        }

        fn exchange(&self, peers: &[usize], tag: u16, sends: &[Vec<u8>]) -> Vec<Option<Vec<u8>>> {
            let tag = i32::from(tag);
            mpi::request::scope(|scope| {
                let pending: Vec<_> = peers
                    .iter()
                    .zip(sends)
                    .map(|(&p, buf)| {
                        self.world
                            .process_at_rank(p as i32)
                            .immediate_send_with_tag(scope, &buf[..], tag)
                    })
                    .collect();
                let out = peers
                    .iter()
                    .map(|&p| {
                        let (msg, _status) = self
                            .world
                            .process_at_rank(p as i32)
                            .receive_vec_with_tag::<u8>(tag);
                        Some(msg)
                    })
                    .collect();
                for req in pending {
                    req.wait();
                }
                out
            })
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_roundtrip_two_ranks() {
        let comms = ThreadComm::world(2);
        let recv = comms[1].irecv(0, 7);
        comms[0].isend(1, 7, &[1, 2, 3, 4]);
        assert_eq!(recv.wait().expect("data from rank 0"), vec![1, 2, 3, 4]);
    }

    #[test]
    fn thread_fifo_per_tag() {
        let comms = ThreadComm::world(2);
        for i in 0..5u8 {
            comms[0].isend(1, 3, &[i]);
        }
        comms[0].isend(1, 4, &[99]);
        let other = comms[1].irecv(0, 4).wait().unwrap();
        assert_eq!(other, vec![99]);
        let got: Vec<u8> = (0..5).map(|_| comms[1].irecv(0, 3).wait().unwrap()[0]).collect();
        assert_eq!(got, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn worlds_are_isolated() {
        let a = ThreadComm::world(2);
        let b = ThreadComm::world(2);
        a[0].isend(1, 1, &[1]);
        b[0].isend(1, 1, &[2]);
        assert_eq!(b[1].irecv(0, 1).wait().unwrap(), vec![2]);
        assert_eq!(a[1].irecv(0, 1).wait().unwrap(), vec![1]);
    }

    #[test]
    fn exchange_on_threads() {
        let comms = ThreadComm::world(3);
        let results: Vec<Vec<Option<Vec<u8>>>> = std::thread::scope(|s| {
            let handles: Vec<_> = comms
                .iter()
                .map(|c| {
                    s.spawn(move || {
                        let me = c.rank();
                        let peers: Vec<usize> = (0..3).filter(|&p| p != me).collect();
                        let sends: Vec<Vec<u8>> =
                            peers.iter().map(|&p| vec![me as u8, p as u8]).collect();
                        c.exchange(&peers, 11, &sends)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(results[0], vec![Some(vec![1, 0]), Some(vec![2, 0])]);
        assert_eq!(results[2], vec![Some(vec![0, 2]), Some(vec![1, 2])]);
    }

    #[test]
    fn no_comm_is_single_rank() {
        let c = NoComm;
        assert_eq!((c.rank(), c.size()), (0, 1));
        assert!(c.irecv(0, 1).wait().is_none());
        c.barrier();
    }
}
