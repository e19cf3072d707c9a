mod util;
use util::*;

use multifront::algs::communicator::{CommTag, Communicator, NoComm, ThreadComm, Wait};
use multifront::algs::exchange::{all_to_all_counts, all_to_all_v};
use multifront::algs::wire::Phase;
use multifront::topology::grid::Team;

#[test]
fn thread_fifo_per_tag() {
    let comms = ThreadComm::world(2);
    for i in 0..5u8 {
        comms[0].isend(1, 9, &[i]);
    }
    let got: Vec<u8> = (0..5).map(|_| comms[1].irecv(0, 9).wait().unwrap()[0]).collect();
    assert_eq!(got, vec![0, 1, 2, 3, 4]);
}

#[test]
fn no_comm_is_a_world_of_one() {
    assert_eq!((NoComm.rank(), NoComm.size()), (0, 1));
    assert_eq!(NoComm.irecv(0, 0).wait(), None);
}

#[test]
fn varying_counts_over_a_team() {
    let tag = CommTag::new(0x2222);
    let got = run_ranks(3, |comm| {
        let team = Team::world(comm.size(), comm.rank());
        // rank r sends q + r values to rank q, each equal to 10 r + q
        let counts: Vec<usize> = (0..3).map(|q| q + comm.rank()).collect();
        let send: Vec<u64> = (0..3)
            .flat_map(|q| std::iter::repeat((10 * comm.rank() + q) as u64).take(q + comm.rank()))
            .collect();
        let recv_counts = all_to_all_counts(&comm, &team, tag, Phase::PullRowCounts, &counts).unwrap();
        let recv = all_to_all_v(&comm, &team, tag, Phase::PullValues, &send, &counts, &recv_counts).unwrap();
        (recv_counts, recv)
    });
    for (me, (counts, recv)) in got.into_iter().enumerate() {
        assert_eq!(counts, (0..3).map(|r| me + r).collect::<Vec<_>>());
        let want: Vec<u64> = (0..3)
            .flat_map(|r| std::iter::repeat((10 * r + me) as u64).take(me + r))
            .collect();
        assert_eq!(recv, want);
    }
}

#[test]
fn subteams_exchange_independently() {
    let tag = CommTag::new(0x2223);
    let got = run_ranks(4, |comm| {
        let (half, _) = Team::world(4, comm.rank()).split(2);
        let counts = vec![comm.rank(); 2];
        all_to_all_counts(&comm, &half, tag, Phase::MapRequestCounts, &counts).unwrap()
    });
    assert_eq!(got, vec![vec![0, 1], vec![0, 1], vec![2, 3], vec![2, 3]]);
}
