mod util;
use util::*;

use grid_halo::algs::communicator::{CommTag, Communicator, NoComm, ThreadComm, Wait};

#[test]
fn thread_fifo_per_link() {
    let world = ThreadComm::world(2);
    for i in 0..10u8 {
        world[0].isend(1, CommTag(500), &[i]).wait();
    }
    let got: Vec<u8> = (0..10)
        .map(|_| world[1].recv(0, CommTag(500)).unwrap()[0])
        .collect();
    assert_eq!(got, (0u8..10).collect::<Vec<_>>());
}

#[test]
fn thread_recv_blocks_until_sent() {
    let got = run_ranks(2, |comm| {
        if comm.rank() == 0 {
            std::thread::sleep(std::time::Duration::from_millis(20));
            comm.isend(1, CommTag(7), b"late").wait();
            Vec::new()
        } else {
            comm.recv(0, CommTag(7)).unwrap()
        }
    });
    assert_eq!(got[1], b"late".to_vec());
}

#[test]
fn gather_collects_in_rank_order() {
    let got = run_ranks(3, |comm| {
        let payload = vec![comm.rank() as u8; comm.rank() + 1];
        comm.gather(1, CommTag::GATHER, &payload).unwrap()
    });
    assert_eq!(got[0], None);
    assert_eq!(got[2], None);
    assert_eq!(got[1], Some(vec![vec![0], vec![1, 1], vec![2, 2, 2]]));
}

#[test]
fn gather_rejects_bad_root() {
    let comm = NoComm::new();
    assert!(comm.gather(2, CommTag::GATHER, &[]).is_err());
}

#[test]
fn recv_from_unknown_rank_fails() {
    let world = ThreadComm::world(2);
    assert!(world[0].recv(5, CommTag(1)).is_err());
}
