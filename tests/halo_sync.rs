mod util;
use util::*;

use std::sync::Arc;

use grid_halo::algs::communicator::{NoComm, ThreadComm};
use grid_halo::data::{
    AxisSelect, DataPartition, DataPartitionOptions, Levels, MutableNdArrayView, NdArray,
    PartitionState,
};
use grid_halo::geometry::{DomainKey, Halos, IndexBox};

#[test]
fn four_ranks_four_domains() {
    let p = grid(&[8, 8], &[2, 2], Halos::uniform(2, 1), 4);
    let dps = run_ranks(4, |comm| synced(&p, comm));
    for (rank, dp) in dps.iter().enumerate() {
        assert_eq!(dp.rank(), rank);
        assert_eq!(dp.state(), PartitionState::Ready);
        assert_eq!(dp.domains().len(), 1);
        assert_synced(dp);
    }
}

#[test]
fn second_sync_changes_nothing() {
    let p = grid(&[8, 8], &[2, 2], Halos::uniform(2, 1), 4);
    let snapshots = run_ranks(4, |comm| {
        let mut dp = synced(&p, comm);
        let first: Vec<Vec<f64>> = dp.buffers().map(|(_, a)| a.as_slice().to_vec()).collect();
        dp.sync_all().unwrap();
        let second: Vec<Vec<f64>> = dp.buffers().map(|(_, a)| a.as_slice().to_vec()).collect();
        (first, second)
    });
    for (first, second) in snapshots {
        assert_eq!(first, second);
    }
}

#[test]
fn level_zero_fills_rows_only() {
    let p = grid(&[8, 8], &[2, 2], Halos::uniform(2, 1), 4);
    let dps = run_ranks(4, |comm| {
        let mut dp: DataPartition<f64, ThreadComm> = DataPartition::new(Arc::clone(&p), comm).unwrap();
        dp.map_interior(|idx, _| value(idx));
        dp.sync(0usize).unwrap();
        dp
    });
    // domain (1, 0) lives on rank 2; its local origin is global (3, 0)
    let d = dps[2].buffer(&DomainKey::from([1, 0])).unwrap();
    let row = d.read_window(&IndexBox::new(vec![0, 0], vec![1, 4])).unwrap();
    let expected: Vec<f64> = (0..4).map(|j| value(&[3, j])).collect();
    assert_eq!(row, expected);
    // corner neighbor (0, 1) shares level 0
    assert_eq!(d.get(&[0, 4]), Some(&value(&[3, 4])));
    // column halo from (1, 1) is level 1
    assert_eq!(d.get(&[1, 4]), Some(&0.0));
}

#[test]
fn explicit_level_list_equals_all() {
    let p = grid(&[8, 8], &[2, 2], Halos::uniform(2, 1), 4);
    let dps = run_ranks(4, |comm| {
        let mut dp: DataPartition<f64, ThreadComm> = DataPartition::new(Arc::clone(&p), comm).unwrap();
        dp.map_interior(|idx, _| value(idx));
        dp.sync(Levels::Axes(vec![1])).unwrap();
        dp.sync(vec![0usize]).unwrap();
        dp
    });
    dps.iter().for_each(assert_synced);
}

#[test]
fn two_ranks_own_two_domains_each() {
    let p = grid(&[8, 8], &[2, 2], Halos::uniform(2, 1), 2);
    let dps = run_ranks(2, |comm| synced(&p, comm));
    for dp in &dps {
        assert_eq!(dp.domains().len(), 2);
        assert_synced(dp);
    }
}

#[test]
fn single_rank_without_communication() {
    let p = grid(&[8, 8], &[2, 2], Halos::uniform(2, 1), 1);
    let mut dp: DataPartition<f64, NoComm> = DataPartition::new(p, NoComm::new()).unwrap();
    dp.map_interior(|idx, _| value(idx));
    dp.sync_all().unwrap();
    assert_eq!(dp.domains().len(), 4);
    assert_synced(&dp);
}

#[test]
fn one_dimension_wide_halo() {
    let p = grid(&[12], &[3], Halos::uniform(1, 2), 3);
    let dps = run_ranks(3, |comm| synced(&p, comm));
    assert_eq!(dps[0].receive_halos().len(), 1);
    assert_eq!(dps[1].receive_halos().len(), 2);
    let middle = dps[1].buffer(&DomainKey::from([1])).unwrap();
    assert_eq!(middle.shape(), &[8]);
    assert_eq!(middle.as_slice(), &[2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
    dps.iter().for_each(assert_synced);
}

#[test]
fn three_dimensions_fill_corners() {
    let p = grid(&[6, 6, 6], &[2, 2, 2], Halos::uniform(3, 1), 4);
    let dps = run_ranks(4, |comm| synced(&p, comm));
    for dp in &dps {
        assert_eq!(dp.domains().len(), 2);
        // two domains, each with 3 face, 3 edge and 1 corner neighbor
        assert_eq!(dp.receive_halos().len(), 14);
        assert_synced(dp);
    }
}

#[test]
fn asymmetric_stencil() {
    let p = grid(&[9, 8], &[3, 2], Halos::new(vec![2, 0], vec![1, 1]), 3);
    let dps = run_ranks(3, |comm| synced(&p, comm));
    dps.iter().for_each(assert_synced);
}

#[test]
fn custom_master_rank() {
    let p = grid(&[12], &[3], Halos::uniform(1, 1), 3);
    let dps = run_ranks(3, |comm| {
        let options = DataPartitionOptions { master_rank: 2 };
        let mut dp: DataPartition<f64, ThreadComm> =
            DataPartition::with_options(Arc::clone(&p), comm, options).unwrap();
        dp.map_interior(|idx, _| value(idx));
        dp.sync_all().unwrap();
        dp
    });
    dps.iter().for_each(assert_synced);
}

#[test]
fn discovery_matches_partition() {
    let p = grid(&[8, 8], &[2, 2], Halos::uniform(2, 1), 4);
    let dps = run_ranks(4, |comm| {
        let mut dp: DataPartition<f64, ThreadComm> = DataPartition::new(Arc::clone(&p), comm).unwrap();
        dp.validate_discovery().unwrap();
        assert_eq!(dp.state(), PartitionState::DiscoveryDone);
        dp.prepare().unwrap();
        dp.sync_all().unwrap();
        dp
    });
    let sent: usize = dps.iter().map(|dp| dp.transmit_halos().map_or(0, |t| t.len())).sum();
    let received: usize = dps.iter().map(|dp| dp.receive_halos().len()).sum();
    assert_eq!(sent, received);

    // each transmit window has the shape of the receive window it serves
    for dp in &dps {
        for (_, t) in dp.transmit_halos().unwrap().iter() {
            let r = dps[t.receiver_rank].receive_halos().get(t.receiver_halo).unwrap();
            assert_eq!(t.window.shape(), r.window.shape());
            assert_eq!(r.sender_rank, dp.rank());
        }
    }
}

#[test]
fn get_set_fill_across_ranks() {
    let p = grid(&[8, 8], &[2, 2], Halos::uniform(2, 1), 2);
    let pieces = run_ranks(2, |comm| {
        let mut dp: DataPartition<f64, ThreadComm> = DataPartition::new(Arc::clone(&p), comm).unwrap();
        dp.fill(&[AxisSelect::Full, AxisSelect::Full], -1.0).unwrap();
        let block = NdArray::from_vec(&[4, 4], (0..16).map(f64::from).collect()).unwrap();
        dp.set(&[(2..6).into(), (2..6).into()], &block).unwrap();
        dp.sync_all().unwrap();
        dp.get(&[(2..6).into(), (2..6).into()]).unwrap()
    });
    // rank 0 owns rows 0..4, rank 1 rows 4..8
    assert_eq!(pieces[0].len(), 2);
    assert_eq!(pieces[1].len(), 2);
    let top_left = &pieces[0][&DomainKey::from([0, 0])];
    assert_eq!(top_left.shape(), &[2, 2]);
    assert_eq!(top_left.as_slice(), &[0.0, 1.0, 4.0, 5.0]);
    let bottom_right = &pieces[1][&DomainKey::from([1, 1])];
    assert_eq!(bottom_right.as_slice(), &[10.0, 11.0, 14.0, 15.0]);
}
