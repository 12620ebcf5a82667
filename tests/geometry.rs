use proptest::prelude::*;

use grid_halo::geometry::{
    DomainKey, Halos, IndexBox, calc_local_indices, calculate_adjacency, compute_sender, do_create_domain,
};
use grid_halo::halo_error::HaloError;
use grid_halo::mesh::RectilinearMesh;

#[test]
fn eight_by_eight_split_two_by_two() {
    let a = calc_local_indices(&[8, 8], &[2, 2], &[0, 0]).unwrap();
    assert_eq!((a.start, a.stop), (vec![0, 0], vec![4, 4]));
    let b = calc_local_indices(&[8, 8], &[2, 2], &[1, 1]).unwrap();
    assert_eq!((b.start, b.stop, b.shape), (vec![4, 4], vec![8, 8], vec![4, 4]));

    let h = calculate_adjacency(&[2, 2], &[0, 0], &Halos::uniform(2, 1)).unwrap();
    assert_eq!(h.low, vec![0, 0]);
    assert_eq!(h.high, vec![1, 1]);
}

#[test]
fn uneven_chunks_front_load_remainder() {
    let sizes: Vec<usize> = (0..3)
        .map(|c| calc_local_indices(&[10], &[3], &[c]).unwrap().shape[0])
        .collect();
    assert_eq!(sizes, vec![4, 3, 3]);
    assert!(matches!(
        calc_local_indices(&[10], &[0], &[0]),
        Err(HaloError::InvalidPartitionCount { .. })
    ));
}

#[test]
fn create_domain_against_mesh_bounds() {
    let mesh = RectilinearMesh::uniform(&[0.0, 0.0], &[0.5, 0.5], &[9, 9]).unwrap();
    let mask = IndexBox::new(vec![4, 4], vec![9, 9]);
    assert!(matches!(
        do_create_domain(&mesh, &mask, &(vec![0.0, 0.0], vec![4.5, 4.0])),
        Err(HaloError::OutOfMeshBounds { side: "higher", axis: 0 })
    ));
    assert_eq!(do_create_domain(&mesh, &mask, &(vec![0.0, 0.0], vec![1.0, 1.0])), Ok(false));
    assert_eq!(do_create_domain(&mesh, &mask, &(vec![0.0, 0.0], vec![2.0, 2.0])), Ok(true));
}

#[test]
fn corner_domain_has_one_neighbor_per_level() {
    let halos = calculate_adjacency(&[2, 2], &[0, 0], &Halos::uniform(2, 1)).unwrap();
    let levels = compute_sender(&DomainKey::from([0usize, 0]), &halos);
    let total: usize = levels.values().map(Vec::len).sum();
    assert_eq!(total, 3);
    assert_eq!(levels[&0].len(), 2);
    assert_eq!(levels[&1].len(), 1);
}

proptest! {
    #[test]
    fn chunks_tile_the_axis(extent in 1usize..200, parts in 1usize..16) {
        prop_assume!(parts <= extent);
        let mut next = 0;
        let mut total = 0;
        for c in 0..parts {
            let li = calc_local_indices(&[extent], &[parts], &[c]).unwrap();
            prop_assert_eq!(li.start[0], next);
            next = li.stop[0];
            total += li.shape[0];
        }
        prop_assert_eq!(total, extent);
    }

    #[test]
    fn boundary_chunks_have_no_outward_halo(
        parts in proptest::collection::vec(1usize..5, 1..4),
        width in 0usize..3,
        seed in any::<u64>(),
    ) {
        let coord: Vec<usize> = parts
            .iter()
            .enumerate()
            .map(|(a, &p)| ((seed >> (8 * a)) as usize) % p)
            .collect();
        let stencil = Halos::uniform(parts.len(), width);
        let h = calculate_adjacency(&parts, &coord, &stencil).unwrap();
        for a in 0..parts.len() {
            if coord[a] == 0 {
                prop_assert_eq!(h.low[a], 0);
            } else {
                prop_assert_eq!(h.low[a], width);
            }
            if coord[a] == parts[a] - 1 {
                prop_assert_eq!(h.high[a], 0);
            } else {
                prop_assert_eq!(h.high[a], width);
            }
        }
    }

    #[test]
    fn every_neighbor_listed_once(ndim in 1usize..4, width in 1usize..3) {
        // interior domain of a 3^ndim decomposition
        let key = DomainKey::from(vec![1usize; ndim]);
        let levels = compute_sender(&key, &Halos::uniform(ndim, width));
        let mut all: Vec<_> = levels.values().flatten().cloned().collect();
        let n = all.len();
        all.sort();
        all.dedup();
        prop_assert_eq!(all.len(), n);
        prop_assert_eq!(n, 3usize.pow(ndim as u32) - 1);
    }
}
