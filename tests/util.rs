#![allow(dead_code)]
use std::sync::Arc;

use grid_halo::algs::communicator::{Communicator, ThreadComm};
use grid_halo::data::{DataPartition, MutableNdArrayView};
use grid_halo::geometry::{Halos, IndexBox};
use grid_halo::mesh::RectilinearMesh;
use grid_halo::partitioning::Partition;

/// Unit-spaced mesh of `shape` nodes starting at the origin, partitioned.
pub fn grid(shape: &[usize], parts: &[usize], stencil: Halos, n_ranks: usize) -> Arc<Partition> {
    let origin = vec![0.0; shape.len()];
    let spacing = vec![1.0; shape.len()];
    let mesh = RectilinearMesh::uniform(&origin, &spacing, shape).unwrap();
    Arc::new(Partition::new(mesh, parts.to_vec(), stencil, n_ranks).unwrap())
}

/// Run `f` once per rank of a fresh `ThreadComm` world, each on its own
/// thread, and return the results in rank order.
pub fn run_ranks<R: Send>(n: usize, f: impl Fn(ThreadComm) -> R + Sync) -> Vec<R> {
    let f = &f;
    std::thread::scope(|s| {
        let handles: Vec<_> = ThreadComm::world(n)
            .into_iter()
            .map(|comm| s.spawn(move || f(comm)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

/// Distinct value per global node: digits of the index in base 100.
pub fn value(idx: &[usize]) -> f64 {
    idx.iter().fold(0.0, |acc, &i| acc * 100.0 + i as f64)
}

fn global(local: &[usize], origin: &[usize]) -> Vec<usize> {
    local.iter().zip(origin).map(|(l, o)| l + o).collect()
}

/// Every node of every local array (halos included) holds `value` of its
/// global index.
pub fn assert_synced<C: Communicator>(dp: &DataPartition<f64, C>) {
    for d in dp.domains() {
        let shape = d.data.shape().to_vec();
        for local in IndexBox::from_shape(&shape).indices() {
            let g = global(&local, &d.origin);
            assert_eq!(
                d.data.get(&local),
                Some(&value(&g)),
                "domain {} local {:?} (global {:?})",
                d.key,
                local,
                g
            );
        }
    }
}

/// Every receive-halo window holds `value` of its global indices.
pub fn assert_halos_match<C: Communicator>(dp: &DataPartition<f64, C>) {
    for (id, h) in dp.receive_halos().iter() {
        let d = &dp.domains()[h.domain];
        for local in h.window.indices() {
            let g = global(&local, &d.origin);
            assert_eq!(d.data.get(&local), Some(&value(&g)), "halo {:?} at {:?}", id, g);
        }
    }
}

/// Build, fill with `value` and fully sync one rank's storage.
pub fn synced(partition: &Arc<Partition>, comm: ThreadComm) -> DataPartition<f64, ThreadComm> {
    let mut dp: DataPartition<f64, ThreadComm> = DataPartition::new(Arc::clone(partition), comm).unwrap();
    dp.map_interior(|idx, _| value(idx));
    dp.sync_all().unwrap();
    dp
}
