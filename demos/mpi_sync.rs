// Run with e.g. `cargo mpirun -n 4 --example mpi_sync --features mpi-support`.
// Each rank owns part of a 32x32 grid split 4x2, syncs its halos and checks
// that every halo node holds the owner's value.
use std::sync::Arc;

use grid_halo::prelude::*;

fn main() -> Result<(), HaloError> {
    let comm = MpiComm::new()?;
    let size = comm.size();
    let rank = comm.rank();

    let mesh = RectilinearMesh::uniform(&[0.0, 0.0], &[0.1, 0.1], &[32, 32])?;
    let partition = Arc::new(Partition::new(mesh, vec![4, 2], Halos::uniform(2, 2), size)?);
    let mut data: DataPartition<f64, MpiComm> = DataPartition::new(partition, comm)?;
    data.map_interior(|idx, _| (idx[0] * 1000 + idx[1]) as f64);
    data.sync_all()?;

    let mut wrong = 0;
    for (_, halo) in data.receive_halos().iter() {
        let domain = &data.domains()[halo.domain];
        for local in halo.window.indices() {
            let g: Vec<usize> = local.iter().zip(&domain.origin).map(|(l, o)| l + o).collect();
            if domain.data.get(&local) != Some(&((g[0] * 1000 + g[1]) as f64)) {
                wrong += 1;
            }
        }
    }
    println!(
        "rank {rank}/{size}: {} domains, {} halos, {wrong} wrong nodes",
        data.domains().len(),
        data.receive_halos().len()
    );
    Ok(())
}
