// Simulates four ranks on threads, each owning one domain of a 16x16 grid.
// Every rank fills its interior with the global row index, syncs, and prints
// the first column of its local array (halo rows included).
use std::sync::Arc;

use grid_halo::prelude::*;

fn main() -> Result<(), HaloError> {
    let cfg = PartitionConfig {
        origin: vec![0.0, 0.0],
        spacing: vec![1.0, 1.0],
        shape: vec![16, 16],
        num_partitions: vec![2, 2],
        stencil: Halos::uniform(2, 1),
        bounds: None,
        master_rank: 0,
    };
    let partition = Arc::new(cfg.build(4)?);
    let options = cfg.options();

    let reports = std::thread::scope(|s| {
        let handles: Vec<_> = ThreadComm::world(4)
            .into_iter()
            .map(|comm| {
                let partition = Arc::clone(&partition);
                let options = options.clone();
                s.spawn(move || -> Result<String, HaloError> {
                    let mut field: Field<f64, ThreadComm> =
                        Field::with_options(partition, "row", "1", comm, None, options)?;
                    field.map_interior(|idx, _| idx[0] as f64);
                    field.sync_all()?;
                    let rank = field.data().rank();
                    let mut lines = Vec::new();
                    for (key, array) in field.data().buffers() {
                        let col = array.read_window(&IndexBox::new(
                            vec![0, 0],
                            vec![array.shape()[0], 1],
                        ))?;
                        lines.push(format!("rank {rank} domain {key}: {col:?}"));
                    }
                    Ok(lines.join("\n"))
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|_| Err(HaloError::Comm {
                neighbor: 0,
                reason: "rank thread panicked".into(),
            })))
            .collect::<Result<Vec<_>, _>>()
    })?;

    for report in reports {
        println!("{report}");
    }
    Ok(())
}
