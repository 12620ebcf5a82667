//! The repeated halo synchronization.
//!
//! Every transmit halo on the selected levels is packed and sent without
//! blocking; then every receive halo is filled from a blocking receive, in
//! ascending [`HaloId`](crate::data::halo::HaloId) order. Senders order their
//! payloads per level by `(receiver_rank, receiver_halo)`, so per-link FIFO
//! delivery lines each payload up with the halo that expects it.

use bytemuck::Pod;

use crate::algs::communicator::{CommTag, Communicator, wait_all};
use crate::data::data_partition::LocalDomain;
use crate::data::halo::{HaloArena, Levels, ReceiveHalo, TransmitHalo};
use crate::data::ndarray::MutableNdArrayView;
use crate::halo_error::HaloError;

fn missing_slot(rank: usize, slot: usize) -> HaloError {
    HaloError::UnknownDomain {
        rank,
        domain: format!("local slot {slot}"),
    }
}

/// Refresh every receive halo on `levels`.
///
/// All pending sends are waited on before returning, also when a receive
/// fails.
pub fn exchange<T, A, C>(
    comm: &C,
    domains: &mut [LocalDomain<A>],
    receive: &HaloArena<ReceiveHalo>,
    transmit: &HaloArena<TransmitHalo>,
    levels: &Levels,
) -> Result<(), HaloError>
where
    T: Pod,
    A: MutableNdArrayView<T>,
    C: Communicator,
{
    let mut sends = Vec::with_capacity(transmit.len());
    let mut packed = Ok(());
    for (_, halo) in transmit.on_levels(levels) {
        let values = match domains.get(halo.domain) {
            Some(d) => d.data.read_window(&halo.window),
            None => Err(missing_slot(comm.rank(), halo.domain)),
        };
        match values {
            Ok(values) => {
                log::trace!(
                    "rank {}: sending {} elements to rank {} halo {} (level {})",
                    comm.rank(),
                    values.len(),
                    halo.receiver_rank,
                    halo.receiver_halo.0,
                    halo.level
                );
                sends.push(comm.isend(
                    halo.receiver_rank,
                    CommTag::sync_level(halo.level),
                    bytemuck::cast_slice(&values),
                ));
            }
            Err(e) => {
                packed = Err(e);
                break;
            }
        }
    }

    let received = packed.and_then(|()| {
        for (id, halo) in receive.on_levels(levels) {
            let bytes = comm.recv(halo.sender_rank, CommTag::sync_level(halo.level))?;
            let n = halo.window.len();
            let expected = n * size_of::<T>();
            if bytes.len() != expected {
                return Err(HaloError::PayloadSize {
                    neighbor: halo.sender_rank,
                    expected,
                    found: bytes.len(),
                });
            }
            let mut values = vec![T::zeroed(); n];
            bytemuck::cast_slice_mut::<T, u8>(&mut values).copy_from_slice(&bytes);
            domains
                .get_mut(halo.domain)
                .ok_or_else(|| missing_slot(comm.rank(), halo.domain))?
                .data
                .write_window(&halo.window, &values)?;
            log::trace!(
                "rank {}: filled halo {} from rank {}",
                comm.rank(),
                id.0,
                halo.sender_rank
            );
        }
        Ok(())
    });

    wait_all(sends);
    received
}
