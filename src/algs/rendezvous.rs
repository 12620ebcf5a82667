//! One-time handshake through which every rank learns who will read from it.
//!
//! Receivers know statically which rank fills each of their halos, but
//! senders do not. The protocol routes that knowledge through a master rank:
//!
//! 1. every rank gathers `[rank, count]` on the master (tag [`CommTag::GATHER`]);
//! 2. every rank sends one [`HaloEdge`] per receive halo to the master
//!    ([`CommTag::DISCOVERY_EDGES`]);
//! 3. the master groups edges by sender and sends every rank its list, empty
//!    or not ([`CommTag::DISCOVERY_ROUTES`]);
//! 4. every rank waits on its sends and receives its list.
//!
//! The master's fan-out scales with the total number of edges; it is logged
//! at `debug` so large runs can spot it.
//!
//! [`exchange_transmit_requests`] runs afterwards and ships the physical
//! location of each receive halo to its sender.

use std::collections::BTreeMap;

use crate::algs::communicator::{CommTag, Communicator, wait_all};
use crate::algs::wire::{
    HaloEdge, TransmitRequest, decode_count, decode_edges, decode_request, encode_count,
    encode_edges, encode_request,
};
use crate::halo_error::HaloError;

/// Run the rendezvous and return the edges for which this rank is the sender.
///
/// `outgoing` holds one edge per receive halo of this rank (`receiver` is this
/// rank). Collective: every rank of `comm` must call it with the same
/// `master`.
pub fn discover_incoming<C: Communicator>(
    comm: &C,
    master: usize,
    outgoing: &[HaloEdge],
) -> Result<Vec<HaloEdge>, HaloError> {
    let (rank, size) = (comm.rank(), comm.size());
    if master >= size {
        return Err(HaloError::RankOutOfRange { rank: master, size });
    }
    if let Some(bad) = outgoing.iter().find(|e| e.receiver != rank) {
        return Err(HaloError::Wire {
            neighbor: bad.sender,
            reason: format!("rank {rank} announcing an edge for receiver {}", bad.receiver),
        });
    }

    let counts = comm.gather(master, CommTag::GATHER, &encode_count(rank, outgoing.len()))?;

    let edge_sends: Vec<_> = outgoing
        .iter()
        .map(|e| comm.isend(master, CommTag::DISCOVERY_EDGES, &encode_edges(std::slice::from_ref(e))))
        .collect();
    log::trace!("rank {rank}: {} edges sent to master {master}", outgoing.len());

    let routed = match counts {
        Some(counts) => route_edges(comm, &counts),
        None => Ok(Vec::new()),
    };
    wait_all(edge_sends);
    let route_sends = routed?;

    let incoming = comm
        .recv(master, CommTag::DISCOVERY_ROUTES)
        .and_then(|bytes| decode_edges(&bytes, master));
    wait_all(route_sends);
    let incoming = incoming?;

    if let Some(bad) = incoming.iter().find(|e| e.sender != rank) {
        return Err(HaloError::Wire {
            neighbor: master,
            reason: format!("rank {rank} routed an edge of sender {}", bad.sender),
        });
    }
    log::debug!("rank {rank}: discovery found {} incoming edges", incoming.len());
    Ok(incoming)
}

/// Master side: collect every rank's edges and fan them out by sender.
fn route_edges<C: Communicator>(
    comm: &C,
    counts: &[Vec<u8>],
) -> Result<Vec<C::SendHandle>, HaloError> {
    let size = comm.size();
    let mut by_sender: BTreeMap<usize, Vec<HaloEdge>> = BTreeMap::new();
    let mut total = 0;
    for (peer, bytes) in counts.iter().enumerate() {
        let (from, n) = decode_count(bytes, peer)?;
        if from != peer {
            return Err(HaloError::Wire {
                neighbor: peer,
                reason: format!("count record claims rank {from}"),
            });
        }
        for _ in 0..n {
            let bytes = comm.recv(peer, CommTag::DISCOVERY_EDGES)?;
            for edge in decode_edges(&bytes, peer)? {
                if edge.sender >= size {
                    return Err(HaloError::RankOutOfRange {
                        rank: edge.sender,
                        size,
                    });
                }
                by_sender.entry(edge.sender).or_default().push(edge);
            }
        }
        total += n;
    }
    log::debug!(
        "master {}: routing {total} halo edges to {size} ranks",
        comm.rank()
    );

    Ok((0..size)
        .map(|r| {
            let edges = by_sender.get(&r).map(Vec::as_slice).unwrap_or_default();
            comm.isend(r, CommTag::DISCOVERY_ROUTES, &encode_edges(edges))
        })
        .collect())
}

/// Send every `(sender_rank, request)` and receive one request per incoming
/// edge, in the order of `incoming`.
///
/// Requests from one receiver arrive in the order it sent them, which is the
/// order the master routed its edges in.
pub fn exchange_transmit_requests<C: Communicator>(
    comm: &C,
    outgoing: &[(usize, TransmitRequest)],
    incoming: &[HaloEdge],
) -> Result<Vec<TransmitRequest>, HaloError> {
    let sends: Vec<_> = outgoing
        .iter()
        .map(|(sender, req)| comm.isend(*sender, CommTag::TRANSMIT_SETUP, &encode_request(req)))
        .collect();

    let received = incoming
        .iter()
        .map(|edge| {
            let req = decode_request(&comm.recv(edge.receiver, CommTag::TRANSMIT_SETUP)?, edge.receiver)?;
            if req.receiver_rank != edge.receiver
                || req.receiver_halo != edge.receiver_halo
                || req.level != edge.level
            {
                return Err(HaloError::Wire {
                    neighbor: edge.receiver,
                    reason: format!(
                        "request for halo {} (level {}) does not match routed halo {} (level {})",
                        req.receiver_halo.0, req.level, edge.receiver_halo.0, edge.level
                    ),
                });
            }
            log::trace!(
                "rank {}: serving halo {} of rank {} from domain {}",
                comm.rank(),
                req.receiver_halo.0,
                req.receiver_rank,
                req.sender_key
            );
            Ok(req)
        })
        .collect::<Result<Vec<_>, _>>();
    wait_all(sends);
    received
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{NoComm, ThreadComm};
    use crate::data::halo::HaloId;
    use crate::geometry::DomainKey;

    fn edge(sender: usize, receiver: usize, halo: u32) -> HaloEdge {
        HaloEdge {
            sender,
            receiver,
            level: 0,
            receiver_halo: HaloId(halo),
        }
    }

    #[test]
    fn single_rank_routes_to_itself() {
        let comm = NoComm::new();
        let mine = [edge(0, 0, 0), edge(0, 0, 1)];
        let incoming = discover_incoming(&comm, 0, &mine).unwrap();
        assert_eq!(incoming, mine.to_vec());
    }

    #[test]
    fn master_out_of_range() {
        assert!(matches!(
            discover_incoming(&NoComm::new(), 1, &[]),
            Err(HaloError::RankOutOfRange { rank: 1, size: 1 })
        ));
    }

    #[test]
    fn three_ranks_ring() {
        // rank r reads one halo from (r + 1) % 3
        let world = ThreadComm::world(3);
        let got: Vec<Vec<HaloEdge>> = std::thread::scope(|s| {
            let handles: Vec<_> = world
                .iter()
                .map(|comm| {
                    s.spawn(move || {
                        let r = comm.rank();
                        discover_incoming(comm, 1, &[edge((r + 1) % 3, r, 0)]).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for (r, incoming) in got.iter().enumerate() {
            assert_eq!(incoming, &vec![edge(r, (r + 2) % 3, 0)]);
        }
    }

    #[test]
    fn transmit_request_must_match_edge() {
        let comm = NoComm::new();
        let req = TransmitRequest {
            sender_key: DomainKey::from([0]),
            level: 0,
            receiver_rank: 0,
            receiver_halo: HaloId(4),
            from: vec![1.0],
            to: vec![2.0],
        };
        let got = exchange_transmit_requests(&comm, &[(0, req.clone())], &[edge(0, 0, 4)]).unwrap();
        assert_eq!(got, vec![req.clone()]);
        let err = exchange_transmit_requests(&comm, &[(0, req)], &[edge(0, 0, 5)]).unwrap_err();
        assert!(matches!(err, HaloError::Wire { .. }));
    }
}
