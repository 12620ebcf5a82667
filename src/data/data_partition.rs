//! Distributed storage of one scalar field over a [`Partition`].
//!
//! A [`DataPartition`] owns the local arrays of every domain assigned to this
//! rank and keeps their halos in sync with the neighbors' interiors.
//!
//! Lifecycle:
//! - **Constructed**: arrays are allocated and receive halos derived from the
//!   shared partition. No messages have been exchanged.
//! - **DiscoveryDone**: the rendezvous has told this rank which neighbors
//!   read from it.
//! - **Ready**: transmit halos are set up; [`DataPartition::sync`] can run any
//!   number of times.
//!
//! The first two transitions are collective and run lazily on the first sync;
//! [`DataPartition::discover`] and [`DataPartition::prepare`] trigger them
//! early. Every rank of the communicator must make the same sequence of
//! collective calls. Each transition runs at most once: if it fails, the
//! partition is **Failed** and later calls return the same error without
//! communicating again.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use bytemuck::Pod;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::algs::communicator::Communicator;
use crate::algs::halo_exchange::exchange;
use crate::algs::rendezvous::{discover_incoming, exchange_transmit_requests};
use crate::algs::wire::{HaloEdge, TransmitRequest};
use crate::data::halo::{HaloArena, Levels, ReceiveHalo, TransmitHalo};
use crate::data::index_bounds::{AxisSelect, IndexBoundsHandler};
use crate::data::ndarray::{MutableNdArrayView, NdArray, row_major_strides};
use crate::debug_invariants::DebugInvariants;
use crate::geometry::{DomainKey, IndexBox, compute_receiver_halo_location, location_to_window};
use crate::halo_error::HaloError;
use crate::partitioning::Partition;

/// One domain owned by this rank.
#[derive(Clone, Debug)]
pub struct LocalDomain<A> {
    pub key: DomainKey,
    /// Owned nodes, as a global index box.
    pub interior: IndexBox,
    /// Global index of local element zero.
    pub origin: Vec<usize>,
    /// Local array, halos included.
    pub data: A,
}

impl<A> LocalDomain<A> {
    /// Owned nodes in local array coordinates.
    pub fn local_interior(&self) -> IndexBox {
        IndexBox::new(
            self.interior.start.iter().zip(&self.origin).map(|(s, o)| s - o).collect(),
            self.interior.stop.iter().zip(&self.origin).map(|(s, o)| s - o).collect(),
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartitionState {
    Constructed,
    DiscoveryDone,
    Ready,
    /// Discovery or transmit setup returned an error.
    Failed,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPartitionOptions {
    /// Rank that routes rendezvous edges.
    #[serde(default)]
    pub master_rank: usize,
}

pub struct DataPartition<T, C, A = NdArray<T>> {
    partition: Arc<Partition>,
    comm: C,
    options: DataPartitionOptions,
    rank: usize,
    domains: Vec<LocalDomain<A>>,
    slots: BTreeMap<DomainKey, usize>,
    index_bounds: IndexBoundsHandler,
    receive: HaloArena<ReceiveHalo>,
    incoming: OnceCell<Result<Vec<HaloEdge>, HaloError>>,
    transmit: OnceCell<Result<HaloArena<TransmitHalo>, HaloError>>,
    _marker: PhantomData<T>,
}

impl<T, C, A> DataPartition<T, C, A>
where
    T: Pod + Default,
    C: Communicator,
    A: MutableNdArrayView<T>,
{
    pub fn new(partition: Arc<Partition>, comm: C) -> Result<Self, HaloError> {
        Self::with_options(partition, comm, DataPartitionOptions::default())
    }

    /// Allocate the local arrays of this rank and derive its receive halos.
    /// Purely local.
    pub fn with_options(
        partition: Arc<Partition>,
        comm: C,
        options: DataPartitionOptions,
    ) -> Result<Self, HaloError> {
        let (rank, size) = (comm.rank(), comm.size());
        if partition.n_ranks() != size {
            return Err(HaloError::DimensionMismatch {
                context: "communicator size",
                expected: partition.n_ranks(),
                found: size,
            });
        }
        if options.master_rank >= size {
            return Err(HaloError::RankOutOfRange {
                rank: options.master_rank,
                size,
            });
        }

        let mut domains = Vec::new();
        let mut slots = BTreeMap::new();
        let mut index_bounds = IndexBoundsHandler::new(partition.shape());
        let mut receive = HaloArena::new();
        for (key, desc) in partition.domains_of(rank) {
            let mask = desc.mask();
            let origin = mask.start.clone();
            let slot = index_bounds.push_domain(desc.indices.clone(), origin.clone());
            for link in partition.halo_links(key) {
                let location =
                    compute_receiver_halo_location(&desc.mesh, &desc.halos, key, &link.neighbor)?;
                let window = location_to_window(partition.mesh(), &location, &origin)?;
                receive.push(ReceiveHalo {
                    domain: slot,
                    sender_rank: link.rank,
                    sender_key: link.neighbor,
                    level: link.level,
                    window,
                    location,
                });
            }
            slots.insert(key.clone(), slot);
            domains.push(LocalDomain {
                key: key.clone(),
                interior: desc.indices.clone(),
                origin,
                data: A::zeros(&mask.shape()),
            });
        }
        log::debug!(
            "rank {rank}: {} domains, {} receive halos",
            domains.len(),
            receive.len()
        );

        let this = Self {
            partition,
            comm,
            options,
            rank,
            domains,
            slots,
            index_bounds,
            receive,
            incoming: OnceCell::new(),
            transmit: OnceCell::new(),
            _marker: PhantomData,
        };
        this.debug_assert_invariants();
        Ok(this)
    }

    /// Run the rendezvous if it has not run yet and return the edges this
    /// rank serves. Collective.
    pub fn discover(&self) -> Result<&[HaloEdge], HaloError> {
        self.incoming
            .get_or_init(|| {
                let outgoing: Vec<HaloEdge> = self
                    .receive
                    .iter()
                    .map(|(id, h)| HaloEdge {
                        sender: h.sender_rank,
                        receiver: self.rank,
                        level: h.level,
                        receiver_halo: id,
                    })
                    .collect();
                let incoming = discover_incoming(&self.comm, self.options.master_rank, &outgoing)?;
                crate::debug_invariants!(check_discovery(&self.partition, self.rank, &incoming), "halo discovery");
                Ok(incoming)
            })
            .as_ref()
            .map(Vec::as_slice)
            .map_err(Clone::clone)
    }

    /// Compare the discovered edges with those derived from the partition.
    pub fn validate_discovery(&self) -> Result<(), HaloError> {
        check_discovery(&self.partition, self.rank, self.discover()?)
    }

    /// Discover and build the transmit halos if not done yet. Collective.
    pub fn prepare(&self) -> Result<&HaloArena<TransmitHalo>, HaloError> {
        let incoming = self.discover()?;
        self.transmit
            .get_or_init(|| {
                build_transmit(
                    &self.comm,
                    &self.partition,
                    &self.domains,
                    &self.slots,
                    &self.receive,
                    incoming,
                )
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Refresh the halos on `levels` from the neighbors' interiors.
    /// Collective: every rank must call it with the same levels.
    pub fn sync(&mut self, levels: impl Into<Levels>) -> Result<(), HaloError> {
        let levels = levels.into();
        self.prepare()?;
        let Some(Ok(transmit)) = self.transmit.get() else {
            return Ok(());
        };
        exchange(&self.comm, &mut self.domains, &self.receive, transmit, &levels)
    }

    pub fn sync_all(&mut self) -> Result<(), HaloError> {
        self.sync(Levels::All)
    }

    /// Copy out the owned part of a global selection, per domain. `None` if
    /// the selection is invalid or this rank owns none of it.
    pub fn get(&self, request: &[AxisSelect]) -> Option<BTreeMap<DomainKey, NdArray<T>>> {
        let global = self.index_bounds.resolve(request)?;
        let mut out = BTreeMap::new();
        for (slot, domain) in self.domains.iter().enumerate() {
            let Some(part) = self.index_bounds.localize(slot, &global) else {
                continue;
            };
            let values = domain.data.read_window(&part.local).ok()?;
            out.insert(domain.key.clone(), NdArray::from_vec(&part.local.shape(), values).ok()?);
        }
        (!out.is_empty()).then_some(out)
    }

    /// Write `values` (shaped like the whole selection) into the owned part
    /// of a global selection. Halos are not touched.
    pub fn set(&mut self, request: &[AxisSelect], values: &NdArray<T>) -> Result<(), HaloError>
    where
        NdArray<T>: MutableNdArrayView<T>,
    {
        let global = self.resolve(request)?;
        if values.shape() != global.shape().as_slice() {
            return Err(HaloError::ShapeMismatch {
                expected: global.shape(),
                found: values.shape().to_vec(),
            });
        }
        for (slot, domain) in self.domains.iter_mut().enumerate() {
            if let Some(part) = self.index_bounds.localize(slot, &global) {
                let chunk = values.read_window(&part.within)?;
                domain.data.write_window(&part.local, &chunk)?;
            }
        }
        Ok(())
    }

    /// Set every owned element of a global selection to `value`.
    pub fn fill(&mut self, request: &[AxisSelect], value: T) -> Result<(), HaloError> {
        let global = self.resolve(request)?;
        for (slot, domain) in self.domains.iter_mut().enumerate() {
            if let Some(part) = self.index_bounds.localize(slot, &global) {
                domain.data.fill_window(&part.local, value)?;
            }
        }
        Ok(())
    }

    /// Replace every interior element with `f(global_index, old_value)`.
    pub fn map_interior(&mut self, mut f: impl FnMut(&[usize], T) -> T) {
        for domain in &mut self.domains {
            let strides = row_major_strides(domain.data.shape());
            let data = domain.data.as_mut_slice();
            for index in domain.interior.indices() {
                let offset = local_offset(&index, &domain.origin, &strides);
                data[offset] = f(&index, data[offset]);
            }
        }
    }

    /// Value of the node at global `index`, if one of this rank's domains
    /// owns it.
    pub fn value(&self, index: &[usize]) -> Option<T> {
        let domain = self.domains.iter().find(|d| d.interior.contains(index))?;
        let strides = row_major_strides(domain.data.shape());
        domain
            .data
            .as_slice()
            .get(local_offset(index, &domain.origin, &strides))
            .copied()
    }

    fn resolve(&self, request: &[AxisSelect]) -> Result<IndexBox, HaloError> {
        self.index_bounds
            .resolve(request)
            .ok_or_else(|| HaloError::WindowOutOfRange {
                window: format!("{request:?}"),
                shape: self.index_bounds.shape().to_vec(),
            })
    }

    /// Local arrays of the owned domains, in key order.
    pub fn buffers(&self) -> impl Iterator<Item = (&DomainKey, &A)> + '_ {
        self.domains.iter().map(|d| (&d.key, &d.data))
    }

    pub fn buffer(&self, key: &DomainKey) -> Option<&A> {
        self.slots.get(key).map(|&s| &self.domains[s].data)
    }

    pub fn buffer_mut(&mut self, key: &DomainKey) -> Option<&mut A> {
        let slot = *self.slots.get(key)?;
        self.domains.get_mut(slot).map(|d| &mut d.data)
    }

    pub fn domains(&self) -> &[LocalDomain<A>] {
        &self.domains
    }

    /// Owned domains, mutable. Halo contents written here are overwritten
    /// by the next sync.
    pub fn domains_mut(&mut self) -> &mut [LocalDomain<A>] {
        &mut self.domains
    }

    pub fn partition(&self) -> &Arc<Partition> {
        &self.partition
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn options(&self) -> &DataPartitionOptions {
        &self.options
    }

    pub fn state(&self) -> PartitionState {
        match (self.incoming.get(), self.transmit.get()) {
            (Some(Err(_)), _) | (_, Some(Err(_))) => PartitionState::Failed,
            (_, Some(Ok(_))) => PartitionState::Ready,
            (Some(Ok(_)), None) => PartitionState::DiscoveryDone,
            (None, None) => PartitionState::Constructed,
        }
    }

    pub fn receive_halos(&self) -> &HaloArena<ReceiveHalo> {
        &self.receive
    }

    /// Transmit halos, once [`DataPartition::prepare`] (or a sync) has run.
    pub fn transmit_halos(&self) -> Option<&HaloArena<TransmitHalo>> {
        self.transmit.get().and_then(|r| r.as_ref().ok())
    }
}

fn local_offset(index: &[usize], origin: &[usize], strides: &[usize]) -> usize {
    index
        .iter()
        .zip(origin)
        .zip(strides)
        .map(|((i, o), s)| (i - o) * s)
        .sum()
}

/// The `(sender, receiver, level)` edges this rank serves must be exactly
/// those the partition implies.
fn check_discovery(partition: &Partition, rank: usize, incoming: &[HaloEdge]) -> Result<(), HaloError> {
    let expected: Vec<_> = partition
        .halo_edges()
        .into_iter()
        .filter(|e| e.0 == rank)
        .collect();
    let mut found: Vec<_> = incoming.iter().map(HaloEdge::triple).collect();
    found.sort_unstable();
    if expected == found {
        Ok(())
    } else {
        Err(HaloError::DiscoveryMismatch {
            rank,
            detail: format!("expected {expected:?}, discovered {found:?}"),
        })
    }
}

fn build_transmit<C: Communicator, A>(
    comm: &C,
    partition: &Partition,
    domains: &[LocalDomain<A>],
    slots: &BTreeMap<DomainKey, usize>,
    receive: &HaloArena<ReceiveHalo>,
    incoming: &[HaloEdge],
) -> Result<HaloArena<TransmitHalo>, HaloError> {
    let rank = comm.rank();
    let outgoing: Vec<(usize, TransmitRequest)> = receive
        .iter()
        .map(|(id, h)| {
            (
                h.sender_rank,
                TransmitRequest {
                    sender_key: h.sender_key.clone(),
                    level: h.level,
                    receiver_rank: rank,
                    receiver_halo: id,
                    from: h.location.0.clone(),
                    to: h.location.1.clone(),
                },
            )
        })
        .collect();
    let requests = exchange_transmit_requests(comm, &outgoing, incoming)?;

    let zero = vec![0; partition.dimension()];
    let mut halos = Vec::with_capacity(requests.len());
    for req in requests {
        let slot = *slots
            .get(&req.sender_key)
            .ok_or_else(|| HaloError::UnknownDomain {
                rank,
                domain: req.sender_key.to_string(),
            })?;
        let domain = &domains[slot];
        let global = location_to_window(partition.mesh(), &(req.from, req.to), &zero)?;
        let exceeds = || HaloError::HaloExceedsNeighbor {
            domain: req.sender_key.to_string(),
            receiver: req.receiver_rank,
        };
        if !domain.interior.contains_box(&global) {
            return Err(exceeds());
        }
        let window = global.relative_to(&domain.origin).ok_or_else(exceeds)?;
        halos.push(TransmitHalo {
            domain: slot,
            receiver_rank: req.receiver_rank,
            receiver_halo: req.receiver_halo,
            level: req.level,
            window,
        });
    }
    halos.sort_by_key(|h| (h.level, h.receiver_rank, h.receiver_halo));

    let mut arena = HaloArena::with_capacity(halos.len());
    for h in halos {
        arena.push(h);
    }
    arena.debug_assert_invariants();
    log::debug!("rank {rank}: {} transmit halos ready", arena.len());
    Ok(arena)
}

impl<T, C, A> DebugInvariants for DataPartition<T, C, A>
where
    T: Pod + Default,
    C: Communicator,
    A: MutableNdArrayView<T>,
{
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "data partition");
    }

    /// Receive windows fit their arrays and never overlap owned nodes.
    fn validate_invariants(&self) -> Result<(), HaloError> {
        self.receive.validate_invariants()?;
        for (id, halo) in self.receive.iter() {
            let domain = self.domains.get(halo.domain).ok_or_else(|| HaloError::UnknownDomain {
                rank: self.rank,
                domain: format!("local slot {}", halo.domain),
            })?;
            let array = IndexBox::from_shape(domain.data.shape());
            if !array.contains_box(&halo.window) || domain.local_interior().intersect(&halo.window).is_some() {
                return Err(HaloError::WindowOutOfRange {
                    window: format!("halo {} {}", id.0, halo.window),
                    shape: domain.data.shape().to_vec(),
                });
            }
        }
        Ok(())
    }
}
