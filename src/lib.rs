#![cfg_attr(docsrs, feature(doc_cfg))]
//! # grid-halo
//!
//! grid-halo keeps the ghost cells of a block-decomposed structured grid in
//! sync across SPMD ranks. A [`Partition`](partitioning::Partition) splits a
//! rectilinear mesh into domains and assigns them to ranks; a
//! [`DataPartition`](data::DataPartition) owns the local arrays of one rank
//! and refreshes their halos from the neighbors' interiors on every `sync`.
//!
//! ## Features
//! - Row-major block decomposition with per-axis, per-direction halo widths
//! - Restriction of a partition to a physical sub-region
//! - One-time rendezvous through a master rank: receivers know their senders
//!   statically, senders learn their receivers at runtime
//! - Per-axis-level synchronization, so the halos of one axis level can be
//!   refreshed on their own
//! - Pluggable communication backends: serial (`NoComm`), in-process threads
//!   (`ThreadComm`) and MPI (`MpiComm`, feature `mpi-support`)
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! grid-halo = "0.1"
//! # features = ["mpi-support"]
//! ```
//!
//! ```
//! use std::sync::Arc;
//! use grid_halo::prelude::*;
//!
//! let mesh = RectilinearMesh::uniform(&[0.0, 0.0], &[1.0, 1.0], &[8, 8]).unwrap();
//! let partition = Arc::new(Partition::new(mesh, vec![2, 2], Halos::uniform(2, 1), 1).unwrap());
//! let mut field: DataPartition<f64, NoComm> = DataPartition::new(partition, NoComm::new()).unwrap();
//! field.map_interior(|idx, _| idx[0] as f64);
//! field.sync_all().unwrap();
//! ```
//!
//! ## Invariant checks
//! Debug builds (or the `check-invariants` feature) validate halo bookkeeping
//! after construction and compare the rendezvous result with the edges
//! derived from the partition, panicking on mismatch.

pub mod algs;
pub mod data;
pub mod debug_invariants;
pub mod field;
pub mod geometry;
pub mod halo_error;
pub mod mesh;
pub mod partitioning;

pub use debug_invariants::DebugInvariants;
pub use halo_error::HaloError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{CommTag, Communicator, NoComm, ThreadComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::data::{
        AxisSelect, DataPartition, DataPartitionOptions, Levels, MutableNdArrayView, NdArray,
        PartitionState,
    };
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::field::Field;
    pub use crate::geometry::{Bounds, DomainKey, Halos, IndexBox};
    pub use crate::halo_error::HaloError;
    pub use crate::mesh::{GridMesh, RectilinearMesh};
    pub use crate::partitioning::{Partition, PartitionConfig};
}
