//! Local arrays, halo descriptors and the distributed field storage.

pub mod data_partition;
pub mod halo;
pub mod index_bounds;
pub mod ndarray;

pub use data_partition::{DataPartition, DataPartitionOptions, LocalDomain, PartitionState};
pub use halo::{HaloArena, HaloDescriptor, HaloId, Levels, ReceiveHalo, TransmitHalo};
pub use index_bounds::{AxisSelect, IndexBoundsHandler, LocalSlice};
pub use ndarray::{MutableNdArrayView, NdArray};
