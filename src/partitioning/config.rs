//! Serializable description of a uniform-mesh partition.

use serde::{Deserialize, Serialize};

use super::Partition;
use crate::data::DataPartitionOptions;
use crate::geometry::{Bounds, Halos};
use crate::halo_error::HaloError;
use crate::mesh::RectilinearMesh;

/// Everything needed to rebuild the same [`Partition`] on every rank.
///
/// ```
/// use grid_halo::partitioning::PartitionConfig;
/// use grid_halo::geometry::Halos;
///
/// let cfg = PartitionConfig {
///     origin: vec![0.0, 0.0],
///     spacing: vec![1.0, 1.0],
///     shape: vec![8, 8],
///     num_partitions: vec![2, 2],
///     stencil: Halos::uniform(2, 1),
///     bounds: None,
///     master_rank: 0,
/// };
/// let partition = cfg.build(4).unwrap();
/// assert_eq!(partition.domains().len(), 4);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartitionConfig {
    pub origin: Vec<f64>,
    pub spacing: Vec<f64>,
    pub shape: Vec<usize>,
    pub num_partitions: Vec<usize>,
    pub stencil: Halos,
    /// Optional sub-region; the partition is restricted to it when present.
    #[serde(default)]
    pub bounds: Option<Bounds>,
    /// Rank that routes the rendezvous.
    #[serde(default)]
    pub master_rank: usize,
}

impl PartitionConfig {
    pub fn build(&self, n_ranks: usize) -> Result<Partition, HaloError> {
        let mesh = RectilinearMesh::uniform(&self.origin, &self.spacing, &self.shape)?;
        let partition = Partition::new(
            mesh,
            self.num_partitions.clone(),
            self.stencil.clone(),
            n_ranks,
        )?;
        match &self.bounds {
            Some(bounds) => partition.restrict(bounds),
            None => Ok(partition),
        }
    }

    pub fn options(&self) -> DataPartitionOptions {
        DataPartitionOptions {
            master_rank: self.master_rank,
        }
    }
}
