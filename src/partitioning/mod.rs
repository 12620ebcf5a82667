//! Static block decomposition of a structured mesh.
//!
//! A [`Partition`] assigns every [`DomainKey`] of a regular decomposition to a
//! rank and records, per key, the interior index box, the halo widths and the
//! local mesh (halo nodes included). It is built once at startup, shared
//! read-only (typically behind an `Arc`) and identical on every rank.

pub mod config;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::geometry::{
    Bounds, DomainKey, Halos, IndexBox, calc_local_indices, calculate_adjacency,
    compute_sender, create_mask_from_indices, do_create_domain, modify_halos_and_indices,
};
use crate::halo_error::HaloError;
use crate::mesh::{GridMesh, RectilinearMesh};

pub use config::PartitionConfig;

/// Geometry of one domain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainDescriptor {
    /// Local mesh, halo nodes included.
    pub mesh: RectilinearMesh,
    pub halos: Halos,
    /// Interior (owned) nodes as a global index box.
    pub indices: IndexBox,
}

impl DomainDescriptor {
    fn new(global: &RectilinearMesh, indices: IndexBox, halos: Halos) -> Self {
        let mask = create_mask_from_indices(&indices, Some(&halos));
        Self {
            mesh: global.slice(&mask),
            halos,
            indices,
        }
    }

    /// Global index box of the local storage (interior plus halos).
    pub fn mask(&self) -> IndexBox {
        create_mask_from_indices(&self.indices, Some(&self.halos))
    }
}

/// A neighbor a domain reads halo data from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HaloLink {
    pub level: usize,
    pub neighbor: DomainKey,
    pub rank: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    mesh: RectilinearMesh,
    num_partitions: Vec<usize>,
    stencil: Halos,
    n_ranks: usize,
    bounds: Bounds,
    domains: BTreeMap<DomainKey, DomainDescriptor>,
    rank_map: BTreeMap<DomainKey, usize>,
}

impl Partition {
    /// Decompose `mesh` into `num_partitions[a]` chunks per axis and spread
    /// the resulting domains over `n_ranks` ranks in contiguous row-major
    /// blocks.
    pub fn new(
        mesh: RectilinearMesh,
        num_partitions: Vec<usize>,
        stencil: Halos,
        n_ranks: usize,
    ) -> Result<Self, HaloError> {
        let shape = mesh.shape();
        let ndim = shape.len();
        if num_partitions.len() != ndim {
            return Err(HaloError::DimensionMismatch {
                context: "num_partitions",
                expected: ndim,
                found: num_partitions.len(),
            });
        }
        if stencil.low.len() != ndim || stencil.high.len() != ndim {
            return Err(HaloError::DimensionMismatch {
                context: "stencil",
                expected: ndim,
                found: stencil.low.len().min(stencil.high.len()),
            });
        }
        if n_ranks == 0 {
            return Err(HaloError::RankOutOfRange { rank: 0, size: 0 });
        }
        for axis in 0..ndim {
            let (extent, parts) = (shape[axis], num_partitions[axis]);
            if parts == 0 || parts > extent {
                return Err(HaloError::InvalidPartitionCount {
                    axis,
                    extent,
                    partitions: parts,
                });
            }
            let narrowest = extent / parts;
            let depth = stencil.low[axis].max(stencil.high[axis]);
            if parts > 1 && depth > narrowest {
                return Err(HaloError::StencilTooWide {
                    axis,
                    depth,
                    width: narrowest,
                });
            }
        }

        let n_domains: usize = num_partitions.iter().product();
        let mut domains = BTreeMap::new();
        let mut rank_map = BTreeMap::new();
        let keys = num_partitions
            .iter()
            .map(|&p| 0..p)
            .multi_cartesian_product();
        for (linear, coords) in keys.enumerate() {
            let local = calc_local_indices(&shape, &num_partitions, &coords)?;
            let halos = calculate_adjacency(&num_partitions, &coords, &stencil)?;
            let key = DomainKey::from(coords);
            domains.insert(key.clone(), DomainDescriptor::new(&mesh, local.as_box(), halos));
            rank_map.insert(key, linear * n_ranks / n_domains);
        }
        log::debug!(
            "partitioned mesh {:?} into {} domains over {} ranks",
            shape,
            n_domains,
            n_ranks
        );

        Ok(Self {
            bounds: mesh.bounds(),
            mesh,
            num_partitions,
            stencil,
            n_ranks,
            domains,
            rank_map,
        })
    }

    /// Copy of this partition covering only `bounds`.
    ///
    /// Domains outside the bounds are dropped; domains crossing them are
    /// clamped and lose the halos that would face outward. A halo never
    /// reaches past the clamped width of the chunk it faces. Rank ownership
    /// of the surviving domains is unchanged.
    pub fn restrict(&self, bounds: &Bounds) -> Result<Partition, HaloError> {
        let mut clamped = BTreeMap::new();
        let mut rank_map = BTreeMap::new();
        for (key, desc) in &self.domains {
            if !do_create_domain(&self.mesh, &desc.indices, bounds)? {
                log::trace!("domain {key} lies outside {bounds:?}, dropped");
                continue;
            }
            let (indices, halos) =
                modify_halos_and_indices(&self.mesh, &desc.indices, &desc.halos, bounds);
            clamped.insert(key.clone(), (indices, halos));
            rank_map.insert(key.clone(), self.rank_map[key]);
        }

        // chunk widths along each axis after clamping, keyed by (axis, coordinate)
        let mut widths = BTreeMap::new();
        for (key, (indices, _)) in &clamped {
            for (axis, &c) in key.as_slice().iter().enumerate() {
                widths.insert((axis, c), indices.stop[axis] - indices.start[axis]);
            }
        }
        let mut domains = BTreeMap::new();
        for (key, (indices, mut halos)) in clamped {
            for (axis, &c) in key.as_slice().iter().enumerate() {
                if let Some(&w) = c.checked_sub(1).and_then(|below| widths.get(&(axis, below))) {
                    halos.low[axis] = halos.low[axis].min(w);
                }
                if let Some(&w) = widths.get(&(axis, c + 1)) {
                    halos.high[axis] = halos.high[axis].min(w);
                }
            }
            domains.insert(key, DomainDescriptor::new(&self.mesh, indices, halos));
        }

        let lo = self.mesh.nearest_node(&bounds.0);
        let hi = self.mesh.nearest_node(&bounds.1);
        let snapped = (
            self.mesh.node(&lo).unwrap_or_else(|| bounds.0.clone()),
            self.mesh.node(&hi).unwrap_or_else(|| bounds.1.clone()),
        );
        log::debug!(
            "restricted partition to {:?}: {} of {} domains kept",
            snapped,
            domains.len(),
            self.domains.len()
        );
        Ok(Partition {
            mesh: self.mesh.clone(),
            num_partitions: self.num_partitions.clone(),
            stencil: self.stencil.clone(),
            n_ranks: self.n_ranks,
            bounds: snapped,
            domains,
            rank_map,
        })
    }

    /// The global mesh.
    pub fn mesh(&self) -> &RectilinearMesh {
        &self.mesh
    }

    /// Full logical shape (nodes per axis of the global mesh).
    pub fn shape(&self) -> Vec<usize> {
        self.mesh.shape()
    }

    pub fn dimension(&self) -> usize {
        self.mesh.dimension()
    }

    /// Physical region covered by the domains.
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn num_partitions(&self) -> &[usize] {
        &self.num_partitions
    }

    pub fn stencil(&self) -> &Halos {
        &self.stencil
    }

    /// Number of ranks the domains are spread over.
    pub fn n_ranks(&self) -> usize {
        self.n_ranks
    }

    pub fn domains(&self) -> &BTreeMap<DomainKey, DomainDescriptor> {
        &self.domains
    }

    pub fn domain(&self, key: &DomainKey) -> Option<&DomainDescriptor> {
        self.domains.get(key)
    }

    pub fn rank_map(&self) -> &BTreeMap<DomainKey, usize> {
        &self.rank_map
    }

    pub fn rank_of(&self, key: &DomainKey) -> Option<usize> {
        self.rank_map.get(key).copied()
    }

    /// Domains owned by `rank`, in key order.
    pub fn domains_of(
        &self,
        rank: usize,
    ) -> impl Iterator<Item = (&DomainKey, &DomainDescriptor)> + '_ {
        self.domains
            .iter()
            .filter(move |(key, _)| self.rank_map.get(*key) == Some(&rank))
    }

    /// Neighbors `key` reads halo data from. Neighbors missing from the
    /// partition (dropped by [`Partition::restrict`]) are skipped.
    pub fn halo_links(&self, key: &DomainKey) -> Vec<HaloLink> {
        let Some(desc) = self.domains.get(key) else {
            return Vec::new();
        };
        let mut links = Vec::new();
        for (level, neighbors) in compute_sender(key, &desc.halos) {
            for neighbor in neighbors {
                match self.rank_of(&neighbor) {
                    Some(rank) => links.push(HaloLink {
                        level,
                        neighbor,
                        rank,
                    }),
                    None => log::warn!(
                        "domain {key}: neighbor {neighbor} is not part of the partition, halo left unfilled"
                    ),
                }
            }
        }
        links
    }

    /// Every `(sender, receiver, level)` halo edge of the whole partition,
    /// sorted. All ranks compute the same list.
    pub fn halo_edges(&self) -> Vec<(usize, usize, usize)> {
        let mut edges: Vec<_> = self
            .rank_map
            .iter()
            .flat_map(|(key, &receiver)| {
                self.halo_links(key)
                    .into_iter()
                    .map(move |l| (l.rank, receiver, l.level))
            })
            .collect();
        edges.sort_unstable();
        edges
    }
}
