//! Which neighbors a domain reads halo data from, and where that data lands.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::DomainKey;
use crate::halo_error::HaloError;
use crate::mesh::GridMesh;

/// Halo widths per axis: `low[a]` nodes below the interior, `high[a]` above.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Halos {
    pub low: Vec<usize>,
    pub high: Vec<usize>,
}

impl Halos {
    pub fn new(low: Vec<usize>, high: Vec<usize>) -> Self {
        Self { low, high }
    }

    /// The same width in both directions on every axis.
    pub fn uniform(ndim: usize, width: usize) -> Self {
        Self {
            low: vec![width; ndim],
            high: vec![width; ndim],
        }
    }

    pub fn zeros(ndim: usize) -> Self {
        Self::uniform(ndim, 0)
    }

    pub fn ndim(&self) -> usize {
        self.low.len()
    }
}

/// Trim a requested `stencil` to the halos that can actually be filled at
/// `coordinate`: no low halo on the first chunk of an axis, no high halo on
/// the last one.
pub fn calculate_adjacency(
    partitions: &[usize],
    coordinate: &[usize],
    stencil: &Halos,
) -> Result<Halos, HaloError> {
    let ndim = partitions.len();
    for (context, len) in [
        ("coordinate", coordinate.len()),
        ("stencil low", stencil.low.len()),
        ("stencil high", stencil.high.len()),
    ] {
        if len != ndim {
            return Err(HaloError::DimensionMismatch {
                context,
                expected: ndim,
                found: len,
            });
        }
    }

    let mut halos = stencil.clone();
    for axis in 0..ndim {
        if coordinate[axis] >= partitions[axis] {
            return Err(HaloError::CoordinateOutOfRange {
                axis,
                coordinate: coordinate[axis],
                partitions: partitions[axis],
            });
        }
        if coordinate[axis] == 0 {
            halos.low[axis] = 0;
        }
        if coordinate[axis] == partitions[axis] - 1 {
            halos.high[axis] = 0;
        }
    }
    Ok(halos)
}

fn steps(idx: &DomainKey, halos: &Halos, axis: usize) -> impl Iterator<Item = DomainKey> {
    let down = (halos.low[axis] > 0).then(|| idx.offset(axis, -1)).flatten();
    let up = (halos.high[axis] > 0).then(|| idx.offset(axis, 1)).flatten();
    down.into_iter().chain(up)
}

/// Every neighbor whose interior overlaps a halo of `idx`, grouped by level.
///
/// A neighbor differs from `idx` by ±1 on a non-empty set of axes; it is
/// filed under the lowest of those axes. Face neighbors of axis `a` and all
/// edge/corner neighbors whose first offset axis is `a` therefore share
/// level `a`, and every neighbor appears exactly once.
pub fn compute_sender(idx: &DomainKey, halos: &Halos) -> BTreeMap<usize, Vec<DomainKey>> {
    let ndim = idx.len().min(halos.low.len()).min(halos.high.len());
    let mut levels: BTreeMap<usize, Vec<DomainKey>> = BTreeMap::new();

    // (level, last offset axis, neighbor): chains only extend to higher axes
    let mut stack: Vec<(usize, usize, DomainKey)> = Vec::with_capacity(2 * ndim);
    for axis in 0..ndim {
        stack.extend(steps(idx, halos, axis).map(|k| (axis, axis, k)));
    }
    while let Some((level, last, key)) = stack.pop() {
        for axis in last + 1..ndim {
            stack.extend(steps(&key, halos, axis).map(|k| (level, axis, k)));
        }
        levels.entry(level).or_default().push(key);
    }

    for keys in levels.values_mut() {
        keys.sort_unstable();
        keys.dedup();
    }
    levels
}

/// Physical corners `(from, to)` (inclusive) of the halo of `idx` that is
/// filled from neighbor `sender`.
///
/// `mesh` is the receiving domain's local mesh, halo nodes included. Axes on
/// which the two keys agree span the interior nodes; on the others the window
/// is the halo strip facing the neighbor.
pub fn compute_receiver_halo_location<M: GridMesh>(
    mesh: &M,
    halos: &Halos,
    idx: &DomainKey,
    sender: &DomainKey,
) -> Result<(Vec<f64>, Vec<f64>), HaloError> {
    let ndim = mesh.dimension();
    let not_neighbor = || HaloError::NotANeighbor {
        receiver: idx.to_string(),
        sender: sender.to_string(),
    };
    if idx.len() != ndim || sender.len() != ndim || halos.ndim() != ndim || idx == sender {
        return Err(not_neighbor());
    }

    let mut from = Vec::with_capacity(ndim);
    let mut to = Vec::with_capacity(ndim);
    for (axis, nodes) in mesh.axes().iter().enumerate() {
        let n = nodes.len();
        let (low, high) = (halos.low[axis], halos.high[axis]);
        let (first, last) = match sender[axis] as isize - idx[axis] as isize {
            0 => (low, n.saturating_sub(high + 1)),
            1 if high > 0 => (n.saturating_sub(high), n - 1),
            -1 if low > 0 => (0, low - 1),
            1 | -1 => {
                return Err(HaloError::NoHaloTowardNeighbor {
                    receiver: idx.to_string(),
                    sender: sender.to_string(),
                    axis,
                });
            }
            _ => return Err(not_neighbor()),
        };
        match (nodes.get(first), nodes.get(last)) {
            (Some(&f), Some(&t)) if first <= last => {
                from.push(f);
                to.push(t);
            }
            _ => {
                return Err(HaloError::WindowOutOfRange {
                    window: format!("{first}..={last} on axis {axis}"),
                    shape: mesh.shape(),
                });
            }
        }
    }
    Ok((from, to))
}
