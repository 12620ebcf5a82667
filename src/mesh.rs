//! Structured (rectilinear) meshes.
//!
//! The halo engine only needs three things from a mesh: per-axis node
//! coordinates, the nearest node to a physical point, and the bounding box.
//! [`GridMesh`] captures exactly that; [`RectilinearMesh`] is the concrete
//! tensor-product mesh used by [`Partition`](crate::partitioning::Partition).

use serde::{Deserialize, Serialize};

use crate::geometry::IndexBox;
use crate::halo_error::HaloError;

/// Read-only view of a tensor-product mesh.
pub trait GridMesh {
    /// Node coordinates, one strictly increasing sequence per axis.
    fn axes(&self) -> &[Vec<f64>];

    fn dimension(&self) -> usize {
        self.axes().len()
    }

    /// Number of nodes per axis.
    fn shape(&self) -> Vec<usize> {
        self.axes().iter().map(Vec::len).collect()
    }

    /// `(lowest corner, highest corner)` in physical coordinates.
    fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        let lo = self
            .axes()
            .iter()
            .map(|a| a.first().copied().unwrap_or_default())
            .collect();
        let hi = self
            .axes()
            .iter()
            .map(|a| a.last().copied().unwrap_or_default())
            .collect();
        (lo, hi)
    }

    /// Index of the node closest to `point` on every axis. Points outside the
    /// mesh snap to the boundary node; ties resolve to the lower node.
    fn nearest_node(&self, point: &[f64]) -> Vec<usize> {
        self.axes()
            .iter()
            .zip(point)
            .map(|(axis, &p)| nearest_on_axis(axis, p))
            .collect()
    }
}

fn nearest_on_axis(axis: &[f64], p: f64) -> usize {
    let upper = axis.partition_point(|&x| x < p);
    if upper == 0 {
        return 0;
    }
    if upper == axis.len() {
        return axis.len() - 1;
    }
    if p - axis[upper - 1] <= axis[upper] - p {
        upper - 1
    } else {
        upper
    }
}

/// Tensor-product mesh with arbitrary (strictly increasing) node spacing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RectilinearMesh {
    axes: Vec<Vec<f64>>,
}

impl RectilinearMesh {
    pub fn new(axes: Vec<Vec<f64>>) -> Result<Self, HaloError> {
        if axes.is_empty() {
            return Err(HaloError::DimensionMismatch {
                context: "mesh axes",
                expected: 1,
                found: 0,
            });
        }
        for (i, axis) in axes.iter().enumerate() {
            if axis.is_empty() {
                return Err(HaloError::EmptyAxis(i));
            }
            if axis.windows(2).any(|w| !(w[0] < w[1])) {
                return Err(HaloError::UnsortedAxis(i));
            }
        }
        Ok(Self { axes })
    }

    /// Evenly spaced mesh with `shape[a]` nodes starting at `origin[a]`.
    pub fn uniform(origin: &[f64], spacing: &[f64], shape: &[usize]) -> Result<Self, HaloError> {
        let ndim = shape.len();
        for (context, len) in [("mesh origin", origin.len()), ("mesh spacing", spacing.len())] {
            if len != ndim {
                return Err(HaloError::DimensionMismatch {
                    context,
                    expected: ndim,
                    found: len,
                });
            }
        }
        let axes = (0..ndim)
            .map(|a| {
                (0..shape[a])
                    .map(|i| origin[a] + spacing[a] * i as f64)
                    .collect()
            })
            .collect();
        Self::new(axes)
    }

    /// Sub-mesh holding the nodes inside `window` (clamped to the mesh).
    pub fn slice(&self, window: &IndexBox) -> RectilinearMesh {
        let axes = self
            .axes
            .iter()
            .enumerate()
            .map(|(a, axis)| {
                let hi = window.stop.get(a).copied().unwrap_or(axis.len()).min(axis.len());
                let lo = window.start.get(a).copied().unwrap_or(0).min(hi);
                axis[lo..hi].to_vec()
            })
            .collect();
        RectilinearMesh { axes }
    }

    /// Physical coordinates of the node at `index`.
    pub fn node(&self, index: &[usize]) -> Option<Vec<f64>> {
        self.axes
            .iter()
            .zip(index)
            .map(|(axis, &i)| axis.get(i).copied())
            .collect()
    }
}

impl GridMesh for RectilinearMesh {
    fn axes(&self) -> &[Vec<f64>] {
        &self.axes
    }
}
