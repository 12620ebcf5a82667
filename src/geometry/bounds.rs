//! Storage masks and clamping of domains to physical sub-bounds.

use super::{Halos, IndexBox};
use crate::halo_error::HaloError;
use crate::mesh::GridMesh;

/// `(lowest corner, highest corner)` in physical coordinates.
pub type Bounds = (Vec<f64>, Vec<f64>);

/// Grow a tight index box by its halos: `[start - low, stop + high)` per axis.
///
/// The result sizes the local storage array and anchors its origin. A
/// degenerate axis (`start == stop`) still spans at least one node.
pub fn create_mask_from_indices(indices: &IndexBox, halos: Option<&Halos>) -> IndexBox {
    let ndim = indices.ndim();
    let mut start = Vec::with_capacity(ndim);
    let mut stop = Vec::with_capacity(ndim);
    for axis in 0..ndim {
        let (low, high) = halos
            .map(|h| (h.low[axis], h.high[axis]))
            .unwrap_or((0, 0));
        let s = indices.start[axis].saturating_sub(low);
        let e = (indices.stop[axis] + high).max(s + 1);
        start.push(s);
        stop.push(e);
    }
    IndexBox::new(start, stop)
}

fn check_dims<M: GridMesh>(mesh: &M, bounds: &Bounds) -> Result<(), HaloError> {
    let ndim = mesh.dimension();
    for len in [bounds.0.len(), bounds.1.len()] {
        if len != ndim {
            return Err(HaloError::DimensionMismatch {
                context: "bounds",
                expected: ndim,
                found: len,
            });
        }
    }
    Ok(())
}

/// Decide whether the domain with interior `mask` survives restriction to
/// `bounds`.
///
/// Bounds reaching outside the global mesh are a configuration error. A
/// domain whose nodes all fall outside the node range selected by `bounds`
/// yields `Ok(false)`: the caller drops it instead of failing.
pub fn do_create_domain<M: GridMesh>(
    mesh: &M,
    mask: &IndexBox,
    bounds: &Bounds,
) -> Result<bool, HaloError> {
    check_dims(mesh, bounds)?;
    let (mesh_lo, mesh_hi) = mesh.bounds();
    for axis in 0..mesh.dimension() {
        if bounds.0[axis] < mesh_lo[axis] || bounds.0[axis] > mesh_hi[axis] {
            return Err(HaloError::OutOfMeshBounds { side: "lower", axis });
        }
        if bounds.1[axis] > mesh_hi[axis] || bounds.1[axis] < bounds.0[axis] {
            return Err(HaloError::OutOfMeshBounds { side: "higher", axis });
        }
    }

    let lo = mesh.nearest_node(&bounds.0);
    let hi = mesh.nearest_node(&bounds.1);
    Ok((0..mesh.dimension()).all(|a| {
        let last = mask.stop[a].saturating_sub(1).max(mask.start[a]);
        mask.start[a] <= hi[a] && last >= lo[a]
    }))
}

/// Clamp a domain to `bounds`.
///
/// On each axis where the domain reaches the snapped lower bound, its start
/// moves onto that node and its low halo is dropped; likewise for the upper
/// bound and the high halo.
pub fn modify_halos_and_indices<M: GridMesh>(
    mesh: &M,
    indices: &IndexBox,
    halos: &Halos,
    bounds: &Bounds,
) -> (IndexBox, Halos) {
    let lo = mesh.nearest_node(&bounds.0);
    let hi: Vec<usize> = mesh.nearest_node(&bounds.1).iter().map(|i| i + 1).collect();
    let mut out_indices = indices.clone();
    let mut out_halos = halos.clone();
    for axis in 0..indices.ndim().min(lo.len()) {
        if out_indices.start[axis] <= lo[axis] {
            out_indices.start[axis] = lo[axis];
            out_halos.low[axis] = 0;
        }
        if out_indices.stop[axis] >= hi[axis] {
            out_indices.stop[axis] = hi[axis];
            out_halos.high[axis] = 0;
        }
    }
    (out_indices, out_halos)
}

/// Map a physical window `(from, to)` (inclusive corners) onto the index box
/// of a local array whose element zero sits at global node `origin`.
pub fn location_to_window<M: GridMesh>(
    mesh: &M,
    location: &Bounds,
    origin: &[usize],
) -> Result<IndexBox, HaloError> {
    let from = mesh.nearest_node(&location.0);
    let to: Vec<usize> = mesh.nearest_node(&location.1).iter().map(|i| i + 1).collect();
    let global = IndexBox::new(from, to);
    global
        .relative_to(origin)
        .ok_or_else(|| HaloError::WindowOutOfRange {
            window: global.to_string(),
            shape: mesh.shape(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::RectilinearMesh;

    fn mesh8() -> RectilinearMesh {
        RectilinearMesh::uniform(&[0.0, 0.0], &[1.0, 1.0], &[8, 8]).unwrap()
    }

    #[test]
    fn mask_grows_by_halos() {
        let tight = IndexBox::new(vec![4, 0], vec![8, 4]);
        let h = Halos::new(vec![1, 0], vec![0, 1]);
        assert_eq!(
            create_mask_from_indices(&tight, Some(&h)),
            IndexBox::new(vec![3, 0], vec![8, 5])
        );
        let point = IndexBox::new(vec![2, 3], vec![2, 3]);
        assert_eq!(
            create_mask_from_indices(&point, None),
            IndexBox::new(vec![2, 3], vec![3, 4])
        );
    }

    #[test]
    fn create_domain_checks_bounds() {
        let m = mesh8();
        let mask = IndexBox::new(vec![0, 0], vec![4, 4]);
        assert_eq!(
            do_create_domain(&m, &mask, &(vec![0.0, 0.0], vec![9.0, 7.0])),
            Err(HaloError::OutOfMeshBounds { side: "higher", axis: 0 })
        );
        assert_eq!(
            do_create_domain(&m, &mask, &(vec![0.0, -1.0], vec![7.0, 7.0])),
            Err(HaloError::OutOfMeshBounds { side: "lower", axis: 1 })
        );
        assert_eq!(do_create_domain(&m, &mask, &(vec![5.0, 0.0], vec![7.0, 7.0])), Ok(false));
        assert_eq!(do_create_domain(&m, &mask, &(vec![3.0, 0.0], vec![7.0, 7.0])), Ok(true));
    }

    #[test]
    fn clamp_drops_flush_halos() {
        let m = mesh8();
        let (idx, h) = modify_halos_and_indices(
            &m,
            &IndexBox::new(vec![4, 0], vec![8, 4]),
            &Halos::new(vec![1, 0], vec![0, 1]),
            &(vec![2.0, 1.0], vec![6.0, 7.0]),
        );
        assert_eq!(idx, IndexBox::new(vec![4, 1], vec![7, 4]));
        assert_eq!(h, Halos::new(vec![1, 0], vec![0, 1]));
    }

    #[test]
    fn window_is_relative_to_origin() {
        let m = mesh8();
        let w = location_to_window(&m, &(vec![3.0, 0.0], vec![3.0, 3.0]), &[3, 0]).unwrap();
        assert_eq!(w, IndexBox::new(vec![0, 0], vec![1, 4]));
        assert!(location_to_window(&m, &(vec![0.0, 0.0], vec![1.0, 1.0]), &[3, 0]).is_err());
    }
}
