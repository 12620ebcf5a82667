use serde::{Deserialize, Serialize};

use super::IndexBox;
use crate::halo_error::HaloError;

/// Tight global index box owned by one domain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalIndices {
    pub start: Vec<usize>,
    pub stop: Vec<usize>,
    pub shape: Vec<usize>,
}

impl LocalIndices {
    pub fn as_box(&self) -> IndexBox {
        IndexBox::new(self.start.clone(), self.stop.clone())
    }
}

/// Split every axis of `global_shape` into `num_partitions[axis]` contiguous
/// chunks and return the chunk at `coordinate`.
///
/// Chunks differ in size by at most one; the remainder goes to the first
/// chunks of the axis.
pub fn calc_local_indices(
    global_shape: &[usize],
    num_partitions: &[usize],
    coordinate: &[usize],
) -> Result<LocalIndices, HaloError> {
    let ndim = global_shape.len();
    for (context, len) in [
        ("num_partitions", num_partitions.len()),
        ("coordinate", coordinate.len()),
    ] {
        if len != ndim {
            return Err(HaloError::DimensionMismatch {
                context,
                expected: ndim,
                found: len,
            });
        }
    }

    let mut start = Vec::with_capacity(ndim);
    let mut stop = Vec::with_capacity(ndim);
    let mut shape = Vec::with_capacity(ndim);
    for axis in 0..ndim {
        let (extent, parts, c) = (global_shape[axis], num_partitions[axis], coordinate[axis]);
        if parts == 0 {
            return Err(HaloError::InvalidPartitionCount {
                axis,
                extent,
                partitions: parts,
            });
        }
        if c >= parts {
            return Err(HaloError::CoordinateOutOfRange {
                axis,
                coordinate: c,
                partitions: parts,
            });
        }
        let (chunk, rem) = (extent / parts, extent % parts);
        let s = c * chunk + c.min(rem);
        let n = chunk + usize::from(c < rem);
        start.push(s);
        stop.push(s + n);
        shape.push(n);
    }
    Ok(LocalIndices { start, stop, shape })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remainder_goes_to_leading_chunks() {
        let sizes: Vec<usize> = (0..3)
            .map(|c| calc_local_indices(&[10], &[3], &[c]).unwrap().shape[0])
            .collect();
        assert_eq!(sizes, vec![4, 3, 3]);
        let last = calc_local_indices(&[10], &[3], &[2]).unwrap();
        assert_eq!((last.start[0], last.stop[0]), (7, 10));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            calc_local_indices(&[8, 8], &[2], &[0, 0]),
            Err(HaloError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            calc_local_indices(&[8], &[2], &[2]),
            Err(HaloError::CoordinateOutOfRange { axis: 0, .. })
        ));
        assert!(matches!(
            calc_local_indices(&[8], &[0], &[0]),
            Err(HaloError::InvalidPartitionCount { .. })
        ));
    }
}
