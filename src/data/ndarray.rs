//! Local dense storage for one domain.
//!
//! [`MutableNdArrayView`] is the only interface the halo engine uses to touch
//! local data: allocation, whole-buffer access, and copying rectangular
//! windows out of or (in place) into the array. [`NdArray`] is the default
//! row-major, `Vec`-backed implementation.

use core::fmt::{self, Debug};

use crate::geometry::IndexBox;
use crate::halo_error::HaloError;

/// Row-major strides of `shape`.
pub fn row_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for a in (0..shape.len().saturating_sub(1)).rev() {
        strides[a] = strides[a + 1] * shape[a + 1];
    }
    strides
}

fn check_window(shape: &[usize], window: &IndexBox) -> Result<(), HaloError> {
    let fits = window.ndim() == shape.len()
        && (0..shape.len()).all(|a| window.start[a] <= window.stop[a] && window.stop[a] <= shape[a]);
    if fits {
        Ok(())
    } else {
        Err(HaloError::WindowOutOfRange {
            window: window.to_string(),
            shape: shape.to_vec(),
        })
    }
}

/// Call `f(array_offset, run_len)` for every contiguous run of `window` along
/// the last axis, in row-major order.
fn for_each_run(shape: &[usize], window: &IndexBox, mut f: impl FnMut(usize, usize)) {
    if window.is_empty() {
        return;
    }
    let strides = row_major_strides(shape);
    let Some(last) = shape.len().checked_sub(1) else {
        f(0, 1);
        return;
    };
    let run = window.stop[last] - window.start[last];
    let mut idx = window.start.clone();
    loop {
        let offset: usize = idx.iter().zip(&strides).map(|(i, s)| i * s).sum();
        f(offset, run);
        let mut axis = last;
        loop {
            if axis == 0 {
                return;
            }
            axis -= 1;
            idx[axis] += 1;
            if idx[axis] < window.stop[axis] {
                break;
            }
            idx[axis] = window.start[axis];
        }
    }
}

/// Mutable n-dimensional array with in-place window writes.
pub trait MutableNdArrayView<T: Copy>: Debug {
    /// Allocate an array of `shape` filled with `T::default()`.
    fn zeros(shape: &[usize]) -> Self
    where
        Self: Sized,
        T: Default;

    fn shape(&self) -> &[usize];

    /// Entire buffer, row-major.
    fn as_slice(&self) -> &[T];

    /// Entire mutable buffer, row-major.
    fn as_mut_slice(&mut self) -> &mut [T];

    /// Copy the elements of `window` out, row-major.
    fn read_window(&self, window: &IndexBox) -> Result<Vec<T>, HaloError> {
        check_window(self.shape(), window)?;
        let data = self.as_slice();
        let mut out = Vec::with_capacity(window.len());
        for_each_run(self.shape(), window, |off, run| {
            out.extend_from_slice(&data[off..off + run]);
        });
        Ok(out)
    }

    /// Overwrite the elements of `window` with `values` (row-major).
    fn write_window(&mut self, window: &IndexBox, values: &[T]) -> Result<(), HaloError> {
        check_window(self.shape(), window)?;
        if values.len() != window.len() {
            return Err(HaloError::ShapeMismatch {
                expected: window.shape(),
                found: vec![values.len()],
            });
        }
        let shape = self.shape().to_vec();
        let data = self.as_mut_slice();
        let mut src = 0;
        for_each_run(&shape, window, |off, run| {
            data[off..off + run].copy_from_slice(&values[src..src + run]);
            src += run;
        });
        Ok(())
    }

    /// Set every element of `window` to `value`.
    fn fill_window(&mut self, window: &IndexBox, value: T) -> Result<(), HaloError> {
        check_window(self.shape(), window)?;
        let shape = self.shape().to_vec();
        let data = self.as_mut_slice();
        for_each_run(&shape, window, |off, run| data[off..off + run].fill(value));
        Ok(())
    }
}

/// `Vec`-backed row-major array (default local storage).
#[derive(Clone, PartialEq)]
pub struct NdArray<T> {
    shape: Vec<usize>,
    data: Vec<T>,
}

impl<T> Debug for NdArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NdArray")
            .field("shape", &self.shape)
            .field("len", &self.data.len())
            .finish()
    }
}

impl<T: Copy> NdArray<T> {
    pub fn full(shape: &[usize], value: T) -> Self {
        Self {
            shape: shape.to_vec(),
            data: vec![value; shape.iter().product()],
        }
    }

    pub fn from_vec(shape: &[usize], data: Vec<T>) -> Result<Self, HaloError> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(HaloError::ShapeMismatch {
                expected: shape.to_vec(),
                found: vec![data.len()],
            });
        }
        Ok(Self {
            shape: shape.to_vec(),
            data,
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn offset(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.shape.len() || index.iter().zip(&self.shape).any(|(i, n)| i >= n) {
            return None;
        }
        Some(
            index
                .iter()
                .zip(row_major_strides(&self.shape))
                .map(|(i, s)| i * s)
                .sum(),
        )
    }

    pub fn get(&self, index: &[usize]) -> Option<&T> {
        self.offset(index).map(|o| &self.data[o])
    }

    pub fn get_mut(&mut self, index: &[usize]) -> Option<&mut T> {
        self.offset(index).map(|o| &mut self.data[o])
    }

    /// Copy of the sub-array covering `window`.
    pub fn window(&self, window: &IndexBox) -> Result<NdArray<T>, HaloError>
    where
        T: Debug,
    {
        let data = self.read_window(window)?;
        Ok(NdArray {
            shape: window.shape(),
            data,
        })
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

impl<T: Copy + Debug> MutableNdArrayView<T> for NdArray<T> {
    fn zeros(shape: &[usize]) -> Self
    where
        T: Default,
    {
        Self::full(shape, T::default())
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn as_slice(&self) -> &[T] {
        &self.data
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}
