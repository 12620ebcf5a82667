use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open multi-dimensional index box `[start, stop)`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexBox {
    pub start: Vec<usize>,
    pub stop: Vec<usize>,
}

impl IndexBox {
    pub fn new(start: Vec<usize>, stop: Vec<usize>) -> Self {
        debug_assert_eq!(start.len(), stop.len());
        Self { start, stop }
    }

    /// Box covering `[0, shape)`.
    pub fn from_shape(shape: &[usize]) -> Self {
        Self {
            start: vec![0; shape.len()],
            stop: shape.to_vec(),
        }
    }

    pub fn ndim(&self) -> usize {
        self.start.len()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.start
            .iter()
            .zip(&self.stop)
            .map(|(&a, &b)| b.saturating_sub(a))
            .collect()
    }

    /// Number of indices inside the box.
    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.start.iter().zip(&self.stop).any(|(a, b)| a >= b)
    }

    pub fn contains(&self, index: &[usize]) -> bool {
        index.len() == self.ndim()
            && index
                .iter()
                .zip(self.start.iter().zip(&self.stop))
                .all(|(&i, (&a, &b))| a <= i && i < b)
    }

    /// True when `other` lies entirely inside `self`.
    pub fn contains_box(&self, other: &IndexBox) -> bool {
        other.ndim() == self.ndim()
            && (0..self.ndim())
                .all(|a| self.start[a] <= other.start[a] && other.stop[a] <= self.stop[a])
    }

    /// Overlap of two boxes, or `None` when they do not overlap.
    pub fn intersect(&self, other: &IndexBox) -> Option<IndexBox> {
        if other.ndim() != self.ndim() {
            return None;
        }
        let start: Vec<usize> = (0..self.ndim())
            .map(|a| self.start[a].max(other.start[a]))
            .collect();
        let stop: Vec<usize> = (0..self.ndim())
            .map(|a| self.stop[a].min(other.stop[a]))
            .collect();
        let out = IndexBox { start, stop };
        (!out.is_empty()).then_some(out)
    }

    /// Shift the box so that `origin` becomes index zero.
    pub fn relative_to(&self, origin: &[usize]) -> Option<IndexBox> {
        let start = self
            .start
            .iter()
            .zip(origin)
            .map(|(&s, &o)| s.checked_sub(o))
            .collect::<Option<Vec<_>>>()?;
        let stop = self
            .stop
            .iter()
            .zip(origin)
            .map(|(&s, &o)| s.checked_sub(o))
            .collect::<Option<Vec<_>>>()?;
        Some(IndexBox { start, stop })
    }

    /// Iterate every index in the box in row-major order.
    pub fn indices(&self) -> BoxIndices<'_> {
        BoxIndices {
            bounds: self,
            next: (!self.is_empty()).then(|| self.start.clone()),
        }
    }
}

impl fmt::Display for IndexBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for a in 0..self.ndim() {
            if a > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}..{}", self.start[a], self.stop[a])?;
        }
        write!(f, "]")
    }
}

/// Row-major odometer over an [`IndexBox`].
pub struct BoxIndices<'a> {
    bounds: &'a IndexBox,
    next: Option<Vec<usize>>,
}

impl Iterator for BoxIndices<'_> {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let current = self.next.take()?;
        let mut succ = current.clone();
        let mut axis = succ.len();
        while axis > 0 {
            axis -= 1;
            succ[axis] += 1;
            if succ[axis] < self.bounds.stop[axis] {
                self.next = Some(succ);
                break;
            }
            succ[axis] = self.bounds.start[axis];
        }
        Some(current)
    }
}
