//! Translation of global index requests into per-domain local windows.

use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

use crate::geometry::IndexBox;

/// Selection along one axis of the global index space.
///
/// `Index(i)` keeps the axis with width one instead of dropping it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AxisSelect {
    Index(usize),
    Range {
        start: Option<usize>,
        stop: Option<usize>,
    },
    Full,
}

impl From<usize> for AxisSelect {
    fn from(i: usize) -> Self {
        AxisSelect::Index(i)
    }
}

impl From<Range<usize>> for AxisSelect {
    fn from(r: Range<usize>) -> Self {
        AxisSelect::Range {
            start: Some(r.start),
            stop: Some(r.end),
        }
    }
}

impl From<RangeFrom<usize>> for AxisSelect {
    fn from(r: RangeFrom<usize>) -> Self {
        AxisSelect::Range {
            start: Some(r.start),
            stop: None,
        }
    }
}

impl From<RangeTo<usize>> for AxisSelect {
    fn from(r: RangeTo<usize>) -> Self {
        AxisSelect::Range {
            start: None,
            stop: Some(r.end),
        }
    }
}

impl From<RangeFull> for AxisSelect {
    fn from(_: RangeFull) -> Self {
        AxisSelect::Full
    }
}

/// Part of a request served by one domain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalSlice {
    /// Window in the domain's local array.
    pub local: IndexBox,
    /// The same elements, relative to the start of the request.
    pub within: IndexBox,
}

#[derive(Clone, Debug)]
struct Owned {
    interior: IndexBox,
    origin: Vec<usize>,
}

/// Maps requests against the full logical shape onto the domains one rank owns.
#[derive(Clone, Debug)]
pub struct IndexBoundsHandler {
    shape: Vec<usize>,
    domains: Vec<Owned>,
}

impl IndexBoundsHandler {
    pub fn new(shape: Vec<usize>) -> Self {
        Self {
            shape,
            domains: Vec::new(),
        }
    }

    /// Register a domain by its global interior box and the global index of
    /// its local element zero. Returns the domain's slot.
    pub fn push_domain(&mut self, interior: IndexBox, origin: Vec<usize>) -> usize {
        self.domains.push(Owned { interior, origin });
        self.domains.len() - 1
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Global box selected by `request`, or `None` if it has the wrong number
    /// of axes, an index is out of range, or the selection is empty.
    pub fn resolve(&self, request: &[AxisSelect]) -> Option<IndexBox> {
        if request.len() != self.shape.len() {
            return None;
        }
        let mut start = Vec::with_capacity(request.len());
        let mut stop = Vec::with_capacity(request.len());
        for (sel, &n) in request.iter().zip(&self.shape) {
            let (s, e) = match *sel {
                AxisSelect::Index(i) if i < n => (i, i + 1),
                AxisSelect::Index(_) => return None,
                AxisSelect::Range { start, stop } => {
                    (start.unwrap_or(0), stop.map_or(n, |e| e.min(n)))
                }
                AxisSelect::Full => (0, n),
            };
            if s >= e {
                return None;
            }
            start.push(s);
            stop.push(e);
        }
        Some(IndexBox::new(start, stop))
    }

    /// The part of `request` (a resolved global box) owned by domain `slot`.
    pub fn localize(&self, slot: usize, request: &IndexBox) -> Option<LocalSlice> {
        let owned = self.domains.get(slot)?;
        let hit = owned.interior.intersect(request)?;
        Some(LocalSlice {
            local: hit.relative_to(&owned.origin)?,
            within: hit.relative_to(&request.start)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> IndexBoundsHandler {
        // domain (1, 0) of an 8x8 grid split 2x2 with unit halos
        let mut h = IndexBoundsHandler::new(vec![8, 8]);
        h.push_domain(IndexBox::new(vec![4, 0], vec![8, 4]), vec![3, 0]);
        h
    }

    #[test]
    fn resolve_clamps_ranges() {
        let h = handler();
        assert_eq!(
            h.resolve(&[AxisSelect::from(2..20), AxisSelect::Full]),
            Some(IndexBox::new(vec![2, 0], vec![8, 8]))
        );
        assert_eq!(h.resolve(&[AxisSelect::Index(8), AxisSelect::Full]), None);
        assert_eq!(h.resolve(&[AxisSelect::from(5..5), AxisSelect::Full]), None);
        assert_eq!(h.resolve(&[AxisSelect::Full]), None);
    }

    #[test]
    fn localize_splits_request() {
        let h = handler();
        let req = h.resolve(&[(3..6).into(), (..).into()]).unwrap();
        let s = h.localize(0, &req).unwrap();
        assert_eq!(s.local, IndexBox::new(vec![1, 0], vec![3, 4]));
        assert_eq!(s.within, IndexBox::new(vec![1, 0], vec![3, 4]));
        let miss = h.resolve(&[(0..4).into(), (..).into()]).unwrap();
        assert_eq!(h.localize(0, &miss), None);
        assert_eq!(h.localize(1, &req), None);
    }
}
