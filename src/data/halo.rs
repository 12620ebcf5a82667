//! Halo descriptors and the arena that stores them.
//!
//! A [`ReceiveHalo`] is a window of a local array that is overwritten with a
//! neighbor's interior on every sync; a [`TransmitHalo`] is the matching
//! window on the neighbor's side. Descriptors live in a flat [`HaloArena`]
//! and are addressed by [`HaloId`]; per-level id lists drive the exchange.

use std::collections::BTreeMap;

use crate::debug_invariants::DebugInvariants;
use crate::geometry::{Bounds, DomainKey, IndexBox};
use crate::halo_error::HaloError;

/// Index of a descriptor inside its arena.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HaloId(pub u32);

impl HaloId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which axis levels a sync covers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Levels {
    #[default]
    All,
    Axis(usize),
    Axes(Vec<usize>),
}

impl Levels {
    fn includes(&self, level: usize) -> bool {
        match self {
            Levels::All => true,
            Levels::Axis(a) => *a == level,
            Levels::Axes(v) => v.contains(&level),
        }
    }
}

impl From<usize> for Levels {
    fn from(a: usize) -> Self {
        Levels::Axis(a)
    }
}

impl From<Vec<usize>> for Levels {
    fn from(v: Vec<usize>) -> Self {
        Levels::Axes(v)
    }
}

impl From<&[usize]> for Levels {
    fn from(v: &[usize]) -> Self {
        Levels::Axes(v.to_vec())
    }
}

impl From<Option<usize>> for Levels {
    fn from(a: Option<usize>) -> Self {
        a.map_or(Levels::All, Levels::Axis)
    }
}

/// Common view of both descriptor kinds.
pub trait HaloDescriptor {
    /// Slot of the local domain whose array the window addresses.
    fn domain(&self) -> usize;
    /// The rank on the other end of the edge.
    fn remote_rank(&self) -> usize;
    fn level(&self) -> usize;
    /// Window in local array coordinates.
    fn window(&self) -> &IndexBox;
}

/// Write target filled from `sender_rank`'s domain `sender_key`.
#[derive(Clone, Debug, PartialEq)]
pub struct ReceiveHalo {
    pub domain: usize,
    pub sender_rank: usize,
    pub sender_key: DomainKey,
    pub level: usize,
    pub window: IndexBox,
    /// Physical corners of the window, shipped to the sender during setup.
    pub location: Bounds,
}

/// Read source served to halo `receiver_halo` on `receiver_rank`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransmitHalo {
    pub domain: usize,
    pub receiver_rank: usize,
    pub receiver_halo: HaloId,
    pub level: usize,
    pub window: IndexBox,
}

impl HaloDescriptor for ReceiveHalo {
    fn domain(&self) -> usize {
        self.domain
    }
    fn remote_rank(&self) -> usize {
        self.sender_rank
    }
    fn level(&self) -> usize {
        self.level
    }
    fn window(&self) -> &IndexBox {
        &self.window
    }
}

impl HaloDescriptor for TransmitHalo {
    fn domain(&self) -> usize {
        self.domain
    }
    fn remote_rank(&self) -> usize {
        self.receiver_rank
    }
    fn level(&self) -> usize {
        self.level
    }
    fn window(&self) -> &IndexBox {
        &self.window
    }
}

/// Flat storage of descriptors with per-level id lists.
#[derive(Clone, Debug)]
pub struct HaloArena<H> {
    halos: Vec<H>,
    levels: BTreeMap<usize, Vec<HaloId>>,
}

impl<H> Default for HaloArena<H> {
    fn default() -> Self {
        Self {
            halos: Vec::new(),
            levels: BTreeMap::new(),
        }
    }
}

impl<H: HaloDescriptor> HaloArena<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            halos: Vec::with_capacity(n),
            levels: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, halo: H) -> HaloId {
        let id = HaloId(self.halos.len() as u32);
        self.levels.entry(halo.level()).or_default().push(id);
        self.halos.push(halo);
        id
    }

    pub fn get(&self, id: HaloId) -> Option<&H> {
        self.halos.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.halos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.halos.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (HaloId, &H)> + '_ {
        self.halos
            .iter()
            .enumerate()
            .map(|(i, h)| (HaloId(i as u32), h))
    }

    /// Levels that have at least one descriptor, ascending.
    pub fn levels(&self) -> impl Iterator<Item = usize> + '_ {
        self.levels.keys().copied()
    }

    /// Descriptors on the selected levels: levels ascending, then insertion
    /// order within a level.
    pub fn on_levels<'a>(&'a self, levels: &'a Levels) -> impl Iterator<Item = (HaloId, &'a H)> + 'a {
        self.levels
            .iter()
            .filter(move |(level, _)| levels.includes(**level))
            .flat_map(|(_, ids)| ids.iter())
            .map(move |&id| (id, &self.halos[id.index()]))
    }
}

impl<H: HaloDescriptor> DebugInvariants for HaloArena<H> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "halo arena");
    }

    fn validate_invariants(&self) -> Result<(), HaloError> {
        let mut seen = vec![false; self.halos.len()];
        for (&level, ids) in &self.levels {
            for id in ids {
                let halo = self.halos.get(id.index()).ok_or_else(|| HaloError::DiscoveryMismatch {
                    rank: usize::MAX,
                    detail: format!("level {level} lists unknown halo {}", id.0),
                })?;
                if halo.level() != level || std::mem::replace(&mut seen[id.index()], true) {
                    return Err(HaloError::DiscoveryMismatch {
                        rank: halo.remote_rank(),
                        detail: format!("halo {} filed twice or under level {level}", id.0),
                    });
                }
                if halo.window().is_empty() {
                    return Err(HaloError::WindowOutOfRange {
                        window: halo.window().to_string(),
                        shape: Vec::new(),
                    });
                }
            }
        }
        if seen.iter().any(|s| !s) {
            return Err(HaloError::DiscoveryMismatch {
                rank: usize::MAX,
                detail: "halo missing from level index".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(level: usize, receiver_rank: usize) -> TransmitHalo {
        TransmitHalo {
            domain: 0,
            receiver_rank,
            receiver_halo: HaloId(0),
            level,
            window: IndexBox::new(vec![0], vec![1]),
        }
    }

    #[test]
    fn on_levels_orders_by_level_then_insertion() {
        let mut arena = HaloArena::new();
        let a = arena.push(tx(1, 5));
        let b = arena.push(tx(0, 6));
        let c = arena.push(tx(1, 7));
        let all: Vec<_> = arena.on_levels(&Levels::All).map(|(id, _)| id).collect();
        assert_eq!(all, vec![b, a, c]);
        let one: Vec<_> = arena.on_levels(&Levels::Axis(1)).map(|(id, _)| id).collect();
        assert_eq!(one, vec![a, c]);
        assert_eq!(arena.on_levels(&Levels::from(vec![2])).count(), 0);
        assert_eq!(arena.levels().collect::<Vec<_>>(), vec![0, 1]);
        arena.validate_invariants().unwrap();
    }

    #[test]
    fn empty_window_breaks_invariants() {
        let mut arena = HaloArena::new();
        let mut h = tx(0, 1);
        h.window = IndexBox::new(vec![2], vec![2]);
        arena.push(h);
        assert!(arena.validate_invariants().is_err());
    }

    #[test]
    fn levels_from_option() {
        assert_eq!(Levels::from(None), Levels::All);
        assert_eq!(Levels::from(Some(2)), Levels::Axis(2));
    }
}
