use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Position of a domain in the decomposition, one coordinate per axis.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainKey(Vec<usize>);

impl DomainKey {
    pub fn new(coords: impl Into<Vec<usize>>) -> Self {
        Self(coords.into())
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Copy of this key with `axis` moved by `step` (`-1` or `+1`), or `None`
    /// when that would leave the non-negative range.
    pub fn offset(&self, axis: usize, step: isize) -> Option<DomainKey> {
        let mut coords = self.0.clone();
        let c = coords.get_mut(axis)?;
        *c = c.checked_add_signed(step)?;
        Some(DomainKey(coords))
    }
}

impl Deref for DomainKey {
    type Target = [usize];

    fn deref(&self) -> &[usize] {
        &self.0
    }
}

impl From<Vec<usize>> for DomainKey {
    fn from(v: Vec<usize>) -> Self {
        Self(v)
    }
}

impl From<&[usize]> for DomainKey {
    fn from(v: &[usize]) -> Self {
        Self(v.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for DomainKey {
    fn from(v: [usize; N]) -> Self {
        Self(v.to_vec())
    }
}

impl fmt::Display for DomainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{c}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_stays_non_negative() {
        let k = DomainKey::from([0, 2]);
        assert_eq!(k.offset(0, -1), None);
        assert_eq!(k.offset(1, -1), Some(DomainKey::from([0, 1])));
        assert_eq!(k.offset(0, 1), Some(DomainKey::from([1, 2])));
        assert_eq!(k.offset(5, 1), None);
    }

    #[test]
    fn display_reads_as_tuple() {
        assert_eq!(DomainKey::from([1, 0, 3]).to_string(), "(1, 0, 3)");
    }
}
