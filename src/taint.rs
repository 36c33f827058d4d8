//! Label sets
//!
//! A value is either untracked (`Taint::Clean`) or tracked with an ordered,
//! possibly empty list of merits. Being tracked with no merits is not the
//! same as being clean: it records that the value touched a tainted source
//! even though no merit currently vouches for it.

use crate::merit::Merit;
use std::fmt;
use std::sync::Arc;

/// Immutable, shareable merit list
///
/// Order is preserved from construction and duplicates are kept.
#[derive(Clone, PartialEq, Eq)]
pub struct Merits(Arc<[Merit]>);

impl Merits {
    /// Merit list with no entries
    pub fn empty() -> Self {
        Self(Arc::from(Vec::new()))
    }

    /// Number of merits, counting duplicates
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list has no merits
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Identity membership test
    pub fn contains(&self, merit: &Merit) -> bool {
        self.0.iter().any(|m| m.is_same(merit))
    }

    /// Iterate merits in order
    pub fn iter(&self) -> std::slice::Iter<'_, Merit> {
        self.0.iter()
    }

    /// Borrow as a slice
    pub fn as_slice(&self) -> &[Merit] {
        &self.0
    }
}

impl From<Vec<Merit>> for Merits {
    fn from(merits: Vec<Merit>) -> Self {
        Self(Arc::from(merits))
    }
}

impl FromIterator<Merit> for Merits {
    fn from_iter<I: IntoIterator<Item = Merit>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Merits {
    type Item = &'a Merit;
    type IntoIter = std::slice::Iter<'a, Merit>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for Merits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

/// Label set carried by a taintable value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Taint {
    /// Not tracked at all
    #[default]
    Clean,
    /// Tracked, carrying the listed merits (possibly none)
    Tainted(Merits),
}

impl Taint {
    /// Tracked with no merits
    pub fn empty() -> Self {
        Taint::Tainted(Merits::empty())
    }

    /// Tracked with the given merits, in order
    pub fn from_merits(merits: impl IntoIterator<Item = Merit>) -> Self {
        Taint::Tainted(merits.into_iter().collect())
    }

    /// Whether the value is untracked
    pub fn is_clean(&self) -> bool {
        matches!(self, Taint::Clean)
    }

    /// Whether the value is tracked (with or without merits)
    pub fn is_tainted(&self) -> bool {
        !self.is_clean()
    }

    /// Merit list, or `None` when clean
    pub fn merits(&self) -> Option<&Merits> {
        match self {
            Taint::Clean => None,
            Taint::Tainted(merits) => Some(merits),
        }
    }

    /// Whether the label set holds `merit` (never true when clean)
    pub fn has_merit(&self, merit: &Merit) -> bool {
        self.merits().is_some_and(|m| m.contains(merit))
    }

    /// Safe for a sink requiring `merit`: untracked, or vouched for by it
    pub fn is_clean_for(&self, merit: &Merit) -> bool {
        match self {
            Taint::Clean => true,
            Taint::Tainted(merits) => merits.contains(merit),
        }
    }

    /// New label set with `merit` appended
    ///
    /// The receiver is left untouched. A clean set becomes tracked with just
    /// `merit`. Duplicates are not filtered.
    pub fn with_merit(&self, merit: &Merit) -> Taint {
        let existing = self.merits().map(Merits::as_slice).unwrap_or(&[]);
        let mut merits = Vec::with_capacity(existing.len() + 1);
        merits.extend_from_slice(existing);
        merits.push(merit.clone());
        Taint::Tainted(Merits::from(merits))
    }
}

impl fmt::Display for Taint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Taint::Clean => f.write_str("clean"),
            Taint::Tainted(merits) => {
                f.write_str("tainted[")?;
                for (i, m) in merits.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(m.name())?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Tracked label set with no merits
pub fn empty_merits() -> Taint {
    Taint::empty()
}

/// Append `merit` to `taint`, returning a new label set
pub fn add_merit(taint: &Taint, merit: &Merit) -> Taint {
    taint.with_merit(merit)
}

/// Whether `taint` is the untracked state
pub fn is_clean(taint: &Taint) -> bool {
    taint.is_clean()
}
