//! Merits and propagation policies
//!
//! A `Merit` is a taint label compared by identity: two merits are the same
//! only when they are the same instance. Each merit carries a propagation
//! marker, and only the three canonical markers (`Full`, `Partial`, `None`)
//! are meaningful. Markers are created once per process behind a
//! `OnceLock` and never written afterwards.

use crate::error::{Result, TaintError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

/// Propagation policy of a merit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Propagation {
    /// Survives every derivation, even when the other operand is clean
    Full,
    /// Survives only when both operands are tracked and carry the merit
    Partial,
    /// Never survives a derivation
    #[default]
    None,
}

impl Propagation {
    /// The canonical marker for this policy
    pub fn marker(self) -> Strategy {
        let markers = markers();
        match self {
            Propagation::Full => markers.full.clone(),
            Propagation::Partial => markers.partial.clone(),
            Propagation::None => markers.none.clone(),
        }
    }
}

impl fmt::Display for Propagation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Propagation::Full => "Full",
            Propagation::Partial => "Partial",
            Propagation::None => "None",
        };
        write!(f, "{}Propagation", name)
    }
}

/// A propagation marker as attached to a merit
///
/// Markers compare by identity. Only the three canonical instances returned
/// by [`Propagation::marker`] classify to a policy; anything built with
/// [`Strategy::custom`] is foreign and makes its merit invalid.
#[derive(Clone)]
pub struct Strategy(Arc<str>);

struct Markers {
    full: Strategy,
    partial: Strategy,
    none: Strategy,
}

static MARKERS: OnceLock<Markers> = OnceLock::new();

fn markers() -> &'static Markers {
    MARKERS.get_or_init(|| Markers {
        full: Strategy(Arc::from("FullPropagation")),
        partial: Strategy(Arc::from("PartialPropagation")),
        none: Strategy(Arc::from("NonePropagation")),
    })
}

/// Create the canonical propagation markers
///
/// Every accessor initializes lazily, so calling this is optional. Hosts
/// that share merits across threads call it once at startup to make the
/// initialization point explicit.
pub fn init() {
    let _ = markers();
    tracing::debug!("Propagation markers initialized");
}

impl Strategy {
    /// Create a marker that is not one of the canonical three
    pub fn custom(name: impl Into<String>) -> Self {
        Self(Arc::from(name.into()))
    }

    /// Marker name
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Map this marker to its policy, if it is canonical
    pub fn classify(&self) -> Option<Propagation> {
        let markers = markers();
        if *self == markers.full {
            Some(Propagation::Full)
        } else if *self == markers.partial {
            Some(Propagation::Partial)
        } else if *self == markers.none {
            Some(Propagation::None)
        } else {
            None
        }
    }

    /// Whether this is one of the three canonical markers
    pub fn is_canonical(&self) -> bool {
        self.classify().is_some()
    }
}

impl PartialEq for Strategy {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Strategy {}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

struct MeritInner {
    name: String,
    strategy: Option<Strategy>,
}

/// A taint label with identity semantics
///
/// Cloning a `Merit` yields another handle to the same instance, so clones
/// compare equal. Two merits built separately never compare equal, even
/// with the same name and policy.
#[derive(Clone)]
pub struct Merit(Arc<MeritInner>);

impl Merit {
    /// Create a merit with a canonical propagation policy
    pub fn new(name: impl Into<String>, propagation: Propagation) -> Self {
        Self::from_parts(name, Some(propagation.marker()))
    }

    /// Create a merit using the default policy (`None`)
    pub fn with_default_propagation(name: impl Into<String>) -> Self {
        Self::new(name, Propagation::default())
    }

    /// Build a merit from raw parts supplied by a host
    ///
    /// Not validated; see [`validate_merit`].
    pub fn from_parts(name: impl Into<String>, strategy: Option<Strategy>) -> Self {
        Self(Arc::new(MeritInner {
            name: name.into(),
            strategy,
        }))
    }

    /// Human-readable category name
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Raw propagation marker, if the merit has one
    pub fn strategy(&self) -> Option<&Strategy> {
        self.0.strategy.as_ref()
    }

    /// Resolved propagation policy, or `None` for a missing/foreign marker
    pub fn propagation(&self) -> Option<Propagation> {
        self.strategy().and_then(Strategy::classify)
    }

    /// Identity comparison
    pub fn is_same(&self, other: &Merit) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Merit {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other)
    }
}

impl Eq for Merit {}

impl Hash for Merit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0), state);
    }
}

impl fmt::Debug for Merit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.strategy() {
            Some(strategy) => write!(f, "Merit({}, {:?})", self.name(), strategy),
            None => write!(f, "Merit({}, <missing>)", self.name()),
        }
    }
}

impl fmt::Display for Merit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Check that a merit carries one of the canonical propagation markers
pub fn validate_merit(candidate: &Merit) -> Result<()> {
    let strategy = candidate.strategy().ok_or_else(|| {
        TaintError::InvalidMerit(format!("merit '{}' has no propagation", candidate.name()))
    })?;
    if !strategy.is_canonical() {
        return Err(TaintError::InvalidMerit(format!(
            "merit '{}' has invalid propagation strategy {:?}",
            candidate.name(),
            strategy
        )));
    }
    Ok(())
}

/// Boolean form of [`validate_merit`]
pub fn is_valid_merit(candidate: &Merit) -> bool {
    validate_merit(candidate).is_ok()
}
