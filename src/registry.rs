//! Merit registry: one canonical instance per taint category
//!
//! Merits compare by identity, so every component that talks about the same
//! category must share one instance. A `MeritRegistry` hands out those
//! canonical instances by name.

use crate::error::{Result, TaintError};
use crate::merit::{Merit, Propagation};
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

/// Names of the merits preloaded in [`builtin_merits`]
pub const SECRET: &str = "secret";
pub const PICKLE: &str = "pickle";
pub const SHELL: &str = "shell";
pub const XSS: &str = "xss";
pub const SQLI: &str = "sqli";

/// Trait for merit registries
pub trait MeritRegistry: Send + Sync {
    /// Canonical merit for `name`, creating it on first use
    ///
    /// Registering an existing name with the same policy returns the existing
    /// instance; a different policy is a configuration error.
    fn register(&self, name: &str, propagation: Propagation) -> Result<Merit>;

    /// Add an already-built merit under its own name
    fn insert(&self, merit: Merit) -> Result<()>;

    /// Look up a merit by name
    fn get(&self, name: &str) -> Result<Option<Merit>>;

    /// All registered names, sorted
    fn list_names(&self) -> Result<Vec<String>>;
}

/// In-memory merit registry
///
/// Stores merits in a `HashMap` protected by `RwLock`.
#[derive(Default)]
pub struct MemoryMeritRegistry {
    merits: RwLock<HashMap<String, Merit>>,
}

impl MemoryMeritRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the given merits
    pub fn from_merits(merits: impl IntoIterator<Item = Merit>) -> Self {
        let merits = merits
            .into_iter()
            .map(|m| (m.name().to_string(), m))
            .collect();
        Self {
            merits: RwLock::new(merits),
        }
    }

    fn poisoned(e: impl std::fmt::Display) -> TaintError {
        TaintError::Registry(format!("Merit registry lock poisoned: {}", e))
    }
}

impl MeritRegistry for MemoryMeritRegistry {
    fn register(&self, name: &str, propagation: Propagation) -> Result<Merit> {
        if name.is_empty() {
            return Err(TaintError::Config("Merit name cannot be empty".to_string()));
        }

        let mut merits = self.merits.write().map_err(Self::poisoned)?;
        if let Some(existing) = merits.get(name) {
            if existing.propagation() == Some(propagation) {
                return Ok(existing.clone());
            }
            return Err(TaintError::Config(format!(
                "Merit '{}' already registered with {:?}, requested {}",
                name,
                existing.strategy(),
                propagation
            )));
        }

        let merit = Merit::new(name, propagation);
        merits.insert(name.to_string(), merit.clone());
        tracing::debug!(merit = name, %propagation, "Merit registered");
        Ok(merit)
    }

    fn insert(&self, merit: Merit) -> Result<()> {
        let mut merits = self.merits.write().map_err(Self::poisoned)?;
        if let Some(existing) = merits.get(merit.name()) {
            if existing.is_same(&merit) {
                return Ok(());
            }
            return Err(TaintError::Config(format!(
                "A different merit named '{}' is already registered",
                merit.name()
            )));
        }
        merits.insert(merit.name().to_string(), merit);
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<Merit>> {
        let merits = self.merits.read().map_err(Self::poisoned)?;
        Ok(merits.get(name).cloned())
    }

    fn list_names(&self) -> Result<Vec<String>> {
        let merits = self.merits.read().map_err(Self::poisoned)?;
        let mut names: Vec<String> = merits.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// Process-wide registry preloaded with the stock merits
///
/// `secret`, `pickle`, `shell`, `xss` and `sqli`, all with the default
/// `None` propagation.
pub fn builtin_merits() -> &'static MemoryMeritRegistry {
    static BUILTIN: OnceLock<MemoryMeritRegistry> = OnceLock::new();
    BUILTIN.get_or_init(|| {
        MemoryMeritRegistry::from_merits(
            [SECRET, PICKLE, SHELL, XSS, SQLI]
                .into_iter()
                .map(Merit::with_default_propagation),
        )
    })
}
