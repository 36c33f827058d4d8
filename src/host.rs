//! Host values that can carry a label set
//!
//! The engine only needs three things from a host value: read its label set,
//! replace it, and duplicate the content under a new label set. `Taintable`
//! captures that contract. `TaintedStr` is the reference string binding used
//! throughout the crate and its tests, with an `Interner` standing in for the
//! host's pool of canonical shared strings.

use crate::error::{Result, TaintError};
use crate::merit::Merit;
use crate::taint::{Merits, Taint};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

/// Contract between the tainting adapter and a host value type
pub trait Taintable: Sized {
    /// Current label set
    fn taint(&self) -> &Taint;

    /// Overwrite the label set in place
    ///
    /// Only called on values the caller owns exclusively.
    fn set_taint(&mut self, taint: Taint);

    /// Fresh instance with the same content and the given label set
    fn duplicate_with(&self, taint: Taint) -> Result<Self>;

    /// Canonical process-wide instance (e.g. interned) that must never be
    /// relabeled in place, even when uniquely referenced
    fn is_canonical(&self) -> bool {
        false
    }

    /// Host type name used in error messages
    fn type_name(&self) -> &'static str;
}

/// String value with an attached label set
pub struct TaintedStr {
    content: String,
    taint: Taint,
    interned: bool,
}

impl TaintedStr {
    /// Create a clean string
    pub fn new(content: impl Into<String>) -> Self {
        Self::with_taint(content, Taint::Clean)
    }

    /// Create a string carrying `taint`
    pub fn with_taint(content: impl Into<String>, taint: Taint) -> Self {
        Self {
            content: content.into(),
            taint,
            interned: false,
        }
    }

    /// String content
    pub fn as_str(&self) -> &str {
        &self.content
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Whether the content is empty
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Whether this instance lives in an interner
    pub fn is_interned(&self) -> bool {
        self.interned
    }

    /// Whether the string is untracked
    pub fn is_clean(&self) -> bool {
        self.taint.is_clean()
    }

    /// Whether the string is tracked
    pub fn is_tainted(&self) -> bool {
        self.taint.is_tainted()
    }

    /// Merits carried, or `None` when untracked
    pub fn merits(&self) -> Option<&Merits> {
        self.taint.merits()
    }

    /// Whether a sink requiring `merit` may accept this string
    pub fn is_clean_for(&self, merit: &Merit) -> bool {
        self.taint.is_clean_for(merit)
    }
}

impl Taintable for TaintedStr {
    fn taint(&self) -> &Taint {
        &self.taint
    }

    fn set_taint(&mut self, taint: Taint) {
        self.taint = taint;
    }

    fn duplicate_with(&self, taint: Taint) -> Result<Self> {
        let mut content = String::new();
        content
            .try_reserve_exact(self.content.len())
            .map_err(|e| {
                TaintError::Allocation(format!(
                    "duplicating string of {} bytes: {}",
                    self.content.len(),
                    e
                ))
            })?;
        content.push_str(&self.content);
        Ok(Self {
            content,
            taint,
            interned: false,
        })
    }

    fn is_canonical(&self) -> bool {
        self.interned
    }

    fn type_name(&self) -> &'static str {
        "str"
    }
}

impl PartialEq for TaintedStr {
    fn eq(&self, other: &Self) -> bool {
        self.content == other.content
    }
}

impl Eq for TaintedStr {}

impl PartialEq<str> for TaintedStr {
    fn eq(&self, other: &str) -> bool {
        self.content == other
    }
}

impl PartialEq<&str> for TaintedStr {
    fn eq(&self, other: &&str) -> bool {
        self.content == *other
    }
}

impl fmt::Debug for TaintedStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self.content, self.taint)
    }
}

impl fmt::Display for TaintedStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content)
    }
}

/// Pool of canonical clean strings
///
/// Interned strings are shared by every caller that asks for the same
/// content. The pool keeps its own reference, and `is_canonical` reports
/// them, so tainting always copies instead of relabeling in place.
#[derive(Default)]
pub struct Interner {
    pool: RwLock<HashMap<String, Arc<TaintedStr>>>,
}

impl Interner {
    /// Create an empty interner
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned(e: impl fmt::Display) -> TaintError {
        TaintError::Registry(format!("Interner lock poisoned: {}", e))
    }

    /// Process-wide interner
    pub fn global() -> &'static Interner {
        static GLOBAL: OnceLock<Interner> = OnceLock::new();
        GLOBAL.get_or_init(Interner::new)
    }

    /// Canonical instance for `content`
    pub fn intern(&self, content: &str) -> Result<Arc<TaintedStr>> {
        {
            let pool = self.pool.read().map_err(Self::poisoned)?;
            if let Some(existing) = pool.get(content) {
                return Ok(Arc::clone(existing));
            }
        }

        let mut pool = self.pool.write().map_err(Self::poisoned)?;
        let entry = pool.entry(content.to_string()).or_insert_with(|| {
            Arc::new(TaintedStr {
                content: content.to_string(),
                taint: Taint::Clean,
                interned: true,
            })
        });
        Ok(Arc::clone(entry))
    }

    /// Number of interned strings
    pub fn len(&self) -> Result<usize> {
        let pool = self.pool.read().map_err(Self::poisoned)?;
        Ok(pool.len())
    }

    /// Whether nothing has been interned yet
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
