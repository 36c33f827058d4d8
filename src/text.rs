//! String derivations that propagate taint
//!
//! Each operation builds the derived content, asks the propagation engine for
//! the label set, and stamps it onto the result. Unary derivations copy the
//! receiver's label set unchanged; binary ones combine their operands; the
//! collection-producing ones stamp every piece through the adapter.

use crate::adapter::{taint_fixed_sequence, taint_in_place, FixedSeq};
use crate::error::{Result, TaintError};
use crate::host::{Interner, TaintedStr, Taintable};
use crate::merit::Merit;
use crate::propagation::{collect, combine};
use crate::taint::Taint;
use std::sync::Arc;

fn derived(content: String, taint: Taint) -> TaintedStr {
    TaintedStr::with_taint(content, taint)
}

/// Pieces of at most one character come from the interner, like a host's
/// single-character cache; longer pieces are fresh allocations.
fn piece(content: &str) -> Result<Arc<TaintedStr>> {
    if content.chars().nth(1).is_none() {
        Interner::global().intern(content)
    } else {
        Ok(Arc::new(TaintedStr::new(content)))
    }
}

fn empty_separator() -> TaintError {
    TaintError::InvalidArgument("empty separator".to_string())
}

impl TaintedStr {
    /// Mark as coming from a taint source
    ///
    /// A clean string becomes tracked with no merits; a tracked one keeps
    /// its merits.
    pub fn tainted(&self) -> Result<TaintedStr> {
        let taint = match self.taint() {
            Taint::Clean => Taint::empty(),
            other => other.clone(),
        };
        self.duplicate_with(taint)
    }

    /// Copy vouched for by `merit`
    pub fn clean_for(&self, merit: &Merit) -> Result<TaintedStr> {
        self.duplicate_with(self.taint().with_merit(merit))
    }

    /// Copy carrying `other`'s label set
    pub fn with_taint_of(&self, other: &TaintedStr) -> Result<TaintedStr> {
        self.duplicate_with(other.taint().clone())
    }

    /// `self` followed by `other`
    pub fn concat(&self, other: &TaintedStr) -> Result<TaintedStr> {
        let taint = combine(self.taint(), other.taint())?;
        let mut content = String::with_capacity(self.len() + other.len());
        content.push_str(self.as_str());
        content.push_str(other.as_str());
        Ok(derived(content, taint))
    }

    /// Content repeated `n` times
    pub fn repeat(&self, n: usize) -> TaintedStr {
        derived(self.as_str().repeat(n), self.taint().clone())
    }

    /// Characters `start..end`, clamped to the string
    pub fn slice(&self, start: usize, end: usize) -> TaintedStr {
        let content = self
            .as_str()
            .chars()
            .skip(start)
            .take(end.saturating_sub(start))
            .collect();
        derived(content, self.taint().clone())
    }

    /// Uppercase copy
    pub fn to_upper(&self) -> TaintedStr {
        derived(self.as_str().to_uppercase(), self.taint().clone())
    }

    /// Lowercase copy
    pub fn to_lower(&self) -> TaintedStr {
        derived(self.as_str().to_lowercase(), self.taint().clone())
    }

    /// Copy without surrounding whitespace
    pub fn strip(&self) -> TaintedStr {
        derived(self.as_str().trim().to_string(), self.taint().clone())
    }

    /// Replace every occurrence of `from` with `to`
    pub fn replace(&self, from: &TaintedStr, to: &TaintedStr) -> Result<TaintedStr> {
        let taint = collect([self.taint(), from.taint(), to.taint()])?;
        Ok(derived(self.as_str().replace(from.as_str(), to.as_str()), taint))
    }

    /// Items joined with `self` as separator
    ///
    /// The separator's label set takes part even when there are no items.
    pub fn join(&self, items: &[&TaintedStr]) -> Result<TaintedStr> {
        let taint = collect(std::iter::once(self.taint()).chain(items.iter().map(|s| s.taint())))?;
        let content = items
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(self.as_str());
        Ok(derived(content, taint))
    }

    /// Split on `sep`, or on whitespace runs when `sep` is `None`
    ///
    /// Every piece carries `combine(self, sep)`. An empty separator is
    /// rejected with `InvalidArgument`.
    pub fn split(&self, sep: Option<&TaintedStr>) -> Result<Vec<Arc<TaintedStr>>> {
        if sep.is_some_and(TaintedStr::is_empty) {
            return Err(empty_separator());
        }
        let clean = Taint::Clean;
        let sep_taint = match sep {
            Some(s) => s.taint(),
            None => &clean,
        };
        let taint = combine(self.taint(), sep_taint)?;

        let raw: Vec<&str> = match sep {
            None => self.as_str().split_whitespace().collect(),
            Some(s) => self.as_str().split(s.as_str()).collect(),
        };
        let mut pieces = raw.into_iter().map(piece).collect::<Result<Vec<_>>>()?;

        taint_in_place(&mut pieces, &taint)?;
        Ok(pieces)
    }

    /// Split around the first occurrence of `sep` into `(head, sep, tail)`
    ///
    /// When `sep` does not occur the result is `(self, "", "")`: the receiver
    /// and interned empty strings are moved into the sequence and copied only
    /// if someone else still holds them. Every element carries
    /// `combine(self, sep)`. An empty separator is rejected with
    /// `InvalidArgument`.
    pub fn partition(self: Arc<Self>, sep: &TaintedStr) -> Result<FixedSeq<TaintedStr>> {
        if sep.is_empty() {
            return Err(empty_separator());
        }
        let taint = combine(self.taint(), sep.taint())?;

        let found = self
            .as_str()
            .split_once(sep.as_str())
            .map(|(head, tail)| (head.to_string(), tail.to_string()));

        let parts: Vec<Arc<TaintedStr>> = match found {
            Some((head, tail)) => vec![
                Arc::new(TaintedStr::new(head)),
                Arc::new(TaintedStr::new(sep.as_str())),
                Arc::new(TaintedStr::new(tail)),
            ],
            None => {
                let empty = Interner::global().intern("")?;
                vec![self, Arc::clone(&empty), empty]
            }
        };

        taint_fixed_sequence(Arc::from(parts), &taint)
    }
}
