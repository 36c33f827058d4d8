//! Propagation engine: label set of a derived value
//!
//! `combine` decides which merits survive when a value is derived from two
//! operands:
//!
//! - both clean: the result is clean
//! - both tracked: merits present on both sides survive if their policy is
//!   `Full` or `Partial`
//! - one clean: merits of the tracked side survive only if `Full`
//!
//! A tracked operand always yields a tracked result, even when no merit
//! survives.

use crate::error::{Result, TaintError};
use crate::merit::{Merit, Propagation};
use crate::taint::{Merits, Taint};

fn policy_of(merit: &Merit) -> Result<Propagation> {
    merit
        .propagation()
        .ok_or_else(|| TaintError::InvalidPropagationStrategy(merit.name().to_string()))
}

/// Label set of a value derived from operands labeled `a` and `b`
///
/// When both sides are tracked the scan runs over `a`, so surviving merits
/// keep `a`'s order (including any duplicates `a` carries).
pub fn combine(a: &Taint, b: &Taint) -> Result<Taint> {
    match (a, b) {
        (Taint::Clean, Taint::Clean) => Ok(Taint::Clean),
        (Taint::Tainted(ma), Taint::Tainted(mb)) => intersect(ma, mb),
        (Taint::Tainted(src), Taint::Clean) | (Taint::Clean, Taint::Tainted(src)) => {
            keep_full(src)
        }
    }
}

fn intersect(ma: &Merits, mb: &Merits) -> Result<Taint> {
    let mut kept = Vec::with_capacity(ma.len().max(mb.len()));
    for m in ma {
        if !mb.contains(m) {
            continue;
        }
        match policy_of(m)? {
            Propagation::Full | Propagation::Partial => kept.push(m.clone()),
            Propagation::None => {}
        }
    }
    Ok(Taint::Tainted(Merits::from(kept)))
}

fn keep_full(src: &Merits) -> Result<Taint> {
    let mut kept = Vec::with_capacity(src.len());
    for m in src {
        match policy_of(m)? {
            Propagation::Full => kept.push(m.clone()),
            Propagation::Partial | Propagation::None => {}
        }
    }
    Ok(Taint::Tainted(Merits::from(kept)))
}

/// Replace `target` with `combine(target, source)`
///
/// On error `target` is left as it was.
pub fn propagate_to(target: &mut Taint, source: &Taint) -> Result<()> {
    let result = combine(target, source)?;
    *target = result;
    Ok(())
}

/// Fold `combine` across any number of label sets
///
/// An empty input is clean; a single input is returned unchanged.
pub fn collect<'a, I>(taints: I) -> Result<Taint>
where
    I: IntoIterator<Item = &'a Taint>,
{
    let mut iter = taints.into_iter();
    let mut acc = match iter.next() {
        Some(first) => first.clone(),
        None => return Ok(Taint::Clean),
    };
    for t in iter {
        propagate_to(&mut acc, t)?;
    }
    Ok(acc)
}
