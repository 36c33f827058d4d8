//! Value tainting adapter: stamp a label set onto host values
//!
//! Values are held behind `Arc`. A value is relabeled in place only when the
//! caller holds the sole reference and the host does not mark it canonical;
//! otherwise a duplicate carrying the new label set replaces the reference
//! and the old alias is released untouched.

use crate::error::{Result, TaintError};
use crate::host::Taintable;
use crate::taint::Taint;
use crate::value::Value;
use std::sync::Arc;

/// Immutable fixed-length sequence of shared host values
pub type FixedSeq<T> = Arc<[Arc<T>]>;

/// Set `item`'s label set, copying it first if anyone else can observe it
///
/// Returns `true` when a duplicate was allocated.
fn relabel<T: Taintable>(item: &mut Arc<T>, taint: &Taint) -> Result<bool> {
    if !item.is_canonical() {
        if let Some(value) = Arc::get_mut(item) {
            value.set_taint(taint.clone());
            return Ok(false);
        }
    }
    let copy = item.duplicate_with(taint.clone())?;
    *item = Arc::new(copy);
    Ok(true)
}

/// Stamp `taint` onto a single shared value
pub fn assign_shared<T: Taintable>(mut item: Arc<T>, taint: &Taint) -> Result<Arc<T>> {
    relabel(&mut item, taint)?;
    Ok(item)
}

/// Stamp `taint` onto a host value, failing for non-taintable types
pub fn assign(value: Value, taint: &Taint) -> Result<Value> {
    match value {
        Value::Str(s) => Ok(Value::Str(assign_shared(s, taint)?)),
        other => Err(TaintError::NotTaintable(other.type_name().to_string())),
    }
}

/// Whether the host value can carry a label set
pub fn is_taintable(value: &Value) -> bool {
    matches!(value, Value::Str(_))
}

/// Borrow the label set of a taintable value
pub fn get_labelset(value: &Value) -> Result<&Taint> {
    match value {
        Value::Str(s) => Ok(s.taint()),
        other => Err(TaintError::NotTaintable(other.type_name().to_string())),
    }
}

/// Set every element's label set to `source`
///
/// A clean `source` leaves the collection untouched. Exclusively owned
/// elements are relabeled in place; shared or canonical ones are replaced by
/// duplicates. If a duplication fails, elements already visited keep their
/// new label set.
pub fn taint_in_place<T: Taintable>(items: &mut [Arc<T>], source: &Taint) -> Result<()> {
    if source.is_clean() {
        return Ok(());
    }
    let mut duplicated = 0usize;
    for item in items.iter_mut() {
        if relabel(item, source)? {
            duplicated += 1;
        }
    }
    tracing::trace!(
        items = items.len(),
        duplicated,
        taint = %source,
        "Collection tainted in place"
    );
    Ok(())
}

/// Stamp `source` onto every element of a fixed sequence
///
/// Consumes `seq`. A clean `source` returns it unchanged. When the caller
/// holds the only reference the elements are tainted in place and the same
/// sequence is returned; otherwise a new sequence is built from duplicates,
/// since every element of a shared sequence is visible to its other holders.
pub fn taint_fixed_sequence<T: Taintable>(
    mut seq: FixedSeq<T>,
    source: &Taint,
) -> Result<FixedSeq<T>> {
    if source.is_clean() {
        return Ok(seq);
    }

    if let Some(items) = Arc::get_mut(&mut seq) {
        taint_in_place(items, source)?;
        return Ok(seq);
    }

    let mut fresh: Vec<Arc<T>> = Vec::new();
    fresh.try_reserve_exact(seq.len()).map_err(|e| {
        TaintError::Allocation(format!("sequence of {} items: {}", seq.len(), e))
    })?;
    for item in seq.iter() {
        fresh.push(Arc::new(item.duplicate_with(source.clone())?));
    }
    tracing::trace!(items = fresh.len(), taint = %source, "Shared sequence copied");
    Ok(Arc::from(fresh))
}
