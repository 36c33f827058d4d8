//! Dynamic host values
//!
//! `Value` models the values a host hands to guards and policies: scalars,
//! strings (the only taintable kind), and the builtin collections that
//! contain them. Collections are walked recursively; for maps only the
//! values are visited, never the keys.

use crate::adapter::assign_shared;
use crate::error::Result;
use crate::host::{TaintedStr, Taintable};
use crate::propagation;
use crate::taint::Taint;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A host value
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<TaintedStr>),
    List(Vec<Value>),
    Tuple(Arc<[Value]>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Host type name
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Map(_) => "dict",
        }
    }

    /// Borrow the string, if this is one
    pub fn as_str(&self) -> Option<&TaintedStr> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Rebuild the value with every contained string passed through `f`
    pub fn map_strings<F>(self, f: &mut F) -> Result<Value>
    where
        F: FnMut(Arc<TaintedStr>) -> Result<Arc<TaintedStr>>,
    {
        Ok(match self {
            Value::Str(s) => Value::Str(f(s)?),
            Value::List(items) => {
                let mut rebuilt = Vec::with_capacity(items.len());
                for item in items {
                    rebuilt.push(item.map_strings(&mut *f)?);
                }
                Value::List(rebuilt)
            }
            Value::Tuple(items) => {
                let mut rebuilt = Vec::with_capacity(items.len());
                for item in items.iter() {
                    rebuilt.push(item.clone().map_strings(&mut *f)?);
                }
                Value::Tuple(Arc::from(rebuilt))
            }
            Value::Map(entries) => {
                let mut rebuilt = BTreeMap::new();
                for (key, item) in entries {
                    rebuilt.insert(key, item.map_strings(&mut *f)?);
                }
                Value::Map(rebuilt)
            }
            scalar => scalar,
        })
    }

    /// Visit every contained string, stopping at the first error
    pub fn visit_strings<F>(&self, f: &mut F) -> Result<()>
    where
        F: FnMut(&TaintedStr) -> Result<()>,
    {
        match self {
            Value::Str(s) => f(s),
            Value::List(items) => items.iter().try_for_each(|v| v.visit_strings(&mut *f)),
            Value::Tuple(items) => items.iter().try_for_each(|v| v.visit_strings(&mut *f)),
            Value::Map(entries) => entries
                .values()
                .try_for_each(|v| v.visit_strings(&mut *f)),
            _ => Ok(()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::new(TaintedStr::new(s)))
    }
}

impl From<TaintedStr> for Value {
    fn from(s: TaintedStr) -> Self {
        Value::Str(Arc::new(s))
    }
}

impl From<Arc<TaintedStr>> for Value {
    fn from(s: Arc<TaintedStr>) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// Stamp `taint` onto every string inside `value`
///
/// A clean `taint` returns the value unchanged. Non-taintable scalars pass
/// through as they are.
pub fn taint_value(value: Value, taint: &Taint) -> Result<Value> {
    if taint.is_clean() {
        return Ok(value);
    }
    value.map_strings(&mut |s| assign_shared(s, taint))
}

/// Combined label set of the taintable values in `args`
///
/// Values that cannot carry a label set count as clean.
pub fn collect_taint(args: &[Value]) -> Result<Taint> {
    let clean = Taint::Clean;
    propagation::collect(args.iter().map(|v| match v {
        Value::Str(s) => s.taint(),
        _ => &clean,
    }))
}
