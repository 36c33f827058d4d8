//! Sources, cleaners, and sinks
//!
//! The three roles a host function can play in taint tracking:
//!
//! - **source**: its results are tracked (tainted with no merits)
//! - **cleaner**: its results are vouched for by one merit
//! - **sink**: its arguments must be clean for a set of merits

use crate::adapter::assign_shared;
use crate::error::{Result, TaintError};
use crate::host::Taintable;
use crate::merit::Merit;
use crate::taint::Taint;
use crate::value::Value;
use std::collections::BTreeMap;

/// Mark every string in `value` as tracked
///
/// Clean strings become tracked with no merits; tracked ones keep their
/// merits.
pub fn source(value: Value) -> Result<Value> {
    value.map_strings(&mut |s| {
        if s.is_clean() {
            assign_shared(s, &Taint::empty())
        } else {
            Ok(s)
        }
    })
}

/// Adds a merit to everything a cleaning function returns
#[derive(Debug, Clone)]
pub struct Cleaner {
    merit: Merit,
}

impl Cleaner {
    /// Create a cleaner for `merit`
    pub fn new(merit: Merit) -> Self {
        Self { merit }
    }

    /// The merit this cleaner grants
    pub fn merit(&self) -> &Merit {
        &self.merit
    }

    /// Append the merit to every string in `value`
    pub fn apply(&self, value: Value) -> Result<Value> {
        value.map_strings(&mut |s| {
            let taint = s.taint().with_merit(&self.merit);
            assign_shared(s, &taint)
        })
    }
}

/// Merits required for one named argument of a sink
#[derive(Debug, Clone)]
pub struct ArgumentCheck {
    name: String,
    merits: Vec<Merit>,
}

impl ArgumentCheck {
    pub fn new(name: impl Into<String>, merits: Vec<Merit>) -> Self {
        Self {
            name: name.into(),
            merits,
        }
    }

    /// Argument name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn merits(&self) -> &[Merit] {
        &self.merits
    }
}

/// Rejects arguments lacking required merits
///
/// `merits` apply to every argument. A sink may also carry per-argument
/// checks: the i-th positional check applies to the i-th positional
/// argument, and a keyword argument uses the keyword check of the same name,
/// falling back to a positional check of that name.
#[derive(Debug, Clone)]
pub struct Sink {
    name: String,
    merits: Vec<Merit>,
    positional: Vec<ArgumentCheck>,
    keyword: Vec<ArgumentCheck>,
}

impl Sink {
    /// Create a sink requiring every merit in `merits`
    pub fn new(name: impl Into<String>, merits: Vec<Merit>) -> Self {
        Self {
            name: name.into(),
            merits,
            positional: Vec::new(),
            keyword: Vec::new(),
        }
    }

    /// Replace the per-argument checks
    pub fn set_arguments(&mut self, positional: Vec<ArgumentCheck>, keyword: Vec<ArgumentCheck>) {
        self.positional = positional;
        self.keyword = keyword;
    }

    /// Builder form of [`Sink::set_arguments`]
    pub fn with_arguments(
        mut self,
        positional: Vec<ArgumentCheck>,
        keyword: Vec<ArgumentCheck>,
    ) -> Self {
        self.set_arguments(positional, keyword);
        self
    }

    /// Sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Merits required of every argument
    pub fn merits(&self) -> &[Merit] {
        &self.merits
    }

    pub fn positional(&self) -> &[ArgumentCheck] {
        &self.positional
    }

    pub fn keyword(&self) -> &[ArgumentCheck] {
        &self.keyword
    }

    /// Add another merit required of every argument
    pub fn require(&mut self, merit: Merit) {
        if !self.merits.iter().any(|m| m.is_same(&merit)) {
            self.merits.push(merit);
        }
    }

    /// Check positional arguments only
    pub fn check(&self, args: &[Value]) -> Result<()> {
        self.check_call(args, &BTreeMap::new())
    }

    /// Check every string inside `args` and `kwargs`
    ///
    /// Untracked strings always pass. Tracked strings must carry each
    /// required merit; the first violation is returned as `MissingMerit`.
    pub fn check_call(&self, args: &[Value], kwargs: &BTreeMap<String, Value>) -> Result<()> {
        for (i, arg) in args.iter().enumerate() {
            let extra = self
                .positional
                .get(i)
                .map(ArgumentCheck::merits)
                .unwrap_or_default();
            self.check_value(arg, extra)?;
        }
        for (key, value) in kwargs {
            self.check_value(value, self.keyword_merits(key))?;
        }
        Ok(())
    }

    fn keyword_merits(&self, key: &str) -> &[Merit] {
        self.keyword
            .iter()
            .chain(&self.positional)
            .find(|check| check.name == key)
            .map(ArgumentCheck::merits)
            .unwrap_or_default()
    }

    fn check_value(&self, value: &Value, extra: &[Merit]) -> Result<()> {
        value.visit_strings(&mut |s| {
            for merit in self.merits.iter().chain(extra) {
                if !s.is_clean_for(merit) {
                    tracing::warn!(
                        sink = %self.name,
                        merit = %merit,
                        taint = %s.taint(),
                        "Taint violation"
                    );
                    return Err(TaintError::MissingMerit {
                        value: s.as_str().to_string(),
                        merit: merit.name().to_string(),
                    });
                }
            }
            Ok(())
        })
    }
}
