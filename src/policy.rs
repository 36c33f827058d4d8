//! Runtime taint policy
//!
//! A `Policy` answers, for a host function name, whether the function is a
//! source or a propagator, which cleaners apply to its results, and which
//! merits its arguments must carry. Build one from a
//! [`TaintConfig`](crate::config::TaintConfig).

use crate::error::Result;
use crate::guard::{self, Cleaner, Sink};
use crate::merit::Merit;
use crate::registry::{MeritRegistry, MemoryMeritRegistry};
use crate::value::{collect_taint, taint_value, Value};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Sources, cleaners, sinks, and propagators keyed by function name
pub struct Policy {
    registry: MemoryMeritRegistry,
    sources: HashSet<String>,
    cleaners: HashMap<String, Vec<Cleaner>>,
    sinks: HashMap<String, Sink>,
    propagators: HashSet<String>,
}

impl Policy {
    pub(crate) fn new(
        registry: MemoryMeritRegistry,
        sources: HashSet<String>,
        cleaners: HashMap<String, Vec<Cleaner>>,
        sinks: HashMap<String, Sink>,
        propagators: HashSet<String>,
    ) -> Self {
        Self {
            registry,
            sources,
            cleaners,
            sinks,
            propagators,
        }
    }

    /// Canonical merit registered under `name`
    pub fn merit(&self, name: &str) -> Result<Option<Merit>> {
        self.registry.get(name)
    }

    /// Merit registry backing this policy
    pub fn registry(&self) -> &dyn MeritRegistry {
        &self.registry
    }

    /// Whether `function`'s results are tracked
    pub fn is_source(&self, function: &str) -> bool {
        self.sources.contains(function)
    }

    /// Whether `function`'s result inherits its arguments' label sets
    pub fn is_propagator(&self, function: &str) -> bool {
        self.propagators.contains(function)
    }

    /// Cleaners applied to `function`'s results, in declaration order
    pub fn cleaners(&self, function: &str) -> &[Cleaner] {
        self.cleaners
            .get(function)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Sink registered for `function`
    pub fn sink(&self, function: &str) -> Option<&Sink> {
        self.sinks.get(function)
    }

    /// Check the arguments of a call to `function`
    ///
    /// Functions that are not sinks accept anything.
    pub fn on_call(&self, function: &str, args: &[Value]) -> Result<()> {
        self.on_call_with_kwargs(function, args, &BTreeMap::new())
    }

    /// Check a call to `function` with keyword arguments
    pub fn on_call_with_kwargs(
        &self,
        function: &str,
        args: &[Value],
        kwargs: &BTreeMap<String, Value>,
    ) -> Result<()> {
        match self.sinks.get(function) {
            Some(sink) => sink.check_call(args, kwargs),
            None => Ok(()),
        }
    }

    /// Stamp the combined label set of `args` onto `result`
    ///
    /// Only applies to propagators; other functions get `result` back
    /// unchanged. Pass keyword argument values along with `args`.
    pub fn on_propagate(&self, function: &str, args: &[Value], result: Value) -> Result<Value> {
        if !self.is_propagator(function) {
            return Ok(result);
        }
        taint_value(result, &collect_taint(args)?)
    }

    /// Label the value returned by `function`
    ///
    /// Sources mark their result as tracked first; cleaners then add their
    /// merits in declaration order.
    pub fn on_return(&self, function: &str, value: Value) -> Result<Value> {
        let mut value = if self.is_source(function) {
            guard::source(value)?
        } else {
            value
        };
        for cleaner in self.cleaners(function) {
            value = cleaner.apply(value)?;
        }
        Ok(value)
    }
}

impl std::fmt::Debug for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Policy")
            .field("sources", &self.sources.len())
            .field("cleaners", &self.cleaners.len())
            .field("sinks", &self.sinks.len())
            .field("propagators", &self.propagators.len())
            .finish()
    }
}
