//! Taint policy configuration
//!
//! A `TaintConfig` is a JSON document naming the merits in play and the host
//! functions that act as sources, cleaners, sinks, and propagators:
//!
//! ```json
//! {
//!   "merits": [{ "name": "html", "propagation": "partial" }],
//!   "sources": ["http.request.body"],
//!   "cleaners": [{ "merit": "html", "functions": ["html.escape"] }],
//!   "sinks": [
//!     { "merit": "sqli", "functions": ["db.execute"] },
//!     { "template.render": { "args": [{ "body": "html" }, "name"],
//!                            "kwargs": [{ "title": ["html", "xss"] }] } }
//!   ],
//!   "propagators": ["text.wrap"]
//! }
//! ```
//!
//! A sink entry is either a merit group, where every argument needs the
//! merit, or a complex sink mapping one function to per-argument merits.
//! Merit references may name a merit declared in the document or one of the
//! builtin merits (`secret`, `pickle`, `shell`, `xss`, `sqli`).

use crate::error::{Result, TaintError};
use crate::guard::{ArgumentCheck, Cleaner, Sink};
use crate::merit::{Merit, Propagation};
use crate::policy::Policy;
use crate::registry::{builtin_merits, MeritRegistry, MemoryMeritRegistry};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// A merit declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeritConfig {
    pub name: String,
    #[serde(default)]
    pub propagation: Propagation,
}

/// Host functions bound to one merit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionGroup {
    pub merit: String,
    #[serde(default)]
    pub functions: Vec<String>,
}

/// One entry of the `sinks` list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SinkEntry {
    /// Every argument of every listed function needs the merit
    Group(FunctionGroup),
    /// `{ "function": { "args": [..], "kwargs": [..] } }`, checked by
    /// [`SinkEntry::parse_complex`]
    Complex(BTreeMap<String, serde_json::Value>),
}

/// Merit names required for one argument of a complex sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentSpec {
    pub name: String,
    pub merits: Vec<String>,
}

/// A complex sink with its per-argument requirements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexSinkSpec {
    pub function: String,
    pub args: Vec<ArgumentSpec>,
    pub kwargs: Vec<ArgumentSpec>,
}

/// Top-level taint configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaintConfig {
    #[serde(default)]
    pub merits: Vec<MeritConfig>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub cleaners: Vec<FunctionGroup>,
    #[serde(default)]
    pub sinks: Vec<SinkEntry>,
    /// Functions whose result carries the combined label set of their
    /// arguments
    #[serde(default)]
    pub propagators: Vec<String>,
    /// Fields this version does not understand
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Result of validating a configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// Whether no errors were found
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_function_path(s: &str) -> bool {
    s.split('.').all(is_identifier)
}

fn parse_merit_names(merits: &serde_json::Value) -> Option<Vec<String>> {
    match merits {
        serde_json::Value::String(m) if is_identifier(m) => Some(vec![m.clone()]),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|m| match m {
                serde_json::Value::String(m) if is_identifier(m) => Some(m.clone()),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

fn parse_argument(
    arg: &serde_json::Value,
    sink: &str,
    report: &mut ValidationReport,
) -> Option<ArgumentSpec> {
    match arg {
        serde_json::Value::String(name) if is_identifier(name) => Some(ArgumentSpec {
            name: name.clone(),
            merits: Vec::new(),
        }),
        serde_json::Value::Object(map) if map.len() == 1 => {
            let (name, merits) = map.iter().next()?;
            match parse_merit_names(merits) {
                Some(merits) => Some(ArgumentSpec {
                    name: name.clone(),
                    merits,
                }),
                None => {
                    report.errors.push(format!(
                        "Malformed merits {} for argument {} in complex sink {}.",
                        merits, name, sink
                    ));
                    None
                }
            }
        }
        _ => {
            report.errors.push(format!(
                "Malformed (keyword or positional) argument {} in complex sink {}.",
                arg, sink
            ));
            None
        }
    }
}

fn parse_arguments(
    specs: &serde_json::Map<String, serde_json::Value>,
    key: &str,
    sink: &str,
    report: &mut ValidationReport,
) -> Option<Vec<ArgumentSpec>> {
    match specs.get(key) {
        None => Some(Vec::new()),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|arg| parse_argument(arg, sink, report))
            .collect(),
        Some(_) => {
            report.errors.push(format!(
                "Malformed {} (expected list) for complex sink {}.",
                key, sink
            ));
            None
        }
    }
}

impl SinkEntry {
    /// Parse a complex sink entry, reporting every problem found
    ///
    /// Returns `None` for merit groups and for malformed entries; a malformed
    /// entry also adds an "Unexpected object in sinks" error.
    pub fn parse_complex(&self, report: &mut ValidationReport) -> Option<ComplexSinkSpec> {
        let SinkEntry::Complex(entry) = self else {
            return None;
        };
        let spec = Self::parse_complex_entry(entry, report);
        if spec.is_none() {
            report.errors.push(format!(
                "Unexpected object in sinks: {}.",
                serde_json::to_string(entry).unwrap_or_default()
            ));
        }
        spec
    }

    fn parse_complex_entry(
        entry: &BTreeMap<String, serde_json::Value>,
        report: &mut ValidationReport,
    ) -> Option<ComplexSinkSpec> {
        if entry.len() != 1 {
            return None;
        }
        let (function, specs) = entry.iter().next()?;
        let specs = specs.as_object()?;

        for key in specs.keys() {
            if key != "args" && key != "kwargs" {
                report
                    .warnings
                    .push(format!("Unexpected key in {}: {}.", function, key));
            }
        }

        let args = parse_arguments(specs, "args", function, report)?;
        let kwargs = parse_arguments(specs, "kwargs", function, report)?;
        Some(ComplexSinkSpec {
            function: function.clone(),
            args,
            kwargs,
        })
    }
}

impl TaintConfig {
    /// Parse a configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            TaintError::Config(format!(
                "Failed to read taint config {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_str(&json).map_err(|e| {
            TaintError::Config(format!(
                "Failed to parse taint config {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Check names and references without building anything
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        for key in self.extra.keys() {
            report
                .warnings
                .push(format!("Unknown configuration field '{}'", key));
        }

        let mut declared = HashSet::new();
        for merit in &self.merits {
            if !is_identifier(&merit.name) {
                report
                    .errors
                    .push(format!("Invalid merit name '{}'", merit.name));
            }
            if !declared.insert(merit.name.as_str()) {
                report
                    .errors
                    .push(format!("Merit '{}' declared more than once", merit.name));
            }
        }

        let builtins = builtin_merits();
        let known = |name: &str| -> bool {
            declared.contains(name) || matches!(builtins.get(name), Ok(Some(_)))
        };

        for (kind, functions) in [("source", &self.sources), ("propagator", &self.propagators)] {
            for function in functions {
                if !is_function_path(function) {
                    report
                        .errors
                        .push(format!("Invalid {} function '{}'", kind, function));
                }
            }
        }

        for group in &self.cleaners {
            check_group("cleaner", group, &known, &mut report);
        }

        let mut sink_functions: HashSet<&str> = HashSet::new();
        let mut complex_functions: HashSet<String> = HashSet::new();
        for entry in &self.sinks {
            match entry {
                SinkEntry::Group(group) => {
                    check_group("sink", group, &known, &mut report);
                    sink_functions.extend(group.functions.iter().map(String::as_str));
                }
                SinkEntry::Complex(_) => {
                    let Some(spec) = entry.parse_complex(&mut report) else {
                        continue;
                    };
                    if !is_function_path(&spec.function) {
                        report
                            .errors
                            .push(format!("Invalid sink function '{}'", spec.function));
                    }
                    for arg in spec.args.iter().chain(&spec.kwargs) {
                        for merit in &arg.merits {
                            if !known(merit) {
                                report.errors.push(format!(
                                    "complex sink {} references unknown merit '{}'",
                                    spec.function, merit
                                ));
                            }
                        }
                    }
                    if !complex_functions.insert(spec.function.clone()) {
                        report.warnings.push(format!(
                            "Complex sink {} declared more than once; the last one wins",
                            spec.function
                        ));
                    }
                }
            }
        }

        for function in &self.sources {
            if sink_functions.contains(function.as_str()) || complex_functions.contains(function) {
                report.warnings.push(format!(
                    "Function '{}' is both a source and a sink",
                    function
                ));
            }
        }

        report
    }

    /// Validate and build a `Policy`
    ///
    /// Warnings are logged; any error fails the build.
    pub fn build(&self) -> Result<Policy> {
        let report = self.validate();
        for warning in &report.warnings {
            tracing::warn!(warning = %warning, "Taint config warning");
        }
        if !report.is_ok() {
            return Err(TaintError::Config(report.errors.join("; ")));
        }

        let registry = MemoryMeritRegistry::new();
        let builtins = builtin_merits();
        for name in builtins.list_names()? {
            if let Some(merit) = builtins.get(&name)? {
                registry.insert(merit)?;
            }
        }
        for merit in &self.merits {
            registry.register(&merit.name, merit.propagation)?;
        }

        let lookup = |name: &str| -> Result<Merit> {
            registry
                .get(name)?
                .ok_or_else(|| TaintError::Config(format!("Unknown merit '{}'", name)))
        };
        let checks = |specs: &[ArgumentSpec]| -> Result<Vec<ArgumentCheck>> {
            specs
                .iter()
                .map(|spec| {
                    let merits = spec
                        .merits
                        .iter()
                        .map(|m| lookup(m.as_str()))
                        .collect::<Result<Vec<_>>>()?;
                    Ok(ArgumentCheck::new(spec.name.clone(), merits))
                })
                .collect()
        };

        let mut cleaners: HashMap<String, Vec<Cleaner>> = HashMap::new();
        for group in &self.cleaners {
            let merit = lookup(group.merit.as_str())?;
            for function in &group.functions {
                cleaners
                    .entry(function.clone())
                    .or_default()
                    .push(Cleaner::new(merit.clone()));
            }
        }

        let mut sinks: HashMap<String, Sink> = HashMap::new();
        for entry in &self.sinks {
            match entry {
                SinkEntry::Group(group) => {
                    let merit = lookup(group.merit.as_str())?;
                    for function in &group.functions {
                        sinks
                            .entry(function.clone())
                            .or_insert_with(|| Sink::new(function.clone(), Vec::new()))
                            .require(merit.clone());
                    }
                }
                SinkEntry::Complex(_) => {
                    let spec = entry
                        .parse_complex(&mut ValidationReport::default())
                        .ok_or_else(|| TaintError::Config("Malformed complex sink".to_string()))?;
                    let positional = checks(&spec.args)?;
                    let keyword = checks(&spec.kwargs)?;
                    sinks
                        .entry(spec.function.clone())
                        .or_insert_with(|| Sink::new(spec.function.clone(), Vec::new()))
                        .set_arguments(positional, keyword);
                }
            }
        }

        let sources = self.sources.iter().cloned().collect();
        let propagators = self.propagators.iter().cloned().collect();

        tracing::debug!(
            merits = self.merits.len(),
            sources = self.sources.len(),
            cleaners = cleaners.len(),
            sinks = sinks.len(),
            propagators = self.propagators.len(),
            "Taint policy loaded"
        );
        Ok(Policy::new(registry, sources, cleaners, sinks, propagators))
    }
}

fn check_group(
    kind: &str,
    group: &FunctionGroup,
    known: &dyn Fn(&str) -> bool,
    report: &mut ValidationReport,
) {
    if !known(&group.merit) {
        report.errors.push(format!(
            "{} group references unknown merit '{}'",
            kind, group.merit
        ));
    }
    if group.functions.is_empty() {
        report.warnings.push(format!(
            "{} group for merit '{}' lists no functions",
            kind, group.merit
        ));
    }
    for function in &group.functions {
        if !is_function_path(function) {
            report
                .errors
                .push(format!("Invalid {} function '{}'", kind, function));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "merits": [{ "name": "html", "propagation": "partial" }],
        "sources": ["http.request.body"],
        "cleaners": [{ "merit": "html", "functions": ["html.escape"] }],
        "sinks": [{ "merit": "sqli", "functions": ["db.execute"] }]
    }"#;

    #[test]
    fn test_parse_sample() {
        let config = TaintConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.merits.len(), 1);
        assert_eq!(config.merits[0].propagation, Propagation::Partial);
        assert_eq!(config.sources, vec!["http.request.body"]);
        assert!(config.extra.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_propagation_is_none() {
        let config = TaintConfig::from_json(r#"{"merits": [{"name": "m"}]}"#).unwrap();
        assert_eq!(config.merits[0].propagation, Propagation::None);
    }

    #[test]
    fn test_unknown_field_warns() {
        let config = TaintConfig::from_json(r#"{"sourcez": ["a"]}"#).unwrap();
        let report = config.validate();
        assert!(report.is_ok());
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("sourcez"));
    }

    #[test]
    fn test_propagators_field() {
        let config = TaintConfig::from_json(
            r#"{"sources": ["req.body"], "propagators": ["toplevel_propagator", "bad..name"]}"#,
        )
        .unwrap();
        assert_eq!(config.propagators.len(), 2);
        assert!(config.extra.is_empty());

        let report = config.validate();
        assert!(report.warnings.is_empty());
        assert_eq!(
            report.errors,
            vec!["Invalid propagator function 'bad..name'".to_string()]
        );
    }

    #[test]
    fn test_invalid_propagation_rejected() {
        let err = TaintConfig::from_json(r#"{"merits": [{"name": "m", "propagation": "some"}]}"#)
            .unwrap_err();
        assert!(matches!(err, TaintError::Serialization(_)));
    }

    #[test]
    fn test_validate_errors() {
        let config = TaintConfig::from_json(
            r#"{
                "merits": [{"name": "a"}, {"name": "a"}, {"name": "1bad"}],
                "sources": ["ok.name", "bad..name"],
                "sinks": [{"merit": "nope", "functions": ["db.run"]}]
            }"#,
        )
        .unwrap();
        let report = config.validate();
        assert_eq!(report.errors.len(), 4, "{:?}", report.errors);
    }

    #[test]
    fn test_validate_warnings() {
        let config = TaintConfig::from_json(
            r#"{
                "sources": ["io.read"],
                "cleaners": [{"merit": "xss", "functions": []}],
                "sinks": [{"merit": "shell", "functions": ["io.read"]}]
            }"#,
        )
        .unwrap();
        let report = config.validate();
        assert!(report.is_ok());
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn test_complex_sink_parses() {
        let config = TaintConfig::from_json(
            r#"{"sinks": [{"complex_sink": {"args": [{"a": "xss"}, "b"],
                                            "kwargs": [{"d": ["xss", "sqli"]}]}}]}"#,
        )
        .unwrap();
        let mut report = ValidationReport::default();
        let spec = config.sinks[0].parse_complex(&mut report).unwrap();

        assert!(report.errors.is_empty());
        assert_eq!(spec.function, "complex_sink");
        assert_eq!(
            spec.args,
            vec![
                ArgumentSpec {
                    name: "a".to_string(),
                    merits: vec!["xss".to_string()],
                },
                ArgumentSpec {
                    name: "b".to_string(),
                    merits: Vec::new(),
                },
            ]
        );
        assert_eq!(spec.kwargs[0].merits, vec!["xss", "sqli"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_complex_sink_validation_messages() {
        let config = TaintConfig::from_json(
            r#"{"sinks": [
                {"complex_sink_2": {"args": [], "foobar": 1}},
                {"complex_sink_3": {"args": "zxcv"}},
                {"complex_sink_4": {"kwargs": "zxcv"}},
                {"complex_sink_5": {"kwargs": [["qwer"]]}},
                {"complex_sink_6": {"kwargs": [{}]}},
                {"complex_sink_7": {"kwargs": [{"aaa": 1234}]}},
                {"complex_sink_8": {"kwargs": [{"bbb": [5]}]}},
                {"complex_sink_9": {"args": [{"c": "nope"}]}}
            ]}"#,
        )
        .unwrap();
        let report = config.validate();

        assert_eq!(
            report.warnings,
            vec!["Unexpected key in complex_sink_2: foobar.".to_string()]
        );
        let expected = [
            "Malformed args (expected list) for complex sink complex_sink_3.",
            r#"Unexpected object in sinks: {"complex_sink_3":{"args":"zxcv"}}."#,
            "Malformed kwargs (expected list) for complex sink complex_sink_4.",
            r#"Malformed (keyword or positional) argument ["qwer"] in complex sink complex_sink_5."#,
            "Malformed (keyword or positional) argument {} in complex sink complex_sink_6.",
            "Malformed merits 1234 for argument aaa in complex sink complex_sink_7.",
            "Malformed merits [5] for argument bbb in complex sink complex_sink_8.",
            "complex sink complex_sink_9 references unknown merit 'nope'",
        ];
        for message in expected {
            assert!(
                report.errors.iter().any(|e| e == message),
                "missing {:?} in {:?}",
                message,
                report.errors
            );
        }
        // One "Unexpected object" per malformed entry
        let unexpected = report
            .errors
            .iter()
            .filter(|e| e.starts_with("Unexpected object in sinks"))
            .count();
        assert_eq!(unexpected, 6);
    }

    #[test]
    fn test_complex_sink_with_extra_keys_is_unexpected() {
        let config = TaintConfig::from_json(r#"{"sinks": [{"f": {}, "g": {}}]}"#).unwrap();
        let report = config.validate();
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("Unexpected object in sinks"));
    }

    #[test]
    fn test_build_rejects_invalid() {
        let config = TaintConfig::from_json(r#"{"sinks": [{"merit": "nope", "functions": ["f"]}]}"#)
            .unwrap();
        assert!(matches!(config.build(), Err(TaintError::Config(_))));
    }

    #[test]
    fn test_build_conflicting_builtin_policy() {
        let config =
            TaintConfig::from_json(r#"{"merits": [{"name": "xss", "propagation": "full"}]}"#)
                .unwrap();
        assert!(matches!(config.build(), Err(TaintError::Config(_))));
    }

    #[test]
    fn test_build_uses_builtin_instances() {
        let policy = TaintConfig::from_json(SAMPLE).unwrap().build().unwrap();
        let sqli = policy.merit("sqli").unwrap().unwrap();
        let builtin = builtin_merits().get("sqli").unwrap().unwrap();
        assert!(sqli.is_same(&builtin));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = TaintConfig::from_file(file.path()).unwrap();
        assert_eq!(
            config.sinks[0],
            SinkEntry::Group(FunctionGroup {
                merit: "sqli".to_string(),
                functions: vec!["db.execute".to_string()],
            })
        );
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = TaintConfig::from_file(dir.path().join("taint.json")).unwrap_err();
        assert!(matches!(err, TaintError::Config(_)));
    }

    #[test]
    fn test_from_file_malformed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        let err = TaintConfig::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
