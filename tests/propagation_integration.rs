//! Propagation integration tests
//!
//! End-to-end tests exercising the public API: label sets flowing through
//! string derivations, collection tainting with shared values, policies
//! built from configuration, and concurrent use of shared merits.

use a3s_taint::{
    builtin_merits, collect_taint, combine, taint_value, Interner, Merit, MeritRegistry,
    Propagation, Strategy, Taint, TaintConfig, TaintError, TaintedStr, Taintable, Value,
};
use std::sync::Arc;

struct Fixture {
    full: Merit,
    partial: Merit,
    none: Merit,
}

fn fixture() -> Fixture {
    Fixture {
        full: Merit::new("full", Propagation::Full),
        partial: Merit::new("partial", Propagation::Partial),
        none: Merit::new("none", Propagation::None),
    }
}

// ─── Combination ─────────────────────────────────────────────────

#[test]
fn test_combination_scenario() {
    let f = fixture();
    let a = TaintedStr::new("a");
    let b = TaintedStr::new("b");
    assert!(a.concat(&b).unwrap().is_clean());

    let t = a.tainted().unwrap();
    let c = t.concat(&b).unwrap();
    assert!(c.is_tainted());
    assert_eq!(c.merits().unwrap().len(), 0);

    let all = a
        .clean_for(&f.full)
        .unwrap()
        .clean_for(&f.partial)
        .unwrap()
        .clean_for(&f.none)
        .unwrap();

    // One side clean: only Full survives
    let with_clean = all.concat(&b).unwrap();
    assert_eq!(with_clean.taint(), &Taint::from_merits([f.full.clone()]));

    // Both tracked with the same merits: Full and Partial survive
    let both = all.concat(&all).unwrap();
    assert_eq!(
        both.taint(),
        &Taint::from_merits([f.full.clone(), f.partial.clone()])
    );

    // Disjoint merits: nothing survives but the result stays tracked
    let only_partial = t.clean_for(&f.partial).unwrap();
    let only_full = t.clean_for(&f.full).unwrap();
    let disjoint = only_partial.concat(&only_full).unwrap();
    assert_eq!(disjoint.taint(), &Taint::empty());
}

#[test]
fn test_combine_is_order_independent_for_sets() {
    let f = fixture();
    let x = Taint::from_merits([f.full.clone(), f.partial.clone(), f.none.clone()]);
    let y = Taint::from_merits([f.none.clone(), f.partial.clone()]);
    assert_eq!(combine(&x, &y).unwrap(), Taint::from_merits([f.partial.clone()]));
    assert_eq!(combine(&y, &x).unwrap(), Taint::from_merits([f.partial]));
}

#[test]
fn test_invalid_strategy_on_shared_merit() {
    let bad = Merit::from_parts("bad", Some(Strategy::custom("Sometimes")));
    let x = Taint::from_merits([bad.clone()]);
    let err = combine(&x, &x).unwrap_err();
    assert!(matches!(err, TaintError::InvalidPropagationStrategy(ref name) if name == "bad"));

    // Not shared, so never classified
    let f = fixture();
    let y = Taint::from_merits([f.full.clone()]);
    assert_eq!(combine(&x, &y).unwrap(), Taint::empty());
}

// ─── String Derivations ──────────────────────────────────────────

#[test]
fn test_unary_derivations_keep_label_set() {
    let f = fixture();
    let s = TaintedStr::new("  Hello  ")
        .tainted()
        .unwrap()
        .clean_for(&f.none)
        .unwrap();
    for derived in [s.to_upper(), s.to_lower(), s.strip(), s.repeat(2), s.slice(2, 4)] {
        assert_eq!(derived.taint(), s.taint());
    }
    assert_eq!(s.strip().as_str(), "Hello");
}

#[test]
fn test_split_and_join() {
    let f = fixture();
    let line = TaintedStr::new("a,bc,d")
        .tainted()
        .unwrap()
        .clean_for(&f.full)
        .unwrap();
    let comma = TaintedStr::new(",");

    let pieces = line.split(Some(&comma)).unwrap();
    assert_eq!(pieces.len(), 3);
    for piece in &pieces {
        assert_eq!(piece.taint(), &Taint::from_merits([f.full.clone()]));
    }

    // Single-character pieces were copied, not the interned originals
    assert!(Interner::global().intern("a").unwrap().is_clean());

    let refs: Vec<&TaintedStr> = pieces.iter().map(|p| p.as_ref()).collect();
    let rejoined = comma.join(&refs).unwrap();
    assert_eq!(rejoined.as_str(), "a,bc,d");
    assert_eq!(rejoined.taint(), &Taint::from_merits([f.full]));
}

#[test]
fn test_partition_not_found_aliases_receiver() {
    let f = fixture();
    let s = Arc::new(
        TaintedStr::new("abc")
            .tainted()
            .unwrap()
            .clean_for(&f.full)
            .unwrap(),
    );
    let held = Arc::clone(&s);

    let parts = s.partition(&TaintedStr::new("/")).unwrap();

    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0].as_str(), "abc");
    assert_eq!(parts[1].as_str(), "");
    assert!(parts.iter().all(|p| p.taint() == &Taint::from_merits([f.full.clone()])));
    assert!(Interner::global().intern("").unwrap().is_clean());
    // The other holder keeps its own copy
    assert!(!Arc::ptr_eq(&parts[0], &held));
    assert_eq!(held.taint(), &Taint::from_merits([f.full]));
}

// ─── Values ──────────────────────────────────────────────────────

#[test]
fn test_value_tainting_and_collection() {
    let f = fixture();
    let label = Taint::from_merits([f.full.clone(), f.partial.clone()]);
    let args = taint_value(
        Value::List(vec![Value::from("x"), Value::from("y"), Value::Int(1)]),
        &label,
    )
    .unwrap();
    let Value::List(items) = args else {
        panic!("expected list");
    };

    assert_eq!(collect_taint(&items[..2]).unwrap(), label);
    assert_eq!(
        collect_taint(&items).unwrap(),
        Taint::from_merits([f.full])
    );
}

// ─── Policy ──────────────────────────────────────────────────────

#[test]
fn test_policy_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taint.json");
    std::fs::write(
        &path,
        r#"{
            "merits": [{ "name": "path", "propagation": "full" }],
            "sources": ["os.environ.get"],
            "cleaners": [
                { "merit": "path", "functions": ["os.path.basename"] },
                { "merit": "shell", "functions": ["shlex.quote"] }
            ],
            "sinks": [
                { "merit": "shell", "functions": ["os.system"] },
                { "merit": "path", "functions": ["open"] }
            ]
        }"#,
    )
    .unwrap();

    let policy = TaintConfig::from_file(&path).unwrap().build().unwrap();

    let env = policy
        .on_return("os.environ.get", Value::from("../etc/passwd"))
        .unwrap();
    assert!(policy.on_call("open", &[env.clone()]).is_err());

    let base = policy.on_return("os.path.basename", env.clone()).unwrap();
    policy.on_call("open", &[base.clone()]).unwrap();

    // A full merit survives mixing with a clean literal
    let base_str = base.as_str().unwrap();
    let joined = TaintedStr::new("/tmp/").concat(base_str).unwrap();
    policy.on_call("open", &[Value::from(joined)]).unwrap();

    let quoted = policy.on_return("shlex.quote", env).unwrap();
    policy.on_call("os.system", &[quoted.clone()]).unwrap();

    // Shell is a None merit: lost as soon as the value is combined
    let cmd = TaintedStr::new("cat ").concat(quoted.as_str().unwrap()).unwrap();
    let err = policy.on_call("os.system", &[Value::from(cmd)]).unwrap_err();
    assert!(matches!(err, TaintError::MissingMerit { ref merit, .. } if merit == "shell"));
}

#[test]
fn test_propagators_and_complex_sinks_from_config() {
    let policy = TaintConfig::from_json(
        r#"{
            "sources": ["req.body"],
            "propagators": ["toplevel_propagator"],
            "sinks": [
                { "complex_sink": { "args": [{ "a": "xss" }, "b"],
                                    "kwargs": [{ "d": ["xss", "sqli"] }] } }
            ]
        }"#,
    )
    .unwrap()
    .build()
    .unwrap();

    let body = policy.on_return("req.body", Value::from("<p>")).unwrap();
    let derived = policy
        .on_propagate("toplevel_propagator", &[body], Value::from("abc"))
        .unwrap();
    assert!(derived.as_str().unwrap().is_tainted());

    // The propagated label set reaches the complex sink's first argument
    let err = policy
        .on_call("complex_sink", &[derived.clone(), Value::from("b")])
        .unwrap_err();
    assert!(matches!(err, TaintError::MissingMerit { ref merit, .. } if merit == "xss"));

    // `b` carries no requirement
    policy
        .on_call("complex_sink", &[Value::from("a"), derived.clone()])
        .unwrap();

    let mut kwargs = std::collections::BTreeMap::new();
    kwargs.insert("d".to_string(), derived);
    assert!(policy
        .on_call_with_kwargs("complex_sink", &[], &kwargs)
        .is_err());
}

// ─── Concurrency ─────────────────────────────────────────────────

#[test]
fn test_concurrent_combination_with_shared_merits() {
    let sqli = builtin_merits().get("sqli").unwrap().unwrap();
    let full = Merit::new("full", Propagation::Full);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let sqli = sqli.clone();
            let full = full.clone();
            std::thread::spawn(move || {
                let s = TaintedStr::new(format!("value-{}", i))
                    .tainted()
                    .unwrap()
                    .clean_for(&sqli)
                    .unwrap()
                    .clean_for(&full)
                    .unwrap();
                let mut acc = s.concat(&s).unwrap();
                for _ in 0..100 {
                    acc = acc.concat(&TaintedStr::new("x")).unwrap();
                }
                acc
            })
        })
        .collect();

    for handle in handles {
        let out = handle.join().unwrap();
        assert_eq!(out.taint(), &Taint::from_merits([full.clone()]));
    }
    assert!(builtin_merits().get("sqli").unwrap().unwrap().is_same(&sqli));
}
