//! Tests for the capture sanitizer, including the notebook scenario it exists for: a
//! function defined in an interactive host is shipped to a session in another process.

use pretty_assertions::assert_eq;
use replbox::{
    InteractiveHost, NoPrint, ReplSession, Value, decode, decode_mapping, encode, encode_mapping, prepare_variables,
    sanitize::{denylist_filter, is_host_injected, probe_filter},
    sanitize_callable,
};

/// Defines `code` in a host and returns the function bound to `name`.
fn host_function(code: &str, name: &str) -> (InteractiveHost, Value) {
    let mut host = InteractiveHost::new();
    let out = host.run_cell(code);
    assert_eq!(out.error, None);
    let function = host.get(name).unwrap();
    (host, function)
}

fn globals_of(value: &Value) -> Vec<String> {
    let Value::Function(function) = value else { panic!("expected a function") };
    function.globals().borrow().names().map(str::to_owned).collect()
}

// =============================================================================
// 1. Fast path
// =============================================================================

/// Functions defined outside a host come back as the very same object.
#[test]
fn plain_functions_are_untouched() {
    let mut session = ReplSession::default();
    session.run("def f(x):\n    return x", &mut NoPrint).unwrap();
    let f = session.get_variable("f").unwrap();
    assert!(sanitize_callable(&f).is(&f));
}

/// Non-callables pass straight through.
#[test]
fn data_is_untouched() {
    let list = Value::list(vec![Value::Int(1)]);
    assert!(sanitize_callable(&list).is(&list));
    assert_eq!(sanitize_callable(&Value::Int(3)), Value::Int(3));
}

// =============================================================================
// 2. Filtering
// =============================================================================

/// Host names, history registers and host-module objects are dropped; user data stays.
#[test]
fn host_state_is_dropped() {
    let (mut host, f) = host_function("offset = 10\ndef f(x):\n    return x + offset", "f");
    host.run_cell("f(1)");
    let clean = sanitize_callable(&f);
    assert!(!clean.is(&f));

    let names = globals_of(&clean);
    for dropped in ["get_ipython", "exit", "quit", "display", "In", "Out", "_", "_i1", "_i2", "_ih", "_oh", "_dh"] {
        assert!(!names.iter().any(|n| n == dropped), "{dropped} should be dropped: {names:?}");
    }
    assert!(names.iter().any(|n| n == "offset"), "{names:?}");
    assert!(names.iter().any(|n| n == "f"), "{names:?}");
}

/// The original function and its host namespace are never modified.
#[test]
fn original_is_not_mutated() {
    let (host, f) = host_function("def f():\n    return 1", "f");
    let before = globals_of(&f);
    let _ = sanitize_callable(&f);
    assert_eq!(globals_of(&f), before);
    assert!(host.get("get_ipython").is_some());
}

/// Entries that refuse to encode are dropped by the probe even when their names are ordinary.
#[test]
fn probe_drops_process_bound_entries() {
    let (_, f) = host_function("log = open('Cargo.toml')\nlimit = 3\ndef f():\n    return limit", "f");
    let names = globals_of(&sanitize_callable(&f));
    assert!(!names.iter().any(|n| n == "log"), "{names:?}");
    assert!(names.iter().any(|n| n == "limit"), "{names:?}");
}

/// The two phases can run on their own.
#[test]
fn phases_are_separate() {
    let (host, _) = host_function("x = 1", "x");
    let entries: Vec<(String, Value)> = ["get_ipython", "_i1", "x"]
        .into_iter()
        .map(|name| (name.to_owned(), host.get(name).unwrap()))
        .collect();
    assert!(is_host_injected("get_ipython", &entries[0].1));

    let after_names = denylist_filter(entries.clone());
    assert_eq!(after_names, vec![("x".to_owned(), Value::Int(1))]);

    // The probe alone drops only the object that cannot encode.
    let probed: Vec<String> = probe_filter(entries).into_iter().map(|(name, _)| name).collect();
    assert_eq!(probed, vec!["_i1".to_owned(), "x".to_owned()]);
}

// =============================================================================
// 3. Behavior after shipping
// =============================================================================

/// A dropped host name the body only uses on one path fails only when that path runs.
#[test]
fn dropped_names_fail_at_call_time() {
    let (_, g) = host_function("def g(x):\n    if x < 0:\n        display(x)\n    return x * 2", "g");
    assert!(encode(&g).is_err(), "the raw function captures a host object");

    let shipped = decode(&encode(&sanitize_callable(&g)).unwrap()).unwrap();
    let mut target = ReplSession::default();
    target.set_variable("g", shipped);
    assert_eq!(target.run("g(3)", &mut NoPrint).unwrap(), Some(Value::Int(6)));
    let err = target.run("g(-1)", &mut NoPrint).unwrap_err();
    assert_eq!(err.summary(), "NameError: name 'display' is not defined");
}

/// A function from a notebook, sent with `set`, gives the same answer remotely as locally.
#[test]
fn notebook_function_runs_remotely() {
    let (mut host, f) = host_function("offset = 10\ndef f(x):\n    return x * 2 + offset", "f");
    let local = host.run_cell("f(5)");
    assert_eq!(local.stdout, "In [2]: f(5)\nOut[2]: 20\n");

    let payload = encode_mapping(prepare_variables(vec![("f".to_owned(), f)])).unwrap();
    let mut server_session = ReplSession::default();
    server_session.merge(decode_mapping(&payload).unwrap());
    let remote = server_session.execute("f(5)");
    assert_eq!(remote.error, None);
    assert_eq!(remote.stdout, "In [1]: f(5)\nOut[1]: 20\n");
}
