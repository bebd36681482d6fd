//! Tests for the value codec: round trips of plain data, functions with their captured
//! environment, and refusal of process-bound values.

use pretty_assertions::assert_eq;
use replbox::{CodecError, NoPrint, ReplSession, Value, decode, decode_mapping, encode, encode_mapping};

fn round_trip(value: &Value) -> Value {
    decode(&encode(value).unwrap()).unwrap()
}

/// Runs `setup` in a fresh session, then evaluates `expr` there.
fn eval(setup: &str, expr: &str) -> (ReplSession, Value) {
    let mut session = ReplSession::default();
    session.run(setup, &mut NoPrint).unwrap();
    let value = session.run(expr, &mut NoPrint).unwrap().unwrap();
    (session, value)
}

// =============================================================================
// 1. Plain data
// =============================================================================

#[test]
fn primitives_round_trip() {
    for value in [
        Value::None,
        Value::Bool(true),
        Value::Int(-7),
        Value::Int(i64::MAX),
        Value::Float(2.5),
        Value::str("héllo\n"),
    ] {
        assert_eq!(round_trip(&value), value);
    }
}

#[test]
fn nested_containers_round_trip() {
    let (_, value) = eval("", "{'a': [1, 2.0, (3, 'x')], (1, 2): {'deep': [None, True]}, 'r': range(0, 10, 3)}");
    let decoded = round_trip(&value);
    assert_eq!(decoded, value);
    assert_eq!(decoded.py_repr(), value.py_repr());
}

/// A table as a dict of equal-length columns survives intact, column order included.
#[test]
fn tabular_value_round_trips() {
    let (_, table) = eval(
        "table = {'id': [1, 2, 3], 'name': ['a', 'b', 'c'], 'score': [0.5, 1.5, 2.5]}",
        "table",
    );
    let decoded = round_trip(&table);
    assert_eq!(
        decoded.py_repr(),
        "{'id': [1, 2, 3], 'name': ['a', 'b', 'c'], 'score': [0.5, 1.5, 2.5]}"
    );
}

/// A list that contains itself decodes to a list that contains itself.
#[test]
fn cycles_survive() {
    let (_, value) = eval("a = [1]\na.append(a)", "a");
    let decoded = round_trip(&value);
    assert_eq!(decoded.py_repr(), "[1, [...]]");
    let Value::List(items) = &decoded else { panic!("expected a list") };
    assert!(items.borrow()[1].is(&decoded));
}

/// Builtins, types, exceptions and modules travel by name.
#[test]
fn named_objects_round_trip() {
    let (_, value) = eval("import math", "[len, int, ValueError, ValueError('bad'), math, math.sqrt]");
    assert_eq!(
        round_trip(&value).py_repr(),
        "[<built-in function len>, <class 'int'>, <class 'ValueError'>, ValueError('bad'), <module 'math' (built-in)>, <built-in function sqrt>]"
    );
}

// =============================================================================
// 2. Functions
// =============================================================================

/// A function keeps working in a fresh session, with the globals it uses.
#[test]
fn function_carries_its_globals() {
    let (_, f) = eval("rate = 3\ndef f(x):\n    return x * rate", "f");
    let mut target = ReplSession::default();
    target.set_variable("f", round_trip(&f));
    assert_eq!(target.run("f(5)", &mut NoPrint).unwrap(), Some(Value::Int(15)));
}

/// Only referenced globals are captured, so an unrelated process-bound global is no obstacle.
#[test]
fn unreferenced_globals_are_left_behind() {
    let (session, f) = eval("handle = open('Cargo.toml')\ndef f(x):\n    return x + 1", "f");
    assert!(session.get_variable("handle").is_some());
    let decoded = round_trip(&f);
    let Value::Function(function) = &decoded else { panic!("expected a function") };
    assert!(!function.globals().borrow().contains("handle"));
}

/// Recursive and mutually recursive functions find each other after decoding.
#[test]
fn recursion_survives() {
    let (_, pair) = eval(
        "def even(n):\n    return True if n == 0 else odd(n - 1)\ndef odd(n):\n    return False if n == 0 else even(n - 1)",
        "(even, odd)",
    );
    let mut target = ReplSession::default();
    target.set_variable("pair", round_trip(&pair));
    assert_eq!(target.run("pair[0](10)", &mut NoPrint).unwrap(), Some(Value::Bool(true)));
    assert_eq!(target.run("pair[1](7)", &mut NoPrint).unwrap(), Some(Value::Bool(true)));
}

/// Closures keep their enclosing scope, and defaults keep their values.
#[test]
fn closures_and_defaults_survive() {
    let (_, adder) = eval(
        "def make_adder(n):\n    def add(x, times=2):\n        return x * times + n\n    return add",
        "make_adder(100)",
    );
    let mut target = ReplSession::default();
    target.set_variable("add", round_trip(&adder));
    assert_eq!(target.run("add(1)", &mut NoPrint).unwrap(), Some(Value::Int(102)));
    assert_eq!(target.run("add(1, times=5)", &mut NoPrint).unwrap(), Some(Value::Int(105)));
}

/// Lambdas are functions too.
#[test]
fn lambdas_round_trip() {
    let (_, square) = eval("", "lambda v: v * v");
    let mut target = ReplSession::default();
    target.set_variable("sq", round_trip(&square));
    assert_eq!(target.run("sq(9)", &mut NoPrint).unwrap(), Some(Value::Int(81)));
}

/// Tracebacks inside a decoded function still show its source lines.
#[test]
fn decoded_functions_keep_source() {
    let (_, f) = eval("def boom():\n    return 1 / 0", "boom");
    let mut target = ReplSession::default();
    target.set_variable("boom", round_trip(&f));
    let error = target.execute("boom()").error.unwrap();
    assert!(error.contains("line 2, in boom\n    return 1 / 0\n"), "{error}");
}

// =============================================================================
// 3. Refusals and mappings
// =============================================================================

/// Open files cannot be encoded, alone or nested.
#[test]
fn files_are_unserializable() {
    let (_, value) = eval("f = open('Cargo.toml')", "[1, {'handle': f}]");
    let err = encode(&value).unwrap_err();
    assert_eq!(
        err,
        CodecError::Unserializable {
            type_name: "TextIOWrapper".to_owned(),
            module: "_io".to_owned(),
        }
    );
}

/// A function whose body uses a process-bound global cannot be encoded.
#[test]
fn functions_using_files_are_unserializable() {
    let (_, f) = eval("fh = open('Cargo.toml')\ndef f():\n    return fh.read()", "f");
    assert!(matches!(encode(&f), Err(CodecError::Unserializable { .. })));
}

#[test]
fn mappings_round_trip_in_order() {
    let bytes = encode_mapping(vec![("b".to_owned(), Value::Int(2)), ("a".to_owned(), Value::str("x"))]).unwrap();
    assert_eq!(
        decode_mapping(&bytes).unwrap(),
        vec![("b".to_owned(), Value::Int(2)), ("a".to_owned(), Value::str("x"))]
    );
}

#[test]
fn non_mappings_are_rejected() {
    let list = encode(&Value::list(vec![Value::Int(1)])).unwrap();
    assert_eq!(decode_mapping(&list).unwrap_err(), CodecError::NotAMapping);
    let (_, int_keys) = eval("", "{1: 'one'}");
    assert_eq!(decode_mapping(&encode(&int_keys).unwrap()).unwrap_err(), CodecError::NotAMapping);
}

#[test]
fn garbage_is_malformed() {
    let mut bytes = encode(&Value::str("payload")).unwrap();
    bytes.truncate(bytes.len() - 3);
    assert!(matches!(decode(&bytes), Err(CodecError::Malformed(_))));
}
