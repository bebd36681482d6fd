//! Tests for `ReplSession`: the persistent namespace, eval-or-exec dispatch and the
//! transcript produced by `execute`.

use pretty_assertions::assert_eq;
use replbox::{CapturedOutput, ExcType, NoPrint, ReplSession, SESSION_STACK_SIZE, Value};

// =============================================================================
// 1. Eval or exec
// =============================================================================

/// A bare expression produces its value.
#[test]
fn expression_returns_value() {
    let mut session = ReplSession::default();
    let value = session.run("1 + 2", &mut NoPrint).unwrap();
    assert_eq!(value, Some(Value::Int(3)));
}

/// Statements produce no value, and neither does an expression evaluating to None.
#[test]
fn statements_and_none_produce_nothing() {
    let mut session = ReplSession::default();
    assert_eq!(session.run("x = 42", &mut NoPrint).unwrap(), None);
    assert_eq!(session.run("None", &mut NoPrint).unwrap(), None);
    assert_eq!(session.run("print('hi')", &mut NoPrint).unwrap(), None);
}

/// Names bound by one snippet are visible to the next.
#[test]
fn namespace_persists_across_snippets() {
    let mut session = ReplSession::default();
    session.run("x = 40", &mut NoPrint).unwrap();
    session.run("def add(a, b=2):\n    return a + b", &mut NoPrint).unwrap();
    assert_eq!(session.run("add(x)", &mut NoPrint).unwrap(), Some(Value::Int(42)));
    assert_eq!(session.get_variable("x"), Some(Value::Int(40)));
}

/// A function sees later rebinding of the globals it uses.
#[test]
fn functions_read_live_globals() {
    let mut session = ReplSession::default();
    session.run("scale = 2\ndef f(v):\n    return v * scale", &mut NoPrint).unwrap();
    session.run("scale = 10", &mut NoPrint).unwrap();
    assert_eq!(session.run("f(3)", &mut NoPrint).unwrap(), Some(Value::Int(30)));
}

/// Syntax errors surface as `SyntaxError` exceptions.
#[test]
fn syntax_error_is_an_exception() {
    let mut session = ReplSession::default();
    let err = session.run("x = = 1", &mut NoPrint).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::SyntaxError);
}

/// Output written by a snippet goes to the writer, not the process.
#[test]
fn output_reaches_the_writer() {
    let mut session = ReplSession::default();
    let mut out = CapturedOutput::new();
    session
        .run("import sys\nprint('a', 'b', sep='-')\nprint('oops', file=sys.stderr)", &mut out)
        .unwrap();
    assert_eq!(out.stdout(), "a-b\n");
    assert_eq!(out.stderr(), "oops\n");
}

// =============================================================================
// 2. Transcript mode
// =============================================================================

/// An echoed expression gets both the header and the `Out` line.
#[test]
fn transcript_echoes_expressions() {
    let mut session = ReplSession::default();
    let out = session.execute("6 * 7");
    assert_eq!(out.stdout, "In [1]: 6 * 7\nOut[1]: 42\n");
    assert_eq!(out.stderr, "");
    assert_eq!(out.error, None);
}

/// Captured output sits between the header and any `Out` line and is newline-terminated.
#[test]
fn transcript_includes_captured_output() {
    let mut session = ReplSession::default();
    let out = session.execute("for i in range(2):\n    print(i, end='')");
    assert_eq!(out.stdout, "In [1]: for i in range(2):\n   ...:     print(i, end='')\n01\n");
}

/// Strings are echoed with their repr.
#[test]
fn transcript_uses_repr() {
    let mut session = ReplSession::default();
    session.execute("name = 'box'");
    let out = session.execute("name");
    assert_eq!(out.stdout, "In [2]: name\nOut[2]: 'box'\n");
}

/// Failures still consume a number, keep earlier output and carry the full trace.
#[test]
fn failures_consume_a_number() {
    let mut session = ReplSession::default();
    session.execute("x = 1");
    let failed = session.execute("print('before')\n1/0");
    assert_eq!(failed.stdout, "In [2]: print('before')\n   ...: 1/0\nbefore\n");
    let error = failed.error.unwrap();
    assert!(error.starts_with("Traceback (most recent call last):\n"), "{error}");
    assert!(error.ends_with("ZeroDivisionError: division by zero"), "{error}");

    let next = session.execute("x");
    assert_eq!(next.stdout, "In [3]: x\nOut[3]: 1\n");
    assert_eq!(session.execution_count(), 3);
}

/// A failing snippet leaves earlier assignments in place.
#[test]
fn failure_keeps_partial_effects() {
    let mut session = ReplSession::default();
    let out = session.execute("a = 1\nb = missing\nc = 3");
    assert!(out.error.unwrap().ends_with("NameError: name 'missing' is not defined"));
    assert_eq!(session.get_variable("a"), Some(Value::Int(1)));
    assert_eq!(session.get_variable("c"), None);
}

/// The trace names the function frames the exception passed through.
#[test]
fn trace_lists_function_frames() {
    let mut session = ReplSession::default();
    session.execute("def inner():\n    return {}['k']\ndef outer():\n    return inner()");
    let error = session.execute("outer()").error.unwrap();
    let expected = "\
Traceback (most recent call last):
  File \"<repl>\", line 1, in <module>
    outer()
  File \"<repl>\", line 4, in outer
    return inner()
  File \"<repl>\", line 2, in inner
    return {}['k']
KeyError: 'k'";
    assert_eq!(error, expected);
}

// =============================================================================
// 3. Namespace access
// =============================================================================

/// Values set from outside are visible to code, and merges let later values win.
#[test]
fn set_and_merge() {
    let mut session = ReplSession::default();
    session.set_variable("a", Value::Int(10));
    session.merge(vec![("b".to_owned(), Value::Int(20)), ("a".to_owned(), Value::Int(1))]);
    let out = session.execute("a + b");
    assert_eq!(out.stdout, "In [1]: a + b\nOut[1]: 21\n");
}

/// Unbound names read as absent.
#[test]
fn unknown_variable_is_absent() {
    let session = ReplSession::default();
    assert_eq!(session.get_variable("nope"), None);
    assert_eq!(session.execution_count(), 0);
}

/// Runaway recursion is stopped with a RecursionError instead of overflowing the stack.
#[test]
fn recursion_is_bounded() {
    let handle = std::thread::Builder::new()
        .stack_size(SESSION_STACK_SIZE)
        .spawn(|| {
            let mut session = ReplSession::default();
            session.execute("def f(n):\n    return f(n + 1)");
            session.execute("f(0)").error
        })
        .unwrap();
    let error = handle.join().unwrap().unwrap();
    assert!(error.ends_with("RecursionError: maximum recursion depth exceeded"), "{error}");
    assert!(error.contains("[Previous line repeated"), "{error}");
}

/// Recursion through a deeply nested expression still ends in a RecursionError on a
/// session-sized stack.
#[test]
fn recursion_through_nested_expressions_is_bounded() {
    let nesting = if cfg!(debug_assertions) { 25 } else { 150 };
    let body = format!("{}f(n + 1){}", "1 + (".repeat(nesting), ")".repeat(nesting));
    let handle = std::thread::Builder::new()
        .stack_size(SESSION_STACK_SIZE)
        .spawn(move || {
            let mut session = ReplSession::default();
            let defined = session.execute(&format!("def f(n):\n    return {body}"));
            assert_eq!(defined.error, None);
            session.execute("f(0)").error
        })
        .unwrap();
    let error = handle.join().unwrap().unwrap();
    assert!(error.ends_with("RecursionError: maximum recursion depth exceeded"), "{error}");
}

// =============================================================================
// 4. Deep data
// =============================================================================

/// Releasing a very deeply nested list does not recurse once per level.
#[test]
fn deep_list_is_released() {
    let mut session = ReplSession::default();
    let built = session.execute("a = []\nfor _ in range(100000):\n    a = [a]");
    assert_eq!(built.error, None);
    let released = session.execute("a = None");
    assert_eq!(released.error, None);
    assert_eq!(session.get_variable("a"), Some(Value::None));
}

/// The same holds for tuples and dicts, including when the session itself goes away.
#[test]
fn deep_tuples_and_dicts_are_released() {
    let mut session = ReplSession::default();
    let built = session.execute(
        "t = ()\nd = {}\nfor _ in range(100000):\n    t = (t,)\n    d = {'k': d, 'n': [d]}",
    );
    assert_eq!(built.error, None);
    drop(session);
}

/// A deep list held by two names survives dropping one of them.
#[test]
fn shared_deep_list_survives_one_release() {
    let mut session = ReplSession::default();
    session.execute("a = []\nfor _ in range(1000):\n    a = [a]\nb = a\na = None");
    let out = session.execute("depth = 0\nwhile b:\n    b = b[0]\n    depth += 1");
    assert_eq!(out.error, None);
    assert_eq!(session.get_variable("depth"), Some(Value::Int(1000)));
}
