//! The execution engine: a persistent session that evaluates snippets against one namespace.

use std::{fmt::Write, rc::Rc};

use crate::{
    exception::Exception,
    expressions::{ExprLoc, StmtLoc},
    io::{CapturedOutput, PrintWriter},
    namespace::{Namespace, NamespaceRef},
    parse::{ParseError, parse_expression_snippet, parse_statements},
    run::{Frame, Interpreter},
    value::Value,
};

/// Filename reported in traces for code submitted to a session.
pub const DEFAULT_SCRIPT_NAME: &str = "<repl>";

/// A compiled snippet. Which path it takes decides whether a result is echoed.
#[derive(Debug, Clone)]
pub enum Snippet {
    /// The whole snippet is one expression; its value becomes `Out[n]`.
    Expression(ExprLoc),
    /// Anything else runs as a statement sequence and produces no value.
    Statements(Vec<StmtLoc>),
}

impl Snippet {
    /// Parses `code` as an expression, falling back to statements when it is not one.
    ///
    /// When both fail the statement parser's error is returned, since that is the form the
    /// code was most likely meant in.
    pub fn compile(code: &str) -> Result<Self, ParseError> {
        match parse_expression_snippet(code) {
            Ok(expr) => Ok(Self::Expression(expr)),
            Err(_) => parse_statements(code).map(Self::Statements),
        }
    }
}

/// What one `execute` call produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Transcript: `In [n]:` header, captured stdout, then `Out[n]:` if there was a value.
    pub stdout: String,
    pub stderr: String,
    /// The rendered trace when the snippet raised.
    pub error: Option<String>,
}

/// A persistent REPL session: a namespace that survives across snippets plus the
/// execution counter used in transcripts.
///
/// The namespace is shared by reference with every function defined in the session, so a
/// function sees later assignments to the globals it uses.
pub struct ReplSession {
    globals: NamespaceRef,
    script_name: String,
    /// Number of `execute` calls made so far.
    executions: u64,
}

impl ReplSession {
    /// Creates a session with an empty namespace.
    #[must_use]
    pub fn new(script_name: &str) -> Self {
        Self::with_namespace(Namespace::new(), script_name)
    }

    /// Creates a session around an existing namespace, e.g. one decoded from a pre-seed payload.
    #[must_use]
    pub fn with_namespace(namespace: Namespace, script_name: &str) -> Self {
        Self {
            globals: namespace.into_ref(),
            script_name: script_name.to_owned(),
            executions: 0,
        }
    }

    #[must_use]
    pub fn script_name(&self) -> &str {
        &self.script_name
    }

    /// Evaluates one snippet without transcript formatting.
    ///
    /// Returns the expression's value when the snippet is a bare expression that did not
    /// evaluate to `None`. Parse failures come back as `SyntaxError` or
    /// `NotImplementedError` exceptions with a trace pointing at the offending line.
    pub fn run(&mut self, code: &str, writer: &mut dyn PrintWriter) -> Result<Option<Value>, Exception> {
        let snippet = Snippet::compile(code).map_err(|err| err.into_python_exc(&self.script_name, code))?;
        let mut frame = Frame::module(Rc::clone(&self.globals), &self.script_name, code);
        let mut interp = Interpreter::new(writer);
        match snippet {
            Snippet::Expression(expr) => {
                let value = interp.eval_module_expr(&mut frame, &expr)?;
                Ok((!matches!(value, Value::None)).then_some(value))
            }
            Snippet::Statements(body) => {
                interp.run_module(&mut frame, &body)?;
                Ok(None)
            }
        }
    }

    /// Runs one snippet in transcript mode, capturing both output streams.
    ///
    /// Every call consumes one execution number, whether or not the snippet succeeds.
    pub fn execute(&mut self, code: &str) -> ExecOutput {
        self.execute_with_value(code).0
    }

    /// Like [`Self::execute`], also handing back the value echoed as `Out[n]`.
    pub fn execute_with_value(&mut self, code: &str) -> (ExecOutput, Option<Value>) {
        self.executions += 1;
        let n = self.executions;
        let mut captured = CapturedOutput::new();
        let result = self.run(code, &mut captured);
        let (raw_stdout, stderr) = captured.into_parts();

        let mut stdout = transcript_header(code, n);
        if !raw_stdout.is_empty() {
            stdout.push_str(&raw_stdout);
            if !raw_stdout.ends_with('\n') {
                stdout.push('\n');
            }
        }
        let (value, error) = match result {
            Ok(Some(value)) => {
                let _ = writeln!(stdout, "Out[{n}]: {}", value.py_repr());
                (Some(value), None)
            }
            Ok(None) => (None, None),
            Err(exc) => (None, Some(exc.to_string())),
        };
        (ExecOutput { stdout, stderr, error }, value)
    }

    /// Number of snippets dispatched through [`Self::execute`].
    #[must_use]
    pub fn execution_count(&self) -> u64 {
        self.executions
    }

    #[must_use]
    pub fn get_variable(&self, name: &str) -> Option<Value> {
        self.globals.borrow().get(name).cloned()
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.globals.borrow_mut().insert(name, value);
    }

    /// Binds every entry of an already-validated mapping; later values win.
    pub fn merge(&mut self, mapping: impl IntoIterator<Item = (String, Value)>) {
        self.globals.borrow_mut().merge(mapping);
    }

    /// The session namespace. Functions defined in the session hold the same handle.
    #[must_use]
    pub fn namespace(&self) -> &NamespaceRef {
        &self.globals
    }
}

impl Default for ReplSession {
    fn default() -> Self {
        Self::new(DEFAULT_SCRIPT_NAME)
    }
}

/// `In [n]: first line` followed by `   ...: ` continuation lines.
fn transcript_header(code: &str, n: u64) -> String {
    let mut lines = code.lines();
    let mut header = format!("In [{n}]: {}\n", lines.next().unwrap_or_default());
    for line in lines {
        let _ = writeln!(header, "   ...: {line}");
    }
    header
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn header_marks_continuation_lines() {
        assert_eq!(transcript_header("", 1), "In [1]: \n");
        assert_eq!(
            transcript_header("for i in x:\n    print(i)", 12),
            "In [12]: for i in x:\n   ...:     print(i)\n"
        );
    }

    #[test]
    fn compile_picks_a_path() {
        assert!(matches!(Snippet::compile("1 + 1"), Ok(Snippet::Expression(_))));
        assert!(matches!(Snippet::compile("x = 1"), Ok(Snippet::Statements(_))));
        assert!(matches!(Snippet::compile(""), Ok(Snippet::Statements(body)) if body.is_empty()));
        assert!(Snippet::compile("x = = 1").is_err());
    }
}
