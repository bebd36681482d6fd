use std::fmt::{self, Write};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Result type alias for operations that can raise a Python exception.
pub type RunResult<T> = Result<T, Exception>;

/// Python exception types supported by the interpreter.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and `Into<&'static str>` implementations.
/// The string representation matches the variant name exactly (e.g., `ValueError` -> "ValueError").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum ExcType {
    /// Root of the hierarchy, caught by a bare `except:`.
    BaseException,
    /// Primary exception class - matches any non-exit exception in isinstance checks.
    Exception,

    // --- ArithmeticError hierarchy ---
    ArithmeticError,
    ZeroDivisionError,
    OverflowError,

    // --- LookupError hierarchy ---
    LookupError,
    KeyError,
    IndexError,

    // --- NameError hierarchy ---
    NameError,
    /// Subclass of NameError - for reading a local before assignment.
    UnboundLocalError,

    // --- RuntimeError hierarchy ---
    RuntimeError,
    RecursionError,
    NotImplementedError,

    // --- ImportError hierarchy ---
    ImportError,
    ModuleNotFoundError,

    // --- OSError hierarchy ---
    OSError,
    FileNotFoundError,

    TypeError,
    ValueError,
    AttributeError,
    AssertionError,
    SyntaxError,
    StopIteration,
}

impl ExcType {
    /// Every exception class, in the order they are exposed as builtins.
    pub const ALL: [Self; 23] = [
        Self::BaseException,
        Self::Exception,
        Self::ArithmeticError,
        Self::ZeroDivisionError,
        Self::OverflowError,
        Self::LookupError,
        Self::KeyError,
        Self::IndexError,
        Self::NameError,
        Self::UnboundLocalError,
        Self::RuntimeError,
        Self::RecursionError,
        Self::NotImplementedError,
        Self::ImportError,
        Self::ModuleNotFoundError,
        Self::OSError,
        Self::FileNotFoundError,
        Self::TypeError,
        Self::ValueError,
        Self::AttributeError,
        Self::AssertionError,
        Self::SyntaxError,
        Self::StopIteration,
    ];

    /// Returns the direct base class, or `None` for `BaseException`.
    #[must_use]
    pub fn parent(self) -> Option<Self> {
        match self {
            Self::BaseException => None,
            Self::Exception => Some(Self::BaseException),
            Self::ZeroDivisionError | Self::OverflowError => Some(Self::ArithmeticError),
            Self::KeyError | Self::IndexError => Some(Self::LookupError),
            Self::UnboundLocalError => Some(Self::NameError),
            Self::RecursionError | Self::NotImplementedError => Some(Self::RuntimeError),
            Self::ModuleNotFoundError => Some(Self::ImportError),
            Self::FileNotFoundError => Some(Self::OSError),
            Self::ArithmeticError
            | Self::LookupError
            | Self::NameError
            | Self::RuntimeError
            | Self::ImportError
            | Self::OSError
            | Self::TypeError
            | Self::ValueError
            | Self::AttributeError
            | Self::AssertionError
            | Self::SyntaxError
            | Self::StopIteration => Some(Self::Exception),
        }
    }

    /// Checks whether `self` is `other` or one of its subclasses.
    ///
    /// This is what `except other:` and `isinstance(e, other)` test.
    #[must_use]
    pub fn is_subclass_of(self, other: Self) -> bool {
        let mut current = Some(self);
        while let Some(exc_type) = current {
            if exc_type == other {
                return true;
            }
            current = exc_type.parent();
        }
        false
    }
}

/// One entry of a traceback: where execution was when the exception passed through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Name of the snippet the code came from, e.g. `<repl>`.
    pub filename: String,
    /// 1-based line number within the snippet.
    pub line: u32,
    /// `<module>` for top level code, otherwise the function name.
    pub name: String,
    /// The source text of `line`, stripped of indentation, if available.
    pub source_line: Option<String>,
}

impl StackFrame {
    /// Builds a frame, looking up the preview line in `source`.
    #[must_use]
    pub fn new(filename: &str, line: u32, name: &str, source: &str) -> Self {
        let source_line = (line as usize)
            .checked_sub(1)
            .and_then(|index| source.lines().nth(index))
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty());
        Self {
            filename: filename.to_owned(),
            line,
            name: name.to_owned(),
            source_line,
        }
    }
}

/// A raised Python exception together with the traceback collected while it unwound.
#[derive(Debug, Clone)]
pub struct Exception {
    exc_type: ExcType,
    message: Option<String>,
    /// Innermost frame first; rendered in reverse.
    traceback: Vec<StackFrame>,
}

impl Exception {
    /// Creates an exception with a message.
    #[must_use]
    pub fn new(exc_type: ExcType, message: impl Into<String>) -> Self {
        Self {
            exc_type,
            message: Some(message.into()),
            traceback: Vec::new(),
        }
    }

    /// Creates an exception without a message, as `raise ValueError` does.
    #[must_use]
    pub fn bare(exc_type: ExcType) -> Self {
        Self {
            exc_type,
            message: None,
            traceback: Vec::new(),
        }
    }

    #[must_use]
    pub fn exc_type(&self) -> ExcType {
        self.exc_type
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Frames the exception passed through, outermost first.
    pub fn traceback(&self) -> impl Iterator<Item = &StackFrame> {
        self.traceback.iter().rev()
    }

    pub(crate) fn push_frame(&mut self, frame: StackFrame) {
        self.traceback.push(frame);
    }

    /// Returns a copy without the collected traceback, used when the exception is re-raised as a value.
    #[must_use]
    pub(crate) fn without_traceback(&self) -> Self {
        Self {
            exc_type: self.exc_type,
            message: self.message.clone(),
            traceback: Vec::new(),
        }
    }

    /// The last line of a trace: `ZeroDivisionError: division by zero`.
    #[must_use]
    pub fn summary(&self) -> String {
        match &self.message {
            Some(message) if !message.is_empty() => format!("{}: {message}", self.exc_type),
            _ => self.exc_type.to_string(),
        }
    }

    /// Python `repr()` of the exception instance, e.g. `ValueError('bad')`.
    #[must_use]
    pub fn py_repr(&self) -> String {
        match &self.message {
            Some(message) => {
                let mut out = format!("{}(", self.exc_type);
                crate::value::string_repr_fmt(message, &mut out);
                out.push(')');
                out
            }
            None => format!("{}()", self.exc_type),
        }
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::new(ExcType::TypeError, message)
    }

    pub(crate) fn value_error(message: impl Into<String>) -> Self {
        Self::new(ExcType::ValueError, message)
    }

    pub(crate) fn name_error(name: &str) -> Self {
        Self::new(ExcType::NameError, format!("name '{name}' is not defined"))
    }

    pub(crate) fn unbound_local(name: &str) -> Self {
        Self::new(
            ExcType::UnboundLocalError,
            format!("cannot access local variable '{name}' where it is not associated with a value"),
        )
    }

    pub(crate) fn zero_division(message: &str) -> Self {
        Self::new(ExcType::ZeroDivisionError, message)
    }

    pub(crate) fn overflow() -> Self {
        Self::new(ExcType::OverflowError, "integer result too large")
    }

    pub(crate) fn index_error(message: impl Into<String>) -> Self {
        Self::new(ExcType::IndexError, message)
    }

    pub(crate) fn key_error(key_repr: String) -> Self {
        Self::new(ExcType::KeyError, key_repr)
    }

    pub(crate) fn attribute_error(type_name: &str, attr: &str) -> Self {
        Self::new(
            ExcType::AttributeError,
            format!("'{type_name}' object has no attribute '{attr}'"),
        )
    }

    pub(crate) fn unhashable(type_name: &str) -> Self {
        Self::type_error(format!("unhashable type: '{type_name}'"))
    }

    pub(crate) fn not_callable(type_name: &str) -> Self {
        Self::type_error(format!("'{type_name}' object is not callable"))
    }

    pub(crate) fn not_iterable(type_name: &str) -> Self {
        Self::type_error(format!("'{type_name}' object is not iterable"))
    }
}

impl PartialEq for Exception {
    fn eq(&self, other: &Self) -> bool {
        self.exc_type == other.exc_type && self.message == other.message
    }
}

impl fmt::Display for Exception {
    /// Renders the trace the way CPython prints an uncaught exception.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.traceback.is_empty() {
            let mut out = String::from("Traceback (most recent call last):\n");
            let mut previous: Option<&StackFrame> = None;
            let mut repeats = 0;
            for frame in self.traceback() {
                if previous == Some(frame) {
                    repeats += 1;
                    if repeats >= REPEAT_FRAMES_SHOWN {
                        continue;
                    }
                } else {
                    write_repeats(&mut out, repeats);
                    repeats = 0;
                    previous = Some(frame);
                }
                let _ = writeln!(
                    out,
                    "  File \"{}\", line {}, in {}",
                    frame.filename, frame.line, frame.name
                );
                if let Some(source_line) = &frame.source_line {
                    let _ = writeln!(out, "    {source_line}");
                }
            }
            write_repeats(&mut out, repeats);
            f.write_str(&out)?;
        }
        f.write_str(&self.summary())
    }
}

/// Identical consecutive frames printed before the rest collapse into one line.
const REPEAT_FRAMES_SHOWN: usize = 3;

fn write_repeats(out: &mut String, repeats: usize) {
    if repeats >= REPEAT_FRAMES_SHOWN {
        let hidden = repeats + 1 - REPEAT_FRAMES_SHOWN;
        let plural = if hidden == 1 { "" } else { "s" };
        let _ = writeln!(out, "  [Previous line repeated {hidden} more time{plural}]");
    }
}

impl std::error::Error for Exception {}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn subclass_chain() {
        assert!(ExcType::KeyError.is_subclass_of(ExcType::LookupError));
        assert!(ExcType::KeyError.is_subclass_of(ExcType::BaseException));
        assert!(!ExcType::KeyError.is_subclass_of(ExcType::IndexError));
    }

    #[test]
    fn repeated_frames_collapse() {
        let source = "def f(n):\n    return f(n + 1)\nf(0)\n";
        let mut exc = Exception::new(ExcType::RecursionError, "maximum recursion depth exceeded");
        for _ in 0..6 {
            exc.push_frame(StackFrame::new("<repl>", 2, "f", source));
        }
        exc.push_frame(StackFrame::new("<repl>", 3, "<module>", source));
        let expected = "\
Traceback (most recent call last):
  File \"<repl>\", line 3, in <module>
    f(0)
  File \"<repl>\", line 2, in f
    return f(n + 1)
  File \"<repl>\", line 2, in f
    return f(n + 1)
  File \"<repl>\", line 2, in f
    return f(n + 1)
  [Previous line repeated 3 more times]
RecursionError: maximum recursion depth exceeded";
        assert_eq!(exc.to_string(), expected);
    }

    #[test]
    fn bare_exception_summary() {
        assert_eq!(Exception::bare(ExcType::StopIteration).summary(), "StopIteration");
        assert_eq!(Exception::new(ExcType::KeyError, "'k'").py_repr(), "KeyError(\"'k'\")");
    }
}
