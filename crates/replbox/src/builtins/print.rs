//! Implementation of the print() builtin function.

use crate::{
    args::ArgValues,
    exception::{Exception, RunResult},
    run::Interpreter,
    value::{Stream, Value},
};

/// Implementation of the print() builtin function.
///
/// Supports the following keyword arguments:
/// - `sep`: separator between values (default: " ")
/// - `end`: string appended after the last value (default: "\n")
/// - `file`: `sys.stdout`, `sys.stderr` or a file opened for writing
/// - `flush`: accepted but ignored
pub(super) fn builtin_print(interp: &mut Interpreter<'_>, mut args: ArgValues) -> RunResult<Value> {
    let sep = text_kwarg(args.take_kwarg("sep"), "sep")?;
    let end = text_kwarg(args.take_kwarg("end"), "end")?;
    let file = args.take_kwarg("file").filter(|file| !matches!(file, Value::None));
    let _ = args.take_kwarg("flush");
    args.reject_kwargs("print")?;

    // print is atomic per call: build the whole line before writing
    let mut output = String::new();
    for (i, value) in args.positional.iter().enumerate() {
        if i > 0 {
            output.push_str(sep.as_deref().unwrap_or(" "));
        }
        output.push_str(&value.py_str());
    }
    output.push_str(end.as_deref().unwrap_or("\n"));

    match &file {
        None => interp.writer().stdout_write(output.into())?,
        Some(Value::Stream(stream)) => interp.writer().write_stream(*stream, output.into())?,
        Some(Value::Resource(resource)) if resource.is_file() => {
            resource.write(&output)?;
        }
        Some(other) => {
            return Err(Exception::attribute_error(other.type_name(), "write"));
        }
    }
    Ok(Value::None)
}

/// `sep` and `end` accept a `str` or `None`.
fn text_kwarg(value: Option<Value>, name: &str) -> RunResult<Option<String>> {
    match &value {
        None | Some(Value::None) => Ok(None),
        Some(Value::Str(s)) => Ok(Some(s.to_string())),
        Some(other) => Err(Exception::type_error(format!(
            "{name} must be None or a string, not {}",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::CapturedOutput;

    #[test]
    fn sep_end_and_stderr() {
        let mut output = CapturedOutput::new();
        let mut interp = Interpreter::new(&mut output);
        let args = ArgValues::new(
            vec![Value::Int(1), Value::str("a")],
            vec![("sep".to_owned(), Value::str("-")), ("end".to_owned(), Value::str("!"))],
        );
        builtin_print(&mut interp, args).unwrap();
        let args = ArgValues::new(
            vec![Value::str("oops")],
            vec![("file".to_owned(), Value::Stream(Stream::Stderr))],
        );
        builtin_print(&mut interp, args).unwrap();
        assert_eq!(output.stdout(), "1-a!");
        assert_eq!(output.stderr(), "oops\n");
    }
}
