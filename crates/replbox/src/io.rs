use std::{
    borrow::Cow,
    io::{self, Write as _},
};

use crate::{
    exception::{ExcType, Exception},
    value::Stream,
};

/// Trait for handling output written by executed code.
///
/// `print()`, `sys.stdout.write()` and `sys.stderr.write()` all end up here, so an
/// implementation decides whether output reaches the process streams or a buffer.
pub trait PrintWriter {
    /// Appends text to standard output.
    fn stdout_write(&mut self, output: Cow<'_, str>) -> Result<(), Exception>;

    /// Appends text to standard error.
    fn stderr_write(&mut self, output: Cow<'_, str>) -> Result<(), Exception>;

    /// Writes to whichever stream `stream` names.
    fn write_stream(&mut self, stream: Stream, output: Cow<'_, str>) -> Result<(), Exception> {
        match stream {
            Stream::Stdout => self.stdout_write(output),
            Stream::Stderr => self.stderr_write(output),
        }
    }
}

/// Writes straight through to the process's stdout and stderr.
#[derive(Debug)]
pub struct StdPrint;

impl PrintWriter for StdPrint {
    fn stdout_write(&mut self, output: Cow<'_, str>) -> Result<(), Exception> {
        io::stdout()
            .write_all(output.as_bytes())
            .map_err(|e| Exception::new(ExcType::OSError, e.to_string()))
    }

    fn stderr_write(&mut self, output: Cow<'_, str>) -> Result<(), Exception> {
        io::stderr()
            .write_all(output.as_bytes())
            .map_err(|e| Exception::new(ExcType::OSError, e.to_string()))
    }
}

/// Discards all output.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn stdout_write(&mut self, _output: Cow<'_, str>) -> Result<(), Exception> {
        Ok(())
    }

    fn stderr_write(&mut self, _output: Cow<'_, str>) -> Result<(), Exception> {
        Ok(())
    }
}

/// Two buffers that collect output for the duration of one execution.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    stdout: String,
    stderr: String,
}

impl CapturedOutput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    #[must_use]
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Returns `(stdout, stderr)`.
    #[must_use]
    pub fn into_parts(self) -> (String, String) {
        (self.stdout, self.stderr)
    }
}

impl PrintWriter for CapturedOutput {
    fn stdout_write(&mut self, output: Cow<'_, str>) -> Result<(), Exception> {
        self.stdout.push_str(&output);
        Ok(())
    }

    fn stderr_write(&mut self, output: Cow<'_, str>) -> Result<(), Exception> {
        self.stderr.push_str(&output);
        Ok(())
    }
}
