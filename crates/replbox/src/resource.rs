//! Process-bound handles: open files and the objects an interactive host injects.
//!
//! None of these can leave the process, so the codec refuses to encode them.

use std::{
    cell::RefCell,
    fs::{self, File, OpenOptions},
    io::{self, Write as _},
};

use crate::exception::{ExcType, Exception, RunResult};

#[derive(Debug)]
pub struct Resource {
    kind: ResourceKind,
}

#[derive(Debug)]
enum ResourceKind {
    File(RefCell<FileHandle>),
    Host(HostObject),
}

/// Objects an IPython kernel places in the user namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostObject {
    /// `get_ipython`, the host's control entry point.
    Shell,
    Exit,
    Quit,
    Display,
}

impl HostObject {
    /// The name the host binds the object to.
    #[must_use]
    pub fn binding(self) -> &'static str {
        match self {
            Self::Shell => "get_ipython",
            Self::Exit => "exit",
            Self::Quit => "quit",
            Self::Display => "display",
        }
    }

    fn type_name(self) -> &'static str {
        match self {
            Self::Shell => "ZMQInteractiveShell",
            Self::Exit | Self::Quit => "ExitAutocall",
            Self::Display => "DisplayHook",
        }
    }

    fn module(self) -> &'static str {
        match self {
            Self::Shell => "ipykernel.zmqshell",
            Self::Exit | Self::Quit => "IPython.core.autocall",
            Self::Display => "IPython.core.display_functions",
        }
    }
}

#[derive(Debug)]
struct FileHandle {
    path: String,
    mode: String,
    state: FileState,
}

#[derive(Debug)]
enum FileState {
    Read { content: String, cursor: usize },
    Write(File),
    Closed,
}

impl Resource {
    #[must_use]
    pub fn host(object: HostObject) -> Self {
        Self {
            kind: ResourceKind::Host(object),
        }
    }

    /// Opens `path` in text mode. Supported modes are `r`, `w` and `a`, optionally with `t`.
    pub fn open(path: &str, mode: &str) -> RunResult<Self> {
        let base = mode.replace('t', "");
        let state = match base.as_str() {
            "r" => FileState::Read {
                content: fs::read_to_string(path).map_err(|e| io_exception(&e, path))?,
                cursor: 0,
            },
            "w" => FileState::Write(File::create(path).map_err(|e| io_exception(&e, path))?),
            "a" => FileState::Write(
                OpenOptions::new()
                    .append(true)
                    .create(true)
                    .open(path)
                    .map_err(|e| io_exception(&e, path))?,
            ),
            _ => return Err(Exception::value_error(format!("invalid mode: '{mode}'"))),
        };
        Ok(Self {
            kind: ResourceKind::File(RefCell::new(FileHandle {
                path: path.to_owned(),
                mode: mode.to_owned(),
                state,
            })),
        })
    }

    #[must_use]
    pub fn host_object(&self) -> Option<HostObject> {
        match &self.kind {
            ResourceKind::Host(object) => Some(*object),
            ResourceKind::File(_) => None,
        }
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        matches!(self.kind, ResourceKind::File(_))
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        match &self.kind {
            ResourceKind::File(_) => "TextIOWrapper",
            ResourceKind::Host(object) => object.type_name(),
        }
    }

    #[must_use]
    pub fn module(&self) -> &str {
        match &self.kind {
            ResourceKind::File(_) => "_io",
            ResourceKind::Host(object) => object.module(),
        }
    }

    #[must_use]
    pub fn is_callable(&self) -> bool {
        matches!(self.kind, ResourceKind::Host(_))
    }

    #[must_use]
    pub fn py_repr(&self) -> String {
        match &self.kind {
            ResourceKind::File(handle) => {
                let handle = handle.borrow();
                format!(
                    "<_io.TextIOWrapper name='{}' mode='{}' encoding='UTF-8'>",
                    handle.path, handle.mode
                )
            }
            ResourceKind::Host(HostObject::Exit | HostObject::Quit) => {
                "Use exit() or Ctrl-D (i.e. EOF) to exit".to_owned()
            }
            ResourceKind::Host(object) => format!(
                "<{}.{} object at {:#x}>",
                object.module(),
                object.type_name(),
                std::ptr::from_ref(self) as usize
            ),
        }
    }

    fn file(&self) -> RunResult<&RefCell<FileHandle>> {
        match &self.kind {
            ResourceKind::File(handle) => Ok(handle),
            ResourceKind::Host(object) => Err(Exception::attribute_error(object.type_name(), "read")),
        }
    }

    /// `f.read()`, or `f.read(n)` characters.
    pub fn read(&self, size: Option<usize>) -> RunResult<String> {
        let mut handle = self.file()?.borrow_mut();
        match &mut handle.state {
            FileState::Read { content, cursor } => {
                let rest = &content[*cursor..];
                let end = match size {
                    Some(n) => rest.char_indices().nth(n).map_or(rest.len(), |(i, _)| i),
                    None => rest.len(),
                };
                let text = rest[..end].to_owned();
                *cursor += end;
                Ok(text)
            }
            FileState::Write(_) => Err(unsupported("not readable")),
            FileState::Closed => Err(closed_file()),
        }
    }

    /// `f.readline()`, including the trailing newline if present.
    pub fn readline(&self) -> RunResult<String> {
        let mut handle = self.file()?.borrow_mut();
        match &mut handle.state {
            FileState::Read { content, cursor } => {
                let rest = &content[*cursor..];
                let end = rest.find('\n').map_or(rest.len(), |i| i + 1);
                let line = rest[..end].to_owned();
                *cursor += end;
                Ok(line)
            }
            FileState::Write(_) => Err(unsupported("not readable")),
            FileState::Closed => Err(closed_file()),
        }
    }

    /// `f.write(text)`, returning the number of characters written.
    pub fn write(&self, text: &str) -> RunResult<usize> {
        let mut handle = self.file()?.borrow_mut();
        let path = handle.path.clone();
        match &mut handle.state {
            FileState::Write(file) => {
                file.write_all(text.as_bytes()).map_err(|e| io_exception(&e, &path))?;
                Ok(text.chars().count())
            }
            FileState::Read { .. } => Err(unsupported("not writable")),
            FileState::Closed => Err(closed_file()),
        }
    }

    /// `f.close()`; closing twice is allowed.
    pub fn close(&self) -> RunResult<()> {
        let mut handle = self.file()?.borrow_mut();
        let path = handle.path.clone();
        if let FileState::Write(file) = &mut handle.state {
            file.flush().map_err(|e| io_exception(&e, &path))?;
        }
        handle.state = FileState::Closed;
        Ok(())
    }

    pub fn closed(&self) -> RunResult<bool> {
        Ok(matches!(self.file()?.borrow().state, FileState::Closed))
    }

    pub fn name(&self) -> RunResult<String> {
        Ok(self.file()?.borrow().path.clone())
    }
}

fn io_exception(err: &io::Error, path: &str) -> Exception {
    match err.kind() {
        io::ErrorKind::NotFound => Exception::new(
            ExcType::FileNotFoundError,
            format!("[Errno 2] No such file or directory: '{path}'"),
        ),
        _ => Exception::new(ExcType::OSError, format!("{err}: '{path}'")),
    }
}

fn closed_file() -> Exception {
    Exception::value_error("I/O operation on closed file.")
}

fn unsupported(what: &str) -> Exception {
    Exception::new(ExcType::OSError, what.to_owned())
}
