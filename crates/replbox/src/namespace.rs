use std::{cell::RefCell, fmt, fs, io, path::Path, rc::Rc};

use indexmap::IndexMap;

use crate::{
    codec::{self, CodecError},
    value::Value,
};

/// A shared handle to a namespace.
///
/// The session's globals and every function defined in it point at the same namespace, so
/// a function sees later assignments to the names it uses.
pub type NamespaceRef = Rc<RefCell<Namespace>>;

/// An insertion-ordered mapping from names to values: the session's globals, or the
/// captured environment of a function.
#[derive(Clone, Default)]
pub struct Namespace {
    vars: IndexMap<String, Value>,
}

impl Namespace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps the namespace in a shared handle.
    #[must_use]
    pub fn into_ref(self) -> NamespaceRef {
        Rc::new(RefCell::new(self))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Binds `name`, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.vars.insert(name.into(), value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.vars.shift_remove(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Copies every entry of `mapping` in; later values win.
    ///
    /// Infallible: callers decode and validate the whole mapping before merging.
    pub fn merge(&mut self, mapping: impl IntoIterator<Item = (String, Value)>) {
        for (name, value) in mapping {
            self.vars.insert(name, value);
        }
    }

    /// Builds a namespace from an encoded mapping.
    pub fn from_payload(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut namespace = Self::new();
        namespace.merge(codec::decode_mapping(bytes)?);
        Ok(namespace)
    }
}

impl FromIterator<(String, Value)> for Namespace {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        let mut namespace = Self::new();
        namespace.merge(iter);
        namespace
    }
}

impl fmt::Debug for Namespace {
    /// Lists names only; values may refer back to this namespace.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.vars.keys()).finish()
    }
}

/// Failure to load a pre-seed payload.
#[derive(Debug)]
pub enum InitPayloadError {
    Io(io::Error),
    Codec(CodecError),
}

impl fmt::Display for InitPayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read init payload: {err}"),
            Self::Codec(err) => write!(f, "failed to decode init payload: {err}"),
        }
    }
}

impl std::error::Error for InitPayloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Codec(err) => Some(err),
        }
    }
}

impl From<io::Error> for InitPayloadError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<CodecError> for InitPayloadError {
    fn from(err: CodecError) -> Self {
        Self::Codec(err)
    }
}

/// Reads and decodes the pre-seed payload at `path`, then deletes the file.
///
/// Returns `Ok(None)` when there is no file. The file is removed whether or not decoding
/// succeeds, so a bad payload is not retried on the next start.
pub fn load_init_payload(path: &Path) -> Result<Option<Namespace>, InitPayloadError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let decoded = Namespace::from_payload(&bytes);
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }
    Ok(Some(decoded?))
}
