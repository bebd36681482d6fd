//! The value codec: turns a value graph into bytes another process can rebuild.
//!
//! Encoding flattens the graph into an arena of slots. Every shared or mutable object
//! (list, dict, function, namespace, scope) occupies exactly one slot, found again by
//! pointer identity, so aliasing and cycles survive the trip. The arena is written with
//! postcard behind a format version.
//!
//! Functions travel with their code, their source text, the part of their globals the
//! body can reach, and their closure scopes. Process-bound values (open files, host
//! objects) refuse to encode.

use std::{fmt, rc::Rc, str::FromStr};

use ahash::AHashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    builtins::Builtin,
    exception::{ExcType, Exception},
    expressions::FunctionDef,
    function::{Defaults, Function, Scope, ScopeRef, Source},
    modules::{Module, ModuleFunction},
    namespace::{Namespace, NamespaceRef},
    resource::Resource,
    types::Type,
    value::{Dict, MAX_DATA_DEPTH, Range, Stream, Value},
};

/// Bumped whenever the slot layout changes.
pub const FORMAT_VERSION: u16 = 1;

/// Why a value could not be encoded or a payload could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The value holds something bound to this process.
    Unserializable { type_name: String, module: String },
    /// The bytes are not a payload this codec wrote.
    Malformed(String),
    VersionMismatch { found: u16, expected: u16 },
    /// The payload decoded, but not to a dict with string keys.
    NotAMapping,
    /// Containers nest deeper than the codec follows.
    TooDeep,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unserializable { type_name, module } => {
                write!(f, "cannot serialize '{module}.{type_name}' object")
            }
            Self::Malformed(detail) => write!(f, "malformed payload: {detail}"),
            Self::VersionMismatch { found, expected } => {
                write!(f, "payload format version {found} is not supported (expected {expected})")
            }
            Self::NotAMapping => f.write_str("payload is not a mapping of names to values"),
            Self::TooDeep => f.write_str("value is nested too deeply to serialize"),
        }
    }
}

impl std::error::Error for CodecError {}

impl From<postcard::Error> for CodecError {
    fn from(err: postcard::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

fn malformed(detail: impl Into<String>) -> CodecError {
    CodecError::Malformed(detail.into())
}

/// Something that can be written into an [`Encoder`].
///
/// Types are process-bound unless they opt in: the provided `transport` refuses with
/// [`CodecError::Unserializable`], naming the type the way `type(x)` would.
pub trait Transportable {
    fn type_name(&self) -> &str;

    fn module_name(&self) -> &str;

    /// Writes `self` and returns the slot it occupies.
    fn transport(&self, _encoder: &mut Encoder) -> Result<usize, CodecError> {
        Err(CodecError::Unserializable {
            type_name: self.type_name().to_owned(),
            module: self.module_name().to_owned(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Payload {
    root: usize,
    slots: Vec<Slot>,
    code: Vec<FunctionDef>,
    /// `(filename, text)` of every snippet a function came from.
    sources: Vec<(String, String)>,
}

#[derive(Debug, Serialize, Deserialize)]
enum Slot {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<usize>),
    Tuple(Vec<usize>),
    Dict(Vec<(usize, usize)>),
    Range { start: i64, stop: i64, step: i64 },
    Function(FunctionSlot),
    /// Captured globals; only reachable from a function slot.
    Namespace(Vec<(String, usize)>),
    /// A closure scope; only reachable from a function or another scope.
    Scope { vars: Vec<(String, usize)>, parent: Option<usize> },
    Builtin(String),
    Type(String),
    ExcClass(String),
    Exception { exc_type: String, message: Option<String> },
    Module(String),
    ModuleFunction(String),
    Stream(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionSlot {
    /// Index into `Payload::code`.
    code: usize,
    /// Index into `Payload::sources`.
    source: usize,
    globals: usize,
    closure: Option<usize>,
    positional_defaults: Vec<Option<usize>>,
    keyword_only_defaults: Vec<Option<usize>>,
}

/// Builds a [`Payload`] from a value graph.
#[derive(Default)]
pub struct Encoder {
    slots: Vec<Slot>,
    code: Vec<FunctionDef>,
    sources: Vec<(String, String)>,
    /// Slot of every shared object written so far, keyed by address.
    seen: AHashMap<usize, usize>,
    code_seen: AHashMap<usize, usize>,
    sources_seen: AHashMap<usize, usize>,
    depth: usize,
}

impl Encoder {
    fn push(&mut self, slot: Slot) -> usize {
        self.slots.push(slot);
        self.slots.len() - 1
    }

    /// Claims a slot for the object at `address` before its contents are written, so a
    /// reference back to it from inside resolves to the same slot.
    fn reserve(&mut self, address: usize) -> usize {
        let slot = self.push(Slot::None);
        self.seen.insert(address, slot);
        slot
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, CodecError>) -> Result<T, CodecError> {
        if self.depth >= MAX_DATA_DEPTH {
            return Err(CodecError::TooDeep);
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn all(&mut self, values: &[Value]) -> Result<Vec<usize>, CodecError> {
        self.nested(|encoder| values.iter().map(|value| value.transport(encoder)).collect())
    }

    fn code(&mut self, def: &Rc<FunctionDef>) -> usize {
        let address = Rc::as_ptr(def) as usize;
        if let Some(&index) = self.code_seen.get(&address) {
            return index;
        }
        self.code.push(FunctionDef::clone(def));
        let index = self.code.len() - 1;
        self.code_seen.insert(address, index);
        index
    }

    fn source(&mut self, source: &Rc<Source>) -> usize {
        let address = Rc::as_ptr(source) as usize;
        if let Some(&index) = self.sources_seen.get(&address) {
            return index;
        }
        self.sources.push((source.filename.clone(), source.text.clone()));
        let index = self.sources.len() - 1;
        self.sources_seen.insert(address, index);
        index
    }

    /// Writes the entries of `globals` named in `names` into the namespace's slot.
    ///
    /// Several functions may share one namespace; each adds the names it needs.
    fn captured_globals(&mut self, globals: &NamespaceRef, names: &[String]) -> Result<usize, CodecError> {
        let address = Rc::as_ptr(globals) as usize;
        let slot = match self.seen.get(&address) {
            Some(&slot) => slot,
            None => {
                let slot = self.reserve(address);
                self.slots[slot] = Slot::Namespace(Vec::new());
                slot
            }
        };
        for name in names {
            if self.namespace_has(slot, name) {
                continue;
            }
            let Some(value) = globals.borrow().get(name).cloned() else {
                continue;
            };
            let value_slot = self.nested(|encoder| value.transport(encoder))?;
            // Encoding the value may have recorded this name already through a cycle.
            if !self.namespace_has(slot, name)
                && let Slot::Namespace(entries) = &mut self.slots[slot]
            {
                entries.push((name.clone(), value_slot));
            }
        }
        Ok(slot)
    }

    fn namespace_has(&self, slot: usize, name: &str) -> bool {
        matches!(&self.slots[slot], Slot::Namespace(entries) if entries.iter().any(|(n, _)| n == name))
    }

    fn scope(&mut self, scope: &ScopeRef) -> Result<usize, CodecError> {
        let address = Rc::as_ptr(scope) as usize;
        if let Some(&slot) = self.seen.get(&address) {
            return Ok(slot);
        }
        let slot = self.reserve(address);
        let (vars, parent) = {
            let scope = scope.borrow();
            let vars: Vec<(String, Value)> = scope.iter().map(|(k, v)| (k.to_owned(), v.clone())).collect();
            (vars, scope.parent().cloned())
        };
        let parent = match parent {
            Some(parent) => Some(self.nested(|encoder| encoder.scope(&parent))?),
            None => None,
        };
        let mut slots = Vec::with_capacity(vars.len());
        for (name, value) in vars {
            slots.push((name, self.nested(|encoder| value.transport(encoder))?));
        }
        self.slots[slot] = Slot::Scope { vars: slots, parent };
        Ok(slot)
    }

    fn defaults(&mut self, defaults: &[Option<Value>]) -> Result<Vec<Option<usize>>, CodecError> {
        defaults
            .iter()
            .map(|default| match default {
                Some(value) => self.nested(|encoder| value.transport(encoder)).map(Some),
                None => Ok(None),
            })
            .collect()
    }

    fn finish(self, root: usize) -> Result<Vec<u8>, CodecError> {
        let payload = Payload {
            root,
            slots: self.slots,
            code: self.code,
            sources: self.sources,
        };
        let mut bytes = postcard::to_allocvec(&FORMAT_VERSION)?;
        bytes.extend(postcard::to_allocvec(&payload)?);
        Ok(bytes)
    }
}

impl Transportable for Value {
    fn type_name(&self) -> &str {
        Self::type_name(self)
    }

    fn module_name(&self) -> &str {
        Self::module_name(self)
    }

    fn transport(&self, encoder: &mut Encoder) -> Result<usize, CodecError> {
        let slot = match self {
            Self::None => Slot::None,
            Self::Bool(b) => Slot::Bool(*b),
            Self::Int(i) => Slot::Int(*i),
            Self::Float(f) => Slot::Float(*f),
            Self::Str(s) => Slot::Str(s.to_string()),
            Self::Range(range) => Slot::Range {
                start: range.start,
                stop: range.stop,
                step: range.step,
            },
            Self::Tuple(items) => Slot::Tuple(encoder.all(items)?),
            Self::List(list) => {
                let address = Rc::as_ptr(list) as usize;
                if let Some(&slot) = encoder.seen.get(&address) {
                    return Ok(slot);
                }
                let slot = encoder.reserve(address);
                let items = list.borrow().clone();
                encoder.slots[slot] = Slot::List(encoder.all(&items)?);
                return Ok(slot);
            }
            Self::Dict(dict) => {
                let address = Rc::as_ptr(dict) as usize;
                if let Some(&slot) = encoder.seen.get(&address) {
                    return Ok(slot);
                }
                let slot = encoder.reserve(address);
                let pairs: Vec<(Self, Self)> = dict.borrow().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                let mut entries = Vec::with_capacity(pairs.len());
                for (key, value) in pairs {
                    let key = encoder.nested(|encoder| key.transport(encoder))?;
                    let value = encoder.nested(|encoder| value.transport(encoder))?;
                    entries.push((key, value));
                }
                encoder.slots[slot] = Slot::Dict(entries);
                return Ok(slot);
            }
            Self::Function(function) => return function.transport(encoder),
            Self::Resource(resource) => return resource.transport(encoder),
            Self::Builtin(builtin) => Slot::Builtin(<&str>::from(builtin).to_owned()),
            Self::Type(ty) => Slot::Type(<&str>::from(ty).to_owned()),
            Self::ExcClass(exc_type) => Slot::ExcClass(<&str>::from(exc_type).to_owned()),
            Self::Exception(exc) => Slot::Exception {
                exc_type: <&str>::from(exc.exc_type()).to_owned(),
                message: exc.message().map(str::to_owned),
            },
            Self::Module(module) => Slot::Module(<&str>::from(module).to_owned()),
            Self::ModuleFunction(function) => Slot::ModuleFunction(<&str>::from(function).to_owned()),
            Self::Stream(stream) => Slot::Stream(<&str>::from(stream).to_owned()),
        };
        Ok(encoder.push(slot))
    }
}

impl Transportable for Function {
    fn type_name(&self) -> &str {
        "function"
    }

    fn module_name(&self) -> &str {
        "__main__"
    }

    /// Writes the code, the globals the body can reach, the closure scopes and the defaults.
    fn transport(&self, encoder: &mut Encoder) -> Result<usize, CodecError> {
        let address = std::ptr::from_ref(self) as usize;
        if let Some(&slot) = encoder.seen.get(&address) {
            return Ok(slot);
        }
        let slot = encoder.reserve(address);
        let code = encoder.code(&self.def);
        let source = encoder.source(&self.source);
        let globals = encoder.captured_globals(&self.globals, &self.def.referenced)?;
        let closure = match &self.closure {
            Some(scope) => Some(encoder.nested(|encoder| encoder.scope(scope))?),
            None => None,
        };
        let defaults = self.defaults();
        let positional_defaults = encoder.defaults(&defaults.positional)?;
        let keyword_only_defaults = encoder.defaults(&defaults.keyword_only)?;
        encoder.slots[slot] = Slot::Function(FunctionSlot {
            code,
            source,
            globals,
            closure,
            positional_defaults,
            keyword_only_defaults,
        });
        Ok(slot)
    }
}

impl Transportable for Resource {
    fn type_name(&self) -> &str {
        Self::type_name(self)
    }

    fn module_name(&self) -> &str {
        self.module()
    }
}

/// Encodes a value and everything it references.
pub fn encode(value: &Value) -> Result<Vec<u8>, CodecError> {
    let mut encoder = Encoder::default();
    let root = value.transport(&mut encoder)?;
    encoder.finish(root)
}

/// Rebuilds a value written by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<Value, CodecError> {
    let (found, rest) =
        postcard::take_from_bytes::<u16>(bytes).map_err(|_| malformed("missing format version"))?;
    if found != FORMAT_VERSION {
        return Err(CodecError::VersionMismatch {
            found,
            expected: FORMAT_VERSION,
        });
    }
    let payload: Payload = postcard::from_bytes(rest)?;
    Decoder::new(&payload).run(payload.root)
}

/// Encodes name/value pairs as a dict with string keys.
pub fn encode_mapping(mapping: impl IntoIterator<Item = (String, Value)>) -> Result<Vec<u8>, CodecError> {
    encode(&Value::dict_from_pairs(mapping))
}

/// Decodes a payload that must be a dict with string keys, preserving its order.
pub fn decode_mapping(bytes: &[u8]) -> Result<Vec<(String, Value)>, CodecError> {
    let decoded = decode(bytes)?;
    let Value::Dict(dict) = &decoded else {
        return Err(CodecError::NotAMapping);
    };
    let dict = dict.borrow();
    dict.iter()
        .map(|(key, value)| match key {
            Value::Str(name) => Ok((name.to_string(), value.clone())),
            _ => Err(CodecError::NotAMapping),
        })
        .collect()
}

/// An object created before its contents are known.
enum Shell {
    Value(Value),
    Namespace(NamespaceRef),
    Scope(ScopeRef),
}

/// Rebuilds a graph in two passes: first every shared object is created empty, then each
/// is filled in. References between objects therefore never need to be resolved early.
struct Decoder<'a> {
    slots: &'a [Slot],
    code: Vec<Rc<FunctionDef>>,
    sources: Vec<Rc<Source>>,
    shells: Vec<Option<Shell>>,
    tuples: AHashMap<usize, Value>,
    depth: usize,
}

impl<'a> Decoder<'a> {
    fn new(payload: &'a Payload) -> Self {
        Self {
            slots: &payload.slots,
            code: payload.code.iter().cloned().map(Rc::new).collect(),
            sources: payload
                .sources
                .iter()
                .map(|(filename, text)| Source::new(filename.as_str(), text.as_str()))
                .collect(),
            shells: (0..payload.slots.len()).map(|_| None).collect(),
            tuples: AHashMap::new(),
            depth: 0,
        }
    }

    fn run(mut self, root: usize) -> Result<Value, CodecError> {
        let slots = self.slots;
        for (index, slot) in slots.iter().enumerate() {
            self.shells[index] = match slot {
                Slot::List(_) => Some(Shell::Value(Value::list(Vec::new()))),
                Slot::Dict(_) => Some(Shell::Value(Value::dict(Dict::new()))),
                Slot::Namespace(_) => Some(Shell::Namespace(Namespace::new().into_ref())),
                Slot::Scope { .. } => Some(Shell::Scope(Scope::new(IndexMap::new(), None))),
                _ => None,
            };
        }
        for (index, slot) in slots.iter().enumerate() {
            if let Slot::Function(function) = slot {
                let shell = self.function_shell(function)?;
                self.shells[index] = Some(Shell::Value(shell));
            }
        }
        for (index, slot) in slots.iter().enumerate() {
            self.fill(index, slot)?;
        }
        self.value_at(root)
    }

    fn function_shell(&self, slot: &FunctionSlot) -> Result<Value, CodecError> {
        let def = self.code.get(slot.code).ok_or_else(|| malformed("code index out of range"))?;
        let source = self
            .sources
            .get(slot.source)
            .ok_or_else(|| malformed("source index out of range"))?;
        let globals = self.namespace_at(slot.globals)?;
        let closure = slot.closure.map(|index| self.scope_at(index)).transpose()?;
        Ok(Value::Function(Rc::new(Function::new(
            Rc::clone(def),
            Defaults::default(),
            globals,
            closure,
            Rc::clone(source),
        ))))
    }

    fn fill(&mut self, index: usize, slot: &Slot) -> Result<(), CodecError> {
        match slot {
            Slot::List(items) => {
                let values = self.values_at(items)?;
                if let Some(Shell::Value(Value::List(list))) = &self.shells[index] {
                    *list.borrow_mut() = values;
                }
            }
            Slot::Dict(entries) => {
                let mut dict = Dict::new();
                for &(key, value) in entries {
                    let key = self.value_at(key)?;
                    let value = self.value_at(value)?;
                    dict.insert(key, value).map_err(|_| malformed("unhashable dict key"))?;
                }
                if let Some(Shell::Value(Value::Dict(shell))) = &self.shells[index] {
                    *shell.borrow_mut() = dict;
                }
            }
            Slot::Namespace(entries) => {
                let namespace = self.namespace_at(index)?;
                for (name, value) in entries {
                    let value = self.value_at(*value)?;
                    namespace.borrow_mut().insert(name.as_str(), value);
                }
            }
            Slot::Scope { vars, parent } => {
                let scope = self.scope_at(index)?;
                let parent = parent.map(|parent| self.scope_at(parent)).transpose()?;
                let mut bound = IndexMap::with_capacity(vars.len());
                for (name, value) in vars {
                    bound.insert(name.clone(), self.value_at(*value)?);
                }
                let mut scope = scope.borrow_mut();
                scope.vars = bound;
                scope.parent = parent;
            }
            Slot::Function(function) => {
                let defaults = Defaults {
                    positional: self.defaults_at(&function.positional_defaults)?,
                    keyword_only: self.defaults_at(&function.keyword_only_defaults)?,
                };
                if let Some(Shell::Value(Value::Function(shell))) = &self.shells[index] {
                    *shell.defaults.borrow_mut() = defaults;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn values_at(&mut self, indices: &[usize]) -> Result<Vec<Value>, CodecError> {
        indices.iter().map(|&index| self.value_at(index)).collect()
    }

    fn defaults_at(&mut self, defaults: &[Option<usize>]) -> Result<Vec<Option<Value>>, CodecError> {
        defaults
            .iter()
            .map(|default| default.map(|index| self.value_at(index)).transpose())
            .collect()
    }

    fn namespace_at(&self, index: usize) -> Result<NamespaceRef, CodecError> {
        match self.shells.get(index) {
            Some(Some(Shell::Namespace(namespace))) => Ok(Rc::clone(namespace)),
            _ => Err(malformed("expected a namespace slot")),
        }
    }

    fn scope_at(&self, index: usize) -> Result<ScopeRef, CodecError> {
        match self.shells.get(index) {
            Some(Some(Shell::Scope(scope))) => Ok(Rc::clone(scope)),
            _ => Err(malformed("expected a scope slot")),
        }
    }

    fn value_at(&mut self, index: usize) -> Result<Value, CodecError> {
        let slots = self.slots;
        let slot = slots.get(index).ok_or_else(|| malformed("slot index out of range"))?;
        let value = match slot {
            Slot::None => Value::None,
            Slot::Bool(b) => Value::Bool(*b),
            Slot::Int(i) => Value::Int(*i),
            Slot::Float(f) => Value::Float(*f),
            Slot::Str(s) => Value::str(s),
            Slot::Range { start, stop, step } => {
                if *step == 0 {
                    return Err(malformed("range step of zero"));
                }
                Value::Range(Range {
                    start: *start,
                    stop: *stop,
                    step: *step,
                })
            }
            Slot::List(_) | Slot::Dict(_) | Slot::Function(_) => match &self.shells[index] {
                Some(Shell::Value(value)) => value.clone(),
                _ => return Err(malformed("missing object")),
            },
            Slot::Tuple(items) => {
                if let Some(tuple) = self.tuples.get(&index) {
                    return Ok(tuple.clone());
                }
                if self.depth >= MAX_DATA_DEPTH {
                    return Err(malformed("tuples nest too deeply"));
                }
                self.depth += 1;
                let items = self.values_at(items);
                self.depth -= 1;
                let tuple = Value::tuple(items?);
                self.tuples.insert(index, tuple.clone());
                tuple
            }
            Slot::Namespace(_) | Slot::Scope { .. } => return Err(malformed("environment slot used as a value")),
            Slot::Builtin(name) => Value::Builtin(parse_name(name, "builtin")?),
            Slot::Type(name) => Value::Type(parse_name::<Type>(name, "type")?),
            Slot::ExcClass(name) => Value::ExcClass(parse_name(name, "exception class")?),
            Slot::Exception { exc_type, message } => {
                let exc_type: ExcType = parse_name(exc_type, "exception class")?;
                let exc = match message {
                    Some(message) => Exception::new(exc_type, message.as_str()),
                    None => Exception::bare(exc_type),
                };
                Value::Exception(Rc::new(exc))
            }
            Slot::Module(name) => Value::Module(parse_name::<Module>(name, "module")?),
            Slot::ModuleFunction(name) => Value::ModuleFunction(parse_name::<ModuleFunction>(name, "module function")?),
            Slot::Stream(name) => Value::Stream(parse_name::<Stream>(name, "stream")?),
        };
        Ok(value)
    }
}

fn parse_name<T: FromStr>(name: &str, kind: &str) -> Result<T, CodecError> {
    T::from_str(name).map_err(|_| malformed(format!("unknown {kind} '{name}'")))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn version_is_checked_first() {
        let mut bytes = encode(&Value::Int(7)).unwrap();
        bytes[0] = 99;
        assert_eq!(
            decode(&bytes).unwrap_err(),
            CodecError::VersionMismatch {
                found: 99,
                expected: FORMAT_VERSION
            }
        );
        assert!(matches!(decode(&[]), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn aliasing_is_preserved() {
        let inner = Value::list(vec![Value::Int(1)]);
        let outer = Value::list(vec![inner.clone(), inner]);
        let decoded = decode(&encode(&outer).unwrap()).unwrap();
        let Value::List(items) = &decoded else { panic!("expected a list") };
        let items = items.borrow();
        assert!(items[0].is(&items[1]));
    }

    #[test]
    fn shared_objects_take_one_slot() {
        let shared = Value::list(vec![Value::str("x")]);
        let mut encoder = Encoder::default();
        Value::tuple(vec![shared.clone(), shared.clone(), shared])
            .transport(&mut encoder)
            .unwrap();
        // one list, its string, the tuple
        assert_eq!(encoder.slots.len(), 3);
    }

    #[test]
    fn deep_nesting_is_refused() {
        let mut value = Value::None;
        for _ in 0..=MAX_DATA_DEPTH {
            value = Value::tuple(vec![value]);
        }
        assert_eq!(encode(&value).unwrap_err(), CodecError::TooDeep);
    }

    #[test]
    fn resources_name_their_type() {
        let path = tempfile::NamedTempFile::new().unwrap();
        let file = Resource::open(path.path().to_str().unwrap(), "r").unwrap();
        let err = encode(&Value::Resource(Rc::new(file))).unwrap_err();
        assert_eq!(err.to_string(), "cannot serialize '_io.TextIOWrapper' object");
    }
}
