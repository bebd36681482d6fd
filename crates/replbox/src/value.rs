use std::{
    cell::RefCell,
    cmp::Ordering,
    fmt::{self, Write},
    mem,
    rc::Rc,
};

use indexmap::IndexMap;
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    builtins::Builtin,
    exception::{ExcType, Exception, RunResult},
    function::Function,
    modules::{Module, ModuleFunction},
    resource::Resource,
    types::Type,
};

/// Maximum depth `repr()` and `==` descend into nested containers before giving up.
#[cfg(not(debug_assertions))]
pub const MAX_DATA_DEPTH: usize = 400;
#[cfg(debug_assertions)]
pub const MAX_DATA_DEPTH: usize = 100;

/// A runtime value.
///
/// Containers and functions are reference counted: cloning a `Value` aliases the same list,
/// dict or function, the way Python names alias objects.
#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<[Value]>),
    Dict(Rc<RefCell<Dict>>),
    Range(Range),
    /// A user-defined function or lambda.
    Function(Rc<Function>),
    Builtin(Builtin),
    Type(Type),
    ExcClass(ExcType),
    Exception(Rc<Exception>),
    Module(Module),
    ModuleFunction(ModuleFunction),
    Stream(Stream),
    /// A handle bound to this process, such as an open file.
    Resource(Rc<Resource>),
}

/// `sys.stdout` / `sys.stderr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum Stream {
    #[strum(serialize = "stdout")]
    Stdout,
    #[strum(serialize = "stderr")]
    Stderr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl Range {
    #[must_use]
    pub fn len(&self) -> usize {
        let span = if self.step > 0 {
            i128::from(self.stop) - i128::from(self.start)
        } else {
            i128::from(self.start) - i128::from(self.stop)
        };
        let step = i128::from(self.step).abs();
        if span <= 0 {
            0
        } else {
            usize::try_from((span + step - 1) / step).unwrap_or(usize::MAX)
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `index`th element, if in range.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<i64> {
        if index >= self.len() {
            return None;
        }
        i64::try_from(index)
            .ok()
            .and_then(|i| i.checked_mul(self.step))
            .and_then(|offset| self.start.checked_add(offset))
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        (0..self.len()).map_while(|i| self.get(i))
    }
}

/// Hashable projection of a value, used as the key of [`Dict`].
///
/// Numbers are normalized so that `1`, `1.0` and `True` collide as they do in Python.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DictKey {
    None,
    Int(i64),
    Float(u64),
    Str(Rc<str>),
    Tuple(Vec<DictKey>),
    Range(Range),
    /// Objects hashed by identity (functions, exceptions, resources).
    Identity(usize),
    /// Built-in singletons such as `len` or `int`, keyed by kind and name.
    Named(&'static str, &'static str),
}

/// An insertion-ordered Python dict.
#[derive(Clone, Default)]
pub struct Dict {
    entries: IndexMap<DictKey, (Value, Value)>,
}

impl Dict {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Value) -> RunResult<Option<Value>> {
        let key = key.dict_key()?;
        Ok(self.entries.get(&key).map(|(_, v)| v.clone()))
    }

    /// Looks up a string key without building a `Value`.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&Value> {
        self.entries.get(&DictKey::Str(Rc::from(key))).map(|(_, v)| v)
    }

    /// Inserts or updates; an existing entry keeps its original key object and position.
    pub fn insert(&mut self, key: Value, value: Value) -> RunResult<()> {
        let dict_key = key.dict_key()?;
        match self.entries.get_mut(&dict_key) {
            Some(entry) => entry.1 = value,
            None => {
                self.entries.insert(dict_key, (key, value));
            }
        }
        Ok(())
    }

    pub fn remove(&mut self, key: &Value) -> RunResult<Option<Value>> {
        let key = key.dict_key()?;
        Ok(self.entries.shift_remove(&key).map(|(_, v)| v))
    }

    pub fn contains(&self, key: &Value) -> RunResult<bool> {
        Ok(self.entries.contains_key(&key.dict_key()?))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.values().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.values().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.values().map(|(_, v)| v)
    }

    /// Removes and returns the most recently inserted pair.
    pub fn pop_last(&mut self) -> Option<(Value, Value)> {
        self.entries.pop().map(|(_, pair)| pair)
    }

    fn drain_into(&mut self, out: &mut Vec<Value>) {
        for (_, (key, value)) in self.entries.drain(..) {
            out.push(key);
            out.push(value);
        }
    }
}

/// Containers are torn down with an explicit worklist, so dropping a deeply nested list
/// does not recurse once per level.
impl Drop for Value {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.release_children(&mut pending);
        while let Some(mut value) = pending.pop() {
            value.release_children(&mut pending);
        }
    }
}

impl Value {
    /// Moves the contents of a container only this value owns into `out`, leaving it empty.
    /// Shared containers are left alone: another owner keeps them alive.
    fn release_children(&mut self, out: &mut Vec<Self>) {
        match self {
            Self::List(items) => {
                if let Some(items) = Rc::get_mut(items) {
                    out.append(items.get_mut());
                }
            }
            Self::Tuple(items) => {
                if let Some(items) = Rc::get_mut(items) {
                    out.extend(items.iter_mut().map(|item| mem::replace(item, Self::None)));
                }
            }
            Self::Dict(dict) => {
                if let Some(dict) = Rc::get_mut(dict) {
                    dict.get_mut().drain_into(out);
                }
            }
            _ => {}
        }
    }

    /// Builds a `str` value.
    #[must_use]
    pub fn str(s: impl AsRef<str>) -> Self {
        Self::Str(Rc::from(s.as_ref()))
    }

    #[must_use]
    pub fn list(items: Vec<Self>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    #[must_use]
    pub fn tuple(items: Vec<Self>) -> Self {
        Self::Tuple(Rc::from(items))
    }

    #[must_use]
    pub fn dict(dict: Dict) -> Self {
        Self::Dict(Rc::new(RefCell::new(dict)))
    }

    /// Builds a dict from string keys, as used for namespaces and `**kwargs`.
    #[must_use]
    pub fn dict_from_pairs(pairs: impl IntoIterator<Item = (String, Self)>) -> Self {
        let mut dict = Dict::new();
        for (name, value) in pairs {
            let key = Rc::<str>::from(name);
            dict.entries
                .insert(DictKey::Str(Rc::clone(&key)), (Self::Str(key), value));
        }
        Self::dict(dict)
    }

    /// Python `type(x).__name__`.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Dict(_) => "dict",
            Self::Range(_) => "range",
            Self::Function(_) => "function",
            Self::Builtin(_) | Self::ModuleFunction(_) => "builtin_function_or_method",
            Self::Type(_) | Self::ExcClass(_) => "type",
            Self::Exception(exc) => exc.exc_type().into(),
            Self::Module(_) => "module",
            Self::Stream(_) => "TextIOWrapper",
            Self::Resource(resource) => resource.type_name(),
        }
    }

    /// Python `type(x).__module__`; the capture sanitizer filters on this.
    #[must_use]
    pub fn module_name(&self) -> &str {
        match self {
            Self::Function(_) => "__main__",
            Self::Stream(_) => "_io",
            Self::Resource(resource) => resource.module(),
            _ => "builtins",
        }
    }

    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.borrow().is_empty(),
            Self::Tuple(items) => !items.is_empty(),
            Self::Dict(dict) => !dict.borrow().is_empty(),
            Self::Range(range) => !range.is_empty(),
            _ => true,
        }
    }

    #[must_use]
    pub fn is_callable(&self) -> bool {
        match self {
            Self::Function(_) | Self::Builtin(_) | Self::Type(_) | Self::ExcClass(_) | Self::ModuleFunction(_) => {
                true
            }
            Self::Resource(resource) => resource.is_callable(),
            _ => false,
        }
    }

    /// Python `is`.
    #[must_use]
    pub fn is(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => Rc::ptr_eq(a, b) || a == b,
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Tuple(a), Self::Tuple(b)) => Rc::ptr_eq(a, b),
            (Self::Dict(a), Self::Dict(b)) => Rc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            (Self::Exception(a), Self::Exception(b)) => Rc::ptr_eq(a, b),
            (Self::Resource(a), Self::Resource(b)) => Rc::ptr_eq(a, b),
            (Self::Range(a), Self::Range(b)) => a == b,
            (Self::Builtin(a), Self::Builtin(b)) => a == b,
            (Self::Type(a), Self::Type(b)) => a == b,
            (Self::ExcClass(a), Self::ExcClass(b)) => a == b,
            (Self::Module(a), Self::Module(b)) => a == b,
            (Self::ModuleFunction(a), Self::ModuleFunction(b)) => a == b,
            (Self::Stream(a), Self::Stream(b)) => a == b,
            _ => false,
        }
    }

    /// Python `==`: structural for data, identity for callables and resources.
    #[must_use]
    pub fn py_eq(&self, other: &Self) -> bool {
        self.eq_depth(other, 0)
    }

    fn eq_depth(&self, other: &Self, depth: usize) -> bool {
        if depth > MAX_DATA_DEPTH {
            return false;
        }
        match (self, other) {
            (Self::List(a), Self::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.eq_depth(y, depth + 1))
            }
            (Self::Tuple(a), Self::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.eq_depth(y, depth + 1))
            }
            (Self::Dict(a), Self::Dict(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.entries
                        .iter()
                        .all(|(key, (_, value))| match b.entries.get(key) {
                            Some((_, other)) => value.eq_depth(other, depth + 1),
                            None => false,
                        })
            }
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Exception(a), Self::Exception(b)) => Rc::ptr_eq(a, b),
            (Self::Range(a), Self::Range(b)) => {
                a.len() == b.len() && (a.is_empty() || (a.start == b.start && (a.len() == 1 || a.step == b.step)))
            }
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a.eq(&b),
                _ => self.is(other),
            },
        }
    }

    /// Numeric view: bools and ints as integers, floats as floats.
    #[must_use]
    pub(crate) fn as_number(&self) -> Option<Number> {
        match self {
            Self::Bool(b) => Some(Number::Int(i64::from(*b))),
            Self::Int(i) => Some(Number::Int(*i)),
            Self::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    /// Integer view accepting bools, as index and count arguments do.
    #[must_use]
    pub(crate) fn as_int(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Projects the value to a dict key, failing for unhashable values.
    pub fn dict_key(&self) -> RunResult<DictKey> {
        Ok(match self {
            Self::None => DictKey::None,
            Self::Bool(b) => DictKey::Int(i64::from(*b)),
            Self::Int(i) => DictKey::Int(*i),
            Self::Float(f) => float_key(*f),
            Self::Str(s) => DictKey::Str(Rc::clone(s)),
            Self::Tuple(items) => DictKey::Tuple(items.iter().map(Self::dict_key).collect::<RunResult<_>>()?),
            Self::Range(range) => DictKey::Range(*range),
            Self::List(_) | Self::Dict(_) => return Err(Exception::unhashable(self.type_name())),
            Self::Function(f) => DictKey::Identity(Rc::as_ptr(f) as usize),
            Self::Exception(e) => DictKey::Identity(Rc::as_ptr(e) as usize),
            Self::Resource(r) => DictKey::Identity(Rc::as_ptr(r) as usize),
            Self::Builtin(b) => DictKey::Named("builtin", b.into()),
            Self::Type(t) => DictKey::Named("type", t.into()),
            Self::ExcClass(e) => DictKey::Named("exception", e.into()),
            Self::Module(m) => DictKey::Named("module", m.into()),
            Self::ModuleFunction(f) => DictKey::Named("module_function", f.into()),
            Self::Stream(s) => DictKey::Named("stream", s.into()),
        })
    }

    /// Python `repr()`.
    #[must_use]
    pub fn py_repr(&self) -> String {
        let mut out = String::new();
        let mut seen = Vec::new();
        self.repr_into(&mut out, &mut seen);
        out
    }

    /// Python `str()`.
    #[must_use]
    pub fn py_str(&self) -> String {
        match self {
            Self::Str(s) => s.to_string(),
            Self::Exception(exc) => exc.message().unwrap_or_default().to_owned(),
            _ => self.py_repr(),
        }
    }

    /// Writes the repr, tracking containers on the current path so cycles print as `[...]`.
    fn repr_into(&self, out: &mut String, seen: &mut Vec<usize>) {
        if seen.len() > MAX_DATA_DEPTH {
            out.push_str("...");
            return;
        }
        match self {
            Self::None => out.push_str("None"),
            Self::Bool(true) => out.push_str("True"),
            Self::Bool(false) => out.push_str("False"),
            Self::Int(i) => {
                let _ = write!(out, "{i}");
            }
            Self::Float(f) => out.push_str(&float_repr(*f)),
            Self::Str(s) => string_repr_fmt(s, out),
            Self::List(items) => {
                let id = Rc::as_ptr(items) as usize;
                if seen.contains(&id) {
                    out.push_str("[...]");
                    return;
                }
                seen.push(id);
                out.push('[');
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.repr_into(out, seen);
                }
                out.push(']');
                seen.pop();
            }
            Self::Tuple(items) => {
                seen.push(Rc::as_ptr(items).cast::<Self>() as usize);
                out.push('(');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.repr_into(out, seen);
                }
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
                seen.pop();
            }
            Self::Dict(dict) => {
                let id = Rc::as_ptr(dict) as usize;
                if seen.contains(&id) {
                    out.push_str("{...}");
                    return;
                }
                seen.push(id);
                out.push('{');
                for (i, (key, value)) in dict.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    key.repr_into(out, seen);
                    out.push_str(": ");
                    value.repr_into(out, seen);
                }
                out.push('}');
                seen.pop();
            }
            Self::Range(range) => {
                let _ = if range.step == 1 {
                    write!(out, "range({}, {})", range.start, range.stop)
                } else {
                    write!(out, "range({}, {}, {})", range.start, range.stop, range.step)
                };
            }
            Self::Function(f) => {
                let _ = write!(out, "<function {} at {:#x}>", f.name(), Rc::as_ptr(f) as usize);
            }
            Self::Builtin(b) => {
                let _ = write!(out, "<built-in function {b}>");
            }
            Self::Type(t) => {
                let _ = write!(out, "<class '{}'>", t.qualified_name());
            }
            Self::ExcClass(e) => {
                let _ = write!(out, "<class '{e}'>");
            }
            Self::Exception(exc) => out.push_str(&exc.py_repr()),
            Self::Module(m) => {
                let _ = write!(out, "<module '{m}' (built-in)>");
            }
            Self::ModuleFunction(f) => {
                let _ = write!(out, "<built-in function {f}>");
            }
            Self::Stream(s) => {
                let _ = write!(out, "<_io.TextIOWrapper name='<{s}>' mode='w' encoding='utf-8'>");
            }
            Self::Resource(resource) => out.push_str(&resource.py_repr()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.py_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.py_repr())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.py_str())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(Rc::from(s))
    }
}

/// A number pulled out of a `Value` for arithmetic.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub(crate) fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }

    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            _ => self.as_f64() == other.as_f64(),
        }
    }

    pub(crate) fn partial_cmp(self, other: Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(&b)),
            _ => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }
}

fn float_key(f: f64) -> DictKey {
    #[expect(clippy::cast_possible_truncation, reason = "only used when the float is integral and in range")]
    let truncated = f as i64;
    if f.fract() == 0.0 && truncated as f64 == f {
        DictKey::Int(truncated)
    } else {
        DictKey::Float(f.to_bits())
    }
}

/// Formats a float the way Python's `repr()` does.
#[must_use]
pub fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_owned();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf".to_owned() } else { "-inf".to_owned() };
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0.0".to_owned() } else { "0.0".to_owned() };
    }
    let abs = f.abs();
    if !(1e-4..1e16).contains(&abs) {
        let s = format!("{f:e}");
        let (mantissa, exponent) = s.split_once('e').unwrap_or((&s, "0"));
        let exponent: i32 = exponent.parse().unwrap_or_default();
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exponent.abs());
    }
    let s = format!("{f}");
    if s.contains('.') { s } else { format!("{s}.0") }
}

/// Writes a Python string literal for `s`, choosing quotes the way CPython does.
pub fn string_repr_fmt(s: &str, out: &mut String) {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_repr_matches_python() {
        assert_eq!(float_repr(1.0), "1.0");
        assert_eq!(float_repr(0.1), "0.1");
        assert_eq!(float_repr(2.5), "2.5");
        assert_eq!(float_repr(1e16), "1e+16");
        assert_eq!(float_repr(1.5e-5), "1.5e-05");
        assert_eq!(float_repr(123_456_789.0), "123456789.0");
        assert_eq!(float_repr(-0.0), "-0.0");
        assert_eq!(float_repr(f64::INFINITY), "inf");
    }

    #[test]
    fn string_repr_quotes() {
        assert_eq!(Value::str("abc").py_repr(), "'abc'");
        assert_eq!(Value::str("it's").py_repr(), "\"it's\"");
        assert_eq!(Value::str("a\nb").py_repr(), "'a\\nb'");
    }

    #[test]
    fn container_repr() {
        let v = Value::list(vec![
            Value::Int(1),
            Value::tuple(vec![Value::str("x")]),
            Value::dict_from_pairs([("k".to_owned(), Value::None)]),
        ]);
        assert_eq!(v.py_repr(), "[1, ('x',), {'k': None}]");
    }

    #[test]
    fn self_referencing_list_repr() {
        let v = Value::list(vec![Value::Int(1)]);
        if let Value::List(items) = &v {
            items.borrow_mut().push(v.clone());
        }
        assert_eq!(v.py_repr(), "[1, [...]]");
    }

    #[test]
    fn numeric_keys_collide() {
        let mut dict = Dict::new();
        dict.insert(Value::Int(1), Value::str("a")).unwrap();
        dict.insert(Value::Float(1.0), Value::str("b")).unwrap();
        dict.insert(Value::Bool(true), Value::str("c")).unwrap();
        assert_eq!(dict.len(), 1);
        assert_eq!(Value::dict(dict).py_repr(), "{1: 'c'}");
    }

    #[test]
    fn lists_are_unhashable() {
        let err = Value::list(vec![]).dict_key().unwrap_err();
        assert_eq!(err.summary(), "TypeError: unhashable type: 'list'");
    }

    #[test]
    fn range_len() {
        assert_eq!(Range { start: 0, stop: 10, step: 3 }.len(), 4);
        assert_eq!(Range { start: 10, stop: 0, step: -2 }.len(), 5);
        assert_eq!(Range { start: 5, stop: 0, step: 1 }.len(), 0);
    }
}
