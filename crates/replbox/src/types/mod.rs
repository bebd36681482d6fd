//! Built-in classes: constructors, `type()`, attribute access and method calls.

mod dict;
mod list;
mod string;

pub(crate) use list::sort_values;

use std::rc::Rc;

use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    args::{ArgValues, expect_int, expect_str},
    exception::{ExcType, Exception, RunResult},
    ops,
    run::Interpreter,
    value::{Dict, Range, Value},
};

/// A built-in class, as returned by `type(x)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Type {
    Int,
    Float,
    Str,
    Bool,
    List,
    Tuple,
    Dict,
    Range,
    Type,
    #[strum(serialize = "NoneType")]
    NoneType,
    Function,
    #[strum(serialize = "builtin_function_or_method")]
    BuiltinFunction,
    Module,
    #[strum(serialize = "TextIOWrapper")]
    TextIO,
    Object,
}

impl Type {
    /// Classes bound as builtin names.
    pub(crate) const CONSTRUCTIBLE: [Self; 10] = [
        Self::Int,
        Self::Float,
        Self::Str,
        Self::Bool,
        Self::List,
        Self::Tuple,
        Self::Dict,
        Self::Range,
        Self::Type,
        Self::Object,
    ];

    /// Name used in `<class '...'>`.
    #[must_use]
    pub fn qualified_name(self) -> String {
        match self {
            Self::TextIO => "_io.TextIOWrapper".to_owned(),
            other => other.to_string(),
        }
    }

    /// `isinstance(value, self)`
    #[must_use]
    pub(crate) fn matches(self, value: &Value) -> bool {
        match (self, value) {
            (Self::Object, _) | (Self::Int, Value::Bool(_)) => true,
            (ty, value) => type_of(value) == Value::Type(ty),
        }
    }
}

/// `type(value)`
pub(crate) fn type_of(value: &Value) -> Value {
    let ty = match value {
        Value::None => Type::NoneType,
        Value::Bool(_) => Type::Bool,
        Value::Int(_) => Type::Int,
        Value::Float(_) => Type::Float,
        Value::Str(_) => Type::Str,
        Value::List(_) => Type::List,
        Value::Tuple(_) => Type::Tuple,
        Value::Dict(_) => Type::Dict,
        Value::Range(_) => Type::Range,
        Value::Function(_) => Type::Function,
        Value::Builtin(_) | Value::ModuleFunction(_) => Type::BuiltinFunction,
        Value::Type(_) | Value::ExcClass(_) => Type::Type,
        Value::Exception(exc) => return Value::ExcClass(exc.exc_type()),
        Value::Module(_) => Type::Module,
        Value::Stream(_) => Type::TextIO,
        Value::Resource(resource) if resource.is_file() => Type::TextIO,
        Value::Resource(_) => Type::Object,
    };
    Value::Type(ty)
}

/// Calls a class: `int("3")`, `list(xs)`, `type(x)` and so on.
pub(crate) fn call_type(ty: Type, mut args: ArgValues) -> RunResult<Value> {
    match ty {
        Type::Int => {
            let base_kwarg = args.take_kwarg("base");
            match args.get_int_args()? {
                (None, _) => Ok(Value::Int(0)),
                (Some(value), base) => to_int(&value, base.or(base_kwarg).as_ref()),
            }
        }
        Type::Float => match args.get_zero_one_arg("float")? {
            None => Ok(Value::Float(0.0)),
            Some(value) => to_float(&value),
        },
        Type::Str => Ok(args.get_zero_one_arg("str")?.map_or_else(|| Value::str(""), |v| Value::from(v.py_str()))),
        Type::Bool => Ok(Value::Bool(args.get_zero_one_arg("bool")?.is_some_and(|v| v.is_truthy()))),
        Type::List => Ok(Value::list(match args.get_zero_one_arg("list")? {
            Some(iterable) => ops::iterate(&iterable)?,
            None => Vec::new(),
        })),
        Type::Tuple => Ok(Value::tuple(match args.get_zero_one_arg("tuple")? {
            Some(iterable) => ops::iterate(&iterable)?,
            None => Vec::new(),
        })),
        Type::Dict => {
            let kwargs = std::mem::take(&mut args.kwargs);
            let mut dict = match args.get_zero_one_arg("dict")? {
                Some(source) => dict::from_source(&source)?,
                None => Dict::new(),
            };
            for (key, value) in kwargs {
                dict.insert(Value::from(key), value)?;
            }
            Ok(Value::dict(dict))
        }
        Type::Range => make_range(args),
        Type::Type => {
            let value = args.get_one_arg("type")?;
            Ok(type_of(&value))
        }
        Type::Object => {
            args.check_zero_args("object")?;
            Err(Exception::new(
                ExcType::NotImplementedError,
                "plain object instances are not supported",
            ))
        }
        Type::NoneType | Type::Function | Type::BuiltinFunction | Type::Module | Type::TextIO => Err(
            Exception::type_error(format!("cannot create '{}' instances", ty.qualified_name())),
        ),
    }
}

impl ArgValues {
    /// `(x, base)` for `int(x, base)`, both optional.
    fn get_int_args(self) -> RunResult<(Option<Value>, Option<Value>)> {
        self.reject_kwargs("int")?;
        let count = self.positional.len();
        let mut positional = self.positional.into_iter();
        match (positional.next(), positional.next(), positional.next()) {
            (first, second, None) => Ok((first, second)),
            _ => Err(Exception::type_error(format!(
                "int() takes at most 2 arguments ({count} given)"
            ))),
        }
    }
}

fn to_int(value: &Value, base: Option<&Value>) -> RunResult<Value> {
    if let Some(base) = base {
        let base = expect_int(base)?;
        let Value::Str(text) = value else {
            return Err(Exception::type_error("int() can't convert non-string with explicit base"));
        };
        let radix = u32::try_from(base)
            .ok()
            .filter(|b| (2..=36).contains(b))
            .ok_or_else(|| Exception::value_error("int() base must be >= 2 and <= 36, or 0"))?;
        let cleaned = text.trim().replace('_', "");
        return i64::from_str_radix(&cleaned, radix).map(Value::Int).map_err(|_| {
            Exception::value_error(format!("invalid literal for int() with base {base}: {}", value.py_repr()))
        });
    }
    match value {
        Value::Int(_) => Ok(value.clone()),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) => {
            if f.is_nan() {
                return Err(Exception::value_error("cannot convert float NaN to integer"));
            }
            let truncated = f.trunc();
            if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
                return Err(Exception::new(
                    ExcType::OverflowError,
                    "cannot convert float infinity to integer",
                ));
            }
            #[expect(clippy::cast_possible_truncation, reason = "range checked above")]
            let int = truncated as i64;
            Ok(Value::Int(int))
        }
        Value::Str(text) => text.trim().replace('_', "").parse::<i64>().map(Value::Int).map_err(|_| {
            Exception::value_error(format!("invalid literal for int() with base 10: {}", value.py_repr()))
        }),
        other => Err(Exception::type_error(format!(
            "int() argument must be a string, a bytes-like object or a real number, not '{}'",
            other.type_name()
        ))),
    }
}

fn to_float(value: &Value) -> RunResult<Value> {
    match value {
        Value::Float(_) => Ok(value.clone()),
        Value::Str(text) => {
            text.trim()
                .replace('_', "")
                .parse::<f64>()
                .ok()
                .map(Value::Float)
                .ok_or_else(|| Exception::value_error(format!("could not convert string to float: {}", value.py_repr())))
        }
        other => match other.as_number() {
            Some(number) => Ok(Value::Float(number.as_f64())),
            None => Err(Exception::type_error(format!(
                "float() argument must be a string or a real number, not '{}'",
                other.type_name()
            ))),
        },
    }
}

fn make_range(args: ArgValues) -> RunResult<Value> {
    args.reject_kwargs("range")?;
    let bounds = args.positional.iter().map(expect_int).collect::<RunResult<Vec<_>>>()?;
    let (start, stop, step) = match bounds.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        [] => return Err(Exception::type_error("range expected at least 1 argument, got 0")),
        more => {
            return Err(Exception::type_error(format!(
                "range expected at most 3 arguments, got {}",
                more.len()
            )));
        }
    };
    if step == 0 {
        return Err(Exception::value_error("range() arg 3 must not be zero"));
    }
    Ok(Value::Range(Range { start, stop, step }))
}

/// `value.attr` for data attributes. Methods are only reachable through a call.
pub(crate) fn get_attribute(value: &Value, attr: &str) -> RunResult<Value> {
    let found = match (value, attr) {
        (Value::Module(module), _) => return crate::modules::get_attr(*module, attr),
        (Value::Exception(exc), "args") => Some(Value::tuple(
            exc.message().map(Value::str).into_iter().collect(),
        )),
        (Value::Function(function), "__name__") => Some(Value::str(function.name())),
        (Value::Builtin(builtin), "__name__") => Some(Value::str(builtin.to_string())),
        (Value::ModuleFunction(function), "__name__") => Some(Value::str(function.to_string())),
        (Value::Type(ty), "__name__") => Some(Value::str(ty.to_string())),
        (Value::ExcClass(exc_type), "__name__") => Some(Value::str(exc_type.to_string())),
        (Value::Resource(resource), "name") if resource.is_file() => Some(Value::from(resource.name()?)),
        (Value::Resource(resource), "closed") if resource.is_file() => Some(Value::Bool(resource.closed()?)),
        (Value::Range(range), "start") => Some(Value::Int(range.start)),
        (Value::Range(range), "stop") => Some(Value::Int(range.stop)),
        (Value::Range(range), "step") => Some(Value::Int(range.step)),
        (Value::Float(f), "real") => Some(Value::Float(*f)),
        (Value::Int(i), "real") => Some(Value::Int(*i)),
        _ => None,
    };
    found.ok_or_else(|| match value {
        Value::Type(ty) => Exception::new(
            ExcType::AttributeError,
            format!("type object '{ty}' has no attribute '{attr}'"),
        ),
        other => Exception::attribute_error(other.type_name(), attr),
    })
}

/// `receiver.name(*args)`
pub(crate) fn call_method(
    interp: &mut Interpreter<'_>,
    receiver: &Value,
    name: &str,
    args: ArgValues,
) -> RunResult<Value> {
    match receiver {
        Value::Str(s) => string::call_method(s, name, args),
        Value::List(items) => list::call_method(interp, receiver, items, name, args),
        Value::Dict(dict) => dict::call_method(dict, name, args),
        Value::Tuple(items) => match name {
            "count" => {
                let needle = args.get_one_arg("count")?;
                Ok(Value::Int(count_matches(items, &needle)))
            }
            "index" => {
                let needle = args.get_one_arg("index")?;
                position_of(items, &needle)
                    .ok_or_else(|| Exception::value_error("tuple.index(x): x not in tuple"))
            }
            _ => Err(Exception::attribute_error("tuple", name)),
        },
        Value::Stream(stream) => match name {
            "write" => {
                let text = args.get_one_arg("write")?;
                let text = expect_str(&text, "write")?;
                let count = text.chars().count();
                interp.writer().write_stream(*stream, text.into())?;
                Ok(Value::Int(i64::try_from(count).unwrap_or(i64::MAX)))
            }
            "flush" => {
                args.check_zero_args("flush")?;
                Ok(Value::None)
            }
            _ => Err(Exception::attribute_error(receiver.type_name(), name)),
        },
        Value::Resource(resource) if resource.is_file() => file_method(resource, name, args),
        _ => {
            let callee = get_attribute(receiver, name)?;
            interp.call(&callee, args)
        }
    }
}

fn file_method(resource: &Rc<crate::resource::Resource>, name: &str, args: ArgValues) -> RunResult<Value> {
    match name {
        "read" => {
            let size = match args.get_zero_one_arg("read")? {
                None | Some(Value::None) => None,
                Some(n) => usize::try_from(expect_int(&n)?).ok(),
            };
            Ok(Value::from(resource.read(size)?))
        }
        "readline" => {
            args.check_zero_args("readline")?;
            Ok(Value::from(resource.readline()?))
        }
        "readlines" => {
            args.check_zero_args("readlines")?;
            Ok(Value::list(ops::iterate(&Value::Resource(Rc::clone(resource)))?))
        }
        "write" => {
            let text = args.get_one_arg("write")?;
            let written = resource.write(expect_str(&text, "write")?)?;
            Ok(Value::Int(i64::try_from(written).unwrap_or(i64::MAX)))
        }
        "close" => {
            args.check_zero_args("close")?;
            resource.close()?;
            Ok(Value::None)
        }
        _ => Err(Exception::attribute_error(resource.type_name(), name)),
    }
}

pub(super) fn count_matches(items: &[Value], needle: &Value) -> i64 {
    let count = items.iter().filter(|item| item.py_eq(needle)).count();
    i64::try_from(count).unwrap_or(i64::MAX)
}

pub(super) fn position_of(items: &[Value], needle: &Value) -> Option<Value> {
    items
        .iter()
        .position(|item| item.py_eq(needle))
        .and_then(|i| i64::try_from(i).ok())
        .map(Value::Int)
}
