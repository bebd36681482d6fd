//! Python builtin functions, types, and exception constructors.
//!
//! Builtins with more than a few lines of logic get their own submodule.

mod isinstance;
mod min_max; // min and max share implementation
mod print;
mod sorted;

use std::{
    hash::{BuildHasher, Hash as _, Hasher},
    rc::Rc,
    str::FromStr,
};

use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    args::{ArgValues, expect_int, expect_str},
    exception::{ExcType, Exception, RunResult},
    expressions::Operator,
    format::format_with_spec,
    ops,
    resource::Resource,
    run::Interpreter,
    types::Type,
    value::{DictKey, Number, Value},
};

/// Builtin functions that are not classes.
///
/// All variants serialize to lowercase (e.g., `Print` -> "print").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Builtin {
    Print,
    Len,
    Repr,
    Isinstance,
    Sum,
    Min,
    Max,
    Abs,
    Round,
    Sorted,
    Reversed,
    Enumerate,
    Zip,
    Any,
    All,
    Map,
    Filter,
    Callable,
    Open,
    Format,
    Divmod,
    Chr,
    Ord,
    Id,
    Hash,
}

/// Resolves a builtin name: functions, classes and exception classes.
pub(crate) fn lookup(name: &str) -> Option<Value> {
    if let Ok(builtin) = Builtin::from_str(name) {
        return Some(Value::Builtin(builtin));
    }
    if let Some(ty) = Type::CONSTRUCTIBLE.into_iter().find(|ty| <&str>::from(*ty) == name) {
        return Some(Value::Type(ty));
    }
    ExcType::from_str(name).ok().map(Value::ExcClass)
}

pub(crate) fn call(interp: &mut Interpreter<'_>, builtin: Builtin, mut args: ArgValues) -> RunResult<Value> {
    match builtin {
        Builtin::Print => print::builtin_print(interp, args),
        Builtin::Min => min_max::builtin_min_max(interp, args, true),
        Builtin::Max => min_max::builtin_min_max(interp, args, false),
        Builtin::Sorted => sorted::builtin_sorted(interp, args),
        Builtin::Isinstance => isinstance::builtin_isinstance(args),
        Builtin::Len => {
            let len = ops::length(&args.get_one_arg("len")?)?;
            Ok(Value::Int(i64::try_from(len).unwrap_or(i64::MAX)))
        }
        Builtin::Repr => Ok(Value::from(args.get_one_arg("repr")?.py_repr())),
        Builtin::Sum => {
            let start = args.take_kwarg("start");
            let (iterable, start_positional) = args.get_one_two_args("sum")?;
            let mut total = start.or(start_positional).unwrap_or(Value::Int(0));
            if matches!(total, Value::Str(_)) {
                return Err(Exception::type_error("sum() can't sum strings [use ''.join(seq) instead]"));
            }
            for item in ops::iterate(&iterable)? {
                total = ops::binary_op(Operator::Add, &total, &item)?;
            }
            Ok(total)
        }
        Builtin::Abs => {
            let value = args.get_one_arg("abs")?;
            match value.as_number() {
                Some(Number::Int(i)) => i.checked_abs().map(Value::Int).ok_or_else(Exception::overflow),
                Some(Number::Float(f)) => Ok(Value::Float(f.abs())),
                None => Err(Exception::type_error(format!(
                    "bad operand type for abs(): '{}'",
                    value.type_name()
                ))),
            }
        }
        Builtin::Round => {
            let ndigits = args.take_kwarg("ndigits");
            let (number, ndigits_positional) = args.get_one_two_args("round")?;
            round(&number, ndigits.or(ndigits_positional).filter(|n| !matches!(n, Value::None)))
        }
        Builtin::Reversed => {
            let value = args.get_one_arg("reversed")?;
            if matches!(value, Value::Dict(_)) {
                return Err(Exception::type_error("'dict' object is not reversible"));
            }
            let mut items = ops::iterate(&value)?;
            items.reverse();
            Ok(Value::list(items))
        }
        Builtin::Enumerate => {
            let start = args.take_kwarg("start");
            let (iterable, start_positional) = args.get_one_two_args("enumerate")?;
            let start = match start.or(start_positional) {
                Some(start) => expect_int(&start)?,
                None => 0,
            };
            let items = ops::iterate(&iterable)?
                .into_iter()
                .zip(start..)
                .map(|(item, i)| Value::tuple(vec![Value::Int(i), item]))
                .collect();
            Ok(Value::list(items))
        }
        Builtin::Zip => {
            args.reject_kwargs("zip")?;
            let columns = args
                .positional
                .iter()
                .map(ops::iterate)
                .collect::<RunResult<Vec<_>>>()?;
            let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
            let zipped = (0..rows)
                .map(|row| Value::tuple(columns.iter().map(|column| column[row].clone()).collect()))
                .collect();
            Ok(Value::list(zipped))
        }
        Builtin::Any => Ok(Value::Bool(ops::iterate(&args.get_one_arg("any")?)?.iter().any(Value::is_truthy))),
        Builtin::All => Ok(Value::Bool(ops::iterate(&args.get_one_arg("all")?)?.iter().all(Value::is_truthy))),
        Builtin::Map => {
            args.reject_kwargs("map")?;
            let mut positional = args.positional.into_iter();
            let Some(function) = positional.next() else {
                return Err(Exception::type_error("map() must have at least two arguments."));
            };
            let columns = positional.map(|v| ops::iterate(&v)).collect::<RunResult<Vec<_>>>()?;
            if columns.is_empty() {
                return Err(Exception::type_error("map() must have at least two arguments."));
            }
            let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
            let mut mapped = Vec::with_capacity(rows);
            for row in 0..rows {
                let call_args = columns.iter().map(|column| column[row].clone()).collect();
                mapped.push(interp.call(&function, ArgValues::positional(call_args))?);
            }
            Ok(Value::list(mapped))
        }
        Builtin::Filter => {
            let (predicate, iterable) = args.get_two_args("filter")?;
            let mut kept = Vec::new();
            for item in ops::iterate(&iterable)? {
                let keep = match predicate {
                    Value::None => item.is_truthy(),
                    _ => interp.call(&predicate, ArgValues::one(item.clone()))?.is_truthy(),
                };
                if keep {
                    kept.push(item);
                }
            }
            Ok(Value::list(kept))
        }
        Builtin::Callable => Ok(Value::Bool(args.get_one_arg("callable")?.is_callable())),
        Builtin::Open => {
            let mode = args.take_kwarg("mode");
            let _ = args.take_kwarg("encoding");
            let (path, mode_positional) = args.get_one_two_args("open")?;
            let path = expect_str(&path, "open")?;
            let mode = mode.or(mode_positional);
            let mode = match &mode {
                Some(mode) => expect_str(mode, "open")?,
                None => "r",
            };
            Ok(Value::Resource(Rc::new(Resource::open(path, mode)?)))
        }
        Builtin::Format => {
            let (value, spec) = args.get_one_two_args("format")?;
            let spec = match &spec {
                Some(spec) => expect_str(spec, "format")?,
                None => "",
            };
            format_with_spec(&value, spec).map(Value::from)
        }
        Builtin::Divmod => {
            let (a, b) = args.get_two_args("divmod")?;
            let quotient = ops::binary_op(Operator::FloorDiv, &a, &b)?;
            let remainder = ops::binary_op(Operator::Mod, &a, &b)?;
            Ok(Value::tuple(vec![quotient, remainder]))
        }
        Builtin::Chr => {
            let code = expect_int(&args.get_one_arg("chr")?)?;
            u32::try_from(code)
                .ok()
                .and_then(char::from_u32)
                .map(|c| Value::from(c.to_string()))
                .ok_or_else(|| Exception::value_error("chr() arg not in range(0x110000)"))
        }
        Builtin::Ord => {
            let value = args.get_one_arg("ord")?;
            let text = expect_str(&value, "ord")?;
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Int(i64::from(u32::from(c)))),
                _ => Err(Exception::type_error(format!(
                    "ord() expected a character, but string of length {} found",
                    text.chars().count()
                ))),
            }
        }
        Builtin::Id => {
            let value = args.get_one_arg("id")?;
            let id = match value.dict_key() {
                Ok(DictKey::Identity(address)) => address,
                _ => identity_address(&value),
            };
            Ok(Value::Int(i64::try_from(id).unwrap_or(i64::MAX)))
        }
        Builtin::Hash => {
            let key = args.get_one_arg("hash")?.dict_key()?;
            if let DictKey::Int(i) = key {
                return Ok(Value::Int(i));
            }
            let mut hasher = ahash::RandomState::with_seeds(0, 0, 0, 0).build_hasher();
            key.hash(&mut hasher);
            Ok(Value::Int(i64::from_ne_bytes(hasher.finish().to_ne_bytes())))
        }
    }
}

/// An address stand-in for `id()` on values that are not heap objects.
fn identity_address(value: &Value) -> usize {
    match value {
        Value::List(items) => Rc::as_ptr(items) as usize,
        Value::Dict(dict) => Rc::as_ptr(dict) as usize,
        Value::Tuple(items) => Rc::as_ptr(items).cast::<Value>() as usize,
        Value::Str(s) => Rc::as_ptr(s).cast::<u8>() as usize,
        other => std::ptr::from_ref(other) as usize,
    }
}

/// `round(number[, ndigits])`, rounding half to even like Python.
fn round(number: &Value, ndigits: Option<Value>) -> RunResult<Value> {
    let Some(number) = number.as_number() else {
        return Err(Exception::type_error(format!(
            "type {} doesn't define __round__ method",
            number.type_name()
        )));
    };
    match (number, ndigits) {
        (Number::Int(i), None) => Ok(Value::Int(i)),
        (Number::Float(f), None) => {
            let rounded = f.round_ties_even();
            if rounded.is_nan() {
                return Err(Exception::value_error("cannot convert float NaN to integer"));
            }
            if rounded.is_infinite() {
                return Err(Exception::new(
                    ExcType::OverflowError,
                    "cannot convert float infinity to integer",
                ));
            }
            if rounded < i64::MIN as f64 || rounded >= i64::MAX as f64 {
                return Err(Exception::overflow());
            }
            #[expect(clippy::cast_possible_truncation, reason = "range checked above")]
            let int = rounded as i64;
            Ok(Value::Int(int))
        }
        (Number::Int(i), Some(ndigits)) => {
            let ndigits = expect_int(&ndigits)?;
            if ndigits >= 0 {
                return Ok(Value::Int(i));
            }
            let factor = ndigits
                .checked_neg()
                .and_then(|exp| u32::try_from(exp).ok())
                .and_then(|exp| 10_i64.checked_pow(exp));
            let Some(factor) = factor else {
                // only 10**19 is reachable: magnitudes above 5 * 10**18 round up to it
                if ndigits == -19 && i.unsigned_abs() > 5 * 10_u64.pow(18) {
                    return Err(Exception::overflow());
                }
                return Ok(Value::Int(0));
            };
            let (quotient, remainder) = (i.div_euclid(factor), i.rem_euclid(factor));
            let twice = remainder * 2;
            let rounded_up = twice > factor || (twice == factor && quotient % 2 != 0);
            quotient
                .checked_add(i64::from(rounded_up))
                .and_then(|q| q.checked_mul(factor))
                .map(Value::Int)
                .ok_or_else(Exception::overflow)
        }
        (Number::Float(f), Some(ndigits)) => {
            let ndigits = i32::try_from(expect_int(&ndigits)?).unwrap_or(i32::MAX).clamp(-308, 308);
            let factor = 10_f64.powi(ndigits.abs());
            let rounded = if ndigits >= 0 {
                (f * factor).round_ties_even() / factor
            } else {
                (f / factor).round_ties_even() * factor
            };
            Ok(Value::Float(if rounded.is_finite() { rounded } else { f }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_resolves_each_kind() {
        assert!(matches!(lookup("len"), Some(Value::Builtin(Builtin::Len))));
        assert!(matches!(lookup("dict"), Some(Value::Type(Type::Dict))));
        assert!(matches!(lookup("KeyError"), Some(Value::ExcClass(ExcType::KeyError))));
        assert!(lookup("NoneType").is_none());
        assert!(lookup("undefined_name").is_none());
    }

    #[test]
    fn round_half_to_even() {
        assert_eq!(round(&Value::Float(2.5), None).unwrap().py_repr(), "2");
        assert_eq!(round(&Value::Float(3.5), None).unwrap().py_repr(), "4");
        assert_eq!(round(&Value::Float(2.675), Some(Value::Int(1))).unwrap().py_repr(), "2.7");
        assert_eq!(round(&Value::Int(1250), Some(Value::Int(-2))).unwrap().py_repr(), "1200");
        assert_eq!(round(&Value::Int(1350), Some(Value::Int(-2))).unwrap().py_repr(), "1400");
        assert_eq!(round(&Value::Int(-7), Some(Value::Int(-1))).unwrap().py_repr(), "-10");
    }

    #[test]
    fn round_int_past_i64_overflows() {
        let err = round(&Value::Int(i64::MAX), Some(Value::Int(-1))).unwrap_err();
        assert_eq!(err.exc_type(), ExcType::OverflowError);
        let err = round(&Value::Int(9_000_000_000_000_000_000), Some(Value::Int(-19))).unwrap_err();
        assert_eq!(err.exc_type(), ExcType::OverflowError);

        assert_eq!(round(&Value::Int(4_000_000_000_000_000_000), Some(Value::Int(-19))).unwrap(), Value::Int(0));
        assert_eq!(round(&Value::Int(i64::MIN), Some(Value::Int(i64::MIN))).unwrap(), Value::Int(0));
        assert_eq!(round(&Value::Int(i64::MAX), Some(Value::Int(-30))).unwrap(), Value::Int(0));
    }
}
