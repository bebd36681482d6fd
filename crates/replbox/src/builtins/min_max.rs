//! Implementation of the min() and max() builtin functions.

use std::cmp::Ordering;

use crate::{
    args::ArgValues,
    exception::{Exception, RunResult},
    ops,
    run::Interpreter,
    value::Value,
};

/// Shared implementation for min() and max().
///
/// Supports `min(iterable)` and `min(arg1, arg2, ...)`, plus the `key` and `default`
/// keywords. Ties keep the first item seen, as CPython does.
pub(super) fn builtin_min_max(interp: &mut Interpreter<'_>, mut args: ArgValues, is_min: bool) -> RunResult<Value> {
    let name = if is_min { "min" } else { "max" };
    let key = args.take_kwarg("key").filter(|key| !matches!(key, Value::None));
    let default = args.take_kwarg("default");
    args.reject_kwargs(name)?;

    let candidates = match args.positional.len() {
        0 => {
            return Err(Exception::type_error(format!(
                "{name} expected at least 1 argument, got 0"
            )));
        }
        1 => {
            let iterable = args.positional.remove(0);
            ops::iterate(&iterable)?
        }
        _ if default.is_some() => {
            return Err(Exception::type_error(format!(
                "Cannot specify a default for {name}() with multiple positional arguments"
            )));
        }
        _ => args.positional,
    };

    let wanted = if is_min { Ordering::Less } else { Ordering::Greater };
    let mut best: Option<(Value, Value)> = None;
    for item in candidates {
        let item_key = match &key {
            Some(key) => interp.call(key, ArgValues::one(item.clone()))?,
            None => item.clone(),
        };
        let replace = match &best {
            None => true,
            Some((best_key, _)) => ops::py_cmp(&item_key, best_key)? == wanted,
        };
        if replace {
            best = Some((item_key, item));
        }
    }
    match (best, default) {
        (Some((_, item)), _) => Ok(item),
        (None, Some(default)) => Ok(default),
        (None, None) => Err(Exception::value_error(format!("{name}() iterable argument is empty"))),
    }
}
