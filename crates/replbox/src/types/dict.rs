//! `dict` methods.
//!
//! # Implemented Methods
//! - `get(key[, default])`
//! - `keys()`, `values()`, `items()` - return lists rather than live views
//! - `pop(key[, default])`
//! - `setdefault(key[, default])`
//! - `update([other], **kwargs)`
//! - `clear()`, `copy()`, `popitem()`

use std::cell::RefCell;

use crate::{
    args::ArgValues,
    exception::{Exception, RunResult},
    ops,
    value::{Dict, Value},
};

pub(super) fn call_method(dict: &RefCell<Dict>, name: &str, mut args: ArgValues) -> RunResult<Value> {
    match name {
        "get" => {
            let (key, default) = args.get_one_two_args("get")?;
            Ok(dict.borrow().get(&key)?.or(default).unwrap_or(Value::None))
        }
        "keys" => {
            args.check_zero_args("keys")?;
            Ok(Value::list(dict.borrow().keys().cloned().collect()))
        }
        "values" => {
            args.check_zero_args("values")?;
            Ok(Value::list(dict.borrow().values().cloned().collect()))
        }
        "items" => {
            args.check_zero_args("items")?;
            let items = dict
                .borrow()
                .iter()
                .map(|(k, v)| Value::tuple(vec![k.clone(), v.clone()]))
                .collect();
            Ok(Value::list(items))
        }
        "pop" => {
            let (key, default) = args.get_one_two_args("pop")?;
            let removed = dict.borrow_mut().remove(&key)?;
            removed
                .or(default)
                .ok_or_else(|| Exception::key_error(key.py_repr()))
        }
        "setdefault" => {
            let (key, default) = args.get_one_two_args("setdefault")?;
            if let Some(existing) = dict.borrow().get(&key)? {
                return Ok(existing);
            }
            let default = default.unwrap_or(Value::None);
            dict.borrow_mut().insert(key, default.clone())?;
            Ok(default)
        }
        "update" => {
            let kwargs = std::mem::take(&mut args.kwargs);
            let incoming = match args.get_zero_one_arg("update")? {
                Some(source) => from_source(&source)?,
                None => Dict::new(),
            };
            let mut dict = dict.borrow_mut();
            for (key, value) in incoming.iter() {
                dict.insert(key.clone(), value.clone())?;
            }
            for (key, value) in kwargs {
                dict.insert(Value::from(key), value)?;
            }
            Ok(Value::None)
        }
        "clear" => {
            args.check_zero_args("clear")?;
            dict.borrow_mut().clear();
            Ok(Value::None)
        }
        "copy" => {
            args.check_zero_args("copy")?;
            Ok(Value::dict(dict.borrow().clone()))
        }
        "popitem" => {
            args.check_zero_args("popitem")?;
            let (key, value) = dict
                .borrow_mut()
                .pop_last()
                .ok_or_else(|| Exception::key_error("'popitem(): dictionary is empty'".to_owned()))?;
            Ok(Value::tuple(vec![key, value]))
        }
        _ => Err(Exception::attribute_error("dict", name)),
    }
}

/// Builds a dict from another dict or an iterable of pairs, as `dict(x)` and `update(x)` do.
pub(super) fn from_source(source: &Value) -> RunResult<Dict> {
    if let Value::Dict(other) = source {
        return Ok(other.borrow().clone());
    }
    let mut dict = Dict::new();
    for (index, item) in ops::iterate(source)?.into_iter().enumerate() {
        let pair = ops::iterate(&item).map_err(|_| {
            Exception::type_error(format!(
                "cannot convert dictionary update sequence element #{index} to a sequence"
            ))
        })?;
        let Ok([key, value]) = <[Value; 2]>::try_from(pair) else {
            return Err(Exception::value_error(format!(
                "dictionary update sequence element #{index} has wrong length; 2 is required"
            )));
        };
        dict.insert(key, value)?;
    }
    Ok(dict)
}
