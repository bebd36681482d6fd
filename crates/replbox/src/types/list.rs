//! `list` methods.

use std::cell::RefCell;

use super::{count_matches, position_of};
use crate::{
    args::{ArgValues, expect_int},
    exception::{Exception, RunResult},
    ops,
    run::Interpreter,
    value::Value,
};

pub(super) fn call_method(
    interp: &mut Interpreter<'_>,
    receiver: &Value,
    items: &RefCell<Vec<Value>>,
    name: &str,
    mut args: ArgValues,
) -> RunResult<Value> {
    match name {
        "append" => {
            let item = args.get_one_arg("append")?;
            items.borrow_mut().push(item);
            Ok(Value::None)
        }
        "extend" => {
            // iterate first: `xs.extend(xs)` reads the list being extended
            let extra = ops::iterate(&args.get_one_arg("extend")?)?;
            items.borrow_mut().extend(extra);
            Ok(Value::None)
        }
        "insert" => {
            let (index, item) = args.get_two_args("insert")?;
            let mut items = items.borrow_mut();
            let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
            let index = expect_int(&index)?;
            let index = if index < 0 { (index + len).max(0) } else { index.min(len) };
            items.insert(usize::try_from(index).unwrap_or_default(), item);
            Ok(Value::None)
        }
        "pop" => {
            let index = match args.get_zero_one_arg("pop")? {
                Some(index) => Some(expect_int(&index)?),
                None => None,
            };
            let mut items = items.borrow_mut();
            if items.is_empty() {
                return Err(Exception::index_error("pop from empty list"));
            }
            let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
            let index = index.unwrap_or(-1);
            let resolved = if index < 0 { index + len } else { index };
            match usize::try_from(resolved).ok().filter(|&i| i < items.len()) {
                Some(i) => Ok(items.remove(i)),
                None => Err(Exception::index_error("pop index out of range")),
            }
        }
        "remove" => {
            let needle = args.get_one_arg("remove")?;
            let mut items = items.borrow_mut();
            match items.iter().position(|item| item.py_eq(&needle)) {
                Some(i) => {
                    items.remove(i);
                    Ok(Value::None)
                }
                None => Err(Exception::value_error("list.remove(x): x not in list")),
            }
        }
        "index" => {
            let needle = args.get_one_arg("index")?;
            position_of(&items.borrow(), &needle)
                .ok_or_else(|| Exception::value_error(format!("{} is not in list", needle.py_repr())))
        }
        "count" => {
            let needle = args.get_one_arg("count")?;
            Ok(Value::Int(count_matches(&items.borrow(), &needle)))
        }
        "sort" => {
            let key = args.take_kwarg("key").filter(|key| !matches!(key, Value::None));
            let reverse = args.take_kwarg("reverse").is_some_and(|r| r.is_truthy());
            args.check_zero_args("sort")?;
            // sort a copy so a key function that touches the list sees it unchanged
            let snapshot = items.borrow().clone();
            let sorted = sort_values(interp, snapshot, key.as_ref(), reverse)?;
            *items.borrow_mut() = sorted;
            Ok(Value::None)
        }
        "reverse" => {
            args.check_zero_args("reverse")?;
            items.borrow_mut().reverse();
            Ok(Value::None)
        }
        "clear" => {
            args.check_zero_args("clear")?;
            items.borrow_mut().clear();
            Ok(Value::None)
        }
        "copy" => {
            args.check_zero_args("copy")?;
            Ok(Value::list(items.borrow().clone()))
        }
        _ => Err(Exception::attribute_error(receiver.type_name(), name)),
    }
}

/// Stable sort shared by `list.sort` and `sorted`.
///
/// Keys are computed once per item. Comparison errors abort the sort and are returned.
pub(crate) fn sort_values(
    interp: &mut Interpreter<'_>,
    values: Vec<Value>,
    key: Option<&Value>,
    reverse: bool,
) -> RunResult<Vec<Value>> {
    let mut keyed = Vec::with_capacity(values.len());
    for value in values {
        let sort_key = match key {
            Some(key) => interp.call(key, ArgValues::one(value.clone()))?,
            None => value.clone(),
        };
        keyed.push((sort_key, value));
    }
    let mut error = None;
    keyed.sort_by(|(a, _), (b, _)| {
        if error.is_some() {
            return std::cmp::Ordering::Equal;
        }
        let ordering = if reverse { ops::py_cmp(b, a) } else { ops::py_cmp(a, b) };
        ordering.unwrap_or_else(|err| {
            error = Some(err);
            std::cmp::Ordering::Equal
        })
    });
    match error {
        Some(err) => Err(err),
        None => Ok(keyed.into_iter().map(|(_, value)| value).collect()),
    }
}
