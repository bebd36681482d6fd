//! Implementation of the sorted() builtin function.

use crate::{
    args::ArgValues,
    exception::RunResult,
    ops,
    run::Interpreter,
    types::sort_values,
    value::Value,
};

/// `sorted(iterable, *, key=None, reverse=False)`
pub(super) fn builtin_sorted(interp: &mut Interpreter<'_>, mut args: ArgValues) -> RunResult<Value> {
    let key = args.take_kwarg("key").filter(|key| !matches!(key, Value::None));
    let reverse = args.take_kwarg("reverse").is_some_and(|r| r.is_truthy());
    let iterable = args.get_one_arg("sorted")?;
    let items = ops::iterate(&iterable)?;
    sort_values(interp, items, key.as_ref(), reverse).map(Value::list)
}
