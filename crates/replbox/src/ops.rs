//! Operator semantics: arithmetic, comparison, membership, iteration and subscripting.

use std::{cmp::Ordering, rc::Rc};

use crate::{
    exception::{ExcType, Exception, RunResult},
    expressions::{CmpOperator, Operator, UnaryOperator},
    format::percent_format,
    value::{Number, Value},
};

pub(crate) fn binary_op(op: Operator, left: &Value, right: &Value) -> RunResult<Value> {
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return match (a, b) {
            (Number::Int(a), Number::Int(b)) => int_op(op, a, b),
            _ => float_op(op, a.as_f64(), b.as_f64()),
        };
    }
    match (op, left, right) {
        (Operator::Add, Value::Str(a), Value::Str(b)) => {
            let mut s = String::with_capacity(a.len() + b.len());
            s.push_str(a);
            s.push_str(b);
            Ok(Value::from(s))
        }
        (Operator::Add, Value::Str(_), other) => Err(Exception::type_error(format!(
            "can only concatenate str (not \"{}\") to str",
            other.type_name()
        ))),
        (Operator::Add, Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (Operator::Add, Value::List(_), other) => Err(Exception::type_error(format!(
            "can only concatenate list (not \"{}\") to list",
            other.type_name()
        ))),
        (Operator::Add, Value::Tuple(a), Value::Tuple(b)) => {
            Ok(Value::tuple(a.iter().chain(b.iter()).cloned().collect()))
        }
        (Operator::Mult, Value::Str(s), n) | (Operator::Mult, n, Value::Str(s)) if n.as_int().is_some() => {
            let count = repeat_count(n);
            Ok(Value::from(s.repeat(count)))
        }
        (Operator::Mult, Value::List(items), n) | (Operator::Mult, n, Value::List(items)) if n.as_int().is_some() => {
            let items = items.borrow();
            Ok(Value::list(repeat_items(&items, repeat_count(n))))
        }
        (Operator::Mult, Value::Tuple(items), n) | (Operator::Mult, n, Value::Tuple(items))
            if n.as_int().is_some() =>
        {
            Ok(Value::tuple(repeat_items(items, repeat_count(n))))
        }
        (Operator::Mod, Value::Str(template), args) => percent_format(template, args).map(Value::from),
        (Operator::BitOr, Value::Dict(a), Value::Dict(b)) => {
            let mut merged = a.borrow().clone();
            for (key, value) in b.borrow().iter() {
                merged.insert(key.clone(), value.clone())?;
            }
            Ok(Value::dict(merged))
        }
        _ => Err(unsupported_operands(op.symbol(), left, right)),
    }
}

fn repeat_count(n: &Value) -> usize {
    n.as_int().map_or(0, |n| usize::try_from(n).unwrap_or(0))
}

fn repeat_items(items: &[Value], count: usize) -> Vec<Value> {
    let mut out = Vec::with_capacity(items.len() * count);
    for _ in 0..count {
        out.extend(items.iter().cloned());
    }
    out
}

fn unsupported_operands(symbol: &str, left: &Value, right: &Value) -> Exception {
    Exception::type_error(format!(
        "unsupported operand type(s) for {symbol}: '{}' and '{}'",
        left.type_name(),
        right.type_name()
    ))
}

fn int_op(op: Operator, a: i64, b: i64) -> RunResult<Value> {
    let result = match op {
        Operator::Add => a.checked_add(b),
        Operator::Sub => a.checked_sub(b),
        Operator::Mult => a.checked_mul(b),
        Operator::Div => {
            if b == 0 {
                return Err(Exception::zero_division("division by zero"));
            }
            return Ok(Value::Float(a as f64 / b as f64));
        }
        Operator::FloorDiv => {
            if b == 0 {
                return Err(Exception::zero_division("integer division or modulo by zero"));
            }
            a.checked_div(b).map(|q| if a % b != 0 && ((a < 0) != (b < 0)) { q - 1 } else { q })
        }
        Operator::Mod => {
            if b == 0 {
                return Err(Exception::zero_division("integer modulo by zero"));
            }
            if b == -1 {
                Some(0)
            } else {
                a.checked_rem(b).map(|r| if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r })
            }
        }
        Operator::Pow => {
            if b < 0 {
                return float_op(op, a as f64, b as f64);
            }
            match u32::try_from(b) {
                Ok(exp) => a.checked_pow(exp),
                Err(_) if matches!(a, 0 | 1) => Some(a),
                Err(_) if a == -1 => Some(if b % 2 == 0 { 1 } else { -1 }),
                Err(_) => None,
            }
        }
        Operator::LShift => {
            if b < 0 {
                return Err(Exception::value_error("negative shift count"));
            }
            if a == 0 {
                Some(0)
            } else if b >= 63 {
                None
            } else {
                let shifted = a << b;
                (shifted >> b == a).then_some(shifted)
            }
        }
        Operator::RShift => {
            if b < 0 {
                return Err(Exception::value_error("negative shift count"));
            }
            Some(if b >= 64 { if a < 0 { -1 } else { 0 } } else { a >> b })
        }
        Operator::BitAnd => Some(a & b),
        Operator::BitOr => Some(a | b),
        Operator::BitXor => Some(a ^ b),
    };
    result.map(Value::Int).ok_or_else(Exception::overflow)
}

fn float_op(op: Operator, a: f64, b: f64) -> RunResult<Value> {
    let result = match op {
        Operator::Add => a + b,
        Operator::Sub => a - b,
        Operator::Mult => a * b,
        Operator::Div => {
            if b == 0.0 {
                return Err(Exception::zero_division("float division by zero"));
            }
            a / b
        }
        Operator::FloorDiv => {
            if b == 0.0 {
                return Err(Exception::zero_division("float floor division by zero"));
            }
            (a / b).floor()
        }
        Operator::Mod => {
            if b == 0.0 {
                return Err(Exception::zero_division("float modulo by zero"));
            }
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) { r + b } else { r }
        }
        Operator::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(Exception::zero_division("zero to a negative power"));
            }
            a.powf(b)
        }
        Operator::LShift | Operator::RShift | Operator::BitAnd | Operator::BitOr | Operator::BitXor => {
            return Err(unsupported_operands(op.symbol(), &Value::Float(a), &Value::Float(b)));
        }
    };
    Ok(Value::Float(result))
}

pub(crate) fn unary_op(op: UnaryOperator, operand: &Value) -> RunResult<Value> {
    match (op, operand.as_number()) {
        (UnaryOperator::Not, _) => Ok(Value::Bool(!operand.is_truthy())),
        (UnaryOperator::Neg, Some(Number::Int(i))) => i.checked_neg().map(Value::Int).ok_or_else(Exception::overflow),
        (UnaryOperator::Neg, Some(Number::Float(f))) => Ok(Value::Float(-f)),
        (UnaryOperator::Pos, Some(Number::Int(i))) => Ok(Value::Int(i)),
        (UnaryOperator::Pos, Some(Number::Float(f))) => Ok(Value::Float(f)),
        (UnaryOperator::Invert, Some(Number::Int(i))) => Ok(Value::Int(!i)),
        _ => {
            let symbol = match op {
                UnaryOperator::Neg => "-",
                UnaryOperator::Pos => "+",
                UnaryOperator::Invert | UnaryOperator::Not => "~",
            };
            Err(Exception::type_error(format!(
                "bad operand type for unary {symbol}: '{}'",
                operand.type_name()
            )))
        }
    }
}

pub(crate) fn compare(op: CmpOperator, left: &Value, right: &Value) -> RunResult<bool> {
    Ok(match op {
        CmpOperator::Eq => left.py_eq(right),
        CmpOperator::NotEq => !left.py_eq(right),
        CmpOperator::Is => left.is(right),
        CmpOperator::IsNot => !left.is(right),
        CmpOperator::In => contains(right, left)?,
        CmpOperator::NotIn => !contains(right, left)?,
        CmpOperator::Lt => partial_order(op, left, right)? == Some(Ordering::Less),
        CmpOperator::LtE => matches!(partial_order(op, left, right)?, Some(Ordering::Less | Ordering::Equal)),
        CmpOperator::Gt => partial_order(op, left, right)? == Some(Ordering::Greater),
        CmpOperator::GtE => matches!(
            partial_order(op, left, right)?,
            Some(Ordering::Greater | Ordering::Equal)
        ),
    })
}

/// Orders two values for `sorted`, `min` and `max`; incomparable NaNs sort as equal.
pub(crate) fn py_cmp(left: &Value, right: &Value) -> RunResult<Ordering> {
    Ok(partial_order(CmpOperator::Lt, left, right)?.unwrap_or(Ordering::Equal))
}

fn partial_order(op: CmpOperator, left: &Value, right: &Value) -> RunResult<Option<Ordering>> {
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return Ok(a.partial_cmp(b));
    }
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
        (Value::List(a), Value::List(b)) => {
            let (a, b) = (a.borrow().clone(), b.borrow().clone());
            sequence_order(op, &a, &b)
        }
        (Value::Tuple(a), Value::Tuple(b)) => sequence_order(op, a, b),
        _ => Err(Exception::type_error(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))),
    }
}

/// Lexicographic order: the first unequal pair decides, then length.
fn sequence_order(op: CmpOperator, a: &[Value], b: &[Value]) -> RunResult<Option<Ordering>> {
    for (x, y) in a.iter().zip(b) {
        if !x.py_eq(y) {
            return partial_order(op, x, y);
        }
    }
    Ok(Some(a.len().cmp(&b.len())))
}

pub(crate) fn contains(container: &Value, item: &Value) -> RunResult<bool> {
    match container {
        Value::Str(haystack) => match item {
            Value::Str(needle) => Ok(haystack.contains(needle.as_ref())),
            other => Err(Exception::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::List(items) => Ok(items.borrow().iter().any(|v| v.py_eq(item))),
        Value::Tuple(items) => Ok(items.iter().any(|v| v.py_eq(item))),
        Value::Dict(dict) => dict.borrow().contains(item),
        Value::Range(range) => Ok(match item.as_number() {
            Some(Number::Int(i)) => range.iter().any(|x| x == i),
            Some(Number::Float(f)) => range.iter().any(|x| x as f64 == f),
            None => false,
        }),
        other => Err(Exception::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

/// Materializes an iterable into its items.
pub(crate) fn iterate(value: &Value) -> RunResult<Vec<Value>> {
    match value {
        Value::List(items) => Ok(items.borrow().clone()),
        Value::Tuple(items) => Ok(items.to_vec()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::from(c.to_string())).collect()),
        Value::Dict(dict) => Ok(dict.borrow().keys().cloned().collect()),
        Value::Range(range) => Ok(range.iter().map(Value::Int).collect()),
        Value::Resource(resource) if resource.is_file() => {
            let mut lines = Vec::new();
            loop {
                let line = resource.readline()?;
                if line.is_empty() {
                    break;
                }
                lines.push(Value::from(line));
            }
            Ok(lines)
        }
        other => Err(Exception::not_iterable(other.type_name())),
    }
}

/// Resolves a possibly negative index against `len`.
fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { index + len } else { index };
    if (0..len).contains(&index) {
        usize::try_from(index).ok()
    } else {
        None
    }
}

fn sequence_index(container: &Value, index: &Value, len: usize) -> RunResult<usize> {
    let Some(i) = index.as_int() else {
        return Err(Exception::type_error(format!(
            "{} indices must be integers or slices, not {}",
            container.type_name(),
            index.type_name()
        )));
    };
    normalize_index(i, len)
        .ok_or_else(|| Exception::index_error(format!("{} index out of range", container.type_name())))
}

fn rename_index_error(err: Exception, message: &str) -> Exception {
    if err.exc_type() == ExcType::IndexError {
        Exception::index_error(message)
    } else {
        err
    }
}

/// `container[index]`
pub(crate) fn get_item(container: &Value, index: &Value) -> RunResult<Value> {
    match container {
        Value::List(items) => {
            let items = items.borrow();
            let i = sequence_index(container, index, items.len())?;
            Ok(items[i].clone())
        }
        Value::Tuple(items) => {
            let i = sequence_index(container, index, items.len())?;
            Ok(items[i].clone())
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = sequence_index(container, index, chars.len())
                .map_err(|e| rename_index_error(e, "string index out of range"))?;
            Ok(Value::from(chars[i].to_string()))
        }
        Value::Range(range) => {
            let i = sequence_index(container, index, range.len())?;
            range
                .get(i)
                .map(Value::Int)
                .ok_or_else(|| Exception::index_error("range object index out of range"))
        }
        Value::Dict(dict) => dict
            .borrow()
            .get(index)?
            .ok_or_else(|| Exception::key_error(index.py_repr())),
        other => Err(Exception::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// `container[index] = value`
pub(crate) fn set_item(container: &Value, index: &Value, value: Value) -> RunResult<()> {
    match container {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let i = sequence_index(container, index, items.len())
                .map_err(|e| rename_index_error(e, "list assignment index out of range"))?;
            items[i] = value;
            Ok(())
        }
        Value::Dict(dict) => dict.borrow_mut().insert(index.clone(), value),
        other => Err(Exception::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

/// `del container[index]`
pub(crate) fn del_item(container: &Value, index: &Value) -> RunResult<()> {
    match container {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let i = sequence_index(container, index, items.len())?;
            items.remove(i);
            Ok(())
        }
        Value::Dict(dict) => match dict.borrow_mut().remove(index)? {
            Some(_) => Ok(()),
            None => Err(Exception::key_error(index.py_repr())),
        },
        other => Err(Exception::type_error(format!(
            "'{}' object doesn't support item deletion",
            other.type_name()
        ))),
    }
}

/// Index positions selected by `[lower:upper:step]` over a sequence of `len` items.
fn slice_indices(len: usize, lower: &Value, upper: &Value, step: &Value) -> RunResult<Vec<usize>> {
    let bound = |value: &Value| -> RunResult<Option<i64>> {
        match value {
            Value::None => Ok(None),
            other => other.as_int().map(Some).ok_or_else(|| {
                Exception::type_error("slice indices must be integers or None or have an __index__ method")
            }),
        }
    };
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let step = bound(step)?.unwrap_or(1);
    if step == 0 {
        return Err(Exception::value_error("slice step cannot be zero"));
    }
    let adjust = |v: i64| -> i64 {
        if v < 0 {
            let v = v + len;
            if v < 0 { if step < 0 { -1 } else { 0 } } else { v }
        } else if v >= len {
            if step < 0 { len - 1 } else { len }
        } else {
            v
        }
    };
    let (default_start, default_stop) = if step > 0 { (0, len) } else { (len - 1, -1) };
    let start = bound(lower)?.map_or(default_start, adjust);
    let stop = bound(upper)?.map_or(default_stop, adjust);
    let mut indices = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        if let Ok(index) = usize::try_from(i) {
            indices.push(index);
        }
        i += step;
    }
    Ok(indices)
}

/// `container[lower:upper:step]`
pub(crate) fn get_slice(container: &Value, lower: &Value, upper: &Value, step: &Value) -> RunResult<Value> {
    match container {
        Value::List(items) => {
            let items = items.borrow();
            let picked = slice_indices(items.len(), lower, upper, step)?;
            Ok(Value::list(picked.into_iter().map(|i| items[i].clone()).collect()))
        }
        Value::Tuple(items) => {
            let picked = slice_indices(items.len(), lower, upper, step)?;
            Ok(Value::tuple(picked.into_iter().map(|i| items[i].clone()).collect()))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let picked = slice_indices(chars.len(), lower, upper, step)?;
            Ok(Value::from(picked.into_iter().map(|i| chars[i]).collect::<String>()))
        }
        Value::Range(range) => {
            let picked = slice_indices(range.len(), lower, upper, step)?;
            Ok(Value::list(picked.into_iter().filter_map(|i| range.get(i)).map(Value::Int).collect()))
        }
        other => Err(Exception::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// `container[lower:upper] = value` for lists.
pub(crate) fn set_slice(container: &Value, lower: &Value, upper: &Value, value: &Value) -> RunResult<()> {
    let Value::List(items) = container else {
        return Err(Exception::type_error(format!(
            "'{}' object does not support item assignment",
            container.type_name()
        )));
    };
    let replacement = iterate(value).map_err(|_| Exception::type_error("can only assign an iterable"))?;
    let mut items = items.borrow_mut();
    let picked = slice_indices(items.len(), lower, upper, &Value::None)?;
    let start = match (picked.first(), lower) {
        (Some(&first), _) => first,
        (None, Value::None) => 0,
        (None, _) => slice_indices(items.len(), lower, &Value::None, &Value::None)?
            .first()
            .copied()
            .unwrap_or(items.len()),
    };
    let end = start + picked.len();
    drop(items.splice(start..end, replacement));
    Ok(())
}

/// `len(value)`
pub(crate) fn length(value: &Value) -> RunResult<usize> {
    match value {
        Value::Str(s) => Ok(s.chars().count()),
        Value::List(items) => Ok(items.borrow().len()),
        Value::Tuple(items) => Ok(items.len()),
        Value::Dict(dict) => Ok(dict.borrow().len()),
        Value::Range(range) => Ok(range.len()),
        other => Err(Exception::type_error(format!(
            "object of type '{}' has no len()",
            other.type_name()
        ))),
    }
}

/// Shares the string when it is already a `str`, otherwise renders `str()`.
pub(crate) fn to_str(value: &Value) -> Rc<str> {
    match value {
        Value::Str(s) => Rc::clone(s),
        other => Rc::from(other.py_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_division_and_modulo_follow_python_signs() {
        assert_eq!(int_op(Operator::FloorDiv, -7, 2).unwrap(), Value::Int(-4));
        assert_eq!(int_op(Operator::Mod, -7, 2).unwrap(), Value::Int(1));
        assert_eq!(int_op(Operator::Mod, 7, -2).unwrap(), Value::Int(-1));
    }

    #[test]
    fn modulo_by_minus_one_is_zero() {
        assert_eq!(int_op(Operator::Mod, i64::MIN, -1).unwrap(), Value::Int(0));
        assert_eq!(int_op(Operator::Mod, 5, -1).unwrap(), Value::Int(0));
        let err = int_op(Operator::FloorDiv, i64::MIN, -1).unwrap_err();
        assert_eq!(err.exc_type(), ExcType::OverflowError);
    }

    #[test]
    fn integer_overflow_raises() {
        let err = int_op(Operator::Mult, i64::MAX, 2).unwrap_err();
        assert_eq!(err.exc_type(), ExcType::OverflowError);
    }

    #[test]
    fn slices() {
        let v = Value::list((0..6).map(Value::Int).collect());
        let s = get_slice(&v, &Value::Int(1), &Value::None, &Value::Int(2)).unwrap();
        assert_eq!(s.py_repr(), "[1, 3, 5]");
        let r = get_slice(&v, &Value::None, &Value::None, &Value::Int(-1)).unwrap();
        assert_eq!(r.py_repr(), "[5, 4, 3, 2, 1, 0]");
        let t = get_slice(&Value::str("hello"), &Value::Int(-3), &Value::None, &Value::None).unwrap();
        assert_eq!(t.py_repr(), "'llo'");
    }

    #[test]
    fn slice_assignment_replaces_a_run() {
        let v = Value::list((0..5).map(Value::Int).collect());
        let replacement = Value::list(vec![Value::str("a")]);
        set_slice(&v, &Value::Int(1), &Value::Int(4), &replacement).unwrap();
        assert_eq!(v.py_repr(), "[0, 'a', 4]");
        set_slice(&v, &Value::Int(3), &Value::None, &Value::list(vec![Value::Int(9)])).unwrap();
        assert_eq!(v.py_repr(), "[0, 'a', 4, 9]");
    }

    #[test]
    fn mixed_comparison_is_a_type_error() {
        let err = compare(CmpOperator::Lt, &Value::Int(1), &Value::str("a")).unwrap_err();
        assert_eq!(
            err.summary(),
            "TypeError: '<' not supported between instances of 'int' and 'str'"
        );
    }
}
