//! Implementation of the isinstance() builtin function.

use crate::{
    args::ArgValues,
    exception::{Exception, RunResult},
    value::Value,
};

/// `isinstance(obj, classinfo)`; `classinfo` may be a class or a tuple of classes.
pub(super) fn builtin_isinstance(args: ArgValues) -> RunResult<Value> {
    let (value, classinfo) = args.get_two_args("isinstance")?;
    is_instance(&value, &classinfo).map(Value::Bool)
}

fn is_instance(value: &Value, classinfo: &Value) -> RunResult<bool> {
    match classinfo {
        Value::Type(ty) => Ok(ty.matches(value)),
        Value::ExcClass(exc_type) => Ok(match value {
            Value::Exception(exc) => exc.exc_type().is_subclass_of(*exc_type),
            _ => false,
        }),
        Value::Tuple(classes) => {
            for class in classes.iter() {
                if is_instance(value, class)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        _ => Err(Exception::type_error(
            "isinstance() arg 2 must be a type, a tuple of types, or a union",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{exception::ExcType, types::Type};

    #[test]
    fn bool_is_an_int() {
        assert!(is_instance(&Value::Bool(true), &Value::Type(Type::Int)).unwrap());
        assert!(!is_instance(&Value::Int(1), &Value::Type(Type::Bool)).unwrap());
    }

    #[test]
    fn tuple_of_classes() {
        let classes = Value::tuple(vec![Value::Type(Type::Str), Value::ExcClass(ExcType::LookupError)]);
        let err = Value::Exception(std::rc::Rc::new(Exception::new(ExcType::KeyError, "k")));
        assert!(is_instance(&err, &classes).unwrap());
        assert!(!is_instance(&Value::Int(1), &classes).unwrap());
    }
}
