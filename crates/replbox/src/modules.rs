//! The built-in modules code can import: `math` and `sys`.

use std::str::FromStr;

use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    args::ArgValues,
    exception::{ExcType, Exception, RunResult},
    value::{Number, Stream, Value},
};

/// Version string reported as `sys.version`.
const VERSION: &str = concat!("3.12.0 (replbox ", env!("CARGO_PKG_VERSION"), ")");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Module {
    Math,
    Sys,
}

/// Functions exposed by `math`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum ModuleFunction {
    Sqrt,
    Floor,
    Ceil,
    Log,
    Exp,
    Pow,
    Fabs,
    Isclose,
}

/// `import name`
pub(crate) fn import_module(name: &str) -> RunResult<Module> {
    Module::from_str(name)
        .map_err(|_| Exception::new(ExcType::ModuleNotFoundError, format!("No module named '{name}'")))
}

/// `module.attr`
pub(crate) fn get_attr(module: Module, attr: &str) -> RunResult<Value> {
    let value = match (module, attr) {
        (Module::Math, "pi") => Some(Value::Float(std::f64::consts::PI)),
        (Module::Math, "e") => Some(Value::Float(std::f64::consts::E)),
        (Module::Math, "tau") => Some(Value::Float(std::f64::consts::TAU)),
        (Module::Math, "inf") => Some(Value::Float(f64::INFINITY)),
        (Module::Math, "nan") => Some(Value::Float(f64::NAN)),
        (Module::Math, name) => ModuleFunction::from_str(name).ok().map(Value::ModuleFunction),
        (Module::Sys, "stdout") => Some(Value::Stream(Stream::Stdout)),
        (Module::Sys, "stderr") => Some(Value::Stream(Stream::Stderr)),
        (Module::Sys, "version") => Some(Value::str(VERSION)),
        (Module::Sys, "maxsize") => Some(Value::Int(i64::MAX)),
        (Module::Sys, "platform") => Some(Value::str(std::env::consts::OS)),
        (Module::Sys, _) => None,
    };
    value.ok_or_else(|| {
        Exception::new(
            ExcType::AttributeError,
            format!("module '{module}' has no attribute '{attr}'"),
        )
    })
}

fn real(value: &Value) -> RunResult<f64> {
    value.as_number().map(Number::as_f64).ok_or_else(|| {
        Exception::type_error(format!("must be real number, not {}", value.type_name()))
    })
}

fn domain_error() -> Exception {
    Exception::value_error("math domain error")
}

/// Converts a float result to `int` for `floor` and `ceil`.
fn float_to_int(f: f64) -> RunResult<Value> {
    if f.is_nan() {
        return Err(Exception::value_error("cannot convert float NaN to integer"));
    }
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    if !in_range {
        return Err(Exception::new(
            ExcType::OverflowError,
            "cannot convert float infinity to integer",
        ));
    }
    #[expect(clippy::cast_possible_truncation, reason = "range checked above")]
    let int = f as i64;
    Ok(Value::Int(int))
}

pub(crate) fn call_module_function(function: ModuleFunction, mut args: ArgValues) -> RunResult<Value> {
    match function {
        ModuleFunction::Sqrt => {
            let x = real(&args.get_one_arg("sqrt")?)?;
            if x < 0.0 {
                return Err(domain_error());
            }
            Ok(Value::Float(x.sqrt()))
        }
        ModuleFunction::Floor => {
            let x = args.get_one_arg("floor")?;
            match x {
                Value::Int(_) => Ok(x),
                Value::Bool(b) => Ok(Value::Int(i64::from(b))),
                other => float_to_int(real(&other)?.floor()),
            }
        }
        ModuleFunction::Ceil => {
            let x = args.get_one_arg("ceil")?;
            match x {
                Value::Int(_) => Ok(x),
                Value::Bool(b) => Ok(Value::Int(i64::from(b))),
                other => float_to_int(real(&other)?.ceil()),
            }
        }
        ModuleFunction::Log => {
            let (x, base) = args.get_one_two_args("log")?;
            let x = real(&x)?;
            if x <= 0.0 {
                return Err(domain_error());
            }
            match base {
                None => Ok(Value::Float(x.ln())),
                Some(base) => {
                    let base = real(&base)?;
                    if base <= 0.0 {
                        return Err(domain_error());
                    }
                    if base == 1.0 {
                        return Err(Exception::zero_division("float division by zero"));
                    }
                    Ok(Value::Float(x.ln() / base.ln()))
                }
            }
        }
        ModuleFunction::Exp => {
            let x = real(&args.get_one_arg("exp")?)?;
            let result = x.exp();
            if result.is_infinite() && x.is_finite() {
                return Err(Exception::new(ExcType::OverflowError, "math range error"));
            }
            Ok(Value::Float(result))
        }
        ModuleFunction::Pow => {
            let (x, y) = args.get_two_args("pow")?;
            let (x, y) = (real(&x)?, real(&y)?);
            if x == 0.0 && y < 0.0 {
                return Err(domain_error());
            }
            Ok(Value::Float(x.powf(y)))
        }
        ModuleFunction::Fabs => Ok(Value::Float(real(&args.get_one_arg("fabs")?)?.abs())),
        ModuleFunction::Isclose => {
            let rel_tol = args.take_kwarg("rel_tol").map_or(Ok(1e-9), |v| real(&v))?;
            let abs_tol = args.take_kwarg("abs_tol").map_or(Ok(0.0), |v| real(&v))?;
            if rel_tol < 0.0 || abs_tol < 0.0 {
                return Err(Exception::value_error("tolerances must be non-negative"));
            }
            let (a, b) = args.get_two_args("isclose")?;
            let (a, b) = (real(&a)?, real(&b)?);
            if a == b {
                return Ok(Value::Bool(true));
            }
            if a.is_infinite() || b.is_infinite() {
                return Ok(Value::Bool(false));
            }
            let diff = (a - b).abs();
            let close = diff <= (rel_tol * b).abs() || diff <= (rel_tol * a).abs() || diff <= abs_tol;
            Ok(Value::Bool(close))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_module() {
        let err = import_module("numpy").unwrap_err();
        assert_eq!(err.summary(), "ModuleNotFoundError: No module named 'numpy'");
    }

    #[test]
    fn floor_returns_int() {
        let floor = call_module_function(ModuleFunction::Floor, ArgValues::one(Value::Float(-2.5))).unwrap();
        assert_eq!(floor.py_repr(), "-3");
        let err = call_module_function(ModuleFunction::Floor, ArgValues::one(Value::Float(f64::INFINITY)));
        assert_eq!(err.unwrap_err().exc_type(), ExcType::OverflowError);
    }

    #[test]
    fn sqrt_of_negative_is_a_domain_error() {
        let err = call_module_function(ModuleFunction::Sqrt, ArgValues::one(Value::Int(-1))).unwrap_err();
        assert_eq!(err.summary(), "ValueError: math domain error");
    }
}
