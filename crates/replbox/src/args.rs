use crate::{
    exception::{Exception, RunResult},
    value::Value,
};

/// Evaluated arguments of one call, after `*args` and `**kwargs` expansion.
#[derive(Debug, Default, Clone)]
pub(crate) struct ArgValues {
    pub positional: Vec<Value>,
    pub kwargs: Vec<(String, Value)>,
}

impl ArgValues {
    pub fn new(positional: Vec<Value>, kwargs: Vec<(String, Value)>) -> Self {
        Self { positional, kwargs }
    }

    pub fn positional(positional: Vec<Value>) -> Self {
        Self {
            positional,
            kwargs: Vec::new(),
        }
    }

    pub fn one(value: Value) -> Self {
        Self::positional(vec![value])
    }

    /// Removes and returns the keyword argument `name`, if given.
    pub fn take_kwarg(&mut self, name: &str) -> Option<Value> {
        let index = self.kwargs.iter().position(|(key, _)| key == name)?;
        Some(self.kwargs.remove(index).1)
    }

    /// Fails if any keyword argument remains, naming the first one.
    pub fn reject_kwargs(&self, name: &str) -> RunResult<()> {
        match self.kwargs.first() {
            Some((key, _)) => Err(Exception::type_error(format!(
                "{name}() got an unexpected keyword argument '{key}'"
            ))),
            None => Ok(()),
        }
    }

    /// Checks that no arguments were passed.
    pub fn check_zero_args(self, name: &str) -> RunResult<()> {
        self.reject_kwargs(name)?;
        if self.positional.is_empty() {
            Ok(())
        } else {
            Err(Exception::type_error(format!(
                "{name}() takes no arguments ({} given)",
                self.positional.len()
            )))
        }
    }

    /// Checks that exactly one positional argument was passed, returning it.
    pub fn get_one_arg(self, name: &str) -> RunResult<Value> {
        self.reject_kwargs(name)?;
        let count = self.positional.len();
        match <[Value; 1]>::try_from(self.positional) {
            Ok([value]) => Ok(value),
            Err(_) => Err(Exception::type_error(format!(
                "{name}() takes exactly one argument ({count} given)"
            ))),
        }
    }

    /// Checks that exactly two positional arguments were passed.
    pub fn get_two_args(self, name: &str) -> RunResult<(Value, Value)> {
        self.reject_kwargs(name)?;
        let count = self.positional.len();
        match <[Value; 2]>::try_from(self.positional) {
            Ok([a, b]) => Ok((a, b)),
            Err(_) => Err(Exception::type_error(format!(
                "{name} expected 2 arguments, got {count}"
            ))),
        }
    }

    /// Checks that zero or one positional argument was passed.
    pub fn get_zero_one_arg(self, name: &str) -> RunResult<Option<Value>> {
        self.reject_kwargs(name)?;
        let count = self.positional.len();
        let mut positional = self.positional.into_iter();
        match (positional.next(), positional.next()) {
            (first, None) => Ok(first),
            _ => Err(Exception::type_error(format!(
                "{name} expected at most 1 argument, got {count}"
            ))),
        }
    }

    /// Checks that one or two positional arguments were passed.
    pub fn get_one_two_args(self, name: &str) -> RunResult<(Value, Option<Value>)> {
        self.reject_kwargs(name)?;
        let count = self.positional.len();
        let mut positional = self.positional.into_iter();
        match (positional.next(), positional.next(), positional.next()) {
            (Some(first), second, None) => Ok((first, second)),
            (None, ..) => Err(Exception::type_error(format!(
                "{name} expected at least 1 argument, got 0"
            ))),
            _ => Err(Exception::type_error(format!(
                "{name} expected at most 2 arguments, got {count}"
            ))),
        }
    }
}

/// Extracts a `str` argument, naming the function in the error.
pub(crate) fn expect_str<'a>(value: &'a Value, name: &str) -> RunResult<&'a str> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(Exception::type_error(format!(
            "{name}() argument must be str, not {}",
            other.type_name()
        ))),
    }
}

/// Extracts an integer argument; bools count as integers.
pub(crate) fn expect_int(value: &Value) -> RunResult<i64> {
    value.as_int().ok_or_else(|| {
        Exception::type_error(format!(
            "'{}' object cannot be interpreted as an integer",
            value.type_name()
        ))
    })
}
