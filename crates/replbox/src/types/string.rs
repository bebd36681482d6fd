//! `str` methods.

use crate::{
    args::{ArgValues, expect_int, expect_str},
    exception::{Exception, RunResult},
    format::str_format,
    ops,
    value::Value,
};

pub(super) fn call_method(s: &str, name: &str, mut args: ArgValues) -> RunResult<Value> {
    match name {
        "upper" => {
            args.check_zero_args("upper")?;
            Ok(Value::from(s.to_uppercase()))
        }
        "lower" => {
            args.check_zero_args("lower")?;
            Ok(Value::from(s.to_lowercase()))
        }
        "strip" | "lstrip" | "rstrip" => {
            let chars = match args.get_zero_one_arg(name)? {
                None | Some(Value::None) => None,
                Some(value) => Some(expect_str(&value, name)?.chars().collect::<Vec<_>>()),
            };
            let matches = |c: char| match &chars {
                Some(set) => set.contains(&c),
                None => c.is_whitespace(),
            };
            let stripped = match name {
                "strip" => s.trim_matches(matches),
                "lstrip" => s.trim_start_matches(matches),
                _ => s.trim_end_matches(matches),
            };
            Ok(Value::str(stripped))
        }
        "split" => {
            let max_split = args.take_kwarg("maxsplit");
            let sep = args.take_kwarg("sep");
            let (sep, max_split) = match args.positional.len() {
                0 => (sep, max_split),
                _ => {
                    let mut positional = std::mem::take(&mut args.positional).into_iter();
                    (positional.next(), positional.next().or(max_split))
                }
            };
            args.reject_kwargs("split")?;
            let max_split = match max_split {
                Some(n) => usize::try_from(expect_int(&n)?).ok(),
                None => None,
            };
            split(s, sep.as_ref(), max_split)
        }
        "splitlines" => {
            args.check_zero_args("splitlines")?;
            Ok(Value::list(s.lines().map(Value::str).collect()))
        }
        "join" => {
            let items = ops::iterate(&args.get_one_arg("join")?)?;
            let mut joined = String::new();
            for (i, item) in items.iter().enumerate() {
                let Value::Str(part) = item else {
                    return Err(Exception::type_error(format!(
                        "sequence item {i}: expected str instance, {} found",
                        item.type_name()
                    )));
                };
                if i > 0 {
                    joined.push_str(s);
                }
                joined.push_str(part);
            }
            Ok(Value::from(joined))
        }
        "replace" => {
            args.reject_kwargs("replace")?;
            let count = args.positional.get(2).map(expect_int).transpose()?;
            let (old, new) = match args.positional.as_slice() {
                [old, new] | [old, new, _] => (expect_str(old, "replace")?, expect_str(new, "replace")?),
                other => {
                    return Err(Exception::type_error(format!(
                        "replace expected at least 2 arguments, got {}",
                        other.len()
                    )));
                }
            };
            let replaced = match count.and_then(|c| usize::try_from(c).ok()) {
                Some(count) => s.replacen(old, new, count),
                None => s.replace(old, new),
            };
            Ok(Value::from(replaced))
        }
        "startswith" | "endswith" => {
            let prefix = args.get_one_arg(name)?;
            let candidates = match &prefix {
                Value::Tuple(items) => items.to_vec(),
                other => vec![other.clone()],
            };
            for candidate in &candidates {
                let candidate = expect_str(candidate, name)?;
                let hit = if name == "startswith" {
                    s.starts_with(candidate)
                } else {
                    s.ends_with(candidate)
                };
                if hit {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        "find" | "index" => {
            let needle = args.get_one_arg(name)?;
            let needle = expect_str(&needle, name)?;
            match s.find(needle) {
                Some(byte_index) => Ok(Value::Int(char_offset(s, byte_index))),
                None if name == "find" => Ok(Value::Int(-1)),
                None => Err(Exception::value_error("substring not found")),
            }
        }
        "count" => {
            let needle = args.get_one_arg("count")?;
            let needle = expect_str(&needle, "count")?;
            let count = if needle.is_empty() {
                s.chars().count() + 1
            } else {
                s.matches(needle).count()
            };
            Ok(Value::Int(i64::try_from(count).unwrap_or(i64::MAX)))
        }
        "format" => {
            let ArgValues { positional, kwargs } = args;
            str_format(s, &positional, &kwargs).map(Value::from)
        }
        "title" => {
            args.check_zero_args("title")?;
            let mut out = String::with_capacity(s.len());
            let mut prev_cased = false;
            for c in s.chars() {
                if prev_cased {
                    out.extend(c.to_lowercase());
                } else {
                    out.extend(c.to_uppercase());
                }
                prev_cased = c.is_alphabetic();
            }
            Ok(Value::from(out))
        }
        "capitalize" => {
            args.check_zero_args("capitalize")?;
            let mut chars = s.chars();
            let out = match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
                None => String::new(),
            };
            Ok(Value::from(out))
        }
        "isdigit" | "isalpha" | "isalnum" | "isspace" | "isupper" | "islower" => {
            args.check_zero_args(name)?;
            let result = match name {
                "isdigit" => !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()),
                "isalpha" => !s.is_empty() && s.chars().all(char::is_alphabetic),
                "isalnum" => !s.is_empty() && s.chars().all(char::is_alphanumeric),
                "isspace" => !s.is_empty() && s.chars().all(char::is_whitespace),
                "isupper" => s.chars().any(char::is_uppercase) && !s.chars().any(char::is_lowercase),
                _ => s.chars().any(char::is_lowercase) && !s.chars().any(char::is_uppercase),
            };
            Ok(Value::Bool(result))
        }
        "zfill" => {
            let width = width_arg(args.get_one_arg("zfill")?)?;
            let len = s.chars().count();
            if len >= width {
                return Ok(Value::str(s));
            }
            let (sign, digits) = match s.strip_prefix(['+', '-']) {
                Some(rest) => (&s[..1], rest),
                None => ("", s),
            };
            Ok(Value::from(format!("{sign}{}{digits}", "0".repeat(width - len))))
        }
        "center" | "ljust" | "rjust" => {
            let (width, fill) = args.get_one_two_args(name)?;
            let width = width_arg(width)?;
            let fill = match fill {
                Some(fill) => {
                    let fill = expect_str(&fill, name)?;
                    let mut chars = fill.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => c,
                        _ => {
                            return Err(Exception::type_error(
                                "The fill character must be exactly one character long",
                            ));
                        }
                    }
                }
                None => ' ',
            };
            let len = s.chars().count();
            let pad = width.saturating_sub(len);
            let (left, right) = match name {
                "ljust" => (0, pad),
                "rjust" => (pad, 0),
                _ => {
                    let left = pad / 2 + (pad & width & 1);
                    (left, pad - left)
                }
            };
            let fill = fill.to_string();
            Ok(Value::from(format!("{}{s}{}", fill.repeat(left), fill.repeat(right))))
        }
        _ => Err(Exception::attribute_error("str", name)),
    }
}

fn width_arg(width: Value) -> RunResult<usize> {
    Ok(usize::try_from(expect_int(&width)?).unwrap_or(0))
}

fn char_offset(s: &str, byte_index: usize) -> i64 {
    i64::try_from(s[..byte_index].chars().count()).unwrap_or(i64::MAX)
}

fn split(s: &str, sep: Option<&Value>, max_split: Option<usize>) -> RunResult<Value> {
    let parts: Vec<Value> = match sep {
        None | Some(Value::None) => {
            let mut parts = Vec::new();
            let mut rest = s.trim_start();
            while !rest.is_empty() {
                if max_split.is_some_and(|max| parts.len() >= max) {
                    parts.push(Value::str(rest.trim_end()));
                    break;
                }
                let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
                parts.push(Value::str(&rest[..end]));
                rest = rest[end..].trim_start();
            }
            parts
        }
        Some(sep) => {
            let sep = expect_str(sep, "split")?;
            if sep.is_empty() {
                return Err(Exception::value_error("empty separator"));
            }
            match max_split {
                Some(max) => s.splitn(max + 1, sep).map(Value::str).collect(),
                None => s.split(sep).map(Value::str).collect(),
            }
        }
    };
    Ok(Value::list(parts))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(s: &str, name: &str, args: Vec<Value>) -> String {
        call_method(s, name, ArgValues::positional(args)).unwrap().py_repr()
    }

    #[test]
    fn split_on_whitespace_skips_runs() {
        assert_eq!(call("  a  b c ", "split", vec![]), "['a', 'b', 'c']");
        assert_eq!(call("a,b,,c", "split", vec![Value::str(",")]), "['a', 'b', '', 'c']");
        assert_eq!(call("a b c", "split", vec![Value::None, Value::Int(1)]), "['a', 'b c']");
    }

    #[test]
    fn padding_methods() {
        assert_eq!(call("ab", "center", vec![Value::Int(6), Value::str("*")]), "'**ab**'");
        assert_eq!(call("ab", "center", vec![Value::Int(5)]), "'  ab '");
        assert_eq!(call("-42", "zfill", vec![Value::Int(6)]), "'-00042'");
    }

    #[test]
    fn find_counts_characters() {
        assert_eq!(call("héllo", "find", vec![Value::str("l")]), "2");
        assert_eq!(call("abc", "find", vec![Value::str("z")]), "-1");
        let err = call_method("abc", "index", ArgValues::one(Value::str("z"))).unwrap_err();
        assert_eq!(err.summary(), "ValueError: substring not found");
    }

    #[test]
    fn title_and_capitalize() {
        assert_eq!(call("hello wORLD", "title", vec![]), "'Hello World'");
        assert_eq!(call("hello wORLD", "capitalize", vec![]), "'Hello world'");
    }
}
