//! The format-spec mini-language shared by f-strings, `str.format` and `%` formatting.

use std::fmt::Write;

use crate::{
    exception::{Exception, RunResult},
    value::{Number, Value, float_repr},
};

/// A parsed `[[fill]align][sign][0][width][,][.precision][type]` spec.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct FormatSpec {
    fill: Option<char>,
    align: Option<char>,
    sign: Option<char>,
    zero_pad: bool,
    width: usize,
    grouping: Option<char>,
    precision: Option<usize>,
    kind: Option<char>,
}

impl FormatSpec {
    fn parse(spec: &str) -> RunResult<Self> {
        let chars: Vec<char> = spec.chars().collect();
        let mut parsed = Self::default();
        let mut i = 0;
        let is_align = |c: char| matches!(c, '<' | '>' | '^' | '=');
        if chars.len() >= 2 && is_align(chars[1]) {
            parsed.fill = Some(chars[0]);
            parsed.align = Some(chars[1]);
            i = 2;
        } else if chars.first().copied().is_some_and(is_align) {
            parsed.align = Some(chars[0]);
            i = 1;
        }
        if let Some(&c) = chars.get(i)
            && matches!(c, '+' | '-' | ' ')
        {
            parsed.sign = Some(c);
            i += 1;
        }
        if chars.get(i) == Some(&'0') {
            parsed.zero_pad = true;
            i += 1;
        }
        let width_start = i;
        while chars.get(i).is_some_and(char::is_ascii_digit) {
            i += 1;
        }
        parsed.width = chars[width_start..i].iter().collect::<String>().parse().unwrap_or(0);
        if let Some(&c) = chars.get(i)
            && matches!(c, ',' | '_')
        {
            parsed.grouping = Some(c);
            i += 1;
        }
        if chars.get(i) == Some(&'.') {
            i += 1;
            let precision_start = i;
            while chars.get(i).is_some_and(char::is_ascii_digit) {
                i += 1;
            }
            if precision_start == i {
                return Err(Exception::value_error("Format specifier missing precision"));
            }
            parsed.precision = chars[precision_start..i].iter().collect::<String>().parse().ok();
        }
        if let Some(&c) = chars.get(i) {
            parsed.kind = Some(c);
            i += 1;
        }
        if i != chars.len() {
            return Err(Exception::value_error(format!("Invalid format specifier '{spec}'")));
        }
        Ok(parsed)
    }
}

/// Formats `value` according to `spec`, as `format(value, spec)` does.
pub(crate) fn format_with_spec(value: &Value, spec: &str) -> RunResult<String> {
    if spec.is_empty() {
        return Ok(value.py_str());
    }
    let spec = FormatSpec::parse(spec)?;
    let (body, numeric) = match (value.as_number(), spec.kind) {
        (_, Some('s')) | (None, None) => {
            if let Some(number) = value.as_number().filter(|_| spec.kind == Some('s')) {
                return Err(Exception::value_error(format!(
                    "Unknown format code 's' for object of type '{}'",
                    number_type(number)
                )));
            }
            let mut text = value.py_str();
            if let Some(precision) = spec.precision {
                text = text.chars().take(precision).collect();
            }
            (text, false)
        }
        (Some(number), kind) => (format_number(number, &spec, kind)?, true),
        (None, Some(kind)) => {
            return Err(Exception::value_error(format!(
                "Unknown format code '{kind}' for object of type '{}'",
                value.type_name()
            )));
        }
    };
    Ok(pad(&body, &spec, numeric))
}

fn number_type(number: Number) -> &'static str {
    match number {
        Number::Int(_) => "int",
        Number::Float(_) => "float",
    }
}

fn format_number(number: Number, spec: &FormatSpec, kind: Option<char>) -> RunResult<String> {
    let negative = match number {
        Number::Int(i) => i < 0,
        Number::Float(f) => f.is_sign_negative() && f != 0.0,
    };
    let magnitude = match (number, kind) {
        (Number::Int(i), None | Some('d')) => group(&i.unsigned_abs().to_string(), spec.grouping),
        (Number::Int(i), Some('x')) => format!("{:x}", i.unsigned_abs()),
        (Number::Int(i), Some('X')) => format!("{:X}", i.unsigned_abs()),
        (Number::Int(i), Some('o')) => format!("{:o}", i.unsigned_abs()),
        (Number::Int(i), Some('b')) => format!("{:b}", i.unsigned_abs()),
        (Number::Float(_), Some('d')) => {
            return Err(Exception::value_error(
                "Unknown format code 'd' for object of type 'float'",
            ));
        }
        (_, Some('f' | 'F')) => {
            let f = number.as_f64().abs();
            let fixed = format!("{f:.*}", spec.precision.unwrap_or(6));
            group_fixed(&fixed, spec.grouping)
        }
        (_, Some('e' | 'E')) => {
            let text = exponent_format(number.as_f64().abs(), spec.precision.unwrap_or(6));
            if kind == Some('E') { text.to_uppercase() } else { text }
        }
        (_, Some('%')) => {
            let f = number.as_f64().abs() * 100.0;
            format!("{f:.*}%", spec.precision.unwrap_or(6))
        }
        (_, Some('g' | 'G')) => general_format(number.as_f64().abs(), spec.precision.unwrap_or(6)),
        (Number::Float(f), None) => match spec.precision {
            Some(precision) => general_format(f.abs(), precision.max(1)),
            None => group_fixed(&float_repr(f.abs()), spec.grouping),
        },
        (_, Some(kind)) => {
            return Err(Exception::value_error(format!(
                "Unknown format code '{kind}' for object of type '{}'",
                number_type(number)
            )));
        }
    };
    let sign = match (negative, spec.sign) {
        (true, _) => "-",
        (false, Some('+')) => "+",
        (false, Some(' ')) => " ",
        _ => "",
    };
    Ok(format!("{sign}{magnitude}"))
}

fn exponent_format(f: f64, precision: usize) -> String {
    let text = format!("{f:.precision$e}");
    let (mantissa, exponent) = text.split_once('e').unwrap_or((&text, "0"));
    let exponent: i32 = exponent.parse().unwrap_or_default();
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exponent.abs())
}

/// The `g` presentation: fixed or scientific depending on the exponent, trailing zeros removed.
fn general_format(f: f64, precision: usize) -> String {
    if f == 0.0 {
        return "0".to_owned();
    }
    if !f.is_finite() {
        return float_repr(f);
    }
    let precision = precision.max(1);
    let scientific = format!("{f:.*e}", precision - 1);
    let exponent: i64 = scientific
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or_default();
    let precision_i = i64::try_from(precision).unwrap_or(i64::MAX);
    if (-4..precision_i).contains(&exponent) {
        let decimals = usize::try_from(precision_i - 1 - exponent).unwrap_or(0);
        strip_zeros(&format!("{f:.decimals$}"))
    } else {
        let text = exponent_format(f, precision - 1);
        match text.split_once('e') {
            Some((mantissa, exponent)) => format!("{}e{exponent}", strip_zeros(mantissa)),
            None => text,
        }
    }
}

fn strip_zeros(text: &str) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_owned()
    } else {
        text.to_owned()
    }
}

fn group(digits: &str, separator: Option<char>) -> String {
    let Some(separator) = separator else {
        return digits.to_owned();
    };
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(c);
    }
    out
}

fn group_fixed(text: &str, separator: Option<char>) -> String {
    match text.split_once('.') {
        Some((int_part, frac)) => format!("{}.{frac}", group(int_part, separator)),
        None => group(text, separator),
    }
}

fn pad(body: &str, spec: &FormatSpec, numeric: bool) -> String {
    let len = body.chars().count();
    if len >= spec.width {
        return body.to_owned();
    }
    let missing = spec.width - len;
    let (fill, align) = if spec.zero_pad && spec.align.is_none() {
        ('0', '=')
    } else {
        (
            spec.fill.unwrap_or(' '),
            spec.align.unwrap_or(if numeric { '>' } else { '<' }),
        )
    };
    let filler = |n: usize| fill.to_string().repeat(n);
    match align {
        '<' => format!("{body}{}", filler(missing)),
        '^' => format!("{}{body}{}", filler(missing / 2), filler(missing - missing / 2)),
        '=' => {
            let sign_len = usize::from(body.starts_with(['-', '+', ' ']));
            let (sign, digits) = body.split_at(sign_len);
            format!("{sign}{}{digits}", filler(missing))
        }
        _ => format!("{}{body}", filler(missing)),
    }
}

/// `template % args` for the conversions `%s %r %d %i %f %e %g %x %%`.
pub(crate) fn percent_format(template: &str, args: &Value) -> RunResult<String> {
    let mut values: Vec<Value> = match args {
        Value::Tuple(items) => items.to_vec(),
        other => vec![other.clone()],
    };
    values.reverse();
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut spec = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_ascii_digit() || matches!(next, '.' | '-' | '+' | ' ' | '0') {
                spec.push(next);
                chars.next();
            } else {
                break;
            }
        }
        let Some(conversion) = chars.next() else {
            return Err(Exception::value_error("incomplete format"));
        };
        if conversion == '%' {
            out.push('%');
            continue;
        }
        let value = values
            .pop()
            .ok_or_else(|| Exception::type_error("not enough arguments for format string"))?;
        let spec = spec.replacen('-', "<", 1);
        let rendered = match conversion {
            's' => format_with_spec(&Value::from(value.py_str()), &spec)?,
            'r' => format_with_spec(&Value::from(value.py_repr()), &spec)?,
            'd' | 'i' => {
                let int = match value.as_number() {
                    Some(Number::Int(i)) => i,
                    #[expect(clippy::cast_possible_truncation, reason = "%d truncates floats like Python")]
                    Some(Number::Float(f)) => f.trunc() as i64,
                    None => {
                        return Err(Exception::type_error(format!(
                            "%{conversion} format: a real number is required, not {}",
                            value.type_name()
                        )));
                    }
                };
                format_with_spec(&Value::Int(int), &format!("{spec}d"))?
            }
            'f' | 'F' | 'e' | 'E' | 'g' | 'G' | 'x' | 'X' | 'o' => {
                format_with_spec(&value, &format!("{spec}{conversion}"))?
            }
            other => {
                return Err(Exception::value_error(format!(
                    "unsupported format character '{other}'"
                )));
            }
        };
        out.push_str(&rendered);
    }
    if !values.is_empty() {
        return Err(Exception::type_error(
            "not all arguments converted during string formatting",
        ));
    }
    Ok(out)
}

/// `template.format(*args, **kwargs)` with `{}`, `{0}`, `{name}`, `!r`/`!s` and specs.
pub(crate) fn str_format(template: &str, args: &[Value], kwargs: &[(String, Value)]) -> RunResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut auto_index = 0;
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => field.push(c),
                        None => return Err(Exception::value_error("expected '}' before end of string")),
                    }
                }
                let (field, spec) = field.split_once(':').unwrap_or((&field, ""));
                let (name, conversion) = field.split_once('!').unwrap_or((field, ""));
                let value = if name.is_empty() {
                    let value = args.get(auto_index).cloned();
                    auto_index += 1;
                    value.ok_or_else(|| {
                        Exception::index_error(format!(
                            "Replacement index {} out of range for positional args tuple",
                            auto_index - 1
                        ))
                    })?
                } else if let Ok(index) = name.parse::<usize>() {
                    args.get(index).cloned().ok_or_else(|| {
                        Exception::index_error(format!(
                            "Replacement index {index} out of range for positional args tuple"
                        ))
                    })?
                } else {
                    kwargs
                        .iter()
                        .find(|(key, _)| key == name)
                        .map(|(_, v)| v.clone())
                        .ok_or_else(|| Exception::key_error(format!("'{name}'")))?
                };
                let value = match conversion {
                    "r" => Value::from(value.py_repr()),
                    "s" => Value::from(value.py_str()),
                    _ => value,
                };
                let _ = write!(out, "{}", format_with_spec(&value, spec)?);
            }
            '}' => return Err(Exception::value_error("Single '}' encountered in format string")),
            c => out.push(c),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_point_and_width() {
        assert_eq!(format_with_spec(&Value::Float(3.14159), ".2f").unwrap(), "3.14");
        assert_eq!(format_with_spec(&Value::Int(42), "5").unwrap(), "   42");
        assert_eq!(format_with_spec(&Value::Int(42), "05d").unwrap(), "00042");
        assert_eq!(format_with_spec(&Value::Int(-42), "06d").unwrap(), "-00042");
        assert_eq!(format_with_spec(&Value::str("ab"), ">4").unwrap(), "  ab");
        assert_eq!(format_with_spec(&Value::str("ab"), "*^6").unwrap(), "**ab**");
        assert_eq!(format_with_spec(&Value::Int(1_234_567), ",").unwrap(), "1,234,567");
    }

    #[test]
    fn general_and_exponent() {
        assert_eq!(format_with_spec(&Value::Float(1234.5), "e").unwrap(), "1.234500e+03");
        assert_eq!(format_with_spec(&Value::Float(0.000_012_5), "g").unwrap(), "1.25e-05");
        assert_eq!(format_with_spec(&Value::Float(2.5), "g").unwrap(), "2.5");
        assert_eq!(format_with_spec(&Value::Float(0.25), ".0%").unwrap(), "25%");
    }

    #[test]
    fn percent_and_brace_formatting() {
        let args = Value::tuple(vec![Value::str("x"), Value::Int(3)]);
        assert_eq!(percent_format("%s=%d", &args).unwrap(), "x=3");
        assert_eq!(percent_format("%.1f%%", &Value::Float(12.34)).unwrap(), "12.3%");
        let formatted = str_format(
            "{} {name!r} {0:>3}",
            &[Value::Int(7)],
            &[("name".to_owned(), Value::str("n"))],
        )
        .unwrap();
        assert_eq!(formatted, "7 'n'   7");
    }
}
