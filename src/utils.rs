// Coercion rules and helpers shared by the evaluator, built-ins and templates
//
// Every place that needs "a number" or "a boolean" out of a dynamic value goes
// through these functions, so the rules are applied uniformly.

use crate::value::Value;

/// Coerce a value to a number.
///
/// Numbers pass through, strings parse as doubles (`0.0` on failure),
/// booleans become `1.0`/`0.0`, and everything else is `0.0`.
pub fn to_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => *n,
        Value::String(s) => parse_number(s).unwrap_or(0.0),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Null | Value::Array(_) | Value::Object(_) => 0.0,
    }
}

/// Parse a string as a double, accepting surrounding whitespace.
///
/// Rejects the non-finite spellings (`inf`, `NaN`) that `f64::from_str` would
/// otherwise accept.
pub fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Coerce a value to a boolean (truthiness).
pub fn to_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => *n != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Null => false,
        Value::Array(arr) => !arr.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// The `==` rule of the expression language.
///
/// null equals only null; same-kind scalars compare directly; anything else
/// falls back to comparing display strings, so `1 == "1"` holds.
pub fn loose_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        _ => to_display_string(left) == to_display_string(right),
    }
}

/// String form used for concatenation and template interpolation.
///
/// Null renders as the empty string, integral numbers drop the decimal point,
/// and containers render as JSON text.
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.to_string(),
        Value::Number(n) => format_number(*n),
        Value::Bool(b) => b.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Render a double, dropping the fractional part when it is integral.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let rendered = if n > 0.0 { "Infinity" } else { "-Infinity" };
        rendered.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        // -0.0 renders as "0"
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Coerce a value to an integer by truncation, for index/count arguments.
pub fn to_integer(value: &Value) -> i64 {
    let n = to_number(value);
    if n.is_finite() {
        n.trunc() as i64
    } else {
        0
    }
}

/// Flatten one level of nesting.
pub fn flatten(arr: &[Value]) -> Vec<Value> {
    let mut result = Vec::with_capacity(arr.len());
    for item in arr {
        if let Value::Array(inner) = item {
            result.extend(inner.iter().cloned());
        } else {
            result.push(item.clone());
        }
    }
    result
}
