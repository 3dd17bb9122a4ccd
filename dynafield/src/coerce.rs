//! Normalizers shared by the value application engine and the filter
//! translator. Both sides must agree on what counts as a number, a truthy
//! token, or a token list, so the rules live in one place.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

/// Tokens coerced to boolean true. Anything else is false; boolean coercion
/// never fails.
const TRUE_TOKENS: [&str; 4] = ["true", "1", "yes", "on"];

/// Coerce a raw value to a boolean using the shared token set.
pub fn truthy(raw: &Value) -> bool {
    match raw {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64() == Some(1.0),
        Value::String(token) => {
            let token = token.trim();
            TRUE_TOKENS.iter().any(|accepted| token.eq_ignore_ascii_case(accepted))
        }
        _ => false,
    }
}

/// Coerce a raw value to a numeric scalar. Strings are parsed; everything
/// non-numeric yields `None`.
pub fn number_from_value(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Coerce a raw value to a text scalar. Numbers and booleans are rendered;
/// structured values yield `None`.
pub fn text_from_value(raw: &Value) -> Option<String> {
    match raw {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Parse a raw value into an instant. Accepts RFC 3339 timestamps and plain
/// `YYYY-MM-DD` dates (midnight UTC).
pub fn date_from_value(raw: &Value) -> Option<DateTime<Utc>> {
    let text = raw.as_str()?.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
    Some(DateTime::from_naive_utc_and_offset(date.and_hms_opt(0, 0, 0)?, Utc))
}

/// Normalize a raw value to a token list. Native lists and comma-joined
/// strings are both accepted; single scalars become one-element lists.
/// Empty segments are dropped, so `"a,,b"` and `["a", "", "b"]` normalize
/// the same way.
pub fn token_list(raw: &Value) -> Vec<String> {
    match raw {
        Value::Array(items) => items
            .iter()
            .filter_map(text_from_value)
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .collect(),
        Value::String(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect(),
        other => text_from_value(other)
            .map(|token| vec![token])
            .unwrap_or_default(),
    }
}
