// 💵 Money Coercion - single ingestion boundary for balances
//
// Balances arrive as JSON numbers, numeric strings ("KES 1,250.50", " 300 "),
// null, or not at all. Everything is reduced to an f64 here, once.
// Unparseable or non-finite input becomes 0.0.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Coerce a loosely-typed JSON value into a balance.
pub fn coerce_balance(value: &Value) -> f64 {
    match value {
        Value::Number(n) => finite_or_zero(n.as_f64().unwrap_or(0.0)),
        Value::String(s) => parse_amount(s),
        Value::Bool(_) | Value::Null | Value::Array(_) | Value::Object(_) => 0.0,
    }
}

/// Parse a textual amount.
///
/// Accepts an optional sign, currency symbols or codes around the number,
/// thousands separators (`,`, `_`, spaces) and surrounding whitespace.
/// Accounting-style parentheses mark a negative amount: `(120.00)` → -120.0.
pub fn parse_amount(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let negative_parens = trimmed.starts_with('(') && trimmed.ends_with(')');

    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
        .collect();

    // Currency codes such as "EUR" leak an 'E' through the filter above
    let cleaned = cleaned.trim_matches(|c| c == 'e' || c == 'E');

    match cleaned.parse::<f64>() {
        Ok(value) => {
            let value = finite_or_zero(value);
            if negative_parens {
                -value.abs()
            } else {
                value
            }
        }
        Err(_) => 0.0,
    }
}

/// Serde adapter for balance fields that may be a number, a string, or null.
///
/// ```ignore
/// #[serde(default, deserialize_with = "crate::money::lenient")]
/// pub balance: f64,
/// ```
pub fn lenient<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(coerce_balance).unwrap_or(0.0))
}

/// Like [`lenient`], but keeps "absent" distinct from zero.
pub fn lenient_opt<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(v) => Some(coerce_balance(&v)),
    })
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
