use std::num::IntErrorKind;

use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

pub const MAX_LINE_QUANTITY: i32 = 1000;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: Option<Uuid>,
    /// Number or numeric string; anything else counts as 1.
    #[schema(value_type = Option<i32>)]
    pub quantity: Option<Value>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    /// Values below 1 or non-numeric values remove the line.
    #[schema(value_type = Option<i32>)]
    pub quantity: Option<Value>,
}

/// Reads a quantity the way a form would send it: a JSON number or a numeric
/// string. Fractions are truncated and digit runs too long for an i64 saturate.
pub fn parse_quantity(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => leading_integer(s.trim()),
        _ => None,
    }
}

fn leading_integer(s: &str) -> Option<i64> {
    let end = s
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    match s[..end].parse::<i64>() {
        Ok(n) => Some(n),
        Err(err) => match err.kind() {
            IntErrorKind::PosOverflow => Some(i64::MAX),
            IntErrorKind::NegOverflow => Some(i64::MIN),
            _ => None,
        },
    }
}

/// Quantity for an add: at least 1.
pub fn add_quantity(value: Option<&Value>) -> i32 {
    parse_quantity(value)
        .filter(|q| *q >= 1)
        .map(cap_quantity)
        .unwrap_or(1)
}

pub fn cap_quantity(q: i64) -> i32 {
    q.clamp(1, MAX_LINE_QUANTITY as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_numbers_and_numeric_strings() {
        assert_eq!(parse_quantity(Some(&json!(3))), Some(3));
        assert_eq!(parse_quantity(Some(&json!("12"))), Some(12));
        assert_eq!(parse_quantity(Some(&json!("7 boxes"))), Some(7));
        assert_eq!(parse_quantity(Some(&json!(2.9))), Some(2));
        assert_eq!(parse_quantity(Some(&json!("abc"))), None);
        assert_eq!(parse_quantity(Some(&json!(null))), None);
        assert_eq!(parse_quantity(None), None);
    }

    #[test]
    fn add_quantity_defaults_to_one() {
        assert_eq!(add_quantity(None), 1);
        assert_eq!(add_quantity(Some(&json!(0))), 1);
        assert_eq!(add_quantity(Some(&json!(-4))), 1);
        assert_eq!(add_quantity(Some(&json!("x"))), 1);
        assert_eq!(add_quantity(Some(&json!(5000))), MAX_LINE_QUANTITY);
        assert_eq!(add_quantity(Some(&json!("99999999999999999999"))), MAX_LINE_QUANTITY);
    }

    #[test]
    fn oversized_digit_runs_saturate() {
        assert_eq!(parse_quantity(Some(&json!("99999999999999999999"))), Some(i64::MAX));
        assert_eq!(parse_quantity(Some(&json!("+123456789012345678901 kg"))), Some(i64::MAX));
        assert_eq!(parse_quantity(Some(&json!("-99999999999999999999"))), Some(i64::MIN));
        assert_eq!(parse_quantity(Some(&json!("-"))), None);
    }
}
