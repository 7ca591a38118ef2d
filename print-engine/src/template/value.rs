//! Order data lookup and value formatting

use std::str::FromStr;

use chrono::DateTime;
use chrono_tz::Tz;
use rust_decimal::prelude::*;
use serde_json::Value;

use crate::utils::time::format_millis;

const DATETIME_PATTERN: &str = "%d/%m/%Y %H:%M";

/// Look up a dotted path (`customer.name`, `items.0.price`)
///
/// `null` counts as missing.
pub fn lookup<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(data, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
        .filter(|v| !v.is_null())
}

/// Present but carrying nothing worth printing
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Converts bound values to receipt text
#[derive(Debug, Clone)]
pub struct ValueFormatter {
    currency_symbol: String,
    timezone: Tz,
}

impl ValueFormatter {
    pub fn new(currency_symbol: impl Into<String>, timezone: Tz) -> Self {
        Self {
            currency_symbol: currency_symbol.into(),
            timezone,
        }
    }

    pub fn format(&self, value: &Value, format: crate::template::FieldFormat) -> String {
        use crate::template::FieldFormat;

        match format {
            FieldFormat::Text => plain_text(value),
            FieldFormat::Currency => match to_decimal(value) {
                Some(amount) => self.currency(amount),
                None => plain_text(value),
            },
            FieldFormat::Quantity => match to_decimal(value) {
                Some(qty) => quantity(qty),
                None => plain_text(value),
            },
            FieldFormat::Datetime => self.datetime(value).unwrap_or_else(|| plain_text(value)),
        }
    }

    /// `£12.50`, `-£3.00`
    pub fn currency(&self, amount: Decimal) -> String {
        let rounded = two_places(amount);
        if rounded.is_sign_negative() && !rounded.is_zero() {
            format!("-{}{}", self.currency_symbol, rounded.abs())
        } else {
            format!("{}{}", self.currency_symbol, rounded.abs())
        }
    }

    fn datetime(&self, value: &Value) -> Option<String> {
        match value {
            Value::Number(n) => format_millis(n.as_i64()?, self.timezone, DATETIME_PATTERN),
            Value::String(s) => {
                let parsed = DateTime::parse_from_rfc3339(s.trim()).ok()?;
                Some(
                    parsed
                        .with_timezone(&self.timezone)
                        .format(DATETIME_PATTERN)
                        .to_string(),
                )
            }
            _ => None,
        }
    }
}

fn quantity(qty: Decimal) -> String {
    if qty.fract().is_zero() {
        qty.trunc().normalize().to_string()
    } else {
        two_places(qty).to_string()
    }
}

fn two_places(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

fn to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Decimal::from(i)),
            None => n.as_f64().and_then(|f| Decimal::try_from(f).ok()),
        },
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(plain_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::FieldFormat;
    use serde_json::json;

    fn formatter() -> ValueFormatter {
        ValueFormatter::new("£", chrono_tz::Europe::London)
    }

    #[test]
    fn test_lookup_paths() {
        let data = json!({
            "customer": { "name": "Ann", "phone": null },
            "items": [{ "name": "Tea" }, { "name": "Cake" }]
        });
        assert_eq!(lookup(&data, "customer.name"), Some(&json!("Ann")));
        assert_eq!(lookup(&data, "items.1.name"), Some(&json!("Cake")));
        assert_eq!(lookup(&data, "customer.phone"), None);
        assert_eq!(lookup(&data, "items.7.name"), None);
        assert_eq!(lookup(&data, "customer.name.first"), None);
    }

    #[test]
    fn test_empty_values() {
        assert!(is_empty_value(&json!("  ")));
        assert!(is_empty_value(&json!([])));
        assert!(!is_empty_value(&json!(0)));
        assert!(!is_empty_value(&json!(false)));
    }

    #[test]
    fn test_currency() {
        let f = formatter();
        assert_eq!(f.format(&json!(12.5), FieldFormat::Currency), "£12.50");
        assert_eq!(f.format(&json!(3), FieldFormat::Currency), "£3.00");
        assert_eq!(f.format(&json!("7.125"), FieldFormat::Currency), "£7.13");
        assert_eq!(f.format(&json!(-3), FieldFormat::Currency), "-£3.00");
        assert_eq!(f.format(&json!(-0.001), FieldFormat::Currency), "£0.00");
        assert_eq!(f.format(&json!("n/a"), FieldFormat::Currency), "n/a");
    }

    #[test]
    fn test_quantity() {
        let f = formatter();
        assert_eq!(f.format(&json!(2), FieldFormat::Quantity), "2");
        assert_eq!(f.format(&json!(2.0), FieldFormat::Quantity), "2");
        assert_eq!(f.format(&json!(0.5), FieldFormat::Quantity), "0.50");
    }

    #[test]
    fn test_datetime() {
        let f = formatter();
        assert_eq!(
            f.format(&json!(1705933935000_i64), FieldFormat::Datetime),
            "22/01/2024 14:32"
        );
        assert_eq!(
            f.format(&json!("2024-07-01T12:00:00Z"), FieldFormat::Datetime),
            "01/07/2024 13:00"
        );
    }

    #[test]
    fn test_text() {
        let f = formatter();
        assert_eq!(f.format(&json!("Table 4"), FieldFormat::Text), "Table 4");
        assert_eq!(f.format(&json!(42), FieldFormat::Text), "42");
        assert_eq!(f.format(&json!(["a", "", "b"]), FieldFormat::Text), "a, b");
    }
}
