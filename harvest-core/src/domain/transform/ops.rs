// harvest-core/src/domain/transform/ops.rs

// Built-in operations. Each one maps `null` and empty text to `null`.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Map, Number, Value};

use super::registry::TransformOperation;

const LOCALES: [&str; 4] = ["auto", "en", "de", "fr"];

const DEFAULT_DATE_FORMATS: [&str; 7] = [
    "%Y-%m-%d",
    "%d.%m.%Y",
    "%d/%m/%Y",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d %B %Y",
    "%B %d, %Y",
];

/// Text form of a scalar. `None` for null or blank input.
fn text_of(value: &Value) -> Result<Option<String>, String> {
    let text = match value {
        Value::Null => return Ok(None),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(_) | Value::Object(_) => {
            return Err("expected a scalar value".to_string());
        }
    };
    Ok((!text.trim().is_empty()).then_some(text))
}

fn reject_unknown_keys(config: &Map<String, Value>, allowed: &[&str]) -> Result<(), String> {
    match config.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(format!("unsupported config key '{key}'")),
        None => Ok(()),
    }
}

pub struct Trim;

impl TransformOperation for Trim {
    fn name(&self) -> &str {
        "trim"
    }

    fn validate_config(&self, config: &Map<String, Value>) -> Result<(), String> {
        reject_unknown_keys(config, &[])
    }

    fn apply(&self, value: &Value, _config: &Map<String, Value>) -> Result<Value, String> {
        Ok(text_of(value)?
            .map(|t| Value::String(t.trim().to_string()))
            .unwrap_or(Value::Null))
    }
}

/// Collapses every whitespace run to one space and trims the ends.
pub struct CollapseWhitespace;

impl TransformOperation for CollapseWhitespace {
    fn name(&self) -> &str {
        "collapse_ws"
    }

    fn validate_config(&self, config: &Map<String, Value>) -> Result<(), String> {
        reject_unknown_keys(config, &[])
    }

    fn apply(&self, value: &Value, _config: &Map<String, Value>) -> Result<Value, String> {
        Ok(text_of(value)?
            .map(|t| Value::String(t.split_whitespace().collect::<Vec<_>>().join(" ")))
            .unwrap_or(Value::Null))
    }
}

/// Locale-aware number parsing.
///
/// `en` reads `1,234.5`, `de`/`fr` read `1.234,5`. `auto` takes the last of
/// `.`/`,` as the decimal mark when both appear, and a lone `,` as decimal.
/// Spaces (including NBSP), `_` and `'` are digit-group separators.
pub struct NumberParse;

impl NumberParse {
    fn normalize(cleaned: &str, locale: &str) -> String {
        let comma_decimal = match locale {
            "en" => false,
            "de" | "fr" => true,
            _ => match (cleaned.rfind(','), cleaned.rfind('.')) {
                (Some(comma), Some(dot)) => comma > dot,
                (Some(_), None) => true,
                _ => false,
            },
        };
        if comma_decimal {
            cleaned.replace('.', "").replace(',', ".")
        } else {
            cleaned.replace(',', "")
        }
    }

    fn to_json(normalized: &str) -> Option<Value> {
        let plausible = normalized.chars().any(|c| c.is_ascii_digit())
            && normalized
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'));
        if !plausible {
            return None;
        }
        if let Ok(int) = normalized.parse::<i64>() {
            return Some(Value::from(int));
        }
        let float = normalized.parse::<f64>().ok().filter(|f| f.is_finite())?;
        if float.fract() == 0.0 && float.abs() < 9.0e15 {
            #[allow(clippy::cast_possible_truncation)]
            return Some(Value::from(float as i64));
        }
        Number::from_f64(float).map(Value::Number)
    }
}

impl TransformOperation for NumberParse {
    fn name(&self) -> &str {
        "to_number"
    }

    fn validate_config(&self, config: &Map<String, Value>) -> Result<(), String> {
        reject_unknown_keys(config, &["locale"])?;
        match config.get("locale") {
            None => Ok(()),
            Some(Value::String(l)) if LOCALES.contains(&l.as_str()) => Ok(()),
            Some(other) => Err(format!(
                "locale {other} is not one of {}",
                LOCALES.join(", ")
            )),
        }
    }

    fn apply(&self, value: &Value, config: &Map<String, Value>) -> Result<Value, String> {
        if value.is_number() {
            return Ok(value.clone());
        }
        let Some(text) = text_of(value)? else {
            return Ok(Value::Null);
        };
        let cleaned: String = text
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '\'')
            .collect();
        let locale = config
            .get("locale")
            .and_then(Value::as_str)
            .unwrap_or("auto");

        Self::to_json(&Self::normalize(&cleaned, locale))
            .ok_or_else(|| format!("could not parse '{}' as a number", text.trim()))
    }
}

/// Normalizes dates to `YYYY-MM-DD`, trying each format in order.
pub struct DateNormalize;

impl DateNormalize {
    fn formats(config: &Map<String, Value>) -> Vec<&str> {
        match config.get("formats").and_then(Value::as_array) {
            Some(list) => list.iter().filter_map(Value::as_str).collect(),
            None => DEFAULT_DATE_FORMATS.to_vec(),
        }
    }
}

impl TransformOperation for DateNormalize {
    fn name(&self) -> &str {
        "parse_date"
    }

    fn validate_config(&self, config: &Map<String, Value>) -> Result<(), String> {
        reject_unknown_keys(config, &["formats"])?;
        match config.get("formats") {
            None => Ok(()),
            Some(Value::Array(list))
                if !list.is_empty() && list.iter().all(|f| f.as_str().is_some_and(|s| !s.is_empty())) =>
            {
                Ok(())
            }
            Some(_) => Err("'formats' must be a non-empty list of format strings".to_string()),
        }
    }

    fn apply(&self, value: &Value, config: &Map<String, Value>) -> Result<Value, String> {
        let Some(text) = text_of(value)? else {
            return Ok(Value::Null);
        };
        let text = text.trim();

        for format in Self::formats(config) {
            let date = NaiveDate::parse_from_str(text, format)
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(text, format)
                        .ok()
                        .map(|dt| dt.date())
                });
            if let Some(date) = date {
                return Ok(Value::String(date.format("%Y-%m-%d").to_string()));
            }
        }
        Err(format!("could not parse '{text}' as a date"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn number(input: &str, locale: &str) -> Result<Value, String> {
        NumberParse.apply(&json!(input), &config(json!({ "locale": locale })))
    }

    #[test]
    fn test_null_and_blank_pass_through_as_null() {
        let empty = Map::new();
        for op in [
            &Trim as &dyn TransformOperation,
            &CollapseWhitespace,
            &NumberParse,
            &DateNormalize,
        ] {
            assert_eq!(op.apply(&Value::Null, &empty).unwrap(), Value::Null);
            assert_eq!(op.apply(&json!("   "), &empty).unwrap(), Value::Null);
        }
    }

    #[test]
    fn test_collapse_ws_is_idempotent() {
        let empty = Map::new();
        let once = CollapseWhitespace
            .apply(&json!("  Jane \n\t  Doe  "), &empty)
            .unwrap();
        assert_eq!(once, json!("Jane Doe"));
        assert_eq!(CollapseWhitespace.apply(&once, &empty).unwrap(), once);
    }

    #[test]
    fn test_number_locales() {
        assert_eq!(number("1,234.5", "en").unwrap(), json!(1234.5));
        assert_eq!(number("1.234,5", "de").unwrap(), json!(1234.5));
        assert_eq!(number("1 234,5", "fr").unwrap(), json!(1234.5));
        assert_eq!(number("1\u{a0}234", "fr").unwrap(), json!(1234));
        assert_eq!(number("3,5", "auto").unwrap(), json!(3.5));
        assert_eq!(number("1.234,50", "auto").unwrap(), json!(1234.5));
        assert_eq!(number("1,234.50", "auto").unwrap(), json!(1234.5));
        assert_eq!(number("1_000", "auto").unwrap(), json!(1000));
        assert_eq!(number("-42", "en").unwrap(), json!(-42));
    }

    #[test]
    fn test_number_returns_integer_when_integral() {
        assert_eq!(number("12.0", "en").unwrap(), json!(12));
        assert!(number("12.0", "en").unwrap().is_i64());
    }

    #[test]
    fn test_number_rejects_text() {
        let err = number("12 pts", "en").unwrap_err();
        assert_eq!(err, "could not parse '12 pts' as a number");
        assert!(number("n/a", "auto").is_err());
        assert!(number("--", "auto").is_err());
    }

    #[test]
    fn test_number_config_validation() {
        assert!(NumberParse.validate_config(&config(json!({"locale": "de"}))).is_ok());
        assert!(NumberParse.validate_config(&config(json!({"locale": "xx"}))).is_err());
        assert!(NumberParse.validate_config(&config(json!({"radix": 16}))).is_err());
    }

    #[test]
    fn test_parse_date_default_formats() {
        let empty = Map::new();
        assert_eq!(
            DateNormalize.apply(&json!("2024-03-05"), &empty).unwrap(),
            json!("2024-03-05")
        );
        assert_eq!(
            DateNormalize.apply(&json!(" 05.03.2024 "), &empty).unwrap(),
            json!("2024-03-05")
        );
        assert!(DateNormalize.apply(&json!("yesterday"), &empty).is_err());
    }

    #[test]
    fn test_parse_date_custom_formats() {
        let cfg = config(json!({"formats": ["%m|%d|%Y"]}));
        assert!(DateNormalize.validate_config(&cfg).is_ok());
        assert_eq!(
            DateNormalize.apply(&json!("03|05|2024"), &cfg).unwrap(),
            json!("2024-03-05")
        );
        assert!(DateNormalize.validate_config(&config(json!({"formats": []}))).is_err());
    }
}
