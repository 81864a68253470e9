//! Lenient field helpers for venue payloads.
//!
//! OKX encodes every number as a JSON string and sends `""` for fields that do not apply to a
//! record. A field that cannot be read as a number is treated as absent so that it falls
//! through to the caller's default, and never fails the surrounding record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::Value;

/// Deserialize a JSON string or number as `Some(String)`. Any other JSON type, including
/// `null`, is read as `None`.
pub fn de_lenient_str<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(raw)) => Some(raw),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

/// Deserialize a JSON array decoding each element on its own. Elements that fail to decode
/// are skipped, and anything other than an array, including `null`, reads as empty.
pub fn de_lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

/// Parse an optional raw field as a finite `f64`. Empty or malformed input yields `None`.
pub fn parse_f64(raw: Option<&str>) -> Option<f64> {
    raw.map(str::trim)
        .filter(|raw| !raw.is_empty())
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|value| value.is_finite())
}

/// Parse an explicit venue-computed value (`upl`, `uplRatio`, ...).
///
/// Only non-empty values other than the literal `"0"` count as present, so a venue sending
/// `"0"` for "not computed" falls through to the next source.
pub fn parse_explicit_f64(raw: Option<&str>) -> Option<f64> {
    raw.map(str::trim)
        .filter(|raw| *raw != "0")
        .and_then(|raw| parse_f64(Some(raw)))
}

/// Parse a millisecond epoch string as a [`DateTime<Utc>`].
pub fn parse_epoch_ms(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.map(str::trim)
        .and_then(|raw| raw.parse::<i64>().ok())
        .and_then(DateTime::<Utc>::from_timestamp_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Field {
        #[serde(default, deserialize_with = "de_lenient_str")]
        value: Option<String>,
    }

    #[test]
    fn test_de_lenient_str() {
        struct TestCase {
            input: &'static str,
            expected: Option<&'static str>,
        }

        let tests = vec![
            TestCase {
                // TC0: string
                input: r#"{"value": "1.5"}"#,
                expected: Some("1.5"),
            },
            TestCase {
                // TC1: number
                input: r#"{"value": 2}"#,
                expected: Some("2"),
            },
            TestCase {
                // TC2: null
                input: r#"{"value": null}"#,
                expected: None,
            },
            TestCase {
                // TC3: missing
                input: r#"{}"#,
                expected: None,
            },
            TestCase {
                // TC4: unexpected type
                input: r#"{"value": ["1"]}"#,
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = serde_json::from_str::<Field>(test.input).unwrap().value;
            assert_eq!(actual.as_deref(), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_parse_f64() {
        assert_eq!(parse_f64(Some("50000")), Some(50000.0));
        assert_eq!(parse_f64(Some(" -0.25 ")), Some(-0.25));
        assert_eq!(parse_f64(Some("abc")), None);
        assert_eq!(parse_f64(Some("")), None);
        assert_eq!(parse_f64(Some("NaN")), None);
        assert_eq!(parse_f64(None), None);
    }

    #[test]
    fn test_parse_explicit_f64_skips_zero_literal() {
        assert_eq!(parse_explicit_f64(Some("5.5")), Some(5.5));
        assert_eq!(parse_explicit_f64(Some("0")), None);
        assert_eq!(parse_explicit_f64(Some("")), None);
        assert_eq!(parse_explicit_f64(Some("0.0")), Some(0.0));
    }

    #[test]
    fn test_parse_epoch_ms() {
        let time = parse_epoch_ms(Some("1597026383085")).unwrap();
        assert_eq!(time.timestamp_millis(), 1597026383085);
        assert_eq!(parse_epoch_ms(Some("soon")), None);
    }
}
