//! Cell conversions used when turning status rows into samples.
//!
//! Both conversions are total: `None` means "could not convert", while a SQL
//! NULL converts successfully to NaN (or an empty label).

use crate::pgpool::Value;
use tracing::debug;

/// Converts a cell to a sample value.
///
/// - integers, floats, booleans (1/0) and timestamps (Unix seconds) convert directly
/// - NULL is `Some(NaN)`
/// - text and bytes are parsed as floats, `"nan"` and `"-nan"` included
/// - anything else is `None`
#[must_use]
pub fn to_float(value: &Value) -> Option<f64> {
    match value {
        Value::Int(v) => Some(i64_to_f64(*v)),
        Value::Float(v) => Some(*v),
        Value::Timestamp(ts) => Some(i64_to_f64(ts.timestamp())),
        Value::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
        Value::Null => Some(f64::NAN),
        Value::Text(text) => parse_float(text),
        Value::Bytes(bytes) => std::str::from_utf8(bytes).ok().and_then(parse_float),
        Value::Unsupported(type_name) => {
            debug!(type_name, "cannot convert column type to float");
            None
        }
    }
}

/// Converts a cell to a label value. NULL becomes the empty string.
#[must_use]
pub fn to_label_string(value: &Value) -> Option<String> {
    match value {
        Value::Int(v) => Some(v.to_string()),
        Value::Float(v) => Some(v.to_string()),
        Value::Timestamp(ts) => Some(ts.timestamp().to_string()),
        Value::Bool(v) => Some(v.to_string()),
        Value::Null => Some(String::new()),
        Value::Text(text) => Some(text.clone()),
        Value::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Value::Unsupported(_) => None,
    }
}

/// Backend node status as a gauge value: 1 for up or waiting, 0 otherwise.
#[must_use]
pub fn status_to_numeric(status: &str) -> f64 {
    match status {
        "true" | "up" | "waiting" => 1.0,
        // "false" | "unused" | "down" and anything unknown
        _ => 0.0,
    }
}

fn parse_float(text: &str) -> Option<f64> {
    match text {
        "nan" | "-nan" => Some(f64::NAN),
        _ => match text.parse::<f64>() {
            Ok(v) => Some(v),
            Err(e) => {
                debug!(value = text, error = %e, "could not parse string as float");
                None
            }
        },
    }
}

#[inline]
#[allow(clippy::cast_precision_loss)]
pub(crate) const fn i64_to_f64(v: i64) -> f64 {
    v as f64
}

#[inline]
#[allow(clippy::cast_precision_loss)]
pub(crate) const fn usize_to_f64(v: usize) -> f64 {
    v as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_to_float_numbers() {
        assert_eq!(to_float(&Value::Int(42)), Some(42.0));
        assert_eq!(to_float(&Value::Float(0.25)), Some(0.25));
        assert_eq!(to_float(&Value::Bool(true)), Some(1.0));
        assert_eq!(to_float(&Value::Bool(false)), Some(0.0));
    }

    #[test]
    fn test_to_float_timestamp_is_unix_seconds() {
        let ts = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).single();
        assert!(ts.is_some());
        if let Some(ts) = ts {
            assert_eq!(to_float(&Value::Timestamp(ts)), Some(1_609_459_200.0));
        }
    }

    #[test]
    fn test_to_label_string_timestamp_is_unix_seconds() {
        let ts = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).single();
        assert!(ts.is_some());
        if let Some(ts) = ts {
            assert_eq!(
                to_label_string(&Value::Timestamp(ts)),
                Some("1609459200".to_string())
            );
        }
    }

    #[test]
    fn test_to_float_null_is_successful_nan() {
        let v = to_float(&Value::Null);
        assert!(v.is_some_and(f64::is_nan));
    }

    #[test]
    fn test_to_float_text() {
        assert_eq!(to_float(&Value::from("12.5")), Some(12.5));
        assert_eq!(to_float(&Value::from("0.000000")), Some(0.0));
        assert!(to_float(&Value::from("nan")).is_some_and(f64::is_nan));
        assert!(to_float(&Value::from("-nan")).is_some_and(f64::is_nan));
        assert_eq!(to_float(&Value::from("notanumber")), None);
        assert_eq!(to_float(&Value::from("")), None);
    }

    #[test]
    fn test_to_float_bytes() {
        assert_eq!(to_float(&Value::Bytes(b"7".to_vec())), Some(7.0));
        assert_eq!(to_float(&Value::Bytes(b"seven".to_vec())), None);
        assert_eq!(to_float(&Value::Bytes(vec![0xff, 0xfe])), None);
    }

    #[test]
    fn test_to_float_unsupported() {
        assert_eq!(to_float(&Value::Unsupported("INET".to_string())), None);
    }

    #[test]
    fn test_to_label_string() {
        assert_eq!(to_label_string(&Value::Int(5432)), Some("5432".to_string()));
        assert_eq!(to_label_string(&Value::Float(1.5)), Some("1.5".to_string()));
        assert_eq!(to_label_string(&Value::Bool(true)), Some("true".to_string()));
        assert_eq!(to_label_string(&Value::Bool(false)), Some("false".to_string()));
        assert_eq!(to_label_string(&Value::Null), Some(String::new()));
        assert_eq!(
            to_label_string(&Value::from("primary")),
            Some("primary".to_string())
        );
        assert_eq!(
            to_label_string(&Value::Bytes(b"standby".to_vec())),
            Some("standby".to_string())
        );
        assert_eq!(to_label_string(&Value::Unsupported("X".to_string())), None);
    }

    #[test]
    fn test_status_to_numeric() {
        for up in ["true", "up", "waiting"] {
            assert!((status_to_numeric(up) - 1.0).abs() < f64::EPSILON, "{up}");
        }
        for down in ["false", "unused", "down", "quarantine", ""] {
            assert!(status_to_numeric(down).abs() < f64::EPSILON, "{down}");
        }
    }
}
