//! Attribute decoding for dBase fields and `GeoJSON` properties.
//!
//! Year and category columns are integers in the source data, but GIS
//! exports store them variously as `Numeric`, `Double`, `Integer` or even
//! `Character` fields. All of them decode to `Option<i32>`; null, blank,
//! non-integral and out-of-range values decode to `None`.

use shapefile::dbase::FieldValue;

/// Decodes a dBase field as an integer.
#[must_use]
pub fn field_as_i32(value: &FieldValue) -> Option<i32> {
    match value {
        FieldValue::Integer(i) => Some(*i),
        FieldValue::Numeric(Some(n)) | FieldValue::Double(n) | FieldValue::Currency(n) => {
            integral(*n)
        }
        FieldValue::Float(Some(f)) => integral(f64::from(*f)),
        FieldValue::Character(Some(s)) => parse_integer(s),
        _ => None,
    }
}

/// Decodes a dBase field as a display string.
#[must_use]
pub fn field_as_string(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Character(Some(s)) | FieldValue::Memo(s) => non_blank(s),
        FieldValue::Integer(i) => Some(i.to_string()),
        FieldValue::Numeric(Some(n)) | FieldValue::Double(n) => Some(n.to_string()),
        FieldValue::Float(Some(f)) => Some(f.to_string()),
        _ => None,
    }
}

/// Decodes a `GeoJSON` property as an integer.
#[must_use]
pub fn json_as_i32(value: &serde_json::Value) -> Option<i32> {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .and_then(|i| i32::try_from(i).ok())
            .or_else(|| n.as_f64().and_then(integral)),
        serde_json::Value::String(s) => parse_integer(s),
        _ => None,
    }
}

/// Decodes a `GeoJSON` property as a display string.
#[must_use]
pub fn json_as_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => non_blank(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn integral(value: f64) -> Option<i32> {
    let in_range = (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&value);
    (value.is_finite() && value.fract() == 0.0 && in_range).then_some(value as i32)
}

fn parse_integer(s: &str) -> Option<i32> {
    let trimmed = s.trim();
    trimmed
        .parse::<i32>()
        .ok()
        .or_else(|| trimmed.parse::<f64>().ok().and_then(integral))
}

fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
