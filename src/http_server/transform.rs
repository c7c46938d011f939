//! # Response Shaping
//!
//! Turns loose store rows into [`LocationRecord`]s.
//!
//! Upstream data marks missing enrichment with the literal string `"nan"`.
//! Every optional field treats that sentinel the same as an absent key.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::geonames::RawRecord;

use super::errors::{ApiError, ApiResult};

const MISSING_SENTINEL: &str = "nan";

/// Location entry returned by the search endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    /// Place name
    pub name: String,
    pub postal_code: Option<String>,
    /// ISO country code
    pub country: String,
    /// Primary administrative division
    pub state: Option<String>,
    pub state_code: Option<String>,
    /// Secondary administrative division
    pub province: Option<String>,
    pub province_code: Option<String>,
    /// Tertiary administrative division
    pub community: Option<String>,
    pub community_code: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// Precision of the coordinates, if known
    pub accuracy: Option<i64>,
}

impl LocationRecord {
    /// Shape one raw row.
    ///
    /// Fails with [`ApiError::Validation`] when a required field is missing or
    /// any field has an unusable type.
    pub fn from_raw(raw: &RawRecord) -> ApiResult<Self> {
        Ok(Self {
            name: required_text(raw, "name")?,
            postal_code: optional_text(raw, "postal_code")?,
            country: required_text(raw, "country")?,
            state: optional_text(raw, "state")?,
            state_code: optional_text(raw, "state_code")?,
            province: optional_text(raw, "province")?,
            province_code: optional_text(raw, "province_code")?,
            community: optional_text(raw, "community")?,
            community_code: optional_text(raw, "community_code")?,
            latitude: coordinate(raw, "latitude")?,
            longitude: coordinate(raw, "longitude")?,
            accuracy: optional_integer(raw, "accuracy")?,
        })
    }
}

/// Shape every row, failing on the first bad one
pub fn transform_records(raw: &[RawRecord]) -> ApiResult<Vec<LocationRecord>> {
    raw.iter().map(LocationRecord::from_raw).collect()
}

/// Latitude and longitude of a raw row
pub fn raw_coordinates(raw: &RawRecord) -> ApiResult<(f64, f64)> {
    Ok((coordinate(raw, "latitude")?, coordinate(raw, "longitude")?))
}

fn is_sentinel(value: &Value) -> bool {
    matches!(value, Value::String(s) if s == MISSING_SENTINEL)
}

/// Value for `key`, treating null and the sentinel as absent
fn present<'a>(raw: &'a RawRecord, key: &str) -> Option<&'a Value> {
    raw.get(key).filter(|v| !v.is_null() && !is_sentinel(v))
}

fn invalid(key: &str, reason: impl std::fmt::Display) -> ApiError {
    ApiError::Validation(format!("field '{key}': {reason}"))
}

fn required_text(raw: &RawRecord, key: &str) -> ApiResult<String> {
    match raw.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(invalid(key, format!("expected string, got {other}"))),
        None => Err(invalid(key, "missing")),
    }
}

fn optional_text(raw: &RawRecord, key: &str) -> ApiResult<Option<String>> {
    match present(raw, key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        // Numeric postal codes survive as numbers in some dumps
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(invalid(key, format!("expected string, got {other}"))),
    }
}

fn coordinate(raw: &RawRecord, key: &str) -> ApiResult<f64> {
    let value = match raw.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(other) => return Err(invalid(key, format!("expected number, got {other}"))),
        None => return Err(invalid(key, "missing")),
    };

    value
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(key, "not a finite number"))
}

fn optional_integer(raw: &RawRecord, key: &str) -> ApiResult<Option<i64>> {
    let Some(value) = present(raw, key) else {
        return Ok(None);
    };

    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    parsed
        .map(Some)
        .ok_or_else(|| invalid(key, format!("expected integer, got {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawRecord {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn full_row() -> RawRecord {
        raw(json!({
            "name": "New York",
            "postal_code": "10001",
            "country": "US",
            "state": "New York",
            "state_code": "NY",
            "province": "New York County",
            "province_code": "061",
            "community": "nan",
            "community_code": "nan",
            "latitude": 40.7484,
            "longitude": -73.9967,
            "accuracy": 4
        }))
    }

    #[test]
    fn test_full_row() {
        let record = LocationRecord::from_raw(&full_row()).unwrap();
        assert_eq!(record.name, "New York");
        assert_eq!(record.postal_code.as_deref(), Some("10001"));
        assert_eq!(record.state_code.as_deref(), Some("NY"));
        assert_eq!(record.latitude, 40.7484);
        assert_eq!(record.accuracy, Some(4));
    }

    #[test]
    fn test_sentinel_becomes_absent() {
        let record = LocationRecord::from_raw(&full_row()).unwrap();
        assert_eq!(record.community, None);
        assert_eq!(record.community_code, None);
    }

    #[test]
    fn test_sentinel_normalized_on_every_optional_field() {
        let mut row = full_row();
        for key in ["postal_code", "state", "state_code", "province", "province_code", "accuracy"] {
            row.insert(key.to_string(), json!("nan"));
        }

        let record = LocationRecord::from_raw(&row).unwrap();
        assert_eq!(record.postal_code, None);
        assert_eq!(record.state, None);
        assert_eq!(record.state_code, None);
        assert_eq!(record.province, None);
        assert_eq!(record.province_code, None);
        assert_eq!(record.accuracy, None);
    }

    #[test]
    fn test_missing_optional_keys_are_absent() {
        let row = raw(json!({
            "name": "Somewhere",
            "country": "DE",
            "latitude": 52.5,
            "longitude": 13.4
        }));

        let record = LocationRecord::from_raw(&row).unwrap();
        assert_eq!(record.postal_code, None);
        assert_eq!(record.state, None);
        assert_eq!(record.community, None);
        assert_eq!(record.accuracy, None);
    }

    #[test]
    fn test_sentinel_is_serialized_as_null() {
        let record = LocationRecord::from_raw(&full_row()).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["community"], Value::Null);
        assert_eq!(json["community_code"], Value::Null);
    }

    #[test]
    fn test_numeric_postal_code_rendered_as_text() {
        let mut row = full_row();
        row.insert("postal_code".to_string(), json!(1010));
        let record = LocationRecord::from_raw(&row).unwrap();
        assert_eq!(record.postal_code.as_deref(), Some("1010"));
    }

    #[test]
    fn test_integral_float_accuracy() {
        let mut row = full_row();
        row.insert("accuracy".to_string(), json!(6.0));
        let record = LocationRecord::from_raw(&row).unwrap();
        assert_eq!(record.accuracy, Some(6));
    }

    #[test]
    fn test_fractional_accuracy_rejected() {
        let mut row = full_row();
        row.insert("accuracy".to_string(), json!(1.5));
        assert!(matches!(
            LocationRecord::from_raw(&row),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn test_missing_required_field_fails() {
        for key in ["name", "country", "latitude", "longitude"] {
            let mut row = full_row();
            row.remove(key);
            let err = LocationRecord::from_raw(&row).unwrap_err();
            assert!(matches!(err, ApiError::Validation(ref msg) if msg.contains(key)));
        }
    }

    #[test]
    fn test_wrong_type_fails() {
        let mut row = full_row();
        row.insert("latitude".to_string(), json!(["40.7"]));
        assert!(LocationRecord::from_raw(&row).is_err());

        let mut row = full_row();
        row.insert("state".to_string(), json!({"name": "NY"}));
        assert!(LocationRecord::from_raw(&row).is_err());
    }

    #[test]
    fn test_numeric_string_coordinates() {
        let mut row = full_row();
        row.insert("latitude".to_string(), json!("40.5"));
        assert_eq!(raw_coordinates(&row).unwrap(), (40.5, -73.9967));
    }

    #[test]
    fn test_transform_stops_at_first_bad_row() {
        let mut bad = full_row();
        bad.remove("name");
        assert!(transform_records(&[full_row(), bad]).is_err());
        assert_eq!(transform_records(&[full_row(), full_row()]).unwrap().len(), 2);
    }
}
