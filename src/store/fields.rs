//! Typed extraction from raw document field maps.
//!
//! Documents come back from the store as untyped JSON maps; repositories use
//! these helpers to map them onto domain structs. Money and hours are
//! persisted as decimal strings, dates as `YYYY-MM-DD`, timestamps as
//! RFC 3339.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::errors::{DomainError, DomainResult};
use crate::store::{EntityType, FieldMap};
use crate::types::EntityId;

pub fn opt_str<'a>(map: &'a FieldMap, field: &str) -> Option<&'a str> {
    match map.get(field) {
        Some(Value::String(s)) => Some(s.as_str()),
        _ => None,
    }
}

pub fn opt_string(map: &FieldMap, field: &str) -> Option<String> {
    opt_str(map, field).map(|s| s.to_string())
}

pub fn opt_i64(map: &FieldMap, field: &str) -> Option<i64> {
    match map.get(field) {
        Some(Value::Number(n)) => n.as_i64(),
        _ => None,
    }
}

pub fn opt_id(map: &FieldMap, field: &str) -> Option<EntityId> {
    opt_i64(map, field)
}

pub fn opt_bool(map: &FieldMap, field: &str) -> Option<bool> {
    match map.get(field) {
        Some(Value::Bool(b)) => Some(*b),
        _ => None,
    }
}

/// Decimals are stored as strings, but tolerate plain JSON numbers written
/// by other store clients.
pub fn opt_decimal(map: &FieldMap, field: &str) -> Option<Decimal> {
    match map.get(field) {
        Some(Value::String(s)) => s.parse().ok(),
        Some(Value::Number(n)) => n.to_string().parse().ok(),
        _ => None,
    }
}

pub fn opt_date(map: &FieldMap, field: &str) -> Option<NaiveDate> {
    opt_str(map, field).and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

pub fn opt_datetime(map: &FieldMap, field: &str) -> Option<DateTime<Utc>> {
    opt_str(map, field)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn req_string(entity: EntityType, map: &FieldMap, field: &str) -> DomainResult<String> {
    opt_string(map, field).ok_or_else(|| DomainError::InvalidFieldType {
        entity,
        field: field.to_string(),
    })
}

pub fn req_id(entity: EntityType, map: &FieldMap, field: &str) -> DomainResult<EntityId> {
    opt_id(map, field).ok_or_else(|| DomainError::InvalidFieldType {
        entity,
        field: field.to_string(),
    })
}

pub fn req_decimal(entity: EntityType, map: &FieldMap, field: &str) -> DomainResult<Decimal> {
    opt_decimal(map, field).ok_or_else(|| DomainError::InvalidFieldType {
        entity,
        field: field.to_string(),
    })
}

pub fn req_date(entity: EntityType, map: &FieldMap, field: &str) -> DomainResult<NaiveDate> {
    opt_date(map, field).ok_or_else(|| DomainError::InvalidFieldType {
        entity,
        field: field.to_string(),
    })
}

// Write-side conversions, so every repository persists the same shapes.

pub fn decimal_value(value: Decimal) -> Value {
    Value::String(value.to_string())
}

pub fn date_value(value: NaiveDate) -> Value {
    Value::String(value.format("%Y-%m-%d").to_string())
}

pub fn datetime_value(value: DateTime<Utc>) -> Value {
    Value::String(value.to_rfc3339())
}

pub fn is_deleted(map: &FieldMap) -> bool {
    matches!(map.get("deleted_at"), Some(Value::String(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn doc(pairs: &[(&str, Value)]) -> FieldMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_decimal_round_trip() {
        let map = doc(&[("amount", decimal_value(dec!(1234.50)))]);
        assert_eq!(opt_decimal(&map, "amount"), Some(dec!(1234.50)));
    }

    #[test]
    fn test_decimal_tolerates_plain_numbers() {
        let map = doc(&[("amount", json!(99.5))]);
        assert_eq!(opt_decimal(&map, "amount"), Some(dec!(99.5)));
    }

    #[test]
    fn test_date_round_trip() {
        let date = NaiveDate::from_ymd_opt(2025, 11, 3).unwrap();
        let map = doc(&[("due_date", date_value(date))]);
        assert_eq!(opt_date(&map, "due_date"), Some(date));
    }

    #[test]
    fn test_required_field_errors_on_missing() {
        let map = doc(&[]);
        let err = req_id(EntityType::Invoice, &map, "organization_id").unwrap_err();
        assert!(matches!(err, DomainError::InvalidFieldType { .. }));
    }

    #[test]
    fn test_is_deleted() {
        let mut map = doc(&[("name", json!("Acme"))]);
        assert!(!is_deleted(&map));
        map.insert("deleted_at".to_string(), datetime_value(Utc::now()));
        assert!(is_deleted(&map));
    }
}
