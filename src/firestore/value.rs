use std::collections::HashMap;

use chrono::SecondsFormat;
use serde::de::Error as _;
use serde_json::{Map, Number, Value as JsonValue};

use super::models::{ArrayValue, MapValue, Value};
use super::query::ScalarValue;
use super::store::Fields;

pub(crate) fn fields_to_json(fields: HashMap<String, Value>) -> Result<Fields, serde_json::Error> {
    let mut map = Map::new();
    for (key, value) in fields {
        map.insert(key, value_to_json(value)?);
    }
    Ok(map)
}

pub(crate) fn value_to_json(value: Value) -> Result<JsonValue, serde_json::Error> {
    Ok(match value {
        Value::NullValue(_) => JsonValue::Null,
        Value::BooleanValue(b) => JsonValue::Bool(b),
        Value::IntegerValue(s) => {
            let i: i64 = s.parse().map_err(|e| {
                serde_json::Error::custom(format!("Failed to parse integer string '{}': {}", s, e))
            })?;
            JsonValue::Number(i.into())
        }
        Value::DoubleValue(d) => JsonValue::Number(
            Number::from_f64(d)
                .ok_or_else(|| serde_json::Error::custom(format!("Invalid f64 value: {}", d)))?,
        ),
        Value::TimestampValue(s) | Value::StringValue(s) | Value::BytesValue(s) => {
            JsonValue::String(s)
        }
        Value::ReferenceValue(s) => JsonValue::String(s),
        Value::GeoPointValue(gp) => {
            serde_json::json!({ "latitude": gp.latitude, "longitude": gp.longitude })
        }
        Value::ArrayValue(array) => JsonValue::Array(
            array
                .values
                .into_iter()
                .map(value_to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Value::MapValue(map) => JsonValue::Object(fields_to_json(map.fields)?),
    })
}

pub(crate) fn json_to_fields(fields: Fields) -> Result<HashMap<String, Value>, serde_json::Error> {
    fields
        .into_iter()
        .map(|(k, v)| json_to_value(v).map(|v| (k, v)))
        .collect()
}

pub(crate) fn json_to_value(value: JsonValue) -> Result<Value, serde_json::Error> {
    Ok(match value {
        JsonValue::Null => Value::NullValue(()),
        JsonValue::Bool(b) => Value::BooleanValue(b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::IntegerValue(i.to_string())
            } else if let Some(f) = n.as_f64() {
                Value::DoubleValue(f)
            } else {
                return Err(serde_json::Error::custom(format!("Unsupported number type: {}", n)));
            }
        }
        JsonValue::String(s) => Value::StringValue(s),
        JsonValue::Array(a) => Value::ArrayValue(ArrayValue {
            values: a
                .into_iter()
                .map(json_to_value)
                .collect::<Result<Vec<_>, _>>()?,
        }),
        JsonValue::Object(o) => Value::MapValue(MapValue {
            fields: json_to_fields(o)?,
        }),
    })
}

pub(crate) fn scalar_to_value(value: &ScalarValue) -> Value {
    match value {
        ScalarValue::String(s) => Value::StringValue(s.clone()),
        ScalarValue::Integer(i) => Value::IntegerValue(i.to_string()),
        ScalarValue::Double(d) => Value::DoubleValue(*d),
        ScalarValue::Boolean(b) => Value::BooleanValue(*b),
        ScalarValue::Timestamp(ts) => {
            Value::TimestampValue(ts.to_rfc3339_opts(SecondsFormat::Micros, true))
        }
        ScalarValue::List(items) => Value::ArrayValue(ArrayValue {
            values: items.iter().map(scalar_to_value).collect(),
        }),
    }
}

/// Records must serialize to a JSON object.
pub(crate) fn object_or_error(value: JsonValue) -> Result<Fields, serde_json::Error> {
    match value {
        JsonValue::Object(map) => Ok(map),
        _ => Err(serde_json::Error::custom(
            "Can only store objects as documents",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::models::Document;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn test_firestore_document_to_json() {
        let doc: Document = serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/documents/users/alice",
            "fields": {
                "name": { "stringValue": "Alice" },
                "age": { "integerValue": "30" },
                "score": { "doubleValue": 4.5 },
                "tags": { "arrayValue": { "values": [{ "stringValue": "a" }] } },
                "empty": { "arrayValue": {} },
                "address": { "mapValue": { "fields": { "city": { "stringValue": "Oslo" } } } },
                "deleted": { "nullValue": null }
            },
            "createTime": "2024-01-01T00:00:00Z",
            "updateTime": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        let fields = fields_to_json(doc.fields).unwrap();
        assert_eq!(
            JsonValue::Object(fields),
            json!({
                "name": "Alice",
                "age": 30,
                "score": 4.5,
                "tags": ["a"],
                "empty": [],
                "address": { "city": "Oslo" },
                "deleted": null
            })
        );
    }

    #[test]
    fn test_json_to_firestore_fields() {
        let fields = object_or_error(json!({ "name": "C", "count": 2, "ratio": 0.5, "ok": true }))
            .unwrap();
        let encoded = serde_json::to_value(json_to_fields(fields).unwrap()).unwrap();

        assert_eq!(
            encoded,
            json!({
                "name": { "stringValue": "C" },
                "count": { "integerValue": "2" },
                "ratio": { "doubleValue": 0.5 },
                "ok": { "booleanValue": true }
            })
        );
    }

    #[test]
    fn test_non_object_record_rejected() {
        assert!(object_or_error(json!(["not", "an", "object"])).is_err());
    }

    #[test]
    fn test_scalar_encoding() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        assert_eq!(
            serde_json::to_value(scalar_to_value(&ScalarValue::Timestamp(ts))).unwrap(),
            json!({ "timestampValue": "2024-05-01T08:30:00.000000Z" })
        );
        assert_eq!(
            serde_json::to_value(scalar_to_value(&ScalarValue::List(vec![
                ScalarValue::Integer(1),
                ScalarValue::from("x"),
            ])))
            .unwrap(),
            json!({ "arrayValue": { "values": [{ "integerValue": "1" }, { "stringValue": "x" }] } })
        );
    }
}
