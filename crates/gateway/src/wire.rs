//! JSON representation of resource records.
//!
//! Control planes speak JSON; records speak [`FieldValue`]. Conversion is
//! lossy in one direction only: arrays have no field kind and come back as
//! their JSON text.

use reconcile::{FieldValue, Fields};
use serde_json::{Map, Number, Value};

/// Convert record fields to a JSON object.
pub fn fields_to_json(fields: &Fields) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(name, value)| (name.clone(), value_to_json(value)))
            .collect(),
    )
}

/// Convert a JSON object to record fields, dropping nulls.
pub fn json_to_fields(object: &Map<String, Value>) -> Fields {
    object
        .iter()
        .filter_map(|(name, value)| json_to_value(value).map(|v| (name.clone(), v)))
        .collect()
}

fn value_to_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::String(s) | FieldValue::Document(s) => Value::String(s.clone()),
        FieldValue::Bool(b) => Value::Bool(*b),
        FieldValue::Number(n) => number_to_json(*n),
        FieldValue::Record(fields) => fields_to_json(fields),
    }
}

fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

fn json_to_value(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(FieldValue::Bool(*b)),
        Value::Number(n) => n.as_f64().map(FieldValue::Number),
        Value::String(s) => Some(FieldValue::String(s.clone())),
        Value::Array(_) => Some(FieldValue::String(value.to_string())),
        Value::Object(map) => Some(FieldValue::Record(json_to_fields(map))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fields_to_json() {
        let mut nested = Fields::new();
        nested.insert("email".into(), "api@contoso.example".into());

        let mut fields = Fields::new();
        fields.insert("path".into(), "pets".into());
        fields.insert("limit".into(), FieldValue::Number(10.0));
        fields.insert("ratio".into(), FieldValue::Number(0.5));
        fields.insert("published".into(), true.into());
        fields.insert("contact".into(), FieldValue::Record(nested));
        fields.insert("xml".into(), FieldValue::Document("<p/>".into()));

        assert_eq!(
            fields_to_json(&fields),
            json!({
                "path": "pets",
                "limit": 10,
                "ratio": 0.5,
                "published": true,
                "contact": { "email": "api@contoso.example" },
                "xml": "<p/>",
            })
        );
    }

    #[test]
    fn test_json_to_fields() {
        let value = json!({
            "path": "pets",
            "protocols": ["https"],
            "description": null,
            "limit": 3,
        });
        let fields = json_to_fields(value.as_object().unwrap());

        assert_eq!(fields.get("path"), Some(&FieldValue::from("pets")));
        assert_eq!(fields.get("protocols"), Some(&FieldValue::from("[\"https\"]")));
        assert_eq!(fields.get("limit"), Some(&FieldValue::Number(3.0)));
        assert!(!fields.contains_key("description"));
    }
}
