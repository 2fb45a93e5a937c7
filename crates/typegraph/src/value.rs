//! Conversions between handler values and engine values.

use async_graphql::Value as GraphValue;
use serde_json::Value;

/// Converts a `serde_json::Value` into an engine value.
pub(crate) fn json_to_graphql_value(json: Value) -> GraphValue {
    match json {
        Value::Null => GraphValue::Null,
        Value::Bool(b) => GraphValue::Boolean(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                GraphValue::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                GraphValue::Number(u.into())
            } else if let Some(f) = n.as_f64() {
                async_graphql::Number::from_f64(f)
                    .map(GraphValue::Number)
                    .unwrap_or(GraphValue::Null)
            } else {
                GraphValue::Null
            }
        }
        Value::String(s) => GraphValue::String(s),
        Value::Array(arr) => GraphValue::List(arr.into_iter().map(json_to_graphql_value).collect()),
        Value::Object(obj) => {
            let map: async_graphql::indexmap::IndexMap<async_graphql::Name, GraphValue> = obj
                .into_iter()
                .map(|(k, v)| (async_graphql::Name::new(k), json_to_graphql_value(v)))
                .collect();
            GraphValue::Object(map)
        }
    }
}

/// Converts an engine value into a `serde_json::Value`.
///
/// Enum values become their name as a string; binary uploads become null.
pub(crate) fn graphql_to_json_value(value: &GraphValue) -> Value {
    match value {
        GraphValue::Null | GraphValue::Binary(_) => Value::Null,
        GraphValue::Boolean(b) => Value::Bool(*b),
        GraphValue::Number(n) => Value::Number(n.clone()),
        GraphValue::String(s) => Value::String(s.clone()),
        GraphValue::Enum(name) => Value::String(name.to_string()),
        GraphValue::List(items) => Value::Array(items.iter().map(graphql_to_json_value).collect()),
        GraphValue::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.to_string(), graphql_to_json_value(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_to_graphql_value_primitives() {
        assert!(matches!(json_to_graphql_value(json!(null)), GraphValue::Null));
        assert!(matches!(json_to_graphql_value(json!(true)), GraphValue::Boolean(true)));
        assert!(matches!(json_to_graphql_value(json!(42)), GraphValue::Number(_)));
        assert!(matches!(json_to_graphql_value(json!("hello")), GraphValue::String(s) if s == "hello"));
    }

    #[test]
    fn test_json_to_graphql_value_complex() {
        let arr = json_to_graphql_value(json!([1, 2, 3]));
        assert!(matches!(arr, GraphValue::List(ref items) if items.len() == 3));

        let obj = json_to_graphql_value(json!({"title": "Pancakes"}));
        assert!(matches!(obj, GraphValue::Object(_)));
    }

    #[test]
    fn test_graphql_to_json_value() {
        let value = GraphValue::List(vec![
            GraphValue::Enum(async_graphql::Name::new("GOOD")),
            GraphValue::Number(3.into()),
        ]);
        assert_eq!(graphql_to_json_value(&value), json!(["GOOD", 3]));
    }

    #[test]
    fn test_round_trip_object() {
        let original = json!({"id": "1", "ratings": [{"value": 5}]});
        let converted = graphql_to_json_value(&json_to_graphql_value(original.clone()));
        assert_eq!(converted, original);
    }
}
