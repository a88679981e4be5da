//! Field-name translation between the model's lowerCamelCase and the
//! store's lower_snake_case, applied recursively to objects and arrays.

use serde_json::{Map, Value};

/// `tpId` -> `tp_id`. Every ASCII uppercase letter becomes `_` plus its
/// lowercase form.
pub fn to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// `tp_id` -> `tpId`. Only an underscore followed by a lowercase ASCII
/// letter is folded; `p5_criteria` keeps its digit and becomes `p5Criteria`.
pub fn to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '_' {
            if let Some(&next) = chars.peek() {
                if next.is_ascii_lowercase() {
                    out.push(next.to_ascii_uppercase());
                    chars.next();
                    continue;
                }
            }
        }
        out.push(ch);
    }
    out
}

/// Renames every object key in the tree with `mapper`.
pub fn map_keys(value: Value, mapper: fn(&str) -> String) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(|v| map_keys(v, mapper)).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, v)| (mapper(&key), map_keys(v, mapper)))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

/// Drops null-valued object fields so that unset columns read as the
/// field's default instead of failing typed decoding.
pub fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(strip_nulls).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        other => other,
    }
}

pub fn keys_to_snake(value: Value) -> Value {
    map_keys(value, to_snake)
}

pub fn keys_to_camel(value: Value) -> Value {
    map_keys(value, to_camel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_case_conversion() {
        assert_eq!(to_snake("tpId"), "tp_id");
        assert_eq!(to_snake("categoryResults"), "category_results");
        assert_eq!(to_snake("p5Criteria"), "p5_criteria");
        assert_eq!(to_camel("teacher_name"), "teacherName");
        assert_eq!(to_camel("p5_criteria"), "p5Criteria");
        assert_eq!(to_camel("id"), "id");
    }

    #[test]
    fn test_nested_keys() {
        let camel = json!({
            "studentId": "S1",
            "levelDescriptions": { "1": "x" },
            "rows": [{ "criteriaId": "K1" }]
        });
        let snake = keys_to_snake(camel.clone());

        assert_eq!(snake["student_id"], "S1");
        assert_eq!(snake["level_descriptions"]["1"], "x");
        assert_eq!(snake["rows"][0]["criteria_id"], "K1");
        assert_eq!(keys_to_camel(snake), camel);
    }

    #[test]
    fn test_strip_nulls() {
        let row = strip_nulls(json!({ "id": 1, "pob": null, "inner": [{ "a": null, "b": 2 }] }));
        assert_eq!(row, json!({ "id": 1, "inner": [{ "b": 2 }] }));
    }
}
