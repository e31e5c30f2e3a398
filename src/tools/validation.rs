//! Validate tool call arguments against JSON Schema before execution.

use serde_json::Value;

/// Validate tool arguments against a JSON Schema.
///
/// Performs top-level validation: schema type check, required field presence,
/// property type, `enum` membership and string `minLength`. Returns `Ok(())`
/// when valid, `Err(message)` describing the first violation found. Messages
/// always name the offending field.
pub fn validate_arguments(args: &Value, schema: &Value) -> Result<(), String> {
    let Some(fields) = args.as_object() else {
        return match schema.get("type").and_then(Value::as_str) {
            Some("object") => Err(format!("expected object arguments, got {}", json_type_name(args))),
            _ => Ok(()),
        };
    };

    let required = schema.get("required").and_then(Value::as_array);
    if let Some(missing) = required
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .find(|name| !fields.contains_key(*name))
    {
        return Err(format!("missing required field '{missing}'"));
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };
    fields
        .iter()
        .filter_map(|(key, value)| properties.get(key).map(|prop| (key, value, prop)))
        .try_for_each(|(key, value, prop)| validate_property(key, value, prop))
}

fn validate_property(key: &str, value: &Value, prop_schema: &Value) -> Result<(), String> {
    if let Some(expected) = prop_schema.get("type").and_then(Value::as_str) {
        if !value_matches_type(value, expected) {
            let actual = json_type_name(value);
            return Err(format!("field '{key}' expected type '{expected}', got {actual}"));
        }
    }

    if let Some(allowed) = prop_schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            let literals = allowed
                .iter()
                .map(|v| match v.as_str() {
                    Some(s) => format!("'{s}'"),
                    None => v.to_string(),
                })
                .collect::<Vec<_>>()
                .join(" or ");
            return Err(format!("field '{key}' must be one of {literals}, got {value}"));
        }
    }

    if let (Some(min), Some(text)) = (
        prop_schema.get("minLength").and_then(Value::as_u64),
        value.as_str(),
    ) {
        if (text.chars().count() as u64) < min {
            return Err(format!(
                "field '{key}' must be at least {min} character(s) long"
            ));
        }
    }

    Ok(())
}

fn value_matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "integer" => value.as_i64().is_some() || value.as_u64().is_some(),
        "string" | "number" | "boolean" | "object" | "array" | "null" => {
            json_type_name(value) == expected
        }
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_non_object_args_when_schema_expects_object() {
        let schema = json!({ "type": "object", "properties": {}, "required": [] });
        let args = json!("not an object");

        let result = validate_arguments(&args, &schema);

        assert!(result.unwrap_err().contains("expected object"));
    }

    #[test]
    fn rejects_missing_required_field() {
        let schema = json!({
            "type": "object",
            "properties": { "csvFile": { "type": "string" } },
            "required": ["csvFile"],
        });

        let result = validate_arguments(&json!({}), &schema);

        assert!(result
            .unwrap_err()
            .contains("missing required field 'csvFile'"));
    }

    #[test]
    fn rejects_when_any_required_field_is_absent() {
        let schema = json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "csvFile": { "type": "string" },
            },
            "required": ["name", "csvFile"],
        });

        let result = validate_arguments(&json!({ "name": "Acme" }), &schema);

        assert!(result
            .unwrap_err()
            .contains("missing required field 'csvFile'"));
    }

    #[test]
    fn accepts_valid_args_with_all_required_fields() {
        let schema = json!({
            "type": "object",
            "properties": { "companyName": { "type": "string" } },
            "required": ["companyName"],
        });

        assert!(validate_arguments(&json!({ "companyName": "Acme" }), &schema).is_ok());
    }

    #[test]
    fn accepts_any_args_when_schema_is_empty_object() {
        assert!(validate_arguments(&json!({ "anything": 42 }), &json!({})).is_ok());
    }

    #[test]
    fn rejects_field_with_wrong_type() {
        let schema = json!({
            "type": "object",
            "properties": { "count": { "type": "integer" } },
            "required": ["count"],
        });

        let err = validate_arguments(&json!({ "count": "seven" }), &schema).unwrap_err();

        assert!(err.contains("field 'count'"));
        assert!(err.contains("expected type 'integer'"));
    }

    #[test]
    fn accepts_extra_fields_not_in_schema_properties() {
        let schema = json!({
            "type": "object",
            "properties": { "name": { "type": "string" } },
            "required": ["name"],
        });

        assert!(validate_arguments(&json!({ "name": "Acme", "extra": true }), &schema).is_ok());
    }

    #[test]
    fn rejects_value_outside_enum_and_lists_literals() {
        let schema = json!({
            "type": "object",
            "properties": { "slideType": { "type": "string", "enum": ["Paragraph", "Bullet"] } },
            "required": ["slideType"],
        });

        let err = validate_arguments(&json!({ "slideType": "Keynote" }), &schema).unwrap_err();

        assert!(err.contains("field 'slideType'"));
        assert!(err.contains("'Paragraph'"));
        assert!(err.contains("'Bullet'"));
    }

    #[test]
    fn accepts_value_inside_enum() {
        let schema = json!({
            "type": "object",
            "properties": { "slideType": { "type": "string", "enum": ["Paragraph", "Bullet"] } },
        });

        assert!(validate_arguments(&json!({ "slideType": "Bullet" }), &schema).is_ok());
    }

    #[test]
    fn rejects_string_shorter_than_min_length() {
        let schema = json!({
            "type": "object",
            "properties": { "accessToken": { "type": "string", "minLength": 1 } },
            "required": ["accessToken"],
        });

        let err = validate_arguments(&json!({ "accessToken": "" }), &schema).unwrap_err();

        assert!(err.contains("field 'accessToken'"));
    }

    #[test]
    fn accepts_null_args_when_schema_has_no_type() {
        assert!(validate_arguments(&serde_json::Value::Null, &json!({})).is_ok());
    }
}
