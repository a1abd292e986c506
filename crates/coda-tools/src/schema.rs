//! Minimal JSON-schema checks applied before a tool handler runs.
//!
//! Only the subset tools actually declare is enforced: the arguments must be
//! an object, every `required` field must be present, and each declared
//! property's primitive `type` must match. Anything else in the schema is
//! advisory for the model and ignored here.

use serde_json::Value;

/// Validates `arguments` against `schema`, returning a description of the
/// first violation.
pub fn validate(schema: &Value, arguments: &Value) -> Result<(), String> {
    let Some(args) = arguments.as_object() else {
        return Err(format!(
            "Arguments must be a JSON object, got {}",
            type_name(arguments)
        ));
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            if !args.contains_key(field) {
                return Err(format!("Missing required field '{field}'"));
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (field, value) in args {
        let Some(expected) = properties.get(field).and_then(|p| p.get("type")) else {
            continue;
        };
        if !type_matches(expected, value) {
            return Err(format!(
                "Field '{field}' expected type {}, got {}",
                describe_expected(expected),
                type_name(value)
            ));
        }
    }

    Ok(())
}

fn type_matches(expected: &Value, value: &Value) -> bool {
    match expected {
        Value::String(t) => primitive_matches(t, value),
        // `"type": ["string", "null"]`
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| primitive_matches(t, value)),
        _ => true,
    }
}

fn primitive_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn describe_expected(expected: &Value) -> String {
    match expected {
        Value::String(t) => format!("'{t}'"),
        Value::Array(types) => {
            let names: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
            format!("one of [{}]", names.join(", "))
        }
        other => other.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
