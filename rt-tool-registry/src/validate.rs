//! Per-parameter JSON-Schema validation.
//!
//! Goes beyond top-level required-field and property-type checks to cover
//! recursive array/object checks, integer integrality, and
//! `additionalProperties` enforcement, with structured
//! `{parameter, message, code}` errors instead of a single error string.

use rt_protocol::{ValidationCode, ValidationIssue};
use serde_json::Value;

/// The outcome of [`validate_params`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
}

impl ValidationResult {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    #[must_use]
    pub fn failed(errors: Vec<ValidationIssue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Validate `params` against a JSON Schema `object` describing a tool's
/// parameters. Unknown schema shapes (no `properties` map, schema isn't an
/// object) are treated as "anything goes" rather than rejected, matching
/// the registration-time requirement that only `function` tools carry a
/// strict `object` schema.
#[must_use]
pub fn validate_params(params: &Value, schema: &Value) -> ValidationResult {
    let mut errors = Vec::new();
    validate_object(params, schema, "", &mut errors);
    ValidationResult::failed(errors)
}

fn validate_object(value: &Value, schema: &Value, path: &str, errors: &mut Vec<ValidationIssue>) {
    let Some(schema_obj) = schema.as_object() else {
        return;
    };

    let declared_type = schema_obj.get("type").and_then(Value::as_str);
    if declared_type == Some("object") && !value.is_object() {
        errors.push(ValidationIssue {
            parameter: path.to_string(),
            message: format!("expected object, got {}", json_type_name(value)),
            code: ValidationCode::TypeMismatch,
        });
        return;
    }

    let Some(value_obj) = value.as_object() else {
        return;
    };

    let required = schema_obj
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).collect::<Vec<_>>())
        .unwrap_or_default();

    for field in &required {
        if !value_obj.contains_key(*field) {
            errors.push(ValidationIssue {
                parameter: qualify(path, field),
                message: format!("missing required parameter '{field}'"),
                code: ValidationCode::Required,
            });
        }
    }

    let properties = schema_obj
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let additional_properties_allowed = schema_obj
        .get("additionalProperties")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    for (key, val) in value_obj {
        match properties.get(key) {
            Some(prop_schema) => validate_value(val, prop_schema, &qualify(path, key), errors),
            None if !additional_properties_allowed => {
                errors.push(ValidationIssue {
                    parameter: qualify(path, key),
                    message: format!("unknown parameter '{key}'"),
                    code: ValidationCode::UnknownParameter,
                });
            }
            None => {}
        }
    }
}

fn validate_value(value: &Value, schema: &Value, path: &str, errors: &mut Vec<ValidationIssue>) {
    let Some(schema_obj) = schema.as_object() else {
        return;
    };
    let Some(declared_type) = schema_obj.get("type").and_then(Value::as_str) else {
        return;
    };

    if value.is_null() {
        errors.push(ValidationIssue {
            parameter: path.to_string(),
            message: "value is null".to_string(),
            code: ValidationCode::NullValue,
        });
        return;
    }

    match declared_type {
        "string" => require(value.is_string(), "string", value, path, errors),
        "number" => require(value.is_number(), "number", value, path, errors),
        "integer" => {
            let is_integer = value.as_i64().is_some() || value.as_u64().is_some();
            require(is_integer, "integer", value, path, errors);
        }
        "boolean" => require(value.is_boolean(), "boolean", value, path, errors),
        "array" => {
            if !value.is_array() {
                errors.push(ValidationIssue {
                    parameter: path.to_string(),
                    message: format!("expected array, got {}", json_type_name(value)),
                    code: ValidationCode::TypeMismatch,
                });
                return;
            }
            if let Some(items_schema) = schema_obj.get("items") {
                for (i, item) in value.as_array().unwrap().iter().enumerate() {
                    validate_value(item, items_schema, &format!("{path}[{i}]"), errors);
                }
            }
        }
        "object" => validate_object(value, schema, path, errors),
        other => {
            errors.push(ValidationIssue {
                parameter: path.to_string(),
                message: format!("unknown schema type '{other}'"),
                code: ValidationCode::UnknownType,
            });
        }
    }
}

fn require(
    matches: bool,
    expected: &str,
    value: &Value,
    path: &str,
    errors: &mut Vec<ValidationIssue>,
) {
    if !matches {
        errors.push(ValidationIssue {
            parameter: path.to_string(),
            message: format!(
                "expected {expected}, got {}",
                json_type_name(value)
            ),
            code: ValidationCode::TypeMismatch,
        });
    }
}

fn qualify(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{path}.{field}")
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

    fn calc_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "x": { "type": "integer" },
                "y": { "type": "integer" },
            },
            "required": ["x", "y"],
        })
    }

    #[test]
    fn valid_params_pass() {
        let result = validate_params(&json!({"x": 2, "y": 2}), &calc_schema());
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn missing_required_field() {
        let result = validate_params(&json!({"x": 2}), &calc_schema());
        assert!(!result.valid);
        assert_eq!(result.errors[0].code, ValidationCode::Required);
        assert_eq!(result.errors[0].parameter, "y");
    }

    #[test]
    fn type_mismatch() {
        let result = validate_params(&json!({"x": "two", "y": 2}), &calc_schema());
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.code == ValidationCode::TypeMismatch && e.parameter == "x"));
    }

    #[test]
    fn unknown_parameter_rejected_by_default() {
        let result = validate_params(&json!({"x": 1, "y": 1, "z": true}), &calc_schema());
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.code == ValidationCode::UnknownParameter && e.parameter == "z"));
    }

    #[test]
    fn additional_properties_true_allows_unknown() {
        let mut schema = calc_schema();
        schema["additionalProperties"] = json!(true);
        let result = validate_params(&json!({"x": 1, "y": 1, "z": true}), &schema);
        assert!(result.valid);
    }

    #[test]
    fn nested_array_items_validated() {
        let schema = json!({
            "type": "object",
            "properties": {
                "tags": { "type": "array", "items": { "type": "string" } },
            },
            "required": [],
        });
        let result = validate_params(&json!({"tags": ["a", 1]}), &schema);
        assert!(!result.valid);
        assert_eq!(result.errors[0].parameter, "tags[1]");
    }

    #[test]
    fn nested_object_properties_validated() {
        let schema = json!({
            "type": "object",
            "properties": {
                "point": {
                    "type": "object",
                    "properties": {
                        "x": { "type": "integer" },
                    },
                    "required": ["x"],
                },
            },
            "required": ["point"],
        });
        let result = validate_params(&json!({"point": {}}), &schema);
        assert!(!result.valid);
        assert_eq!(result.errors[0].parameter, "point.x");
    }

    #[test]
    fn integer_integrality_rejects_float() {
        let result = validate_params(&json!({"x": 2.5, "y": 2}), &calc_schema());
        assert!(!result.valid);
        assert_eq!(result.errors[0].parameter, "x");
    }

    #[test]
    fn null_value_reported() {
        let result = validate_params(&json!({"x": null, "y": 2}), &calc_schema());
        assert!(!result.valid);
        assert_eq!(result.errors[0].code, ValidationCode::NullValue);
    }
}
