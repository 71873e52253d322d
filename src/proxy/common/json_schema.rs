use serde_json::Value;

// JSON-Schema vocabulary the upstream rejects in function declarations.
// Everything else (type, description, properties, required, items, enum)
// passes through untouched.
const STRIP_KEYS: &[&str] = &[
    "$schema",
    "$id",
    "$ref",
    "definitions",
    "title",
    "examples",
    "default",
    "readOnly",
    "writeOnly",
    "additionalProperties",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
    "pattern",
    "format",
    "minLength",
    "maxLength",
    "minItems",
    "maxItems",
    "uniqueItems",
    "minProperties",
    "maxProperties",
    "patternProperties",
    "dependencies",
    "contentMediaType",
    "contentEncoding",
    "const",
    "allOf",
    "anyOf",
    "oneOf",
    "not",
];

// Total over arbitrary JSON: never errors, non-container values pass through.
pub fn clean_json_schema(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for key in STRIP_KEYS {
                map.remove(*key);
            }

            for (_, child) in map.iter_mut() {
                clean_json_schema(child);
            }

            repair_required_list(map);
        }
        Value::Array(items) => {
            for child in items.iter_mut() {
                clean_json_schema(child);
            }
        }
        _ => {}
    }
}

// `required` may name fields that only existed under stripped combinators.
// Restrict it to what `properties` still declares; drop it when empty.
fn repair_required_list(map: &mut serde_json::Map<String, Value>) {
    let property_names: Option<Vec<String>> = map
        .get("properties")
        .and_then(|p| p.as_object())
        .map(|props| props.keys().cloned().collect());

    let Some(property_names) = property_names else {
        return;
    };

    let Some(required) = map.get_mut("required").and_then(|r| r.as_array_mut()) else {
        return;
    };

    required.retain(|name| {
        name.as_str()
            .map(|n| property_names.iter().any(|p| p == n))
            .unwrap_or(false)
    });

    if required.is_empty() {
        map.remove("required");
    }
}

// Post-sanitisation audit used by tests and debug logging; a survivor is a
// bug in the strip list, not a reason to reject the request.
pub fn find_rejected_keywords(value: &Value) -> Vec<String> {
    let mut found = Vec::new();
    collect_rejected_keywords(value, &mut found);
    found
}

fn collect_rejected_keywords(value: &Value, found: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for key in map.keys() {
                if STRIP_KEYS.contains(&key.as_str()) {
                    found.push(key.clone());
                }
            }
            for child in map.values() {
                collect_rejected_keywords(child, found);
            }
        }
        Value::Array(items) => {
            for child in items {
                collect_rejected_keywords(child, found);
            }
        }
        _ => {}
    }
}

pub fn warn_on_rejected_keywords(value: &Value, context: &str) {
    let survivors = find_rejected_keywords(value);
    if !survivors.is_empty() {
        tracing::warn!(
            "[Schema-Sanitiser] {} still contains rejected keywords after cleaning: {:?}",
            context,
            survivors
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_rejected_keywords_at_top_level() {
        let mut schema = json!({
            "type": "object",
            "properties": {
                "q": {"type": "string", "pattern": "^x$", "minLength": 1}
            },
            "required": ["q"],
            "additionalProperties": false,
            "$schema": "http://x"
        });
        clean_json_schema(&mut schema);
        assert_eq!(
            schema,
            json!({
                "type": "object",
                "properties": {"q": {"type": "string"}},
                "required": ["q"]
            })
        );
    }

    #[test]
    fn strips_at_every_nesting_depth() {
        let mut schema = json!({
            "type": "object",
            "properties": {
                "outer": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "inner": {"type": "number", "exclusiveMinimum": 0, "format": "double"}
                        },
                        "patternProperties": {"^x-": {"type": "string"}}
                    },
                    "minItems": 1
                }
            }
        });
        clean_json_schema(&mut schema);
        assert!(find_rejected_keywords(&schema).is_empty());
        assert_eq!(
            schema["properties"]["outer"]["items"]["properties"]["inner"],
            json!({"type": "number"})
        );
    }

    #[test]
    fn required_is_restricted_to_surviving_properties() {
        let mut schema = json!({
            "type": "object",
            "properties": {"a": {"type": "string"}},
            "required": ["a", "b"]
        });
        clean_json_schema(&mut schema);
        assert_eq!(schema["required"], json!(["a"]));
    }

    #[test]
    fn empty_required_is_dropped() {
        let mut schema = json!({
            "type": "object",
            "properties": {"a": {"type": "string"}},
            "required": ["gone"]
        });
        clean_json_schema(&mut schema);
        assert!(schema.get("required").is_none());
    }

    #[test]
    fn sanitiser_is_idempotent() {
        let mut once = json!({
            "type": "object",
            "title": "T",
            "properties": {
                "x": {"type": "string", "enum": ["a", "b"], "default": "a"}
            },
            "anyOf": [{"type": "object"}],
            "required": ["x", "y"]
        });
        clean_json_schema(&mut once);
        let mut twice = once.clone();
        clean_json_schema(&mut twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn non_container_values_pass_through() {
        let mut v = json!("just a string");
        clean_json_schema(&mut v);
        assert_eq!(v, json!("just a string"));

        let mut n = json!(42);
        clean_json_schema(&mut n);
        assert_eq!(n, json!(42));
    }

    #[test]
    fn retained_keywords_survive() {
        let mut schema = json!({
            "type": "object",
            "description": "desc",
            "properties": {"e": {"type": "string", "enum": ["x"]}},
            "required": ["e"],
            "items": {"type": "string"}
        });
        let before = schema.clone();
        clean_json_schema(&mut schema);
        assert_eq!(schema, before);
    }
}
