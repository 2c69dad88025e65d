//! Repairs loosely formatted model output into a strict JSON object.
//!
//! Models asked for "a JSON document" routinely answer with single-quoted
//! strings, a bare `id` key, stray wrapping quotes or a Markdown fence.
//! This is a best-effort textual repair: it assumes one level of quoting and no
//! quotes nested inside values.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use topichub_core::{OperationError, ID_FIELD};

const BARE_ID_KEY: &str = "id";

static SINGLE_QUOTED_KEY: OnceLock<Regex> = OnceLock::new();
static SINGLE_QUOTED_VALUE: OnceLock<Regex> = OnceLock::new();

fn single_quoted_key() -> &'static Regex {
    SINGLE_QUOTED_KEY
        .get_or_init(|| Regex::new(r"([{,]\s*)'([^']+)'\s*:").expect("key pattern is valid"))
}

fn single_quoted_value() -> &'static Regex {
    SINGLE_QUOTED_VALUE.get_or_init(|| {
        Regex::new(r":\s*'([^']+)'(\s*[},])").expect("value pattern is valid")
    })
}

/// Parses `raw` into a JSON object, repairing single quotes and renaming a
/// bare `id` key to `_id` at every depth.
pub fn normalize(raw: &str) -> Result<Map<String, Value>, OperationError> {
    let stripped = strip_wrapping(raw);

    let value = match serde_json::from_str::<Value>(stripped) {
        Ok(value) => value,
        Err(_) => {
            let repaired = repair_quotes(stripped);
            serde_json::from_str::<Value>(&repaired)
                .map_err(|error| OperationError::Parse(error.to_string()))?
        }
    };

    match rename_bare_id(value) {
        Value::Object(map) => Ok(map),
        other => Err(OperationError::Parse(format!(
            "expected a JSON object, got {}",
            value_kind(&other)
        ))),
    }
}

fn strip_wrapping(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(fenced) = text.strip_prefix("```") {
        let body = fenced.split_once('\n').map(|(_, body)| body).unwrap_or(fenced);
        text = body.trim_end().strip_suffix("```").unwrap_or(body).trim();
    }

    text.trim_matches('"').trim_matches('\'').trim()
}

fn repair_quotes(text: &str) -> String {
    let keys_fixed = single_quoted_key().replace_all(text, r#"${1}"${2}":"#);
    single_quoted_value().replace_all(&keys_fixed, r#": "${1}"${2}"#).into_owned()
}

fn rename_bare_id(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let has_identifier = map.contains_key(ID_FIELD);
            Value::Object(
                map.into_iter()
                    .map(|(key, value)| {
                        let key = if key == BARE_ID_KEY && !has_identifier {
                            ID_FIELD.to_string()
                        } else {
                            key
                        };
                        (key, rename_bare_id(value))
                    })
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(rename_bare_id).collect()),
        other => other,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use topichub_core::OperationError;

    use super::normalize;

    fn normalized(raw: &str) -> Value {
        Value::Object(normalize(raw).expect("normalize"))
    }

    #[test]
    fn single_quoted_document_becomes_strict_json() {
        assert_eq!(
            normalized("{'_id': 'a', 'description': 'b'}"),
            json!({"_id": "a", "description": "b"})
        );
    }

    #[test]
    fn bare_id_key_is_renamed() {
        assert_eq!(normalized("{'id': 'x'}"), json!({"_id": "x"}));
        assert_eq!(normalized(r#"{"id" : "x"}"#), json!({"_id": "x"}));
    }

    #[test]
    fn bare_id_inside_operator_arrays_is_renamed() {
        assert_eq!(
            normalized("{'$or': [{'id': 'a'}, {'id': 'b'}]}"),
            json!({"$or": [{"_id": "a"}, {"_id": "b"}]})
        );
    }

    #[test]
    fn surrounding_quotes_whitespace_and_fences_are_stripped() {
        assert_eq!(normalized("  \"{'_id': 'politics'}\"\n"), json!({"_id": "politics"}));
        assert_eq!(normalized("'{\"_id\": \"politics\"}'"), json!({"_id": "politics"}));
        assert_eq!(normalized("```json\n{'_id': 'politics'}\n```"), json!({"_id": "politics"}));
    }

    #[test]
    fn numeric_values_survive_repair() {
        assert_eq!(
            normalized("{'description': 1, '_id': 0}"),
            json!({"description": 1, "_id": 0})
        );
    }

    #[test]
    fn empty_object_is_valid() {
        assert_eq!(normalized("{}"), json!({}));
    }

    #[test]
    fn normalizing_strict_output_is_idempotent() {
        for raw in [
            "{'_id': 'a', 'description': 'b'}",
            "{'id': 'x'}",
            "{'description': {'$regex': 'elect', '$options': 'i'}}",
            r#"{"_id": "it's fine", "description": "quoted 'words' inside"}"#,
        ] {
            let once = normalized(raw);
            let twice = normalized(&once.to_string());
            assert_eq!(once, twice, "input `{raw}`");
        }
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(normalize("politics"), Err(OperationError::Parse(_))));
        assert!(matches!(normalize(""), Err(OperationError::Parse(_))));
        assert!(matches!(normalize("{'_id': 'a'"), Err(OperationError::Parse(_))));
    }

    #[test]
    fn non_object_json_is_a_parse_error() {
        let error = normalize("[1, 2]").expect_err("arrays are rejected");
        assert_eq!(error, OperationError::Parse("expected a JSON object, got an array".to_string()));
    }
}
