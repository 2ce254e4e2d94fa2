use crate::errors::ScoreError;
use crate::model::FEATURE_COLUMNS;
use jsonschema::JSONSchema;
use serde_json::{Map, Value};

/// Request body contract: an object whose known keys are numbers.
/// Unknown keys are allowed and ignored downstream.
pub fn input_schema() -> Value {
    let mut properties = Map::new();
    for column in FEATURE_COLUMNS {
        properties.insert(column.to_string(), serde_json::json!({ "type": "number" }));
    }
    serde_json::json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "properties": properties
    })
}

/// Compiled once per service, shared across requests.
pub struct InputValidator {
    compiled: JSONSchema,
}

impl InputValidator {
    pub fn new() -> Result<Self, ScoreError> {
        Self::from_schema(&input_schema())
    }

    /// A schema that does not compile is a server fault, never the caller's.
    pub fn from_schema(schema: &Value) -> Result<Self, ScoreError> {
        let compiled = JSONSchema::compile(schema)
            .map_err(|e| ScoreError::Internal(format!("input schema does not compile: {e}")))?;
        Ok(Self { compiled })
    }

    pub fn check(&self, body: &Value) -> Result<(), ScoreError> {
        if let Err(errors) = self.compiled.validate(body) {
            let violations: Vec<String> = errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{path}: {e}")
                    }
                })
                .collect();
            return Err(ScoreError::InvalidInput(violations.join("; ")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_subsets_and_extras() {
        let v = InputValidator::new().unwrap();
        v.check(&json!({})).unwrap();
        v.check(&json!({"Энергия": 100, "Белок": 5.5})).unwrap();
        v.check(&json!({"Энергия": 1, "comment": "free text"})).unwrap();
    }

    #[test]
    fn reports_offending_path() {
        let v = InputValidator::new().unwrap();
        let err = v.check(&json!({"Углеводы": "twenty"})).unwrap_err();
        assert!(err.is_client_error());
        assert!(err.to_string().contains("Углеводы"), "{err}");
    }

    #[test]
    fn broken_schema_is_internal() {
        let err = InputValidator::from_schema(&json!({"type": "nonsense"})).err().unwrap();
        assert_eq!(err.code(), "E_INTERNAL");
        assert!(!err.is_client_error());
    }

    #[test]
    fn rejects_non_objects() {
        let v = InputValidator::new().unwrap();
        assert!(v.check(&json!([])).is_err());
        assert!(v.check(&json!("body")).is_err());
        assert!(v.check(&Value::Null).is_err());
    }
}
