//! Typed access to tool call arguments.

use crate::error::BridgeError;

/// Wrapper around tool call arguments providing typed extraction.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    /// Get a string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str, BridgeError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| BridgeError::InvalidArgument(format!("Missing string argument: {key}")))
    }

    /// Get an optional string argument.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    /// Deserialize the entire arguments into a typed struct.
    ///
    /// Models occasionally send arguments as a JSON-encoded string; those are
    /// decoded first.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, BridgeError> {
        let value = match &self.value {
            serde_json::Value::String(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    serde_json::json!({})
                } else {
                    serde_json::from_str::<serde_json::Value>(trimmed).map_err(|e| {
                        BridgeError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
                    })?
                }
            }
            serde_json::Value::Null => serde_json::json!({}),
            other => other.clone(),
        };
        serde_json::from_value(value).map_err(|e| {
            BridgeError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Args {
        company_name: String,
    }

    #[test]
    fn deserializes_object_arguments() {
        let args = ToolArguments::new(json!({ "companyName": "Acme" }));
        let parsed: Args = args.deserialize().unwrap();
        assert_eq!(parsed.company_name, "Acme");
    }

    #[test]
    fn deserializes_stringified_arguments() {
        let args = ToolArguments::new(json!(r#"{"companyName":"Beta"}"#));
        let parsed: Args = args.deserialize().unwrap();
        assert_eq!(parsed.company_name, "Beta");
    }

    #[test]
    fn missing_field_is_invalid_argument() {
        let args = ToolArguments::new(json!({}));
        let err = args.deserialize::<Args>().unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument(msg) if msg.contains("companyName")));
    }

    #[test]
    fn get_str_reports_missing_key() {
        let args = ToolArguments::new(json!({ "name": "Acme" }));
        assert_eq!(args.get_str("name").unwrap(), "Acme");
        assert!(args.get_str("csvFile").is_err());
        assert!(args.get_str_opt("csvFile").is_none());
    }
}
