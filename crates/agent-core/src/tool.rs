//! Tool System
//!
//! Extensible tool framework for agent capabilities.
//! Tools are registered at startup and invoked with structured parameters.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentError, Result};

/// Tool invocation with structured parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier
    pub name: String,

    /// Arguments as key-value pairs
    pub arguments: HashMap<String, serde_json::Value>,

    /// Optional call ID for tracking
    #[serde(default)]
    pub id: Option<String>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: HashMap::new(),
            id: None,
        }
    }

    /// Add an argument; `null` values are skipped
    #[must_use]
    pub fn arg(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        if !value.is_null() {
            self.arguments.insert(key.into(), value);
        }
        self
    }

    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }

    /// Numeric argument; numeric strings are accepted
    pub fn f64_arg(&self, key: &str) -> Option<f64> {
        match self.arguments.get(key)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Arguments rendered as a compact JSON object
    pub fn arguments_json(&self) -> String {
        let ordered: std::collections::BTreeMap<_, _> = self.arguments.iter().collect();
        serde_json::to_string(&ordered).unwrap_or_default()
    }
}

/// Raw output of a tool invocation
///
/// `success = true` with empty `items` is a valid "no results" answer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool that was called
    pub name: String,

    /// Whether execution succeeded
    pub success: bool,

    /// Result items
    #[serde(default)]
    pub items: Vec<serde_json::Value>,

    /// Human-readable message (summary, or the failure reason)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ToolResult {
    pub fn found(name: impl Into<String>, items: Vec<serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            success: true,
            items,
            message: None,
        }
    }

    pub fn no_results(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: true,
            items: Vec::new(),
            message: Some(message.into()),
        }
    }

    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: false,
            items: Vec::new(),
            message: Some(error.into()),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, boolean, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<serde_json::Value>>,
}

impl ParameterSchema {
    pub fn new(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: false,
            enum_values: None,
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.enum_values = Some(values.iter().map(|v| serde_json::json!(v)).collect());
        self
    }

    fn check(&self, value: &serde_json::Value) -> Result<()> {
        let type_ok = match self.param_type.as_str() {
            "string" => value.is_string(),
            "number" => {
                value.is_number()
                    || value.as_str().is_some_and(|s| s.trim().parse::<f64>().is_ok())
            }
            "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            _ => true,
        };
        if !type_ok {
            return Err(AgentError::ToolValidation(format!(
                "Parameter '{}' must be of type {}",
                self.name, self.param_type
            )));
        }

        if let Some(allowed) = &self.enum_values {
            if !allowed.contains(value) {
                return Err(AgentError::ToolValidation(format!(
                    "Parameter '{}' has unsupported value {}",
                    self.name, value
                )));
            }
        }

        Ok(())
    }
}

/// Tool definition schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with given arguments
    ///
    /// `Err(ToolValidation)` means invalid parameters, `Err(ToolExecution)`
    /// a backend failure.
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult>;

    /// Validate arguments before execution
    fn validate(&self, call: &ToolCall) -> Result<()> {
        let schema = self.schema();

        for param in &schema.parameters {
            match call.arguments.get(&param.name) {
                Some(value) => param.check(value)?,
                None if param.required => {
                    return Err(AgentError::ToolValidation(format!(
                        "Missing required parameter: {}",
                        param.name
                    )));
                }
                None => {}
            }
        }

        Ok(())
    }
}

/// Registry for available tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let schema = tool.schema();
        self.tools.insert(schema.name, Arc::new(tool));
    }

    /// Register a shared tool
    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) {
        let schema = tool.schema();
        self.tools.insert(schema.name, tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Execute a tool call
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let tool = self.get(&call.name).ok_or_else(|| {
            AgentError::ToolNotFound(call.name.clone())
        })?;

        tool.validate(call)?;

        tool.execute(call).await
    }

    /// Get tool names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "echo".into(),
                description: "Echo the text back".into(),
                parameters: vec![
                    ParameterSchema::new("text", "string", "Text to echo").required(),
                    ParameterSchema::new("limit", "number", "Max items"),
                    ParameterSchema::new("mode", "string", "Echo mode").one_of(&["plain", "loud"]),
                ],
            }
        }

        async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
            let text = call.str_arg("text").unwrap_or_default();
            if text.is_empty() {
                return Ok(ToolResult::no_results("echo", "nothing to echo"));
            }
            Ok(ToolResult::found("echo", vec![serde_json::json!(text)]))
        }
    }

    #[tokio::test]
    async fn test_registry_executes_valid_call() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);

        let call = ToolCall::new("echo").arg("text", serde_json::json!("laptop"));
        let result = registry.execute(&call).await.unwrap();
        assert!(result.success);
        assert_eq!(result.items.len(), 1);
    }

    #[tokio::test]
    async fn test_registry_rejects_missing_and_invalid_params() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);

        let missing = registry.execute(&ToolCall::new("echo")).await;
        assert!(matches!(missing, Err(AgentError::ToolValidation(_))));

        let bad_number = ToolCall::new("echo")
            .arg("text", serde_json::json!("x"))
            .arg("limit", serde_json::json!("many"));
        assert!(matches!(registry.execute(&bad_number).await, Err(AgentError::ToolValidation(_))));

        let bad_enum = ToolCall::new("echo")
            .arg("text", serde_json::json!("x"))
            .arg("mode", serde_json::json!("whisper"));
        assert!(matches!(registry.execute(&bad_enum).await, Err(AgentError::ToolValidation(_))));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::new();
        let result = registry.execute(&ToolCall::new("missing")).await;
        assert!(matches!(result, Err(AgentError::ToolNotFound(_))));
    }

    #[test]
    fn test_call_helpers() {
        let call = ToolCall::new("search")
            .arg("price_max", serde_json::json!("20000000"))
            .arg("brand", serde_json::Value::Null);
        assert_eq!(call.f64_arg("price_max"), Some(20_000_000.0));
        assert!(!call.arguments.contains_key("brand"));
        assert_eq!(call.arguments_json(), r#"{"price_max":"20000000"}"#);
    }
}
