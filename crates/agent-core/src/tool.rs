//! Tool System
//!
//! Extensible tool framework for agent capabilities.
//! Tools are registered at runtime and invoked by the reasoning loop.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// Tool call request from the LLM
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier
    #[serde(rename = "tool")]
    pub name: String,

    /// Arguments as key-value pairs
    pub arguments: HashMap<String, serde_json::Value>,

    /// Optional call ID for tracking
    #[serde(default)]
    pub id: Option<String>,
}

/// Result from tool execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool that was called
    pub name: String,

    /// Call ID (if provided in request)
    pub id: Option<String>,

    /// Whether execution succeeded
    pub success: bool,

    /// Output (success message or error)
    pub output: String,
}

impl ToolResult {
    pub fn success(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            success: true,
            output: output.into(),
        }
    }

    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            success: false,
            output: error.into(),
        }
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,
}

/// Tool definition schema (for LLM function calling)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema for LLM function calling
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with given arguments
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult>;

    /// Validate arguments before execution (optional)
    fn validate(&self, call: &ToolCall) -> Result<()> {
        let schema = self.schema();

        for param in &schema.parameters {
            if param.required && !call.arguments.contains_key(&param.name) {
                return Err(AgentError::ToolValidation(format!(
                    "Missing required parameter: {}",
                    param.name
                )));
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
        self.tools.insert(schema.name.clone(), Arc::new(tool));
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Execute a tool call
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        // Validate first
        tool.validate(call)?;

        // Execute
        tool.execute(call).await
    }

    /// Get all tool schemas (for system prompt generation)
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Generate system prompt section describing available tools
    pub fn generate_prompt_section(&self) -> String {
        let mut prompt = String::from("## Available Tools\n\n");
        prompt.push_str("You can use the following tools by responding with a JSON block:\n\n");
        prompt.push_str("```tool\n{\"tool\": \"tool_name\", \"arguments\": {\"arg\": \"value\"}}\n```\n\n");

        for schema in self.schemas() {
            prompt.push_str(&format!("### {}\n", schema.name));
            prompt.push_str(&format!("{}\n", schema.description));

            if !schema.parameters.is_empty() {
                prompt.push_str("**Parameters:**\n");
                for param in &schema.parameters {
                    let required = if param.required { " (required)" } else { "" };
                    prompt.push_str(&format!(
                        "- `{}` ({}){}: {}\n",
                        param.name, param.param_type, required, param.description
                    ));
                }
            }
            prompt.push('\n');
        }

        prompt
    }
}

// ============================================================================
// Built-in Tools
// ============================================================================

/// Calculator tool - evaluates mathematical expressions via `meval`
///
/// Evaluation is delegated entirely to the expression crate; this tool
/// only adapts arguments and formats the result for the conversation.
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "calculator".into(),
            description: "Evaluate a mathematical expression exactly".into(),
            parameters: vec![ParameterSchema {
                name: "expression".into(),
                param_type: "string".into(),
                description: "Expression to evaluate (e.g., '1234 * 5678', 'sqrt(144)')".into(),
                required: true,
            }],
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let expr = call
            .arguments
            .get("expression")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AgentError::ToolValidation("Missing expression".into()))?;

        match meval::eval_str(expr) {
            Ok(value) => Ok(ToolResult::success(
                "calculator",
                format!("{} = {}", expr, value),
            )),
            Err(e) => Ok(ToolResult::failure("calculator", e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(expr: &str) -> ToolCall {
        ToolCall {
            name: "calculator".into(),
            arguments: HashMap::from([("expression".into(), json!(expr))]),
            id: None,
        }
    }

    #[tokio::test]
    async fn test_calculator() {
        let result = CalculatorTool.execute(&call("1234 * 5678")).await.unwrap();
        assert!(result.success);
        assert!(result.output.contains("7006652"));

        let result = CalculatorTool.execute(&call("sqrt(144)")).await.unwrap();
        assert!(result.success);
        assert!(result.output.contains("12"));
    }

    #[tokio::test]
    async fn test_calculator_bad_expression() {
        let result = CalculatorTool.execute(&call("1 +* 2")).await.unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_calculator_missing_argument() {
        let call = ToolCall {
            name: "calculator".into(),
            arguments: HashMap::new(),
            id: None,
        };
        assert!(CalculatorTool.validate(&call).is_err());
    }

    #[test]
    fn test_tool_registry() {
        let mut registry = ToolRegistry::new();
        registry.register(CalculatorTool);

        assert_eq!(registry.len(), 1);
        assert!(registry.get("calculator").is_some());
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_prompt_section_lists_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(CalculatorTool);

        let prompt = registry.generate_prompt_section();
        assert!(prompt.contains("### calculator"));
        assert!(prompt.contains("`expression`"));
    }
}
