//! Agent Runtime
//!
//! Bounded reason/act loop over an `LlmProvider` and a `ToolRegistry`.
//! The agent observes, thinks, acts (via tools), and responds. Callers
//! interact through the narrow [`ChatAgent`] interface and never see
//! how many tool invocations a run performed.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message};
use crate::provider::{GenerationOptions, LlmProvider};
use crate::tool::{ToolCall, ToolRegistry, ToolResult};

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// System prompt template
    pub system_prompt: String,

    /// Maximum reasoning iterations before giving up
    pub max_iterations: usize,

    /// Generation options
    pub generation: GenerationOptions,

    /// Whether to append tool descriptions to system prompt
    pub inject_tool_descriptions: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_iterations: 10,
            generation: GenerationOptions::default(),
            inject_tool_descriptions: true,
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a helpful AI assistant.

When you need to use a tool, respond with a JSON block in this exact format:
```tool
{"tool": "tool_name", "arguments": {"arg1": "value1"}}
```

After receiving tool results, synthesize them into a helpful response.
If you can answer directly without tools, do so.
Be concise and accurate."#;

/// Outcome of a single agent run
///
/// Multi-step runs (where at least one tool executed) surface their
/// answer as a distinguished final response; single-shot completions
/// surface the raw model output. Callers pattern-match instead of
/// probing the result shape at runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AgentReply {
    /// Final answer distilled from a multi-step tool run
    Final {
        text: String,
        /// Number of tool invocations performed during the run
        tool_calls: usize,
    },

    /// Direct completion with no tool activity
    Raw(String),
}

impl AgentReply {
    /// Consume the reply, yielding the answer text of either variant
    pub fn into_text(self) -> String {
        match self {
            AgentReply::Final { text, .. } => text,
            AgentReply::Raw(text) => text,
        }
    }
}

/// Narrow interface the service layer depends on
///
/// One message in, one reply out. Implementations may run arbitrary
/// tool orchestration internally; mocks implement this directly.
#[async_trait]
pub trait ChatAgent: Send + Sync {
    async fn invoke(&self, message: &str) -> Result<AgentReply>;
}

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    /// Create with default configuration
    pub fn with_defaults(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self::new(provider, tools, AgentConfig::default())
    }

    /// Build the full system prompt including tool descriptions
    fn build_system_prompt(&self) -> String {
        let mut prompt = self.config.system_prompt.clone();

        if self.config.inject_tool_descriptions && !self.tools.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&self.tools.generate_prompt_section());
        }

        prompt
    }

    /// Run the agent on a conversation, returning the answer and the
    /// number of tool invocations performed
    async fn run(&self, conversation: &mut Conversation) -> Result<(String, usize)> {
        let mut iterations = 0;
        let mut tool_calls = 0;

        loop {
            iterations += 1;

            if iterations > self.config.max_iterations {
                return Err(AgentError::MaxIterations(self.config.max_iterations));
            }

            // Get completion from provider
            let completion = self
                .provider
                .complete(conversation.messages(), &self.config.generation)
                .await?;

            let content = completion.content.clone();

            // Add assistant response to conversation
            conversation.push(Message::assistant(&content));

            // Check for tool calls
            if let Some(tool_call) = self.parse_tool_call(&content) {
                tracing::debug!(tool = %tool_call.name, "Executing tool");
                tool_calls += 1;

                // Execute the tool
                let result = self.execute_tool(&tool_call).await;

                // Add tool result to conversation
                conversation.push(Message::tool(self.format_tool_result(&result)));

                // Continue reasoning loop
                continue;
            }

            // No tool call - this is the final response
            return Ok((content, tool_calls));
        }
    }

    /// Parse a tool call from LLM response
    fn parse_tool_call(&self, content: &str) -> Option<ToolCall> {
        // Look for ```tool ... ``` blocks
        let tool_start = "```tool";
        let tool_end = "```";

        if let Some(start_idx) = content.find(tool_start) {
            let after_marker = &content[start_idx + tool_start.len()..];
            if let Some(end_idx) = after_marker.find(tool_end) {
                let json_str = after_marker[..end_idx].trim();

                // Try to parse as ToolCall
                if let Ok(mut call) = serde_json::from_str::<ToolCall>(json_str) {
                    // Generate call ID if not present
                    if call.id.is_none() {
                        call.id = Some(uuid::Uuid::new_v4().to_string());
                    }
                    return Some(call);
                }
            }
        }

        // Fallback: try to find raw JSON with "tool" key
        self.parse_inline_tool_call(content)
    }

    /// Try to parse inline JSON tool call
    fn parse_inline_tool_call(&self, content: &str) -> Option<ToolCall> {
        // Look for JSON object with "tool" field
        if !content.contains(r#""tool""#) {
            return None;
        }

        // Find JSON boundaries
        let start = content.find('{')?;
        let end = content.rfind('}')?;

        if end <= start {
            return None;
        }

        let json_str = &content[start..=end];
        serde_json::from_str::<ToolCall>(json_str).ok()
    }

    /// Execute a tool call
    async fn execute_tool(&self, call: &ToolCall) -> ToolResult {
        match self.tools.execute(call).await {
            Ok(mut result) => {
                result.id = call.id.clone();
                result
            }
            Err(e) => ToolResult {
                name: call.name.clone(),
                id: call.id.clone(),
                success: false,
                output: format!("Error: {}", e),
            },
        }
    }

    /// Format tool result for conversation
    fn format_tool_result(&self, result: &ToolResult) -> String {
        if result.success {
            format!("[Tool '{}' returned]\n{}", result.name, result.output)
        } else {
            format!("[Tool '{}' failed]\n{}", result.name, result.output)
        }
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

#[async_trait]
impl ChatAgent for Agent {
    async fn invoke(&self, message: &str) -> Result<AgentReply> {
        let mut conversation = Conversation::with_system_prompt(self.build_system_prompt());
        conversation.push(Message::user(message));

        let (text, tool_calls) = self.run(&mut conversation).await?;

        if tool_calls > 0 {
            Ok(AgentReply::Final { text, tool_calls })
        } else {
            Ok(AgentReply::Raw(text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Completion, GenerationOptions, ModelInfo};
    use crate::tool::CalculatorTool;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider that replays a fixed script of completions
    struct ScriptedProvider {
        script: Vec<String>,
        cursor: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(script: &[&str]) -> Self {
            Self {
                script: script.iter().map(|s| (*s).to_string()).collect(),
                cursor: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        async fn complete(
            &self,
            _messages: &[Message],
            options: &GenerationOptions,
        ) -> Result<Completion> {
            let idx = self.cursor.fetch_add(1, Ordering::SeqCst);
            let content = self
                .script
                .get(idx)
                .cloned()
                .ok_or_else(|| AgentError::Provider("script exhausted".into()))?;

            Ok(Completion {
                content,
                model: options.model.clone(),
                usage: None,
            })
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(Vec::new())
        }
    }

    fn agent_with_script(script: &[&str]) -> Agent {
        let mut tools = ToolRegistry::new();
        tools.register(CalculatorTool);
        Agent::with_defaults(Arc::new(ScriptedProvider::new(script)), Arc::new(tools))
    }

    #[tokio::test]
    async fn test_direct_answer_is_raw() {
        let agent = agent_with_script(&["Albert Einstein was a physicist."]);

        let reply = agent.invoke("Quem foi Albert Einstein?").await.unwrap();
        assert_eq!(reply, AgentReply::Raw("Albert Einstein was a physicist.".into()));
    }

    #[tokio::test]
    async fn test_tool_run_is_final() {
        let agent = agent_with_script(&[
            "```tool\n{\"tool\": \"calculator\", \"arguments\": {\"expression\": \"1234 * 5678\"}}\n```",
            "7006652",
        ]);

        let reply = agent.invoke("Quanto é 1234 * 5678?").await.unwrap();
        match reply {
            AgentReply::Final { text, tool_calls } => {
                assert_eq!(text, "7006652");
                assert_eq!(tool_calls, 1);
            }
            AgentReply::Raw(_) => panic!("expected a final answer from a tool run"),
        }
    }

    #[tokio::test]
    async fn test_max_iterations() {
        // Provider keeps asking for the same tool forever
        let script: Vec<&str> =
            vec!["```tool\n{\"tool\": \"calculator\", \"arguments\": {\"expression\": \"1\"}}\n```"; 20];
        let agent = agent_with_script(&script);

        let err = agent.invoke("loop").await.unwrap_err();
        assert!(matches!(err, AgentError::MaxIterations(_)));
    }

    #[test]
    fn test_parse_tool_call_block() {
        let agent = agent_with_script(&[]);
        let content = "Let me check.\n```tool\n{\"tool\": \"calculator\", \"arguments\": {\"expression\": \"2 + 2\"}}\n```";

        let call = agent.parse_tool_call(content).expect("tool call parsed");
        assert_eq!(call.name, "calculator");
        assert!(call.id.is_some());
    }

    #[test]
    fn test_parse_inline_tool_call() {
        let agent = agent_with_script(&[]);
        let content = r#"{"tool": "calculator", "arguments": {"expression": "2 + 2"}}"#;

        let call = agent.parse_tool_call(content).expect("tool call parsed");
        assert_eq!(call.name, "calculator");
    }

    #[test]
    fn test_plain_text_is_not_a_tool_call() {
        let agent = agent_with_script(&[]);
        assert!(agent.parse_tool_call("The answer is 4.").is_none());
    }
}
