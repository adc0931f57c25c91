//! Ollama LLM Provider
//!
//! Implementation of `LlmProvider` for local Ollama inference.

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{Completion, GenerationOptions, LlmProvider, ModelInfo, TokenUsage},
};
use async_trait::async_trait;
use ollama_rs::{
    Ollama,
    generation::chat::{ChatMessage, ChatMessageResponse, MessageRole, request::ChatMessageRequest},
    models::ModelOptions,
};

/// Ollama provider configuration
///
/// The server URL is infrastructure-local and deliberately resolved
/// from `OLLAMA_HOST` rather than application settings.
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Ollama server URL, including port
    pub url: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".into(),
        }
    }
}

impl OllamaConfig {
    pub fn from_env() -> Self {
        let url = std::env::var("OLLAMA_HOST")
            .unwrap_or_else(|_| "http://localhost:11434".into());

        Self { url }
    }
}

/// Ollama LLM provider
pub struct OllamaProvider {
    client: Ollama,
}

impl OllamaProvider {
    /// Create from configuration
    pub fn from_config(config: &OllamaConfig) -> Result<Self> {
        let client = Ollama::try_new(config.url.as_str())
            .map_err(|e| AgentError::Config(format!("Invalid OLLAMA_HOST '{}': {}", config.url, e)))?;

        Ok(Self { client })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(&OllamaConfig::from_env())
    }

    /// Create with default localhost settings
    pub fn localhost() -> Result<Self> {
        Self::from_config(&OllamaConfig::default())
    }

    /// Convert agent messages to Ollama format
    fn convert_messages(messages: &[Message]) -> Vec<ChatMessage> {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => MessageRole::System,
                    Role::User => MessageRole::User,
                    Role::Assistant => MessageRole::Assistant,
                    Role::Tool => MessageRole::User, // Tools appear as user context
                };
                ChatMessage::new(role, m.content.clone())
            })
            .collect()
    }

    /// Convert Ollama response to agent completion
    fn convert_completion(response: ChatMessageResponse, model: &str) -> Completion {
        Completion {
            content: response.message.content,
            model: model.to_string(),
            usage: response.final_data.as_ref().map(|d| TokenUsage {
                prompt_tokens: d.prompt_eval_count as u32,
                completion_tokens: d.eval_count as u32,
                total_tokens: (d.prompt_eval_count + d.eval_count) as u32,
            }),
        }
    }

    /// Build Ollama generation options
    fn build_options(opts: &GenerationOptions) -> ModelOptions {
        ModelOptions::default()
            .temperature(opts.temperature)
            .num_predict(opts.max_tokens as i32)
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn health_check(&self) -> Result<bool> {
        match self.client.list_local_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Ollama health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let ollama_messages = Self::convert_messages(messages);
        let ollama_options = Self::build_options(options);

        let request = ChatMessageRequest::new(options.model.clone(), ollama_messages)
            .options(ollama_options);

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| AgentError::Provider(e.to_string()))?;

        Ok(Self::convert_completion(response, &options.model))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let models = self
            .client
            .list_local_models()
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;

        Ok(models
            .into_iter()
            .map(|m| ModelInfo {
                id: m.name.clone(),
                name: m.name,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = OllamaConfig::default();
        assert_eq!(config.url, "http://localhost:11434");
    }

    #[test]
    fn test_provider_rejects_bad_url() {
        let config = OllamaConfig {
            url: "not a url".into(),
        };
        assert!(OllamaProvider::from_config(&config).is_err());
    }

    #[test]
    fn test_build_options_from_generation_options() {
        let opts = GenerationOptions {
            model: "llama3".into(),
            temperature: 0.2,
            max_tokens: 1024,
        };

        // Pins the ModelOptions builder surface we rely on
        let built = OllamaProvider::build_options(&opts);
        let json = serde_json::to_value(&built).unwrap();
        assert!((json["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
        assert_eq!(json["num_predict"], serde_json::json!(1024));
    }

    #[test]
    fn test_message_conversion() {
        let messages = vec![Message::system("You are helpful."), Message::user("Hello")];

        let converted = OllamaProvider::convert_messages(&messages);
        assert_eq!(converted.len(), 2);
    }
}
