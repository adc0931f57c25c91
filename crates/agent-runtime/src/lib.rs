//! # agent-runtime
//!
//! Runtime providers for the chat agent service.
//!
//! ## Providers
//!
//! - **Ollama** (default): Local LLM inference via Ollama
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::OllamaProvider;
//!
//! let provider = OllamaProvider::from_env()?;
//! let healthy = provider.health_check().await?;
//! ```

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};

// Re-export core types for convenience
pub use agent_core::{
    Agent, AgentError, AgentReply, ChatAgent, LlmProvider, Message, Result, Role, Tool,
    ToolRegistry,
};
