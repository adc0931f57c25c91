//! # agent-core
//!
//! Core agent logic with provider-agnostic LLM abstraction and an
//! extensible tool system.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Agent                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │  Reasoning  │  │    Tools    │  │   LlmProvider       │  │
//! │  │    Loop     │──│   Registry  │──│   (Strategy)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Service code depends only on the [`ChatAgent`] trait: one message
//! in, one [`AgentReply`] out. The `LlmProvider` trait enables swapping
//! between Ollama and other backends without changing agent logic.

pub mod agent;
pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

pub use agent::{Agent, AgentConfig, AgentReply, ChatAgent};
pub use error::{AgentError, Result};
pub use message::{Conversation, Message, Role};
pub use provider::{Completion, GenerationOptions, LlmProvider};
pub use tool::{CalculatorTool, Tool, ToolCall, ToolRegistry, ToolResult};
