//! Agent Bootstrap
//!
//! The factory that assembles the chat agent from settings, the
//! process-lifetime cell that constructs it exactly once, and the
//! orchestrator the HTTP handlers call.

use std::sync::Arc;

use tokio::sync::OnceCell;

use agent_core::{
    Agent, AgentConfig, AgentReply, CalculatorTool, ChatAgent, GenerationOptions,
    Result as AgentResult, ToolRegistry,
};
use agent_runtime::OllamaProvider;

use crate::settings::Settings;

/// Behavior policy for the chat agent
///
/// Any change to agent behavior is a change to this string, not to
/// code logic.
pub const SYSTEM_PROMPT: &str = r#"You are a helpful chat assistant that can both talk naturally and solve math problems.

- When the user asks for any non-trivial calculation (multiplication, division, powers, roots,
  percentages, etc.), or explicitly asks something like "quanto é", "calculate", "raiz quadrada",
  you MUST use the `calculator` tool instead of doing the math yourself.
- For general knowledge questions that do not require calculations, answer directly without tools.
- Always return a concise answer in the same language as the user."#;

/// Factory signature for agent construction, injectable for tests
pub type AgentFactory =
    Box<dyn Fn(&Settings) -> AgentResult<Arc<dyn ChatAgent>> + Send + Sync>;

/// Build a chat agent from settings
///
/// Pure factory: the backend address comes from `OLLAMA_HOST`, the
/// generation parameters from settings, and the capability set is
/// exactly the calculator tool. Caching is the cell's job.
pub fn build_agent(settings: &Settings) -> AgentResult<Arc<dyn ChatAgent>> {
    let provider = Arc::new(OllamaProvider::from_env()?);

    let mut tools = ToolRegistry::new();
    tools.register(CalculatorTool);

    let config = AgentConfig {
        system_prompt: SYSTEM_PROMPT.into(),
        generation: GenerationOptions {
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        },
        ..Default::default()
    };

    Ok(Arc::new(Agent::new(provider, Arc::new(tools), config)))
}

/// Process-lifetime agent cell
///
/// Lazily constructs the agent on first use and reuses it for every
/// subsequent request. `OnceCell` guarantees at most one factory
/// invocation even under concurrent first access; all callers observe
/// the same handle. There is no invalidation: settings are fixed for
/// the process lifetime.
pub struct AgentCell {
    settings: Settings,
    factory: AgentFactory,
    cell: OnceCell<Arc<dyn ChatAgent>>,
}

impl AgentCell {
    /// Create a cell backed by the real Ollama factory
    pub fn new(settings: Settings) -> Self {
        Self::with_factory(settings, Box::new(build_agent))
    }

    /// Create a cell with an injected factory (used by tests)
    pub fn with_factory(settings: Settings, factory: AgentFactory) -> Self {
        Self {
            settings,
            factory,
            cell: OnceCell::new(),
        }
    }

    /// Get the agent, constructing it on first call
    pub async fn get(&self) -> AgentResult<Arc<dyn ChatAgent>> {
        self.cell
            .get_or_try_init(|| async { (self.factory)(&self.settings) })
            .await
            .cloned()
    }
}

/// Run the agent on a user message and normalize the reply to text
///
/// The agent may perform any number of tool invocations internally;
/// both reply shapes collapse to their answer text here. Failures
/// propagate unmodified - the HTTP layer owns the translation to
/// transport errors.
pub async fn run_agent(agents: &AgentCell, message: &str) -> AgentResult<String> {
    let agent = agents.get().await?;

    match agent.invoke(message).await? {
        AgentReply::Final { text, tool_calls } => {
            tracing::debug!(tool_calls, "Multi-step agent run completed");
            Ok(text)
        }
        AgentReply::Raw(text) => Ok(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::AgentError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedAgent {
        reply: AgentReply,
    }

    #[async_trait]
    impl ChatAgent for FixedAgent {
        async fn invoke(&self, _message: &str) -> AgentResult<AgentReply> {
            Ok(self.reply.clone())
        }
    }

    struct FailingAgent;

    #[async_trait]
    impl ChatAgent for FailingAgent {
        async fn invoke(&self, _message: &str) -> AgentResult<AgentReply> {
            Err(AgentError::Provider("backend unreachable".into()))
        }
    }

    fn test_settings() -> Settings {
        Settings {
            provider: "ollama".into(),
            model: "llama3".into(),
            temperature: 0.2,
            max_tokens: 1024,
            environment: "local".into(),
        }
    }

    fn counting_cell(
        reply: AgentReply,
    ) -> (Arc<AgentCell>, Arc<AtomicUsize>) {
        let constructions = Arc::new(AtomicUsize::new(0));
        let counter = constructions.clone();

        let cell = AgentCell::with_factory(
            test_settings(),
            Box::new(move |_settings| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(FixedAgent {
                    reply: reply.clone(),
                }) as Arc<dyn ChatAgent>)
            }),
        );

        (Arc::new(cell), constructions)
    }

    #[tokio::test]
    async fn test_cell_constructs_exactly_once() {
        let (cell, constructions) = counting_cell(AgentReply::Raw("hi".into()));

        let a = cell.get().await.unwrap();
        let b = cell.get().await.unwrap();
        let c = cell.get().await.unwrap();

        assert_eq!(constructions.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
    }

    #[tokio::test]
    async fn test_cell_constructs_exactly_once_concurrently() {
        let (cell, constructions) = counting_cell(AgentReply::Raw("hi".into()));

        let (a, b, c, d) = tokio::join!(cell.get(), cell.get(), cell.get(), cell.get());
        let (a, b, c, d) = (a.unwrap(), b.unwrap(), c.unwrap(), d.unwrap());

        assert_eq!(constructions.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &c));
        assert!(Arc::ptr_eq(&a, &d));
    }

    #[tokio::test]
    async fn test_run_agent_returns_final_text() {
        let (cell, _) = counting_cell(AgentReply::Final {
            text: "7006652".into(),
            tool_calls: 1,
        });

        let answer = run_agent(&cell, "Quanto é 1234 * 5678?").await.unwrap();
        assert_eq!(answer, "7006652");
    }

    #[tokio::test]
    async fn test_run_agent_returns_raw_text() {
        let (cell, _) = counting_cell(AgentReply::Raw("Einstein was a physicist.".into()));

        let answer = run_agent(&cell, "Quem foi Albert Einstein?").await.unwrap();
        assert_eq!(answer, "Einstein was a physicist.");
    }

    #[tokio::test]
    async fn test_run_agent_propagates_errors() {
        let cell = AgentCell::with_factory(
            test_settings(),
            Box::new(|_settings| Ok(Arc::new(FailingAgent) as Arc<dyn ChatAgent>)),
        );

        let err = run_agent(&cell, "hello").await.unwrap_err();
        assert!(err.to_string().contains("backend unreachable"));
    }

    #[tokio::test]
    async fn test_factory_error_propagates() {
        let cell = AgentCell::with_factory(
            test_settings(),
            Box::new(|_settings| Err(AgentError::Config("no backend".into()))),
        );

        let Err(err) = cell.get().await else {
            panic!("factory error should propagate out of the cell");
        };
        assert!(matches!(err, AgentError::Config(_)));
    }

    #[test]
    fn test_system_prompt_covers_both_languages() {
        assert!(SYSTEM_PROMPT.contains("quanto é"));
        assert!(SYSTEM_PROMPT.contains("raiz quadrada"));
        assert!(SYSTEM_PROMPT.contains("calculate"));
        assert!(SYSTEM_PROMPT.contains("`calculator`"));
    }
}
