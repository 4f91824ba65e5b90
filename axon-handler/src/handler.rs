//! The handler: provider plus tool registry.

use std::sync::Arc;

use axon_types::TaskResult;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::builtin::{CommandTool, ListFilesTool};
use crate::command::CommandPolicy;
use crate::files::FileAccessManager;
use crate::provider::{LlmRequest, Provider, ProviderError};
use crate::tool::{ToolError, ToolExecutor, ToolRegistry, ToolSpec};

/// Errors from handler-level operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The underlying provider call failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Handler configuration.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Default model passed to the provider when neither the template nor
    /// the request names one.
    pub default_model: Option<String>,
    /// Models the provider can serve; empty means accept any name.
    pub available_models: Vec<String>,
    /// Cap applied to tool result content, in bytes.
    pub max_tool_output_bytes: usize,
    /// Policy applied to shell commands (the built-in tool and
    /// template-declared path-listing commands).
    pub command_policy: CommandPolicy,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            default_model: None,
            available_models: Vec::new(),
            max_tool_output_bytes: 1024 * 1024,
            command_policy: CommandPolicy::default(),
        }
    }
}

/// The execution surface the evaluator and task system talk to: one LLM
/// provider and a registry of direct tools.
pub struct Handler {
    provider: Arc<dyn Provider>,
    tools: RwLock<ToolRegistry>,
    files: FileAccessManager,
    config: HandlerConfig,
}

impl Handler {
    /// A handler over the given provider with default configuration.
    #[must_use]
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self::with_config(provider, HandlerConfig::default())
    }

    /// A handler over the given provider and configuration.
    #[must_use]
    pub fn with_config(provider: Arc<dyn Provider>, config: HandlerConfig) -> Self {
        Self {
            provider,
            tools: RwLock::new(ToolRegistry::new()),
            files: FileAccessManager::new(),
            config,
        }
    }

    /// The file-access manager used by `read-files` and context resolution.
    #[must_use]
    pub fn files(&self) -> &FileAccessManager {
        &self.files
    }

    /// The shell command policy.
    #[must_use]
    pub fn command_policy(&self) -> &CommandPolicy {
        &self.config.command_policy
    }

    /// The models this handler's provider can serve; `None` when any name
    /// is accepted.
    #[must_use]
    pub fn available_models(&self) -> Option<&[String]> {
        if self.config.available_models.is_empty() {
            None
        } else {
            Some(&self.config.available_models)
        }
    }

    /// Register a direct tool, overwriting any existing registration with
    /// the same name.
    pub async fn register_tool(&self, spec: ToolSpec, executor: Arc<dyn ToolExecutor>) {
        info!(tool = %spec.name, "registering direct tool");
        self.tools.write().await.register(spec, executor);
    }

    /// Register the built-in `execute_command` and `list_files` tools,
    /// using the configured command policy.
    pub async fn register_builtin_tools(&self) {
        self.register_tool(
            CommandTool::spec(),
            Arc::new(CommandTool::new(self.config.command_policy.clone())),
        )
        .await;
        self.register_tool(
            ListFilesTool::spec(),
            Arc::new(ListFilesTool::new(self.files.clone())),
        )
        .await;
    }

    /// Whether a direct tool with this name is registered.
    pub async fn has_tool(&self, name: &str) -> bool {
        self.tools.read().await.contains(name)
    }

    /// The spec of a registered tool.
    pub async fn tool_spec(&self, name: &str) -> Option<ToolSpec> {
        self.tools.read().await.spec(name).cloned()
    }

    /// All registered tool specs, for handing to the LLM.
    pub async fn tool_definitions(&self) -> Vec<ToolSpec> {
        self.tools.read().await.definitions()
    }

    /// Execute a direct tool with a key/value input mapping.
    ///
    /// A tool that *reports* failure returns `Ok` with a FAILED
    /// [`TaskResult`]; `Err` means the executor itself faulted.
    pub async fn execute_tool(
        &self,
        name: &str,
        input: serde_json::Map<String, serde_json::Value>,
    ) -> Result<TaskResult, ToolError> {
        let executor = self
            .tools
            .read()
            .await
            .executor(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        debug!(tool = name, "executing direct tool");
        let mut result = executor.execute(input).await?;
        truncate_in_place(&mut result.content, self.config.max_tool_output_bytes);
        Ok(result)
    }

    /// Execute one LLM call with a fully substituted prompt.
    pub async fn execute_llm_call(
        &self,
        prompt: String,
        tools: Vec<ToolSpec>,
        model: Option<String>,
    ) -> Result<TaskResult, HandlerError> {
        let model = model.or_else(|| self.config.default_model.clone());
        debug!(model = model.as_deref().unwrap_or("default"), prompt_len = prompt.len(), "LLM call");
        let response = self
            .provider
            .complete(LlmRequest {
                prompt,
                tools,
                model,
            })
            .await?;
        Ok(TaskResult::complete(response.content))
    }
}

fn truncate_in_place(text: &mut String, max_bytes: usize) {
    if text.len() <= max_bytes {
        return;
    }
    let mut boundary = max_bytes;
    while boundary > 0 && !text.is_char_boundary(boundary) {
        boundary -= 1;
    }
    text.truncate(boundary);
    text.push_str("... [truncated]");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ScriptedProvider;
    use crate::tool::FnTool;
    use serde_json::json;

    fn handler() -> Handler {
        Handler::new(Arc::new(ScriptedProvider::echo()))
    }

    #[tokio::test]
    async fn llm_call_returns_complete_result() {
        let handler = Handler::new(Arc::new(ScriptedProvider::new(["hi world"])));
        let result = handler
            .execute_llm_call("Say hi to world".to_string(), vec![], None)
            .await
            .unwrap();
        assert!(result.is_complete());
        assert_eq!(result.content, "hi world");
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let error = handler()
            .execute_tool("nope", serde_json::Map::new())
            .await
            .unwrap_err();
        assert!(matches!(error, ToolError::NotFound(name) if name == "nope"));
    }

    #[tokio::test]
    async fn registered_tool_executes() {
        let handler = handler();
        handler
            .register_tool(
                ToolSpec::new("ping", "Replies with pong"),
                Arc::new(FnTool(|_| Ok(TaskResult::complete("pong")))),
            )
            .await;
        assert!(handler.has_tool("ping").await);
        let result = handler
            .execute_tool("ping", serde_json::Map::new())
            .await
            .unwrap();
        assert_eq!(result.content, "pong");
    }

    #[tokio::test]
    async fn tool_output_is_truncated() {
        let handler = Handler::with_config(
            Arc::new(ScriptedProvider::echo()),
            HandlerConfig {
                max_tool_output_bytes: 4,
                ..Default::default()
            },
        );
        handler
            .register_tool(
                ToolSpec::new("chatty", "Talks a lot"),
                Arc::new(FnTool(|_| Ok(TaskResult::complete("0123456789")))),
            )
            .await;
        let result = handler
            .execute_tool("chatty", serde_json::Map::new())
            .await
            .unwrap();
        assert!(result.content.starts_with("0123"));
        assert!(result.content.ends_with("[truncated]"));
    }

    #[tokio::test]
    async fn builtin_tools_register() {
        let handler = handler();
        handler.register_builtin_tools().await;
        assert!(handler.has_tool("execute_command").await);
        assert!(handler.has_tool("list_files").await);

        let mut input = serde_json::Map::new();
        input.insert("command".to_string(), json!("echo via-handler"));
        let result = handler.execute_tool("execute_command", input).await.unwrap();
        assert_eq!(result.content.trim(), "via-handler");
    }
}
