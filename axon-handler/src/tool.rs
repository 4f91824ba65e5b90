//! Direct-tool specs, executors, and the registry.

use std::collections::HashMap;
use std::sync::Arc;

use axon_types::TaskResult;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::BoxFuture;

/// Errors from tool operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ToolError {
    /// The requested tool was not found in the registry.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// The input provided to the tool was invalid.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Tool execution failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Declaration of a direct tool: name, description, and a JSON-Schema-style
/// input schema (`type: "object"`, `properties`, `required`).
///
/// The same spec is handed to the LLM as a tool definition and rendered in
/// dispatcher help output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's input mapping.
    pub input_schema: serde_json::Value,
}

impl ToolSpec {
    /// A spec with an empty object schema.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: serde_json::json!({"type": "object", "properties": {}}),
        }
    }

    /// Replace the input schema.
    #[must_use]
    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.input_schema = schema;
        self
    }
}

/// Object-safe trait for tool implementations.
///
/// Executors receive the evaluated key/value input mapping and must return
/// a [`TaskResult`] envelope. Returning `Ok` with a FAILED result reports a
/// tool-level failure the workflow can branch on; returning `Err` reports
/// an execution fault that surfaces as an evaluator error.
pub trait ToolExecutor: Send + Sync {
    /// Execute the tool with the given input mapping.
    fn execute(
        &self,
        input: serde_json::Map<String, serde_json::Value>,
    ) -> BoxFuture<'_, Result<TaskResult, ToolError>>;
}

/// Adapter turning a plain function into a [`ToolExecutor`].
pub struct FnTool<F>(
    /// The wrapped function.
    pub F,
);

impl<F> ToolExecutor for FnTool<F>
where
    F: Fn(serde_json::Map<String, serde_json::Value>) -> Result<TaskResult, ToolError>
        + Send
        + Sync,
{
    fn execute(
        &self,
        input: serde_json::Map<String, serde_json::Value>,
    ) -> BoxFuture<'_, Result<TaskResult, ToolError>> {
        let result = (self.0)(input);
        Box::pin(async move { result })
    }
}

/// A registered tool: its spec paired with its executor.
#[derive(Clone)]
struct RegisteredTool {
    spec: ToolSpec,
    executor: Arc<dyn ToolExecutor>,
}

/// Registry of direct tools, keyed by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Overwrites any existing tool with the same name.
    pub fn register(&mut self, spec: ToolSpec, executor: Arc<dyn ToolExecutor>) {
        if self.tools.contains_key(&spec.name) {
            warn!(tool = %spec.name, "overwriting existing tool registration");
        }
        self.tools
            .insert(spec.name.clone(), RegisteredTool { spec, executor });
    }

    /// Whether a tool with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// The spec for a registered tool.
    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name).map(|t| &t.spec)
    }

    /// The executor for a registered tool.
    pub fn executor(&self, name: &str) -> Option<Arc<dyn ToolExecutor>> {
        self.tools.get(name).map(|t| Arc::clone(&t.executor))
    }

    /// All registered specs (LLM tool definitions).
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.spec.clone()).collect()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
