//! Runtime wiring: one value owning every collaborator.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axon_eval::{Env, EvalError, SexpEvaluator, Value};
use axon_handler::{Handler, HandlerConfig, Provider};
use axon_memory::{MemoryConfig, MemorySystem};
use axon_task::TaskSystem;

/// A fully wired axon runtime.
///
/// Owns the memory system, handler, task system, and evaluator. There are
/// no process-wide registries: every runtime is standalone, so tests can
/// construct one over a scripted provider.
pub struct Runtime {
    memory: Arc<MemorySystem>,
    handler: Arc<Handler>,
    tasks: Arc<TaskSystem>,
    evaluator: SexpEvaluator,
    request_counter: AtomicU64,
}

impl Runtime {
    /// A runtime over the given provider with default configuration.
    #[must_use]
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self::with_config(provider, HandlerConfig::default(), MemoryConfig::default())
    }

    /// A runtime with explicit handler and memory configuration.
    #[must_use]
    pub fn with_config(
        provider: Arc<dyn Provider>,
        handler_config: HandlerConfig,
        memory_config: MemoryConfig,
    ) -> Self {
        let memory = Arc::new(MemorySystem::with_config(memory_config));
        let handler = Arc::new(Handler::with_config(provider, handler_config));
        let tasks = Arc::new(TaskSystem::new(Arc::clone(&memory), Arc::clone(&handler)));
        let evaluator =
            SexpEvaluator::new(Arc::clone(&tasks), Arc::clone(&handler), Arc::clone(&memory));
        Self {
            memory,
            handler,
            tasks,
            evaluator,
            request_counter: AtomicU64::new(0),
        }
    }

    /// Register the built-in `execute_command` and `list_files` tools,
    /// governed by the handler's command policy.
    pub async fn install_builtin_tools(&self) {
        self.handler.register_builtin_tools().await;
    }

    /// The memory system (metadata index).
    #[must_use]
    pub fn memory(&self) -> &Arc<MemorySystem> {
        &self.memory
    }

    /// The handler (provider and tool registry).
    #[must_use]
    pub fn handler(&self) -> &Arc<Handler> {
        &self.handler
    }

    /// The task system (template registry and executor).
    #[must_use]
    pub fn tasks(&self) -> &Arc<TaskSystem> {
        &self.tasks
    }

    /// The S-expression evaluator.
    #[must_use]
    pub fn evaluator(&self) -> &SexpEvaluator {
        &self.evaluator
    }

    /// Evaluate one S-expression program in a fresh root environment.
    pub async fn evaluate(&self, source: &str) -> Result<Value, EvalError> {
        self.evaluator.evaluate_str(source, &Env::root()).await
    }

    /// Evaluate one S-expression program in an existing environment.
    pub async fn evaluate_in(&self, source: &str, env: &Env) -> Result<Value, EvalError> {
        self.evaluator.evaluate_str(source, env).await
    }

    /// A fresh request id for dispatcher-initiated executions.
    pub(crate) fn next_request_id(&self, identifier: &str) -> String {
        let n = self.request_counter.fetch_add(1, Ordering::Relaxed);
        format!("dispatch_{identifier}_{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_handler::ScriptedProvider;

    #[tokio::test]
    async fn runtime_is_standalone() {
        let runtime = Runtime::new(Arc::new(ScriptedProvider::echo()));
        let value = runtime.evaluate("(+ 1 2)").await.unwrap();
        assert_eq!(value, Value::Int(3));
    }

    #[tokio::test]
    async fn environments_persist_across_calls_when_shared() {
        let runtime = Runtime::new(Arc::new(ScriptedProvider::echo()));
        let env = Env::root();
        runtime.evaluate_in("(bind x 41)", &env).await.unwrap();
        assert_eq!(
            runtime.evaluate_in("(+ x 1)", &env).await.unwrap(),
            Value::Int(42)
        );
    }

    #[tokio::test]
    async fn builtin_tools_install() {
        let runtime = Runtime::new(Arc::new(ScriptedProvider::echo()));
        runtime.install_builtin_tools().await;
        assert!(runtime.handler().has_tool("execute_command").await);
    }
}
