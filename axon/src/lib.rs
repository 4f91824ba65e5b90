#![deny(missing_docs)]
//! # axon — umbrella crate
//!
//! An orchestration runtime for LLM-mediated workflows. Programs are
//! S-expressions composing dynamically defined atomic tasks (prompt
//! templates executed by an LLM), direct host tools, and control flow
//! including first-class closures and two plan/execute/validate/control
//! loop constructs.
//!
//! Re-exports the workspace crates and provides the [`Runtime`] wiring and
//! the programmatic [`dispatch`] entry point, plus a `prelude` for the
//! happy path.

pub use axon_eval;
pub use axon_handler;
pub use axon_memory;
pub use axon_sexp;
pub use axon_task;
pub use axon_types;

mod dispatch;
mod runtime;

pub use dispatch::{DispatchFlags, execute_programmatic_task};
pub use runtime::Runtime;

/// Happy-path imports for composing axon runtimes.
pub mod prelude {
    pub use crate::dispatch::{DispatchFlags, execute_programmatic_task};
    pub use crate::runtime::Runtime;

    pub use axon_eval::{Env, EvalError, SexpEvaluator, Value};
    pub use axon_handler::{
        CommandPolicy, FnTool, Handler, LlmRequest, LlmResponse, Provider, ProviderError,
        ScriptedProvider, ToolError, ToolExecutor, ToolSpec,
    };
    pub use axon_memory::{AssociativeMatchResult, ContextGenerationInput, MemorySystem};
    pub use axon_sexp::{Node, ParseError, parse};
    pub use axon_task::{TaskSystem, TemplateRegistry};
    pub use axon_types::{
        ParamSpec, SubtaskRequest, TaskError, TaskFailureReason, TaskResult, TaskStatus,
        TaskTemplate,
    };
}
