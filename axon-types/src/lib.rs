#![deny(missing_docs)]
//! Core types shared across the axon workspace.
//!
//! Defines the universal [`TaskResult`] envelope returned by atomic tasks and
//! direct tools, the [`SubtaskRequest`] that drives atomic task execution,
//! the [`TaskTemplate`] record stored in the template registry, and the
//! structured [`TaskError`] payload with its [`TaskFailureReason`] taxonomy.

mod error;
mod task;
mod template;

pub use error::{TaskError, TaskFailureReason};
pub use task::{
    ContextManagement, ContextOverrides, ContextSource, FreshContext, InheritContext,
    SubtaskRequest, TaskResult, TaskStatus,
};
pub use template::{
    FilePathSource, HistoryConfig, ModelPreference, OutputFormat, OutputKind, ParamSpec,
    TaskTemplate,
};
