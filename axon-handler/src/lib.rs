#![deny(missing_docs)]
//! The host side of axon: the LLM provider seam, the direct-tool registry,
//! safe command execution, and file access.
//!
//! The [`Handler`] owns a [`Provider`] and a [`ToolRegistry`] and exposes
//! the two operations the rest of the system consumes: `execute_llm_call`
//! for atomic tasks and `execute_tool` for direct tools. Built-in tools
//! (`execute_command`, `list_files`) are registered through
//! [`Handler::register_builtin_tools`].

mod builtin;
mod command;
mod files;
mod handler;
mod provider;
mod tool;

pub use builtin::{CommandTool, ListFilesTool};
pub use command::{CommandOutcome, CommandPolicy, execute_command_safely, parse_file_paths_from_output};
pub use files::{FileAccessConfig, FileAccessManager, FileError};
pub use handler::{Handler, HandlerConfig, HandlerError};
pub use provider::{LlmRequest, LlmResponse, Provider, ProviderError, ScriptedProvider};
pub use tool::{FnTool, ToolError, ToolExecutor, ToolRegistry, ToolSpec};

/// Boxed future type used by the object-safe traits in this crate.
pub type BoxFuture<'a, T> = futures_util::future::BoxFuture<'a, T>;
