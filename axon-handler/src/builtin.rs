//! Built-in direct tools.

use axon_types::{TaskError, TaskResult};
use serde_json::json;

use crate::BoxFuture;
use crate::command::{CommandPolicy, execute_command_safely};
use crate::files::FileAccessManager;
use crate::tool::{ToolError, ToolExecutor, ToolSpec};

fn input_str<'a>(
    input: &'a serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Option<&'a str> {
    input.get(key).and_then(serde_json::Value::as_str)
}

/// The `execute_command` tool: safe argv execution under a
/// [`CommandPolicy`].
pub struct CommandTool {
    policy: CommandPolicy,
}

impl CommandTool {
    /// A command tool with the given policy.
    #[must_use]
    pub fn new(policy: CommandPolicy) -> Self {
        Self { policy }
    }

    /// The tool spec advertised to the model and the dispatcher.
    #[must_use]
    pub fn spec() -> ToolSpec {
        ToolSpec::new(
            "execute_command",
            "Execute a shell command safely and return its output",
        )
        .with_schema(json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "Command to execute"},
                "cwd": {"type": "string", "description": "Working directory"},
                "timeout": {"type": "integer", "description": "Timeout in seconds"}
            },
            "required": ["command"]
        }))
    }
}

impl ToolExecutor for CommandTool {
    fn execute(
        &self,
        input: serde_json::Map<String, serde_json::Value>,
    ) -> BoxFuture<'_, Result<TaskResult, ToolError>> {
        Box::pin(async move {
            let Some(command) = input_str(&input, "command") else {
                return Ok(TaskResult::from_error(TaskError::input_validation(
                    "execute_command requires a 'command' string",
                )));
            };
            let cwd = input_str(&input, "cwd").map(std::path::PathBuf::from);
            let mut policy = self.policy.clone();
            if let Some(seconds) = input.get("timeout").and_then(serde_json::Value::as_u64) {
                policy.timeout = std::time::Duration::from_secs(seconds);
            }

            let outcome = execute_command_safely(command, cwd.as_deref(), &policy).await;
            let mut result = if outcome.success {
                TaskResult::complete(outcome.output.clone())
            } else {
                TaskResult::failed(outcome.error.clone())
            };
            result = result
                .with_note("success", json!(outcome.success))
                .with_note("exit_code", json!(outcome.exit_code))
                .with_note("stderr", json!(outcome.error));
            Ok(result)
        })
    }
}

/// The `list_files` tool: directory listing through the file-access
/// manager.
pub struct ListFilesTool {
    files: FileAccessManager,
}

impl ListFilesTool {
    /// A listing tool backed by the given manager.
    #[must_use]
    pub fn new(files: FileAccessManager) -> Self {
        Self { files }
    }

    /// The tool spec advertised to the model and the dispatcher.
    #[must_use]
    pub fn spec() -> ToolSpec {
        ToolSpec::new("list_files", "List the entries of a directory").with_schema(json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Directory to list"}
            },
            "required": ["path"]
        }))
    }
}

impl ToolExecutor for ListFilesTool {
    fn execute(
        &self,
        input: serde_json::Map<String, serde_json::Value>,
    ) -> BoxFuture<'_, Result<TaskResult, ToolError>> {
        Box::pin(async move {
            let Some(path) = input_str(&input, "path") else {
                return Ok(TaskResult::from_error(TaskError::input_validation(
                    "list_files requires a 'path' string",
                )));
            };
            match self.files.list_dir(path).await {
                Ok(names) => Ok(TaskResult::complete(names.join("\n"))
                    .with_note("files", json!(names))
                    .with_note("file_count", json!(names.len()))),
                Err(error) => Ok(TaskResult::from_error(
                    TaskError::input_validation(format!("cannot list '{path}': {error}")),
                )),
            }
        })
    }
}
