//! Safe shell command execution.
//!
//! Commands run as direct argv invocations (no shell), after a policy check
//! that rejects system-modifying commands and chaining metacharacters.
//! Rejected commands never spawn a subprocess. Output streams are capped
//! and timed-out processes are killed before a result is reported.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Policy limits applied to every command execution.
#[derive(Debug, Clone)]
pub struct CommandPolicy {
    /// Commands rejected outright when they appear as the first token.
    pub denied_commands: Vec<String>,
    /// Metacharacter sequences rejected anywhere in any argument.
    pub denied_sequences: Vec<String>,
    /// Maximum wall-clock execution time.
    pub timeout: Duration,
    /// Per-stream output cap in bytes.
    pub max_output_bytes: usize,
}

impl Default for CommandPolicy {
    fn default() -> Self {
        Self {
            denied_commands: ["rm", "mv", "cp", "chmod", "chown", "sudo", "su"]
                .into_iter()
                .map(String::from)
                .collect(),
            denied_sequences: [">", "<", "|", ";", "&&", "||"]
                .into_iter()
                .map(String::from)
                .collect(),
            timeout: Duration::from_secs(5),
            max_output_bytes: 1024 * 1024,
        }
    }
}

impl CommandPolicy {
    /// Replace the execution timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether the split command violates this policy.
    fn rejects(&self, args: &[String]) -> Option<String> {
        if let Some(first) = args.first()
            && self.denied_commands.iter().any(|c| c == first)
        {
            return Some(format!("command '{first}' is not permitted"));
        }
        for arg in args {
            for seq in &self.denied_sequences {
                if arg.contains(seq.as_str()) {
                    return Some(format!("argument '{arg}' contains '{seq}'"));
                }
            }
        }
        None
    }
}

/// The outcome of a command execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    /// Whether the command ran and exited zero.
    pub success: bool,
    /// Captured stdout, truncated to the policy cap.
    pub output: String,
    /// Captured stderr or a policy/execution error message.
    pub error: String,
    /// The process exit code; `-1` when the command never ran or was killed.
    pub exit_code: i32,
}

impl CommandOutcome {
    fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: message.into(),
            exit_code: -1,
        }
    }
}

/// Execute `command` under the given policy.
///
/// Never returns an error: policy rejections, spawn failures, and timeouts
/// all surface as a `success = false` outcome, matching the shell-tool
/// contract that workflows branch on.
pub async fn execute_command_safely(
    command: &str,
    cwd: Option<&Path>,
    policy: &CommandPolicy,
) -> CommandOutcome {
    let Some(args) = shlex::split(command) else {
        return CommandOutcome::rejected("Command could not be parsed");
    };
    if args.is_empty() {
        return CommandOutcome::rejected("Command is empty");
    }
    if let Some(reason) = policy.rejects(&args) {
        warn!(command, reason = %reason, "rejected unsafe command");
        return CommandOutcome::rejected(format!(
            "Command contains potentially unsafe operations: {reason}"
        ));
    }

    debug!(command, timeout = ?policy.timeout, "executing command");
    let mut process = tokio::process::Command::new(&args[0]);
    process
        .args(&args[1..])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        process.current_dir(dir);
    }

    let child = match process.spawn() {
        Ok(child) => child,
        Err(error) => {
            return CommandOutcome::rejected(format!("Error executing command: {error}"));
        }
    };

    // Dropping the in-flight future on timeout kills the child
    // (kill_on_drop above).
    match tokio::time::timeout(policy.timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => CommandOutcome {
            success: output.status.success(),
            output: truncate_stream(&output.stdout, policy.max_output_bytes),
            error: truncate_stream(&output.stderr, policy.max_output_bytes),
            exit_code: output.status.code().unwrap_or(-1),
        },
        Ok(Err(error)) => CommandOutcome::rejected(format!("Error executing command: {error}")),
        Err(_elapsed) => CommandOutcome::rejected(format!(
            "Command execution timed out after {} seconds",
            policy.timeout.as_secs()
        )),
    }
}

fn truncate_stream(bytes: &[u8], max_bytes: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= max_bytes {
        return text.into_owned();
    }
    let mut boundary = max_bytes;
    while boundary > 0 && !text.is_char_boundary(boundary) {
        boundary -= 1;
    }
    text[..boundary].to_string()
}

/// Parse line-oriented command output into a list of paths that exist on
/// disk. Empty lines and nonexistent paths are dropped.
#[must_use]
pub fn parse_file_paths_from_output(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && Path::new(line).exists())
        .map(String::from)
        .collect()
}
