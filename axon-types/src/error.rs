//! Structured failure payloads for the task envelope.

use serde::{Deserialize, Serialize};

/// Reason codes attached to task failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskFailureReason {
    /// The memory subsystem failed to retrieve context.
    ContextRetrievalFailure,
    /// Input data did not meet requirements.
    InputValidationFailure,
    /// No template was registered under the requested identifier.
    TemplateNotFound,
    /// A subtask failed, causing the parent task to fail.
    SubtaskFailure,
    /// Execution exceeded its time limit.
    ExecutionTimeout,
    /// Output did not meet format requirements.
    OutputFormatFailure,
    /// Catch-all for truly unexpected errors.
    UnexpectedError,
}

impl TaskFailureReason {
    /// The wire representation of this reason code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContextRetrievalFailure => "context_retrieval_failure",
            Self::InputValidationFailure => "input_validation_failure",
            Self::TemplateNotFound => "template_not_found",
            Self::SubtaskFailure => "subtask_failure",
            Self::ExecutionTimeout => "execution_timeout",
            Self::OutputFormatFailure => "output_format_failure",
            Self::UnexpectedError => "unexpected_error",
        }
    }
}

impl std::fmt::Display for TaskFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured task failure, serialized under `notes.error` in FAILED
/// [`TaskResult`](crate::TaskResult)s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct TaskError {
    /// Error type discriminator; always `TASK_FAILURE` for this shape.
    #[serde(rename = "type")]
    pub kind: String,
    /// Reason code from the failure taxonomy.
    pub reason: TaskFailureReason,
    /// Human-readable message.
    pub message: String,
    /// Additional structured details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl TaskError {
    /// A task failure with the given reason and message.
    #[must_use]
    pub fn new(reason: TaskFailureReason, message: impl Into<String>) -> Self {
        Self {
            kind: "TASK_FAILURE".to_string(),
            reason,
            message: message.into(),
            details: None,
        }
    }

    /// An `input_validation_failure`.
    #[must_use]
    pub fn input_validation(message: impl Into<String>) -> Self {
        Self::new(TaskFailureReason::InputValidationFailure, message)
    }

    /// A `template_not_found` failure.
    #[must_use]
    pub fn template_not_found(name: &str) -> Self {
        Self::new(
            TaskFailureReason::TemplateNotFound,
            format!("Template not found: {name}"),
        )
    }

    /// A `context_retrieval_failure`.
    #[must_use]
    pub fn context_retrieval(message: impl Into<String>) -> Self {
        Self::new(TaskFailureReason::ContextRetrievalFailure, message)
    }

    /// An `unexpected_error`.
    #[must_use]
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(TaskFailureReason::UnexpectedError, message)
    }

    /// Attach structured details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}
