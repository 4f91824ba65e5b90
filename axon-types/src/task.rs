//! The task envelope and execution request types.

use serde::{Deserialize, Serialize};

use crate::error::TaskError;

/// Completion status of a task or tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// The task finished successfully.
    #[serde(rename = "COMPLETE")]
    Complete,
    /// The task failed; `notes.error` carries the structured reason.
    #[serde(rename = "FAILED")]
    Failed,
    /// The task is awaiting further input or a downstream result.
    #[serde(rename = "PENDING")]
    Pending,
    /// The task produced a usable but incomplete result.
    #[serde(rename = "PARTIAL")]
    Partial,
}

/// The universal return envelope for atomic tasks and direct tools.
///
/// Every executor in the system — the LLM-backed atomic task path, host
/// tools, and the outer dispatcher — returns this shape. Workflows inspect
/// it with `get-field` and branch on `status` rather than relying on
/// evaluator errors (a FAILED result is a value, not an exception).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Completion status.
    pub status: TaskStatus,
    /// The primary payload, usually the model or tool output text.
    pub content: String,
    /// Free-form structured annotations: error details, execution path,
    /// resolved file lists, parsed JSON output, and so on.
    #[serde(default)]
    pub notes: serde_json::Map<String, serde_json::Value>,
}

impl TaskResult {
    /// A COMPLETE result with the given content and empty notes.
    #[must_use]
    pub fn complete(content: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Complete,
            content: content.into(),
            notes: serde_json::Map::new(),
        }
    }

    /// A FAILED result with the given content and empty notes.
    #[must_use]
    pub fn failed(content: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            content: content.into(),
            notes: serde_json::Map::new(),
        }
    }

    /// A FAILED result carrying `error` under `notes.error`.
    #[must_use]
    pub fn from_error(error: TaskError) -> Self {
        let mut result = Self::failed(error.message.clone());
        result.notes.insert(
            "error".to_string(),
            serde_json::to_value(&error).unwrap_or_else(|_| serde_json::Value::Null),
        );
        result
    }

    /// Attach a note, replacing any existing value for the key.
    #[must_use]
    pub fn with_note(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.notes.insert(key.into(), value);
        self
    }

    /// Look up a note by key.
    pub fn note(&self, key: &str) -> Option<&serde_json::Value> {
        self.notes.get(key)
    }

    /// Whether the status is COMPLETE.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == TaskStatus::Complete
    }
}

/// How a subtask inherits context from its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InheritContext {
    /// Inherit the full parent context.
    Full,
    /// Inherit a relevant subset of the parent context.
    Subset,
    /// Inherit nothing.
    None,
}

/// Whether a subtask triggers fresh associative context retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FreshContext {
    /// Query the memory index for relevant files.
    Enabled,
    /// Skip retrieval; inherited context is passed through verbatim.
    Disabled,
}

/// Resolved context-management settings for one task execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextManagement {
    /// Inheritance mode.
    #[serde(rename = "inheritContext")]
    pub inherit_context: InheritContext,
    /// Whether intermediate outputs accumulate into the context.
    #[serde(rename = "accumulateData")]
    pub accumulate_data: bool,
    /// Fresh-retrieval mode.
    #[serde(rename = "freshContext")]
    pub fresh_context: FreshContext,
}

impl ContextManagement {
    /// Default settings for an atomic subtype.
    ///
    /// All subtypes currently share the same defaults: no inheritance, no
    /// accumulation, fresh retrieval enabled.
    #[must_use]
    pub fn subtype_defaults(_subtype: &str) -> Self {
        Self {
            inherit_context: InheritContext::None,
            accumulate_data: false,
            fresh_context: FreshContext::Enabled,
        }
    }

    /// Apply a partial override on top of these settings.
    #[must_use]
    pub fn apply(mut self, overrides: &ContextOverrides) -> Self {
        if let Some(inherit) = overrides.inherit_context {
            self.inherit_context = inherit;
        }
        if let Some(accumulate) = overrides.accumulate_data {
            self.accumulate_data = accumulate;
        }
        if let Some(fresh) = overrides.fresh_context {
            self.fresh_context = fresh;
        }
        self
    }

    /// Reject contradictory settings.
    ///
    /// `freshContext = enabled` cannot be combined with
    /// `inheritContext = full | subset`: a task either reuses its parent's
    /// context or fetches its own, never both.
    pub fn validate(&self) -> Result<(), TaskError> {
        if self.fresh_context == FreshContext::Enabled
            && matches!(
                self.inherit_context,
                InheritContext::Full | InheritContext::Subset
            )
        {
            return Err(TaskError::input_validation(
                "freshContext='enabled' cannot be combined with inheritContext='full' or 'subset'",
            ));
        }
        Ok(())
    }
}

/// A partial [`ContextManagement`]: unset fields fall through to the layer
/// below (request overrides template, template overrides subtype defaults).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextOverrides {
    /// Inheritance mode override.
    #[serde(rename = "inheritContext", skip_serializing_if = "Option::is_none")]
    pub inherit_context: Option<InheritContext>,
    /// Accumulation override.
    #[serde(rename = "accumulateData", skip_serializing_if = "Option::is_none")]
    pub accumulate_data: Option<bool>,
    /// Fresh-retrieval override.
    #[serde(rename = "freshContext", skip_serializing_if = "Option::is_none")]
    pub fresh_context: Option<FreshContext>,
}

impl ContextOverrides {
    /// Whether no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inherit_context.is_none()
            && self.accumulate_data.is_none()
            && self.fresh_context.is_none()
    }
}

/// Where the file paths attached to a task execution came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
    /// The caller supplied explicit paths.
    ExplicitRequest,
    /// The template declared literal paths.
    TemplateLiteral,
    /// Fresh associative retrieval resolved the paths.
    FreshRetrieval,
    /// A template-declared command's output listed the paths.
    CommandOutput,
    /// Fresh retrieval was attempted and failed; execution continued
    /// without files.
    ResolutionFailed,
    /// No paths were requested or resolved.
    None,
}

/// A request to execute one atomic task template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtaskRequest {
    /// Caller-assigned identifier, echoed back in `notes.task_id`.
    pub task_id: String,
    /// Template name to execute.
    pub name: String,
    /// Evaluated call arguments, keyed by parameter name.
    #[serde(default)]
    pub inputs: serde_json::Map<String, serde_json::Value>,
    /// Explicit file paths; when present they pre-empt template paths and
    /// fresh retrieval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_paths: Option<Vec<String>>,
    /// Per-call context-management overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextOverrides>,
    /// Optional conversation history made available to templates whose
    /// `history_config` opts in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<String>,
}

impl SubtaskRequest {
    /// A request with the given id and template name and no arguments.
    #[must_use]
    pub fn new(task_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            name: name.into(),
            inputs: serde_json::Map::new(),
            file_paths: None,
            context: None,
            history: None,
        }
    }
}
