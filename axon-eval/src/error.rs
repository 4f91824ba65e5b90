//! The evaluator's error taxonomy.
//!
//! Every error carries a human-readable message and, where applicable, the
//! canonical text of the offending expression. Failures *reported* by
//! tasks and tools (a FAILED result) are values, not errors; only faults
//! and structural violations surface here.

use axon_sexp::ParseError;
use axon_types::TaskFailureReason;
use thiserror::Error;

/// Errors raised during evaluation.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EvalError {
    /// The source text failed to parse.
    #[error("syntax error: {0}")]
    Syntax(#[from] ParseError),

    /// A symbol was neither lexically bound nor registered.
    #[error("unbound symbol '{name}'")]
    UnboundSymbol {
        /// The unresolved name.
        name: String,
        /// Canonical text of the offending expression.
        expression: String,
    },

    /// A callable or form received the wrong number of arguments.
    #[error("arity mismatch: {message}")]
    ArityMismatch {
        /// What was expected and what arrived.
        message: String,
        /// Canonical text of the offending expression.
        expression: String,
    },

    /// A value had the wrong type for its position, or a non-callable was
    /// applied.
    #[error("type error: {message}")]
    TypeError {
        /// What went wrong.
        message: String,
        /// Canonical text of the offending expression.
        expression: String,
    },

    /// A task-level precondition failed or a downstream dependency broke.
    #[error("task failure ({reason}): {message}")]
    TaskFailure {
        /// Reason code from the failure taxonomy.
        reason: TaskFailureReason,
        /// What went wrong.
        message: String,
        /// Canonical text of the offending expression.
        expression: String,
        /// Structured details, when available.
        details: Option<serde_json::Value>,
    },

    /// A tool executor faulted (as opposed to reporting failure).
    #[error("tool execution failed: {message}")]
    ToolExecution {
        /// What went wrong.
        message: String,
        /// Canonical text of the offending expression.
        expression: String,
    },

    /// A phase of a loop construct failed; wraps the underlying error with
    /// the iteration and phase it happened in.
    #[error("error in {phase} phase (iteration {iteration}): {source}")]
    LoopPhase {
        /// Which phase failed: director, executor, evaluator, validator,
        /// or controller.
        phase: &'static str,
        /// 1-based iteration number.
        iteration: usize,
        /// The underlying error.
        #[source]
        source: Box<EvalError>,
    },

    /// Catch-all for faults with no better classification.
    #[error("unexpected error: {message}")]
    Unexpected {
        /// What went wrong.
        message: String,
        /// Canonical text of the offending expression.
        expression: String,
    },
}

impl EvalError {
    /// An [`EvalError::UnboundSymbol`].
    #[must_use]
    pub fn unbound(name: impl Into<String>, expression: impl ToString) -> Self {
        Self::UnboundSymbol {
            name: name.into(),
            expression: expression.to_string(),
        }
    }

    /// An [`EvalError::ArityMismatch`].
    #[must_use]
    pub fn arity(message: impl Into<String>, expression: impl ToString) -> Self {
        Self::ArityMismatch {
            message: message.into(),
            expression: expression.to_string(),
        }
    }

    /// An [`EvalError::TypeError`].
    #[must_use]
    pub fn type_error(message: impl Into<String>, expression: impl ToString) -> Self {
        Self::TypeError {
            message: message.into(),
            expression: expression.to_string(),
        }
    }

    /// An [`EvalError::TaskFailure`].
    #[must_use]
    pub fn task_failure(
        reason: TaskFailureReason,
        message: impl Into<String>,
        expression: impl ToString,
    ) -> Self {
        Self::TaskFailure {
            reason,
            message: message.into(),
            expression: expression.to_string(),
            details: None,
        }
    }

    /// An [`EvalError::ToolExecution`].
    #[must_use]
    pub fn tool(message: impl Into<String>, expression: impl ToString) -> Self {
        Self::ToolExecution {
            message: message.into(),
            expression: expression.to_string(),
        }
    }

    /// Wrap this error with the loop phase and iteration it occurred in.
    #[must_use]
    pub fn in_loop_phase(self, phase: &'static str, iteration: usize) -> Self {
        Self::LoopPhase {
            phase,
            iteration,
            source: Box::new(self),
        }
    }

    /// The canonical text of the offending expression, when recorded.
    #[must_use]
    pub fn expression(&self) -> Option<&str> {
        match self {
            Self::Syntax(_) => None,
            Self::UnboundSymbol { expression, .. }
            | Self::ArityMismatch { expression, .. }
            | Self::TypeError { expression, .. }
            | Self::TaskFailure { expression, .. }
            | Self::ToolExecution { expression, .. }
            | Self::Unexpected { expression, .. } => Some(expression),
            Self::LoopPhase { source, .. } => source.expression(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_annotation_wraps_and_preserves_expression() {
        let inner = EvalError::type_error("not callable", "(f 1)");
        let wrapped = inner.in_loop_phase("director", 3);
        assert_eq!(
            wrapped.to_string(),
            "error in director phase (iteration 3): type error: not callable"
        );
        assert_eq!(wrapped.expression(), Some("(f 1)"));
    }

    #[test]
    fn display_includes_reason_codes() {
        let error = EvalError::task_failure(
            TaskFailureReason::ContextRetrievalFailure,
            "index offline",
            "(get-context (query \"x\"))",
        );
        assert_eq!(
            error.to_string(),
            "task failure (context_retrieval_failure): index offline"
        );
    }
}
