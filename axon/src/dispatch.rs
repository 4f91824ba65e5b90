//! The programmatic task entry point.
//!
//! Routes an external identifier to a registered template (preferred) or a
//! direct tool. This boundary never raises: every failure is converted into
//! a FAILED [`TaskResult`] with `notes.error` populated.

use axon_eval::{Env, Value};
use axon_types::{SubtaskRequest, TaskError, TaskResult, TaskTemplate};
use serde_json::json;
use tracing::{debug, info};

use crate::runtime::Runtime;

/// Flags accepted by the dispatcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchFlags {
    /// Forward the caller's history string to the task.
    pub use_history: bool,
    /// Render a usage description instead of executing.
    pub help: bool,
    /// Treat `identifier` as an S-expression program and evaluate it.
    pub is_sexp_string: bool,
}

/// Route `identifier` to a template or a direct tool and execute it.
///
/// Resolution precedence is strict: templates (by name or
/// `atomic:subtype`) win over tools; an identifier matching neither yields
/// an `input_validation_failure`. The `help` flag renders a description
/// derived from the template's params or the tool's input schema and never
/// executes anything.
pub async fn execute_programmatic_task(
    runtime: &Runtime,
    identifier: &str,
    params: serde_json::Map<String, serde_json::Value>,
    flags: DispatchFlags,
    history: Option<&str>,
) -> TaskResult {
    info!(identifier, ?flags, "dispatching programmatic task");

    if flags.is_sexp_string {
        return evaluate_sexp_program(runtime, identifier).await;
    }

    if let Some(template) = runtime.tasks().find_template(identifier).await {
        if flags.help {
            return TaskResult::complete(template_help(&template));
        }
        return execute_template(runtime, identifier, &template, params, flags, history).await;
    }

    if runtime.handler().has_tool(identifier).await {
        if flags.help {
            let spec = runtime.handler().tool_spec(identifier).await;
            return TaskResult::complete(
                spec.map(|s| tool_help(&s.name, &s.description, &s.input_schema))
                    .unwrap_or_default(),
            );
        }
        debug!(identifier, "routing to direct tool");
        return match runtime.handler().execute_tool(identifier, params).await {
            Ok(result) => result.with_note("execution_path", json!("direct_tool")),
            Err(error) => TaskResult::from_error(TaskError::unexpected(format!(
                "Tool execution failed: {error}"
            ))),
        };
    }

    TaskResult::from_error(
        TaskError::input_validation(format!(
            "No template or tool found matching identifier: {identifier}"
        ))
        .with_details(json!({"identifier": identifier})),
    )
}

async fn execute_template(
    runtime: &Runtime,
    identifier: &str,
    template: &TaskTemplate,
    mut params: serde_json::Map<String, serde_json::Value>,
    flags: DispatchFlags,
    history: Option<&str>,
) -> TaskResult {
    let file_paths = match params.remove("file_context") {
        None => None,
        Some(value) => match parse_file_context(value) {
            Ok(paths) => Some(paths),
            Err(message) => {
                return TaskResult::from_error(TaskError::input_validation(message));
            }
        },
    };

    // The registry may have been addressed as atomic:subtype; the request
    // carries the template's canonical name.
    let mut request = SubtaskRequest::new(runtime.next_request_id(identifier), template.name.clone());
    request.inputs = params;
    request.file_paths = file_paths;
    if flags.use_history {
        request.history = history.map(str::to_string);
    }

    debug!(identifier, template = %template.name, "routing to atomic template");
    runtime
        .tasks()
        .execute_atomic_template(request)
        .await
        .with_note("execution_path", json!("subtask_template"))
}

/// Evaluate an S-expression program submitted through the dispatcher.
async fn evaluate_sexp_program(runtime: &Runtime, source: &str) -> TaskResult {
    match runtime.evaluate_in(source, &Env::root()).await {
        Ok(Value::TaskResult(result)) => result,
        Ok(value) => {
            TaskResult::complete(value.to_string()).with_note("execution_path", json!("sexp_program"))
        }
        Err(error) => TaskResult::from_error(
            TaskError::unexpected(format!("Evaluation failed: {error}")).with_details(json!({
                "expression": error.expression(),
            })),
        ),
    }
}

/// Parse the `file_context` parameter: a JSON array of strings, or a JSON
/// string encoding one.
fn parse_file_context(value: serde_json::Value) -> Result<Vec<String>, String> {
    let array = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::String(text) => match serde_json::from_str(&text) {
            Ok(serde_json::Value::Array(items)) => items,
            Ok(_) | Err(_) => {
                return Err(format!(
                    "Invalid file_context parameter: expected a JSON list of strings, got: {text}"
                ));
            }
        },
        other => {
            return Err(format!(
                "Invalid type for file_context parameter: {}",
                json_type_name(&other)
            ));
        }
    };
    array
        .into_iter()
        .map(|item| match item {
            serde_json::Value::String(path) => Ok(path),
            other => Err(format!(
                "Invalid file_context entry: expected a string, got {}",
                json_type_name(&other)
            )),
        })
        .collect()
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Render a usage block from a template's declared parameters.
fn template_help(template: &TaskTemplate) -> String {
    let mut help = format!("Usage: {}", template.name);
    for param in &template.params {
        if param.required && param.default.is_none() {
            help.push_str(&format!(" <{}>", param.name));
        } else {
            help.push_str(&format!(" [{}]", param.name));
        }
    }
    help.push('\n');
    if let Some(description) = &template.description {
        help.push_str(description);
        help.push('\n');
    }
    if !template.params.is_empty() {
        help.push_str("\nParameters:\n");
        for param in &template.params {
            let requirement = if param.required && param.default.is_none() {
                "required"
            } else {
                "optional"
            };
            help.push_str(&format!("  {} ({requirement})", param.name));
            if let Some(description) = &param.description {
                help.push_str(&format!(" - {description}"));
            }
            if let Some(default) = &param.default {
                help.push_str(&format!(" [default: {default}]"));
            }
            help.push('\n');
        }
    }
    help
}

/// Render a usage block from a tool's input schema.
fn tool_help(name: &str, description: &str, schema: &serde_json::Value) -> String {
    let mut help = format!("Usage: {name}\n{description}\n");
    let required: Vec<&str> = schema
        .get("required")
        .and_then(serde_json::Value::as_array)
        .map(|items| items.iter().filter_map(serde_json::Value::as_str).collect())
        .unwrap_or_default();
    if let Some(properties) = schema.get("properties").and_then(serde_json::Value::as_object)
        && !properties.is_empty()
    {
        help.push_str("\nParameters:\n");
        for (field, field_schema) in properties {
            let requirement = if required.contains(&field.as_str()) {
                "required"
            } else {
                "optional"
            };
            help.push_str(&format!("  {field} ({requirement})"));
            if let Some(description) = field_schema
                .get("description")
                .and_then(serde_json::Value::as_str)
            {
                help.push_str(&format!(" - {description}"));
            }
            help.push('\n');
        }
    }
    help
}
