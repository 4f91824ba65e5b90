//! Parameter binding, prompt assembly, and the LLM call for atomic tasks.

use axon_handler::Handler;
use axon_types::{TaskError, TaskResult, TaskTemplate};
use serde_json::json;
use tracing::debug;

/// Bind positional and named call arguments to a template's parameters.
///
/// Positional arguments bind in declaration order; named arguments bind by
/// name. Errors: more positional arguments than parameters, a named
/// argument for an unknown parameter, a named argument colliding with a
/// positional one, or a missing required parameter without a default.
/// Optional parameters without a value bind their default, or nothing.
pub fn bind_parameters(
    template: &TaskTemplate,
    positional: &[serde_json::Value],
    named: &serde_json::Map<String, serde_json::Value>,
) -> Result<serde_json::Map<String, serde_json::Value>, TaskError> {
    if positional.len() > template.params.len() {
        return Err(TaskError::input_validation(format!(
            "task '{}' accepts {} parameter(s), got {} positional argument(s)",
            template.name,
            template.params.len(),
            positional.len()
        )));
    }
    for name in named.keys() {
        if template.param(name).is_none() {
            return Err(TaskError::input_validation(format!(
                "task '{}' has no parameter named '{}'",
                template.name, name
            )));
        }
    }

    let mut bound = serde_json::Map::new();
    for (i, param) in template.params.iter().enumerate() {
        let from_position = positional.get(i);
        let from_name = named.get(&param.name);
        match (from_position, from_name) {
            (Some(_), Some(_)) => {
                return Err(TaskError::input_validation(format!(
                    "parameter '{}' of task '{}' given both positionally and by name",
                    param.name, template.name
                )));
            }
            (Some(value), None) | (None, Some(value)) => {
                bound.insert(param.name.clone(), value.clone());
            }
            (None, None) => {
                if let Some(default) = &param.default {
                    bound.insert(param.name.clone(), default.clone());
                } else if param.required {
                    return Err(TaskError::input_validation(format!(
                        "missing required parameter '{}' for task '{}'",
                        param.name, template.name
                    )));
                }
            }
        }
    }
    Ok(bound)
}

/// Substitute `{{param}}` placeholders in `instructions` with bound values.
///
/// String values substitute raw; other values substitute as compact JSON;
/// null substitutes as the empty string. Placeholders without a binding are
/// left untouched.
#[must_use]
pub fn substitute_params(
    instructions: &str,
    bindings: &serde_json::Map<String, serde_json::Value>,
) -> String {
    let mut output = String::with_capacity(instructions.len());
    let mut rest = instructions;
    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = after[..end].trim();
                match bindings.get(name) {
                    Some(serde_json::Value::String(s)) => output.push_str(s),
                    Some(serde_json::Value::Null) => {}
                    Some(value) => output.push_str(&value.to_string()),
                    None => {
                        // No binding: keep the placeholder verbatim.
                        output.push_str(&rest[start..start + 2 + end + 2]);
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                output.push_str(&rest[start..]);
                return output;
            }
        }
    }
    output.push_str(rest);
    output
}

/// Executes the body of an atomic task: binds arguments, assembles the
/// prompt, performs the LLM call, and post-processes the output.
#[derive(Debug, Default)]
pub struct AtomicTaskExecutor;

impl AtomicTaskExecutor {
    /// A new executor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Execute `template` with already-named inputs.
    ///
    /// `file_sections` carries `(path, content)` pairs appended to the
    /// prompt as a context block; `history` is prepended when the
    /// template's `history_config` opts in.
    pub async fn execute_body(
        &self,
        template: &TaskTemplate,
        inputs: &serde_json::Map<String, serde_json::Value>,
        history: Option<&str>,
        file_sections: &[(String, String)],
        handler: &Handler,
    ) -> Result<TaskResult, TaskError> {
        let bindings = bind_parameters(template, &[], inputs)?;
        let body = substitute_params(&template.instructions, &bindings);

        let mut prompt = String::new();
        if let (Some(config), Some(history)) = (&template.history_config, history)
            && config.use_history
        {
            let trimmed = match config.turns_to_include {
                Some(turns) => trail_lines(history, turns as usize),
                None => history.to_string(),
            };
            prompt.push_str("Conversation history:\n");
            prompt.push_str(&trimmed);
            prompt.push_str("\n\n");
        }
        prompt.push_str(&body);
        if !file_sections.is_empty() {
            prompt.push_str("\n\nRelevant files:\n");
            for (path, content) in file_sections {
                prompt.push_str(&format!("=== {path} ===\n{content}\n"));
            }
        }

        debug!(template = %template.name, prompt_len = prompt.len(), "executing atomic task body");
        let tools = handler.tool_definitions().await;
        let model = template.preferred_model(handler.available_models());
        let mut result = handler
            .execute_llm_call(prompt, tools, model)
            .await
            .map_err(|error| TaskError::unexpected(format!("Execution failed: {error}")))?;

        if let Some(format) = &template.output_format
            && format.kind == axon_types::OutputKind::Json
        {
            // A malformed payload is recorded but does not fail the task.
            match serde_json::from_str::<serde_json::Value>(&result.content) {
                Ok(parsed) => {
                    result.notes.insert("parsedContent".to_string(), parsed);
                }
                Err(error) => {
                    result
                        .notes
                        .insert("parseError".to_string(), json!(error.to_string()));
                }
            }
        }
        Ok(result)
    }
}

fn trail_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}
