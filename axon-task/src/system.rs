//! The task system: registry plus execution front-end.

use std::sync::Arc;

use axon_handler::{Handler, execute_command_safely, parse_file_paths_from_output};
use axon_memory::{ContextGenerationInput, MemorySystem};
use axon_types::{
    ContextManagement, ContextSource, FilePathSource, FreshContext, SubtaskRequest, TaskError,
    TaskResult, TaskTemplate,
};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::executor::AtomicTaskExecutor;
use crate::registry::TemplateRegistry;

/// Similarity threshold for [`TaskSystem::find_matching_tasks`].
const MATCH_THRESHOLD: f64 = 0.6;

/// One hit from task similarity matching.
#[derive(Debug, Clone)]
pub struct TaskMatch {
    /// Normalized similarity score in `[0, 1]`.
    pub score: f64,
    /// The matched template.
    pub template: Arc<TaskTemplate>,
}

/// Manages and executes atomic task templates.
pub struct TaskSystem {
    registry: TemplateRegistry,
    memory: Arc<MemorySystem>,
    handler: Arc<Handler>,
    executor: AtomicTaskExecutor,
}

impl TaskSystem {
    /// A task system over the given memory and handler.
    #[must_use]
    pub fn new(memory: Arc<MemorySystem>, handler: Arc<Handler>) -> Self {
        Self {
            registry: TemplateRegistry::new(),
            memory,
            handler,
            executor: AtomicTaskExecutor::new(),
        }
    }

    /// Register an atomic template.
    pub async fn register_template(&self, template: TaskTemplate) -> Result<(), TaskError> {
        self.registry.register(template).await
    }

    /// Find a template by name or `atomic:<subtype>`.
    pub async fn find_template(&self, identifier: &str) -> Option<Arc<TaskTemplate>> {
        self.registry.find(identifier).await
    }

    /// The handler this system executes against.
    #[must_use]
    pub fn handler(&self) -> &Arc<Handler> {
        &self.handler
    }

    /// Execute one atomic template request.
    ///
    /// Never returns an error: every failure becomes a FAILED [`TaskResult`]
    /// with `notes.error` populated, so callers (and workflows) branch on
    /// `status`.
    pub async fn execute_atomic_template(&self, request: SubtaskRequest) -> TaskResult {
        info!(task = %request.name, task_id = %request.task_id, "executing atomic template");

        let Some(template) = self.find_template(&request.name).await else {
            return TaskResult::from_error(TaskError::template_not_found(&request.name));
        };

        // Subtype defaults, overlaid by template settings, overlaid by the
        // per-request overrides.
        let mut settings = ContextManagement::subtype_defaults(&template.subtype);
        if let Some(overrides) = &template.context_management {
            settings = settings.apply(overrides);
        }
        if let Some(overrides) = &request.context {
            settings = settings.apply(overrides);
        }
        if let Err(error) = settings.validate() {
            return TaskResult::from_error(error);
        }

        let (file_paths, context_source) = self.resolve_file_paths(&template, &request, settings).await;

        let mut file_sections = Vec::new();
        for path in &file_paths {
            match self.handler.files().read_file(path).await {
                Ok(content) => file_sections.push((path.clone(), content)),
                Err(error) => {
                    warn!(path = %path, %error, "skipping unreadable context file");
                }
            }
        }

        let mut result = match self
            .executor
            .execute_body(
                &template,
                &request.inputs,
                request.history.as_deref(),
                &file_sections,
                &self.handler,
            )
            .await
        {
            Ok(result) => result,
            Err(error) => TaskResult::from_error(error),
        };

        result.notes.insert("template_used".to_string(), json!(request.name));
        result.notes.insert("task_id".to_string(), json!(request.task_id));
        result.notes.insert(
            "context_source".to_string(),
            serde_json::to_value(context_source).unwrap_or(serde_json::Value::Null),
        );
        result
            .notes
            .insert("file_count".to_string(), json!(file_paths.len()));
        info!(task = %request.name, status = ?result.status, "atomic template finished");
        result
    }

    /// Resolve the file paths for one execution, in precedence order:
    /// explicit request paths, template literals, the template's declared
    /// path source (command output or associative retrieval, gated on
    /// fresh context), none.
    async fn resolve_file_paths(
        &self,
        template: &TaskTemplate,
        request: &SubtaskRequest,
        settings: ContextManagement,
    ) -> (Vec<String>, ContextSource) {
        if let Some(paths) = &request.file_paths {
            debug!(count = paths.len(), "using explicit file paths from request");
            return (paths.clone(), ContextSource::ExplicitRequest);
        }
        if !template.file_paths.is_empty()
            && matches!(
                template.file_paths_source,
                None | Some(FilePathSource::Literal)
            )
        {
            debug!(count = template.file_paths.len(), "using template literal file paths");
            return (template.file_paths.clone(), ContextSource::TemplateLiteral);
        }
        if settings.fresh_context != FreshContext::Enabled {
            return (Vec::new(), ContextSource::None);
        }

        match &template.file_paths_source {
            Some(FilePathSource::Command(command)) => {
                let outcome =
                    execute_command_safely(command, None, self.handler.command_policy()).await;
                if !outcome.success {
                    warn!(
                        task = %template.name,
                        error = %outcome.error,
                        "path-listing command failed"
                    );
                    return (Vec::new(), ContextSource::ResolutionFailed);
                }
                let paths = parse_file_paths_from_output(&outcome.output);
                debug!(count = paths.len(), "resolved file paths from command output");
                (paths, ContextSource::CommandOutput)
            }
            Some(FilePathSource::Description(text)) => {
                self.retrieve_paths(template, request, text.clone()).await
            }
            None | Some(FilePathSource::Literal) => {
                let query = template
                    .description
                    .clone()
                    .unwrap_or_else(|| template.instructions.clone());
                self.retrieve_paths(template, request, query).await
            }
        }
    }

    /// Associative retrieval of file paths for one execution.
    async fn retrieve_paths(
        &self,
        template: &TaskTemplate,
        request: &SubtaskRequest,
        query: String,
    ) -> (Vec<String>, ContextSource) {
        let mut input = ContextGenerationInput::for_query(query);
        input.template_type = template.template_type.clone();
        input.template_subtype = template.subtype.clone();
        input.inputs = request.inputs.clone();
        match self.memory.get_relevant_context_for(&input).await {
            Ok(matches) => {
                let paths = matches.paths();
                let source = if paths.is_empty() {
                    ContextSource::None
                } else {
                    ContextSource::FreshRetrieval
                };
                (paths, source)
            }
            Err(error) => {
                warn!(%error, task = %template.name, "file path resolution failed");
                (Vec::new(), ContextSource::ResolutionFailed)
            }
        }
    }

    /// Score registered templates' descriptions against free text,
    /// returning matches over the threshold, best first.
    pub async fn find_matching_tasks(&self, input_text: &str) -> Vec<TaskMatch> {
        if input_text.is_empty() {
            return Vec::new();
        }
        let needle = input_text.to_lowercase();
        let mut matches = Vec::new();
        for template in self.registry.all().await {
            let Some(description) = &template.description else {
                continue;
            };
            let score = strsim::normalized_levenshtein(&needle, &description.to_lowercase());
            debug!(template = %template.name, score, "similarity score");
            if score >= MATCH_THRESHOLD {
                matches.push(TaskMatch { score, template });
            }
        }
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches
    }
}
