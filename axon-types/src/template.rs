//! Atomic task template records.

use serde::{Deserialize, Serialize};

use crate::task::ContextOverrides;

/// Declaration of one template parameter.
///
/// Parameters are kept in declaration order; positional call arguments bind
/// in this order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name, matched against `{{name}}` placeholders.
    pub name: String,
    /// Human-readable description, surfaced in help output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional type hint (informational).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_hint: Option<String>,
    /// Whether a value must be supplied when no default exists.
    #[serde(default = "default_true")]
    pub required: bool,
    /// Default value used when the caller omits the parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

fn default_true() -> bool {
    true
}

impl ParamSpec {
    /// A required parameter with an autogenerated description.
    #[must_use]
    pub fn required(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            description: Some(format!("Parameter {name}")),
            name,
            type_hint: None,
            required: true,
            default: None,
        }
    }

    /// An optional parameter with the given default.
    #[must_use]
    pub fn optional(name: impl Into<String>, default: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            description: None,
            type_hint: None,
            required: false,
            default: Some(default),
        }
    }
}

/// Output format expected from a template's LLM call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// The content should parse as JSON; the parsed value is attached to
    /// `notes.parsedContent`.
    Json,
    /// Plain text, returned as-is.
    Text,
}

/// Output post-processing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputFormat {
    /// Expected output kind.
    #[serde(rename = "type")]
    pub kind: OutputKind,
    /// Optional schema description forwarded to the model prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
}

/// Where a template's file paths come from when the request supplies none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FilePathSource {
    /// The paths listed literally on the template.
    Literal,
    /// A shell command whose line-oriented output lists the paths.
    Command(String),
    /// A free-text description resolved through associative retrieval.
    Description(String),
}

/// A model preference: a plain name, or a ranked preference with
/// fallbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelPreference {
    /// A single model name.
    Name(String),
    /// A preferred model with ordered fallbacks.
    Ranked {
        /// First choice, used when available.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        preferred: Option<String>,
        /// Tried in order when the preferred model is unavailable.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        fallback: Vec<String>,
    },
}

impl ModelPreference {
    /// Choose a model against an availability list.
    ///
    /// With no list, any preference is taken at face value. With a list,
    /// the preferred name wins if present, then each fallback in order,
    /// then the first available model.
    #[must_use]
    pub fn choose(&self, available: Option<&[String]>) -> Option<String> {
        let Some(available) = available.filter(|models| !models.is_empty()) else {
            return match self {
                Self::Name(name) => Some(name.clone()),
                Self::Ranked { preferred, .. } => preferred.clone(),
            };
        };
        match self {
            Self::Name(name) if available.contains(name) => Some(name.clone()),
            Self::Name(_) => available.first().cloned(),
            Self::Ranked {
                preferred,
                fallback,
            } => preferred
                .iter()
                .chain(fallback)
                .find(|name| available.contains(*name))
                .cloned()
                .or_else(|| available.first().cloned()),
        }
    }
}

/// Conversation-history plumbing for a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Whether the request's history string is prepended to the prompt.
    #[serde(default = "default_true")]
    pub use_history: bool,
    /// How many trailing turns to include; `None` means all.
    #[serde(
        rename = "history_turns_to_include",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub turns_to_include: Option<u32>,
}

/// An atomic task template: a named prompt with declared parameters,
/// executed by the LLM handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTemplate {
    /// Unique template name.
    pub name: String,
    /// Template type; only `"atomic"` templates are registrable.
    #[serde(rename = "type", default = "default_type")]
    pub template_type: String,
    /// Subtype, indexed as `atomic:<subtype>`.
    #[serde(default = "default_subtype")]
    pub subtype: String,
    /// Human-readable description; also drives task similarity matching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared parameters, in declaration order.
    #[serde(default)]
    pub params: Vec<ParamSpec>,
    /// Prompt body with `{{param}}` placeholders.
    pub instructions: String,
    /// Model preference for this template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelPreference>,
    /// Output post-processing configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,
    /// History plumbing configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_config: Option<HistoryConfig>,
    /// Template-level context-management settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_management: Option<ContextOverrides>,
    /// Literal file paths to attach when the request supplies none.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_paths: Vec<String>,
    /// How file paths resolve when the request supplies none; `None`
    /// behaves like [`FilePathSource::Literal`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_paths_source: Option<FilePathSource>,
}

fn default_type() -> String {
    "atomic".to_string()
}

fn default_subtype() -> String {
    "standard".to_string()
}

impl TaskTemplate {
    /// A minimal atomic template with the `standard` subtype.
    #[must_use]
    pub fn atomic(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template_type: default_type(),
            subtype: default_subtype(),
            description: None,
            params: Vec::new(),
            instructions: instructions.into(),
            model: None,
            output_format: None,
            history_config: None,
            context_management: None,
            file_paths: Vec::new(),
            file_paths_source: None,
        }
    }

    /// The `atomic:<subtype>` index key for this template.
    #[must_use]
    pub fn index_key(&self) -> String {
        format!("{}:{}", self.template_type, self.subtype)
    }

    /// Look up a declared parameter by name.
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Resolve the model to request, honoring the template preference
    /// against an availability list.
    #[must_use]
    pub fn preferred_model(&self, available: Option<&[String]>) -> Option<String> {
        match &self.model {
            Some(preference) => preference.choose(available),
            None => available.and_then(|models| models.first().cloned()),
        }
    }
}
