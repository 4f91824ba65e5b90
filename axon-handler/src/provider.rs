//! Provider trait for LLM backends.
//!
//! Concrete adapters (HTTP transports, vendor SDKs) live outside this
//! workspace; the runtime only consumes this seam. The trait is
//! object-safe — providers are stored as `Arc<dyn Provider>` on the
//! [`Handler`](crate::Handler).

use std::collections::VecDeque;
use std::sync::Mutex;

use thiserror::Error;

use crate::BoxFuture;
use crate::tool::ToolSpec;

/// Errors from LLM providers.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP or network request failed.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// Provider rate-limited the request.
    #[error("rate limited")]
    RateLimited,

    /// Authentication/authorization failed.
    #[error("auth failed: {0}")]
    AuthFailed(String),

    /// Could not parse the provider's response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ProviderError {
    /// Whether retrying this request might succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited | ProviderError::RequestFailed(_)
        )
    }
}

/// A fully rendered request for one model completion.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// The prompt text, with all template parameters already substituted.
    pub prompt: String,
    /// Tool definitions the model may call.
    pub tools: Vec<ToolSpec>,
    /// Model override; `None` uses the provider's default.
    pub model: Option<String>,
}

impl LlmRequest {
    /// A request with just a prompt.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            tools: Vec::new(),
            model: None,
        }
    }
}

/// A completion returned by a provider.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// The generated text.
    pub content: String,
    /// The model that produced it, when the provider reports one.
    pub model: Option<String>,
}

/// LLM backend interface.
pub trait Provider: Send + Sync {
    /// Send a completion request to the backend.
    fn complete(&self, request: LlmRequest) -> BoxFuture<'_, Result<LlmResponse, ProviderError>>;
}

/// A provider that replays canned responses.
///
/// Pops queued responses in order; once the queue is empty it echoes the
/// prompt back. Useful for tests and offline dry runs of workflows.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedProvider {
    /// A provider that will return the given responses in order.
    #[must_use]
    pub fn new(responses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
        }
    }

    /// A provider that always echoes the prompt.
    #[must_use]
    pub fn echo() -> Self {
        Self::new(Vec::<String>::new())
    }
}

impl Provider for ScriptedProvider {
    fn complete(&self, request: LlmRequest) -> BoxFuture<'_, Result<LlmResponse, ProviderError>> {
        Box::pin(async move {
            let scripted = self
                .responses
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .pop_front();
            Ok(LlmResponse {
                content: scripted.unwrap_or(request.prompt),
                model: request.model,
            })
        })
    }
}
