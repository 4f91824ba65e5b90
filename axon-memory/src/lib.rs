#![deny(missing_docs)]
//! Associative context retrieval for axon.
//!
//! [`MemorySystem`] maintains a global metadata index mapping file paths to
//! short descriptions, and answers [`ContextGenerationInput`] queries with an
//! [`AssociativeMatchResult`] — a context summary plus scored file matches.
//!
//! Two matching strategies are supported: `metadata` scores the query
//! against indexed descriptions, `content` scores it against the file's
//! actual text. When a query arrives with `fresh_context = disabled`, the
//! inherited context is returned verbatim and no matching runs.

mod matcher;

use std::collections::BTreeMap;

use axon_types::FreshContext;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

pub use matcher::MatchingStrategy;

/// Errors from the memory subsystem.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum MemoryError {
    /// An unrecognized matching strategy was requested.
    #[error("unknown matching strategy '{0}' (expected \"content\" or \"metadata\")")]
    UnknownStrategy(String),

    /// Reading a file during content matching failed.
    #[error("failed to read '{path}' during content matching: {source}")]
    ContentRead {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Input to template-aware context generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextGenerationInput {
    /// Free-text description of what the requesting task is doing.
    #[serde(default)]
    pub template_description: String,
    /// Requesting template's type.
    #[serde(default)]
    pub template_type: String,
    /// Requesting template's subtype.
    #[serde(default)]
    pub template_subtype: String,
    /// The task's call inputs; values marked relevant join the query.
    #[serde(default)]
    pub inputs: serde_json::Map<String, serde_json::Value>,
    /// Per-input relevance flags. Inputs absent from this map count as
    /// relevant.
    #[serde(default)]
    pub context_relevance: BTreeMap<String, bool>,
    /// Context inherited from the parent task.
    #[serde(default)]
    pub inherited_context: String,
    /// Outputs of previously executed steps.
    #[serde(default)]
    pub previous_outputs: Vec<String>,
    /// Whether fresh retrieval should run at all.
    #[serde(default = "default_fresh")]
    pub fresh_context: FreshContext,
    /// Strategy used to score candidate files.
    #[serde(default)]
    pub matching_strategy: MatchingStrategy,
}

fn default_fresh() -> FreshContext {
    FreshContext::Enabled
}

impl Default for ContextGenerationInput {
    fn default() -> Self {
        Self {
            template_description: String::new(),
            template_type: String::new(),
            template_subtype: String::new(),
            inputs: serde_json::Map::new(),
            context_relevance: BTreeMap::new(),
            inherited_context: String::new(),
            previous_outputs: Vec::new(),
            fresh_context: FreshContext::Enabled,
            matching_strategy: MatchingStrategy::default(),
        }
    }
}

impl ContextGenerationInput {
    /// An input that queries with the given description and defaults
    /// everywhere else.
    #[must_use]
    pub fn for_query(description: impl Into<String>) -> Self {
        Self {
            template_description: description.into(),
            ..Self::default()
        }
    }

    /// The full query text: description plus relevant input values.
    #[must_use]
    pub fn query_text(&self) -> String {
        let mut query = self.template_description.clone();
        for (name, value) in &self.inputs {
            if *self.context_relevance.get(name).unwrap_or(&true) {
                query.push(' ');
                match value {
                    serde_json::Value::String(s) => query.push_str(s),
                    other => query.push_str(&other.to_string()),
                }
            }
        }
        query
    }
}

/// One scored match from the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEntry {
    /// Path of the matched file.
    pub path: String,
    /// Human-readable relevance note.
    pub relevance: String,
    /// Normalized match score in `[0, 1]`, when the strategy computes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// The result of an associative matching pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociativeMatchResult {
    /// Summary of the retrieved context.
    pub context: String,
    /// Scored matches, best first.
    pub matches: Vec<MatchEntry>,
}

impl AssociativeMatchResult {
    /// The matched paths, in score order.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.matches.iter().map(|m| m.path.clone()).collect()
    }
}

/// Tuning knobs for the memory system.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Maximum number of matches returned per query.
    pub max_matches: usize,
    /// Minimum score for a file to count as a match.
    pub min_score: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_matches: 10,
            min_score: 0.0,
        }
    }
}

/// Configuration for sharded retrieval.
///
/// Sharding partitions the index into token-balanced slices so each
/// matching pass works a bounded set; entries go to the least-loaded
/// shard. Token counts are estimated from character length.
#[derive(Debug, Clone)]
pub struct ShardingConfig {
    /// Target estimated token budget per shard.
    pub token_size_per_shard: usize,
    /// Upper bound on the number of shards.
    pub max_shards: usize,
    /// Chars-per-token ratio used for estimation.
    pub chars_per_token: usize,
}

impl Default for ShardingConfig {
    fn default() -> Self {
        Self {
            token_size_per_shard: 4000,
            max_shards: 8,
            chars_per_token: 4,
        }
    }
}

impl ShardingConfig {
    fn estimate_tokens(&self, text: &str) -> usize {
        text.len() / self.chars_per_token.max(1)
    }
}

/// The global metadata index and its matching front-end.
pub struct MemorySystem {
    index: RwLock<BTreeMap<String, String>>,
    shards: RwLock<Vec<BTreeMap<String, String>>>,
    sharding: RwLock<Option<ShardingConfig>>,
    config: MemoryConfig,
}

impl MemorySystem {
    /// An empty memory system with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MemoryConfig::default())
    }

    /// An empty memory system with the given configuration.
    #[must_use]
    pub fn with_config(config: MemoryConfig) -> Self {
        Self {
            index: RwLock::new(BTreeMap::new()),
            shards: RwLock::new(Vec::new()),
            sharding: RwLock::new(None),
            config,
        }
    }

    /// Merge `entries` (path → description) into the global index,
    /// overwriting descriptions for paths already present.
    pub async fn update_global_index(&self, entries: BTreeMap<String, String>) {
        {
            let mut index = self.index.write().await;
            let added = entries.len();
            index.extend(entries);
            debug!(added, total = index.len(), "updated global metadata index");
        }
        self.rebuild_shards().await;
    }

    /// Enable sharded retrieval and partition the current index.
    pub async fn enable_sharding(&self, config: ShardingConfig) {
        *self.sharding.write().await = Some(config);
        self.rebuild_shards().await;
    }

    /// Disable sharded retrieval.
    pub async fn disable_sharding(&self) {
        *self.sharding.write().await = None;
        self.shards.write().await.clear();
    }

    /// Number of shards the index is currently partitioned into; zero when
    /// sharding is disabled.
    pub async fn shard_count(&self) -> usize {
        self.shards.read().await.len()
    }

    /// Repartition the index into token-balanced shards.
    async fn rebuild_shards(&self) {
        let Some(config) = self.sharding.read().await.clone() else {
            return;
        };
        let index = self.index.read().await.clone();
        let mut shards = self.shards.write().await;
        shards.clear();
        if index.is_empty() {
            return;
        }

        let total_tokens: usize = index
            .values()
            .map(|metadata| config.estimate_tokens(metadata))
            .sum();
        let wanted = total_tokens.div_ceil(config.token_size_per_shard.max(1));
        let shard_count = wanted.clamp(1, config.max_shards.max(1));

        shards.resize_with(shard_count, BTreeMap::new);
        let mut shard_tokens = vec![0usize; shard_count];
        for (path, metadata) in index {
            let tokens = config.estimate_tokens(&metadata);
            // Least-loaded shard takes the entry.
            let target = shard_tokens
                .iter()
                .enumerate()
                .min_by_key(|(_, load)| **load)
                .map(|(i, _)| i)
                .unwrap_or(0);
            shards[target].insert(path, metadata);
            shard_tokens[target] += tokens;
        }
        debug!(shard_count, total_tokens, "rebuilt index shards");
    }

    /// A snapshot of the global index.
    pub async fn global_index(&self) -> BTreeMap<String, String> {
        self.index.read().await.clone()
    }

    /// Number of indexed paths.
    pub async fn index_len(&self) -> usize {
        self.index.read().await.len()
    }

    /// Retrieve context relevant to `input`.
    ///
    /// With `fresh_context = disabled` the inherited context is returned
    /// verbatim and no matching runs.
    pub async fn get_relevant_context_for(
        &self,
        input: &ContextGenerationInput,
    ) -> Result<AssociativeMatchResult, MemoryError> {
        if input.fresh_context == FreshContext::Disabled {
            debug!("fresh context disabled; passing inherited context through");
            return Ok(AssociativeMatchResult {
                context: input.inherited_context.clone(),
                matches: Vec::new(),
            });
        }

        let query = input.query_text();
        let shards = self.shards.read().await;
        let mut matches = if shards.is_empty() {
            let index = self.index.read().await;
            matcher::score_index(&index, &query, input.matching_strategy, self.config.min_score)
                .await?
        } else {
            // Sharded retrieval: score each slice, then merge.
            let mut merged = Vec::new();
            for shard in shards.iter() {
                merged.extend(
                    matcher::score_index(
                        shard,
                        &query,
                        input.matching_strategy,
                        self.config.min_score,
                    )
                    .await?,
                );
            }
            merged.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            merged
        };
        drop(shards);
        matches.truncate(self.config.max_matches);

        debug!(
            strategy = %input.matching_strategy,
            matched = matches.len(),
            "associative matching complete"
        );
        Ok(AssociativeMatchResult {
            context: format!(
                "Found {} relevant file(s) for: {}",
                matches.len(),
                input.template_description
            ),
            matches,
        })
    }
}

impl Default for MemorySystem {
    fn default() -> Self {
        Self::new()
    }
}
