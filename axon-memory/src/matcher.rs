//! Term-overlap scoring over the metadata index.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{MatchEntry, MemoryError};

/// How candidate files are scored against the query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchingStrategy {
    /// Score against the indexed description and the path itself.
    #[default]
    Metadata,
    /// Score against the file's text content.
    Content,
}

impl MatchingStrategy {
    /// Parse the wire form `"content"` / `"metadata"`.
    pub fn parse(s: &str) -> Result<Self, MemoryError> {
        match s {
            "content" => Ok(Self::Content),
            "metadata" => Ok(Self::Metadata),
            other => Err(MemoryError::UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for MatchingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metadata => f.write_str("metadata"),
            Self::Content => f.write_str("content"),
        }
    }
}

/// Score every indexed path against `query`, returning matches above
/// `min_score` sorted best-first.
pub(crate) async fn score_index(
    index: &BTreeMap<String, String>,
    query: &str,
    strategy: MatchingStrategy,
    min_score: f64,
) -> Result<Vec<MatchEntry>, MemoryError> {
    let terms = terms_of(query);
    if terms.is_empty() {
        return Ok(Vec::new());
    }

    let mut matches = Vec::new();
    for (path, description) in index {
        let haystack = match strategy {
            MatchingStrategy::Metadata => format!("{path} {description}").to_lowercase(),
            MatchingStrategy::Content => match tokio::fs::read_to_string(path).await {
                Ok(text) => text.to_lowercase(),
                Err(error) => {
                    // An unreadable file is not fatal to the whole query;
                    // skip it and keep matching the rest of the index.
                    warn!(path = %path, %error, "skipping unreadable file in content matching");
                    continue;
                }
            },
        };

        let hits = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
        let score = hits as f64 / terms.len() as f64;
        if hits > 0 && score > min_score {
            matches.push(MatchEntry {
                path: path.clone(),
                relevance: format!("matched {hits}/{} query terms", terms.len()),
                score: Some(score),
            });
        }
    }

    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(matches)
}

/// Lowercased alphanumeric query terms, short noise words dropped.
fn terms_of(query: &str) -> Vec<String> {
    query
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|t| t.len() >= 3)
        .map(str::to_lowercase)
        .collect()
}
