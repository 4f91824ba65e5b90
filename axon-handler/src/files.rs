//! Scoped file access for the `read-files` primitive and file-context
//! resolution.

use std::path::Path;

use thiserror::Error;
use tracing::debug;

/// Errors from file access.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum FileError {
    /// The file could not be read.
    #[error("failed to read '{path}': {source}")]
    Read {
        /// The offending path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file exceeds the configured size cap.
    #[error("'{path}' is {size} bytes, over the {limit} byte limit")]
    TooLarge {
        /// The offending path.
        path: String,
        /// Actual size in bytes.
        size: u64,
        /// Configured limit in bytes.
        limit: u64,
    },
}

/// Limits applied to file reads.
#[derive(Debug, Clone)]
pub struct FileAccessConfig {
    /// Maximum size of a single file read, in bytes.
    pub max_file_bytes: u64,
}

impl Default for FileAccessConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 256 * 1024,
        }
    }
}

/// Host file access with size limits.
///
/// All reads go through this manager so the cap is applied on every path,
/// including error paths — a failed read never leaves a handle open
/// (tokio's read helpers are scoped).
#[derive(Debug, Clone, Default)]
pub struct FileAccessManager {
    config: FileAccessConfig,
}

impl FileAccessManager {
    /// A manager with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A manager with the given limits.
    #[must_use]
    pub fn with_config(config: FileAccessConfig) -> Self {
        Self { config }
    }

    /// Read one file as UTF-8 text, enforcing the size cap before reading.
    pub async fn read_file(&self, path: &str) -> Result<String, FileError> {
        let metadata = tokio::fs::metadata(path).await.map_err(|source| {
            FileError::Read {
                path: path.to_string(),
                source,
            }
        })?;
        if metadata.len() > self.config.max_file_bytes {
            return Err(FileError::TooLarge {
                path: path.to_string(),
                size: metadata.len(),
                limit: self.config.max_file_bytes,
            });
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| FileError::Read {
                path: path.to_string(),
                source,
            })?;
        debug!(path, bytes = content.len(), "read file");
        Ok(content)
    }

    /// Read several files, pairing each path with its outcome.
    pub async fn read_files(&self, paths: &[String]) -> Vec<(String, Result<String, FileError>)> {
        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            let outcome = self.read_file(path).await;
            results.push((path.clone(), outcome));
        }
        results
    }

    /// List the entries of a directory (names only, sorted).
    pub async fn list_dir(&self, path: &str) -> Result<Vec<String>, FileError> {
        let mut reader = tokio::fs::read_dir(Path::new(path))
            .await
            .map_err(|source| FileError::Read {
                path: path.to_string(),
                source,
            })?;
        let mut names = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(|source| FileError::Read {
            path: path.to_string(),
            source,
        })? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}
