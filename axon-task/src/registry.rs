//! Storage and lookup of atomic task templates.

use std::collections::HashMap;
use std::sync::Arc;

use axon_types::{TaskError, TaskTemplate};
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Default)]
struct RegistryInner {
    /// Templates keyed by name.
    templates: HashMap<String, Arc<TaskTemplate>>,
    /// Secondary index: `atomic:<subtype>` → name.
    index: HashMap<String, String>,
}

/// Registry of atomic task templates.
///
/// Registration publishes the template and its `atomic:<subtype>` index
/// entry under a single write guard, so a reader that observes the index
/// entry always observes the template.
#[derive(Default)]
pub struct TemplateRegistry {
    inner: RwLock<RegistryInner>,
}

impl TemplateRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a template.
    ///
    /// Re-registering a name overwrites the previous entry; if the subtype
    /// changed, the stale `atomic:<old-subtype>` index key is removed in the
    /// same write.
    pub async fn register(&self, template: TaskTemplate) -> Result<(), TaskError> {
        if template.template_type != "atomic" {
            return Err(TaskError::input_validation(format!(
                "template '{}' is not atomic (type: '{}'); only atomic templates can be registered",
                template.name, template.template_type
            )));
        }
        if template.name.is_empty() || template.subtype.is_empty() {
            return Err(TaskError::input_validation(
                "atomic template requires a non-empty 'name' and 'subtype'",
            ));
        }
        for (i, param) in template.params.iter().enumerate() {
            if template.params[..i].iter().any(|p| p.name == param.name) {
                return Err(TaskError::input_validation(format!(
                    "template '{}' declares duplicate parameter '{}'",
                    template.name, param.name
                )));
            }
        }
        if template.description.is_none() {
            warn!(template = %template.name, "atomic template registered without a description");
        }

        let name = template.name.clone();
        let index_key = template.index_key();

        let mut inner = self.inner.write().await;
        if inner.templates.contains_key(&name) {
            warn!(template = %name, "overwriting existing template registration");
        }
        // Drop a stale index entry left from a previous subtype.
        let stale_key = inner
            .index
            .iter()
            .find(|(key, mapped)| **mapped == name && **key != index_key)
            .map(|(key, _)| key.clone());
        if let Some(stale) = stale_key {
            warn!(template = %name, old = %stale, new = %index_key, "re-registered with new subtype");
            inner.index.remove(&stale);
        }
        inner.templates.insert(name.clone(), Arc::new(template));
        inner.index.insert(index_key.clone(), name.clone());
        info!(template = %name, key = %index_key, "registered atomic template");
        Ok(())
    }

    /// Find a template by name or `atomic:<subtype>` identifier.
    pub async fn find(&self, identifier: &str) -> Option<Arc<TaskTemplate>> {
        let inner = self.inner.read().await;
        if let Some(template) = inner.templates.get(identifier) {
            return Some(Arc::clone(template));
        }
        let name = inner.index.get(identifier)?;
        inner.templates.get(name).map(Arc::clone)
    }

    /// Whether a template is registered under this identifier.
    pub async fn contains(&self, identifier: &str) -> bool {
        self.find(identifier).await.is_some()
    }

    /// All registered templates.
    pub async fn all(&self) -> Vec<Arc<TaskTemplate>> {
        self.inner.read().await.templates.values().cloned().collect()
    }

    /// Number of registered templates.
    pub async fn len(&self) -> usize {
        self.inner.read().await.templates.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.templates.is_empty()
    }
}
