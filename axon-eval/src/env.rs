//! Lexically scoped environment frames.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::value::Value;

struct Frame {
    bindings: RwLock<HashMap<String, Value>>,
    parent: Option<Env>,
}

/// A lexical scope mapping symbols to values, chained to an optional
/// parent.
///
/// Frames are shared: a closure holds its definition environment, and
/// mutations through `set!` are observed by every holder. The parent chain
/// is acyclic by construction — frames only ever point outward, and
/// nothing holds a back-reference.
#[derive(Clone)]
pub struct Env {
    frame: Arc<Frame>,
}

impl Env {
    /// A new root environment with no parent.
    #[must_use]
    pub fn root() -> Self {
        Self {
            frame: Arc::new(Frame {
                bindings: RwLock::new(HashMap::new()),
                parent: None,
            }),
        }
    }

    /// A fresh child frame with the given initial bindings. The receiver is
    /// the parent and is never mutated.
    #[must_use]
    pub fn extend(&self, bindings: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            frame: Arc::new(Frame {
                bindings: RwLock::new(bindings.into_iter().collect()),
                parent: Some(self.clone()),
            }),
        }
    }

    /// Look up `name`, walking the parent chain; `None` when unbound.
    pub async fn lookup(&self, name: &str) -> Option<Value> {
        let mut current = Some(self.clone());
        while let Some(env) = current {
            if let Some(value) = env.frame.bindings.read().await.get(name) {
                return Some(value.clone());
            }
            current = env.frame.parent.clone();
        }
        None
    }

    /// Define or redefine `name` in *this* frame, shadowing any parent
    /// binding.
    pub async fn define(&self, name: impl Into<String>, value: Value) {
        self.frame.bindings.write().await.insert(name.into(), value);
    }

    /// Mutate the nearest existing binding of `name` anywhere up the chain.
    /// Returns `false` when no frame binds it.
    pub async fn set(&self, name: &str, value: Value) -> bool {
        let mut current = Some(self.clone());
        while let Some(env) = current {
            let mut bindings = env.frame.bindings.write().await;
            if let Some(slot) = bindings.get_mut(name) {
                *slot = value;
                return true;
            }
            drop(bindings);
            current = env.frame.parent.clone();
        }
        false
    }

    /// Whether `name` is bound in this frame (ignoring ancestors).
    pub async fn binds_locally(&self, name: &str) -> bool {
        self.frame.bindings.read().await.contains_key(name)
    }
}
