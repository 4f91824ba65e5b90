#![deny(missing_docs)]
//! Atomic task templates and their executor.
//!
//! A [`TemplateRegistry`] stores [`TaskTemplate`](axon_types::TaskTemplate)
//! records under their name and an `atomic:<subtype>` secondary index. The
//! [`TaskSystem`] resolves a [`SubtaskRequest`](axon_types::SubtaskRequest)
//! against the registry, merges context-management settings, resolves file
//! paths, and drives the [`AtomicTaskExecutor`] — parameter binding,
//! `{{param}}` substitution, the LLM call, and output post-processing.

mod executor;
mod registry;
mod system;

pub use executor::{AtomicTaskExecutor, bind_parameters, substitute_params};
pub use registry::TemplateRegistry;
pub use system::{TaskMatch, TaskSystem};
