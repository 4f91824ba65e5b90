#![deny(missing_docs)]
//! The axon S-expression evaluator.
//!
//! Interprets parsed workflow programs: literals, lexical symbol lookup,
//! special forms (`if`, `let`, `bind`, `set!`, `progn`, `quote`, `lambda`,
//! `defatom`, `loop`, `and`, `or`, `director-evaluator-loop`,
//! `iterative-loop`), primitives, and application of closures, atomic
//! tasks, and direct tools.
//!
//! Truthiness is uniform: only `false` and `nil` are falsey; `0`, `""`,
//! and `()` are truthy.
//!
//! The evaluator is single-threaded and synchronous relative to one
//! request; the only suspension points are LLM calls and tool I/O.

mod env;
mod error;
mod evaluator;
mod forms;
mod loops;
mod primitives;
mod value;

pub use env::Env;
pub use error::EvalError;
pub use evaluator::SexpEvaluator;
pub use value::{Closure, NativeCallable, TaskHandle, Value};

/// Boxed future type used for recursive evaluation.
pub type BoxFuture<'a, T> = futures_util::future::BoxFuture<'a, T>;
