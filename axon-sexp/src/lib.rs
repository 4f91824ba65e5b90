#![deny(missing_docs)]
//! S-expression reader for the axon workflow language.
//!
//! Parses a single top-level S-expression into a [`Node`] tree of atoms and
//! lists. The atoms `true`, `false`, and `nil` are normalized to
//! [`Node::Bool`] and [`Node::Nil`]; the quote shorthand `'X` is normalized
//! to `(quote X)` at read time so no wrapper type survives parsing.
//!
//! The [`Display`](std::fmt::Display) impl on [`Node`] renders canonical
//! text: parsing the rendered form of any node yields an equal node.

mod ast;
mod parser;

pub use ast::Node;
pub use parser::{ParseError, parse};
