//! XPath 3.1 evaluation with automatic namespace prefix discovery.
//!
//! Queries run against a transient per-call context: the current state of
//! the document tree is serialized and loaded into a fresh `xee-xpath`
//! `Documents`, the expression is evaluated there, and node results are
//! mapped back onto the shared tree by document-order position. The context
//! is released on every exit path.
//!
//! Before evaluation, every namespace prefix the expression references is
//! resolved against the document's own declarations (context node first,
//! then the root, then the whole tree). A binding found only on a
//! descendant is persisted onto the root so later queries resolve it
//! directly.

mod engine;
mod prefix;

pub(crate) use engine::{evaluate, select_elements};

/// A scalar XPath result.
#[derive(Debug, Clone, PartialEq)]
pub enum XPathValue {
    Boolean(bool),
    Number(f64),
    String(String),
}
