//! xmlquery: an XPath query layer over parsed XML and HTML trees.
//!
//! This library loads a document from bytes or a string, exposes its node
//! tree through lightweight [`Element`] handles, and runs XPath 3.1
//! expressions against any node. Namespace prefixes referenced by a query
//! are discovered automatically from the document's own declarations, so
//! `//ns:item` works without registering `ns` by hand.
//!
//! Parsing and query evaluation are delegated to external engines: `xot`
//! stores the tree and parses XML strictly, `tree-sitter-html` recovers a
//! best-effort tree from malformed HTML, and `xee-xpath` evaluates the
//! expressions.
//!
//! ```no_run
//! use xmlquery::{Document, DocumentKind};
//!
//! let doc = Document::from_bytes(
//!     br#"<a xmlns:ns="urn:x"><ns:b/><ns:b/></a>"#,
//!     DocumentKind::Xml,
//!     "utf-8",
//! )?;
//! let items = doc.select_elements("//ns:b")?;
//! assert_eq!(items.len(), 2);
//! # Ok::<(), xmlquery::Error>(())
//! ```
//!
//! All handles onto one document share a single reference-counted tree and
//! are neither `Send` nor `Sync`; concurrent use must be serialized by the
//! caller.

pub mod document;
pub mod element;
pub mod encoding;
mod html;
pub mod xpath;

pub use document::{Document, DocumentKind};
pub use element::{Attribute, Attributes, Children, Element};
pub use xpath::XPathValue;

use thiserror::Error;

/// Errors surfaced by document construction and query evaluation.
///
/// Absence during navigation (missing child, missing attribute, nameless
/// node) is never an error; those operations return `Option` instead.
#[derive(Error, Debug)]
pub enum Error {
    /// The encoding label is not a recognized charset name.
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),
    /// The input bytes are malformed for the named encoding.
    #[error("input is not valid {0}")]
    Decode(String),
    /// The string contains characters the named encoding cannot represent.
    #[error("string is not representable in {0}")]
    Encode(String),
    /// The parser could not produce a tree.
    #[error("failed to parse document: {0}")]
    Parse(String),
    /// The parse produced a tree without a root element.
    #[error("document has no root element")]
    NoRootElement,
    /// The XPath expression failed to compile.
    #[error("failed to compile xpath: {0}")]
    XPathCompile(String),
    /// The XPath expression failed during evaluation.
    #[error("failed to execute xpath: {0}")]
    XPathExecute(String),
    /// A query referenced a namespace prefix with no discoverable binding.
    ///
    /// Register the binding explicitly with
    /// [`Document::register_default_namespace`] to resolve it.
    #[error("unresolved namespace prefix: {0}")]
    UnresolvedPrefix(String),
}
