//! Document loading and the shared tree owner.

use std::cell::RefCell;
use std::rc::Rc;

use xot::Xot;

use crate::element::Element;
use crate::encoding;
use crate::html;
use crate::xpath::XPathValue;
use crate::Error;

/// How input bytes are turned into a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Strict parsing; malformed input fails construction.
    Xml,
    /// Lenient, recovering parsing; a best-effort tree is always attempted.
    Html,
}

/// The tree owner: the single holder of one parsed tree.
///
/// Exactly one instance exists per constructed document. It is dropped
/// exactly once, when the last `Document` or `Element` handle referencing it
/// goes away.
pub(crate) struct DocumentInner {
    pub(crate) xot: Xot,
    /// The document node wrapping the whole tree.
    pub(crate) doc_node: xot::Node,
    /// The document element. Always present on a constructed document.
    pub(crate) root: xot::Node,
    pub(crate) kind: DocumentKind,
    pub(crate) encoding: String,
    pub(crate) data: Vec<u8>,
}

/// A loaded XML or HTML document.
///
/// `Document` is a cheap handle; cloning it shares the underlying tree. The
/// tree is immutable except for [`Document::register_default_namespace`],
/// [`Element::unlink`] and the namespace persistence described in
/// [`crate::xpath`]; any such mutation is immediately visible through every
/// other handle onto the same tree.
///
/// Handles are single-threaded by construction (`Rc`-based sharing makes
/// them neither `Send` nor `Sync`); callers needing cross-thread access must
/// serialize it externally.
#[derive(Clone)]
pub struct Document {
    pub(crate) inner: Rc<RefCell<DocumentInner>>,
}

impl Document {
    /// Load a document from raw bytes.
    ///
    /// The encoding label is resolved to a charset first. XML mode decodes
    /// and parses strictly; HTML mode decodes leniently and recovers a
    /// best-effort tree from malformed markup. Both modes discard
    /// whitespace-only text nodes. Construction fails when no tree with a
    /// root element can be produced.
    pub fn from_bytes(bytes: &[u8], kind: DocumentKind, encoding: &str) -> Result<Document, Error> {
        let text = match kind {
            DocumentKind::Xml => encoding::decode(bytes, encoding)?,
            DocumentKind::Html => encoding::decode_lossy(bytes, encoding)?,
        };

        let mut xot = Xot::new();
        let doc_node = match kind {
            DocumentKind::Xml => xot.parse(&text).map_err(|e| Error::Parse(e.to_string()))?,
            DocumentKind::Html => html::parse_into(&mut xot, &text)?,
        };
        let root = xot
            .document_element(doc_node)
            .map_err(|_| Error::NoRootElement)?;
        strip_blank_text(&mut xot, doc_node);

        Ok(Document {
            inner: Rc::new(RefCell::new(DocumentInner {
                xot,
                doc_node,
                root,
                kind,
                encoding: encoding.to_string(),
                data: bytes.to_vec(),
            })),
        })
    }

    /// Load a document from a string.
    ///
    /// The string is encoded to bytes with the named encoding first (failing
    /// on unmappable characters), then handed to [`Document::from_bytes`].
    pub fn from_string(text: &str, kind: DocumentKind, encoding: &str) -> Result<Document, Error> {
        let bytes = encoding::encode(text, encoding)?;
        Document::from_bytes(&bytes, kind, encoding)
    }

    /// The document's root element.
    pub fn root_element(&self) -> Element {
        let root = self.inner.borrow().root;
        Element {
            doc: self.clone(),
            node: root,
        }
    }

    /// Register a namespace binding on the root node, visible to the whole
    /// document and to every subsequent query.
    pub fn register_default_namespace(&self, uri: &str, prefix: &str) {
        let mut inner = self.inner.borrow_mut();
        let root = inner.root;
        let prefix_id = inner.xot.add_prefix(prefix);
        let ns_id = inner.xot.add_namespace(uri);
        inner.xot.namespaces_mut(root).insert(prefix_id, ns_id);
    }

    /// Evaluate an XPath expression against the root element and return the
    /// matching elements. See [`Element::select_elements`].
    pub fn select_elements(&self, xpath: &str) -> Result<Vec<Element>, Error> {
        self.root_element().select_elements(xpath)
    }

    /// Like [`Document::select_elements`], returning only the first match.
    pub fn select_first_element(&self, xpath: &str) -> Result<Option<Element>, Error> {
        self.root_element().select_first_element(xpath)
    }

    /// Evaluate an XPath function expression against the root element. See
    /// [`Element::evaluate`].
    pub fn evaluate(&self, xpath: &str) -> Result<Option<XPathValue>, Error> {
        self.root_element().evaluate(xpath)
    }

    /// How this document was parsed.
    pub fn kind(&self) -> DocumentKind {
        self.inner.borrow().kind
    }

    /// The encoding label the document was constructed with.
    pub fn encoding(&self) -> String {
        self.inner.borrow().encoding.clone()
    }

    /// The raw bytes the document was constructed from.
    pub fn data(&self) -> Vec<u8> {
        self.inner.borrow().data.clone()
    }
}

/// Detach every whitespace-only text node, mirroring a discard-blanks parse.
fn strip_blank_text(xot: &mut Xot, doc_node: xot::Node) {
    let mut blank = Vec::new();
    let mut stack = vec![doc_node];
    while let Some(node) = stack.pop() {
        for child in xot.children(node) {
            if let Some(text) = xot.text_str(child) {
                if text.chars().all(char::is_whitespace) {
                    blank.push(child);
                }
                continue;
            }
            stack.push(child);
        }
    }
    for node in blank {
        let _ = xot.detach(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construct_xml() {
        let doc = Document::from_bytes(b"<root><item/></root>", DocumentKind::Xml, "utf-8").unwrap();
        assert_eq!(doc.root_element().tag().as_deref(), Some("root"));
        assert_eq!(doc.kind(), DocumentKind::Xml);
    }

    #[test]
    fn test_construct_xml_malformed_fails() {
        let result = Document::from_bytes(b"<root><unclosed></root>", DocumentKind::Xml, "utf-8");
        assert!(result.is_err());
    }

    #[test]
    fn test_construct_html_recovers() {
        let bytes = b"<div><p>one<p>two</div>";
        assert!(Document::from_bytes(bytes, DocumentKind::Xml, "utf-8").is_err());
        let doc = Document::from_bytes(bytes, DocumentKind::Html, "utf-8").unwrap();
        assert_eq!(doc.root_element().tag().as_deref(), Some("div"));
    }

    #[test]
    fn test_construct_html_without_elements_fails() {
        let result = Document::from_bytes(b"just text", DocumentKind::Html, "utf-8");
        assert!(result.is_err());
    }

    #[test]
    fn test_construct_from_string() {
        let doc = Document::from_string("<a><b/></a>", DocumentKind::Xml, "utf-8").unwrap();
        assert_eq!(doc.root_element().tag().as_deref(), Some("a"));
        assert_eq!(doc.data(), b"<a><b/></a>".to_vec());
    }

    #[test]
    fn test_construct_from_string_unencodable_fails() {
        let result = Document::from_string("<a>\u{30ab}</a>", DocumentKind::Xml, "ISO-8859-1");
        assert!(matches!(result, Err(Error::Encode(_))));
    }

    #[test]
    fn test_construct_latin1_bytes() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"<a>caf\xE9</a>");
        let doc = Document::from_bytes(&bytes, DocumentKind::Xml, "ISO-8859-1").unwrap();
        assert_eq!(
            doc.root_element().content().as_deref(),
            Some("caf\u{e9}")
        );
    }

    #[test]
    fn test_unknown_encoding_fails() {
        let result = Document::from_bytes(b"<a/>", DocumentKind::Xml, "no-such-charset");
        assert!(matches!(result, Err(Error::UnsupportedEncoding(_))));
    }

    #[test]
    fn test_blank_text_discarded() {
        let doc = Document::from_bytes(b"<a> <b/> </a>", DocumentKind::Xml, "utf-8").unwrap();
        let children: Vec<_> = doc.root_element().children().unwrap().collect();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].tag().as_deref(), Some("b"));
    }

    #[test]
    fn test_shared_tree_clone() {
        let doc = Document::from_bytes(b"<a><b/></a>", DocumentKind::Xml, "utf-8").unwrap();
        let other = doc.clone();
        let child = doc.root_element().first_child().unwrap();
        child.unlink();
        assert!(other.root_element().children().is_none());
    }

    #[test]
    fn test_round_trip_root_tag() {
        let doc = Document::from_bytes(b"<root a=\"1\"><b/></root>", DocumentKind::Xml, "utf-8").unwrap();
        let raw = doc.root_element().raw_content().unwrap();
        let reparsed = Document::from_string(&raw, DocumentKind::Xml, "utf-8").unwrap();
        assert_eq!(
            reparsed.root_element().tag(),
            doc.root_element().tag()
        );
    }
}
