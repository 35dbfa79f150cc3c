//! Element handles and lazy navigation over the shared tree.

use std::fmt;
use std::rc::Rc;

use crate::document::{Document, DocumentKind};
use crate::xpath::{self, XPathValue};
use crate::Error;

/// A position in a document's tree.
///
/// An `Element` is a cheap handle: a clone of the document's shared ownership
/// plus a node id. It never owns tree memory, and any number of handles may
/// name the same position. A handle keeps the whole tree alive for as long as
/// it exists, even after [`Element::unlink`].
///
/// Handles may also wrap non-element nodes (text, comments) reached through
/// navigation; [`Element::tag`] is `None` for those.
#[derive(Clone)]
pub struct Element {
    pub(crate) doc: Document,
    pub(crate) node: xot::Node,
}

/// An attribute as `(name, value)` in declaration order.
pub type Attribute = (String, Option<String>);

impl Element {
    fn wrap(&self, node: xot::Node) -> Element {
        Element {
            doc: self.doc.clone(),
            node,
        }
    }

    /// The local name of this element, or `None` for non-element nodes.
    pub fn tag(&self) -> Option<String> {
        let inner = self.doc.inner.borrow();
        let element = inner.xot.element(self.node)?;
        Some(inner.xot.local_name_str(element.name()).to_string())
    }

    /// The recursive text content of this node and its descendants.
    pub fn content(&self) -> Option<String> {
        let inner = self.doc.inner.borrow();
        Some(inner.xot.string_value(self.node))
    }

    /// This node serialized as markup, including its own tag.
    ///
    /// Text nodes return their content directly. `None` if serialization
    /// fails. Serialization is XML-mode for both document kinds; HTML
    /// documents are not re-serialized with HTML rules (void elements, raw
    /// text), so the output is well-formed XML markup of the tree.
    pub fn raw_content(&self) -> Option<String> {
        let inner = self.doc.inner.borrow();
        if let Some(text) = inner.xot.text_str(self.node) {
            return Some(text.to_string());
        }
        inner.xot.to_string(self.node).ok()
    }

    /// The serialized markup of every direct child concatenated, with
    /// surrounding whitespace trimmed. `None` when the node has no children.
    pub fn inner_raw_content(&self) -> Option<String> {
        let children = self.children()?;
        let mut markup = String::new();
        for child in children {
            if let Some(raw) = child.raw_content() {
                markup.push_str(&raw);
            }
        }
        Some(markup.trim().to_string())
    }

    /// The parent node, or `None` at the document root.
    pub fn parent(&self) -> Option<Element> {
        let parent = {
            let inner = self.doc.inner.borrow();
            let parent = inner.xot.parent(self.node)?;
            if inner.xot.is_document(parent) {
                return None;
            }
            parent
        };
        Some(self.wrap(parent))
    }

    /// The first direct child, or `None` for a childless node.
    pub fn first_child(&self) -> Option<Element> {
        let child = self.doc.inner.borrow().xot.first_child(self.node)?;
        Some(self.wrap(child))
    }

    /// The child at position `index` in document order, or `None` out of
    /// range.
    pub fn child_at(&self, index: usize) -> Option<Element> {
        let child = self.doc.inner.borrow().xot.children(self.node).nth(index)?;
        Some(self.wrap(child))
    }

    /// The previous sibling, or `None` at the front.
    pub fn prev_sibling(&self) -> Option<Element> {
        let sibling = self.doc.inner.borrow().xot.previous_sibling(self.node)?;
        Some(self.wrap(sibling))
    }

    /// The next sibling, or `None` at the end.
    pub fn next_sibling(&self) -> Option<Element> {
        let sibling = self.doc.inner.borrow().xot.next_sibling(self.node)?;
        Some(self.wrap(sibling))
    }

    /// A lazy iterator over direct children in document order, or `None`
    /// when the node has no children at all.
    pub fn children(&self) -> Option<Children> {
        let first = self.doc.inner.borrow().xot.first_child(self.node)?;
        Some(Children {
            doc: self.doc.clone(),
            next: Some(first),
        })
    }

    /// A lazy iterator over this element's attributes in declaration order,
    /// or `None` when it carries none.
    pub fn attributes(&self) -> Option<Attributes> {
        let names: Vec<xot::NameId> = {
            let inner = self.doc.inner.borrow();
            inner
                .xot
                .attributes(self.node)
                .iter()
                .map(|(name_id, _)| name_id)
                .collect()
        };
        if names.is_empty() {
            return None;
        }
        Some(Attributes {
            doc: self.doc.clone(),
            node: self.node,
            names: names.into_iter(),
        })
    }

    /// The value of the attribute with the given local name, ignoring
    /// namespaces.
    pub fn attribute_value(&self, name: &str) -> Option<String> {
        let inner = self.doc.inner.borrow();
        for (name_id, value) in inner.xot.attributes(self.node).iter() {
            if inner.xot.local_name_str(name_id) == name {
                return Some(value.to_string());
            }
        }
        None
    }

    /// The value of the attribute with the given local name in the given
    /// namespace URI.
    pub fn attribute_value_ns(&self, name: &str, namespace: &str) -> Option<String> {
        let inner = self.doc.inner.borrow();
        for (name_id, value) in inner.xot.attributes(self.node).iter() {
            let (local, uri) = inner.xot.name_ns_str(name_id);
            if local == name && uri == namespace {
                return Some(value.to_string());
            }
        }
        None
    }

    /// The document this element belongs to.
    pub fn document(&self) -> Document {
        self.doc.clone()
    }

    /// How the owning document was parsed.
    pub fn kind(&self) -> DocumentKind {
        self.doc.kind()
    }

    /// Detach this node (and its subtree) from the document.
    ///
    /// The removal is immediately visible through every other handle on the
    /// same tree. The node's memory is not released; handles onto the
    /// detached subtree stay valid, and the tree itself lives until the last
    /// handle drops.
    pub fn unlink(&self) {
        let mut inner = self.doc.inner.borrow_mut();
        let _ = inner.xot.detach(self.node);
    }

    /// Evaluate an XPath expression with this node as the context node and
    /// return the matching elements in document order.
    ///
    /// Namespace prefixes used in the expression are resolved automatically
    /// from the document's own declarations; a prefix with no discoverable
    /// binding yields [`Error::UnresolvedPrefix`]. Non-node results and
    /// non-element nodes are dropped from the result.
    pub fn select_elements(&self, xpath: &str) -> Result<Vec<Element>, Error> {
        xpath::select_elements(self, xpath)
    }

    /// Like [`Element::select_elements`], returning only the first match.
    pub fn select_first_element(&self, xpath: &str) -> Result<Option<Element>, Error> {
        Ok(xpath::select_elements(self, xpath)?.into_iter().next())
    }

    /// Evaluate an XPath expression that produces a value rather than nodes,
    /// such as `count(//item)` or `string(@id)`.
    ///
    /// Booleans, numbers, and strings come back as the matching
    /// [`XPathValue`]; any other result yields `None`.
    pub fn evaluate(&self, xpath: &str) -> Result<Option<XPathValue>, Error> {
        xpath::evaluate(self, xpath)
    }
}

impl PartialEq for Element {
    /// Two handles are equal when they name the same position in the same
    /// tree.
    fn eq(&self, other: &Element) -> bool {
        Rc::ptr_eq(&self.doc.inner, &other.doc.inner) && self.node == other.node
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("tag", &self.tag())
            .finish()
    }
}

/// Lazy iterator over an element's direct children in document order.
///
/// Keeps the underlying tree alive while it exists. Unlinking the node the
/// iterator is about to yield does not disturb traversal already past it.
pub struct Children {
    doc: Document,
    next: Option<xot::Node>,
}

impl Iterator for Children {
    type Item = Element;

    fn next(&mut self) -> Option<Element> {
        let node = self.next?;
        self.next = self.doc.inner.borrow().xot.next_sibling(node);
        Some(Element {
            doc: self.doc.clone(),
            node,
        })
    }
}

/// Lazy iterator over an element's attributes in declaration order.
pub struct Attributes {
    doc: Document,
    node: xot::Node,
    names: std::vec::IntoIter<xot::NameId>,
}

impl Iterator for Attributes {
    type Item = Attribute;

    fn next(&mut self) -> Option<Attribute> {
        let name_id = self.names.next()?;
        let inner = self.doc.inner.borrow();
        let name = inner.xot.local_name_str(name_id).to_string();
        let value = inner
            .xot
            .attributes(self.node)
            .get(name_id)
            .map(|v| v.to_string());
        Some((name, value))
    }
}
