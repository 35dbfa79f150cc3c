//! Query execution against a transient `xee-xpath` context.

use xee_xpath::context::StaticContextBuilder;
use xee_xpath::{Documents, Queries, Query};
use xot::Xot;

use crate::document::DocumentInner;
use crate::element::Element;
use crate::xpath::{prefix, XPathValue};
use crate::Error;

/// Evaluate `xpath` with `element` as the context node; return matching
/// elements of the shared tree in document order.
pub(crate) fn select_elements(element: &Element, xpath: &str) -> Result<Vec<Element>, Error> {
    let bindings = resolve_namespaces(element, xpath)?;
    let (xml, path) = serialize_context(element)?;
    let wrapped = format!("({path})/({xpath})");

    let (documents, sequence) = execute(&bindings, &xml, &wrapped)?;

    // Map result nodes back onto the shared tree by document-order element
    // position; the query ran against a serialized copy.
    let copy_xot = documents.xot();
    let mut copy_elements: Option<Vec<xot::Node>> = None;
    let mut positions = Vec::new();
    for item in sequence.iter() {
        let xee_xpath::Item::Node(node) = item else {
            continue;
        };
        if copy_xot.element(node).is_none() {
            continue;
        }
        let elements = copy_elements.get_or_insert_with(|| {
            elements_in_document_order(copy_xot, top_node(copy_xot, node))
        });
        if let Some(position) = elements.iter().position(|&n| n == node) {
            positions.push(position);
        }
    }
    if positions.is_empty() {
        return Ok(Vec::new());
    }

    let own_elements = {
        let inner = element.doc.inner.borrow();
        elements_in_document_order(&inner.xot, inner.root)
    };
    let mut results = Vec::new();
    for position in positions {
        if let Some(&node) = own_elements.get(position) {
            results.push(Element {
                doc: element.doc.clone(),
                node,
            });
        }
    }
    Ok(results)
}

/// Evaluate `xpath` with `element` as the context node and classify the
/// result as a scalar value.
pub(crate) fn evaluate(element: &Element, xpath: &str) -> Result<Option<XPathValue>, Error> {
    let bindings = resolve_namespaces(element, xpath)?;
    let (xml, path) = serialize_context(element)?;

    // Classify inside the expression itself so only a string crosses the
    // engine boundary, tagged with the original type.
    let probe = format!(
        "let $r := (({path})/({xpath})) return \
         if ($r instance of xs:boolean) then concat('b:', string($r)) \
         else if ($r instance of xs:numeric) then concat('n:', string($r)) \
         else if ($r instance of xs:string) then concat('s:', $r) \
         else 'o:'"
    );

    let (_documents, sequence) = execute(&bindings, &xml, &probe)?;
    for item in sequence.iter() {
        if let xee_xpath::Item::Atomic(atomic) = item {
            let tagged = atomic
                .to_string()
                .map_err(|e| Error::XPathExecute(e.to_string()))?;
            return Ok(decode_tagged(&tagged));
        }
    }
    Ok(None)
}

/// Resolve every namespace prefix `xpath` references to a binding from the
/// document, per the discovery order described in [`crate::xpath`].
fn resolve_namespaces(element: &Element, xpath: &str) -> Result<Vec<(String, String)>, Error> {
    let prefixes = prefix::referenced_prefixes(xpath);
    if prefixes.is_empty() {
        return Ok(Vec::new());
    }

    let mut bindings: Vec<(String, String)> = Vec::new();
    let mut discovered: Vec<(String, String)> = Vec::new();
    {
        let inner = element.doc.inner.borrow();
        let xot = &inner.xot;

        // Every declaration on the context node itself applies, referenced
        // or not.
        collect_declarations(xot, element.node, &mut bindings);

        let mut remaining: Vec<String> = prefixes
            .into_iter()
            .filter(|p| bindings.iter().all(|(bound, _)| bound != p))
            .collect();

        if !remaining.is_empty() && element.node != inner.root {
            let mut root_bindings = Vec::new();
            collect_declarations(xot, inner.root, &mut root_bindings);
            remaining.retain(|p| {
                match root_bindings.iter().find(|(bound, _)| bound == p) {
                    Some((_, uri)) => {
                        bindings.push((p.clone(), uri.clone()));
                        false
                    }
                    None => true,
                }
            });
        }

        // Last resort: search the whole tree. A hit is persisted onto the
        // root below so the next query resolves it without the walk.
        for prefix in remaining {
            match declared_uri(xot, inner.doc_node, &prefix) {
                Some(uri) => {
                    bindings.push((prefix.clone(), uri.clone()));
                    discovered.push((prefix, uri));
                }
                None => return Err(Error::UnresolvedPrefix(prefix)),
            }
        }
    }

    if !discovered.is_empty() {
        let mut inner = element.doc.inner.borrow_mut();
        let root = inner.root;
        for (prefix, uri) in discovered {
            let prefix_id = inner.xot.add_prefix(&prefix);
            let ns_id = inner.xot.add_namespace(&uri);
            inner.xot.namespaces_mut(root).insert(prefix_id, ns_id);
        }
    }

    Ok(bindings)
}

/// The prefixed namespace declarations carried directly on `node`.
fn collect_declarations(xot: &Xot, node: xot::Node, out: &mut Vec<(String, String)>) {
    for (prefix_id, ns_id) in xot.namespaces(node).iter() {
        let prefix = xot.prefix_str(prefix_id);
        // A default-namespace declaration has no prefix to resolve.
        if prefix.is_empty() {
            continue;
        }
        if out.iter().any(|(bound, _)| bound.as_str() == prefix) {
            continue;
        }
        out.push((prefix.to_string(), xot.namespace_str(*ns_id).to_string()));
    }
}

/// Search the whole tree for a declaration of `prefix`.
fn declared_uri(xot: &Xot, top: xot::Node, prefix: &str) -> Option<String> {
    let mut stack = vec![top];
    while let Some(node) = stack.pop() {
        for (prefix_id, ns_id) in xot.namespaces(node).iter() {
            if xot.prefix_str(prefix_id) == prefix {
                return Some(xot.namespace_str(*ns_id).to_string());
            }
        }
        for child in xot.children(node) {
            stack.push(child);
        }
    }
    None
}

/// Serialize the current tree and compute the positional path addressing
/// the context node inside it.
fn serialize_context(element: &Element) -> Result<(String, String), Error> {
    let inner = element.doc.inner.borrow();
    let xml = inner
        .xot
        .to_string(inner.root)
        .map_err(|e| Error::XPathExecute(e.to_string()))?;
    let path = context_path(&inner, element.node);
    Ok((xml, path))
}

/// A positional path (`/*`, `/*/*[2]`, ...) selecting the context node in
/// the serialized copy. Stable across serialization because only element
/// positions are counted.
fn context_path(inner: &DocumentInner, node: xot::Node) -> String {
    let xot = &inner.xot;
    let mut steps = Vec::new();
    let mut current = node;

    // A non-element context node is addressed by its position among all of
    // its parent's children.
    if xot.element(current).is_none() {
        if let Some(parent) = xot.parent(current) {
            let position = xot
                .children(parent)
                .position(|c| c == current)
                .unwrap_or(0)
                + 1;
            steps.push(format!("node()[{position}]"));
            current = parent;
        }
    }

    while current != inner.root {
        let Some(parent) = xot.parent(current) else {
            break;
        };
        let position = xot
            .children(parent)
            .filter(|&c| xot.element(c).is_some())
            .position(|c| c == current)
            .unwrap_or(0)
            + 1;
        steps.push(format!("*[{position}]"));
        current = parent;
    }

    let mut path = String::from("/*");
    for step in steps.iter().rev() {
        path.push('/');
        path.push_str(step);
    }
    path
}

/// Compile and run one expression against a fresh query context.
fn execute(
    bindings: &[(String, String)],
    xml: &str,
    expression: &str,
) -> Result<(Documents, xee_xpath::Sequence), Error> {
    let mut builder = StaticContextBuilder::default();
    for (prefix, uri) in bindings {
        builder.add_namespace(prefix, uri);
    }
    let queries = Queries::new(builder);
    let query = queries
        .sequence(expression)
        .map_err(|e| Error::XPathCompile(e.to_string()))?;

    let mut documents = Documents::new();
    let handle = documents
        .add_string("file:///query".try_into().unwrap(), xml)
        .map_err(|e| Error::XPathExecute(e.to_string()))?;
    let sequence = query
        .execute(&mut documents, handle)
        .map_err(|e| Error::XPathExecute(e.to_string()))?;
    Ok((documents, sequence))
}

fn top_node(xot: &Xot, mut node: xot::Node) -> xot::Node {
    while let Some(parent) = xot.parent(node) {
        node = parent;
    }
    node
}

/// Every element node under `top` in preorder, which is document order.
fn elements_in_document_order(xot: &Xot, top: xot::Node) -> Vec<xot::Node> {
    let mut elements = Vec::new();
    let mut stack = vec![top];
    while let Some(node) = stack.pop() {
        if xot.element(node).is_some() {
            elements.push(node);
        }
        let children: Vec<xot::Node> = xot.children(node).collect();
        for child in children.into_iter().rev() {
            stack.push(child);
        }
    }
    elements
}

fn decode_tagged(tagged: &str) -> Option<XPathValue> {
    if let Some(rest) = tagged.strip_prefix("b:") {
        Some(XPathValue::Boolean(rest == "true"))
    } else if let Some(rest) = tagged.strip_prefix("n:") {
        Some(XPathValue::Number(parse_xpath_number(rest)))
    } else if let Some(rest) = tagged.strip_prefix("s:") {
        Some(XPathValue::String(rest.to_string()))
    } else {
        None
    }
}

/// Parse a number in XPath's string form, which spells the specials as
/// `INF`, `-INF`, and `NaN`.
fn parse_xpath_number(text: &str) -> f64 {
    match text {
        "INF" => f64::INFINITY,
        "-INF" => f64::NEG_INFINITY,
        "NaN" => f64::NAN,
        _ => text.parse().unwrap_or(f64::NAN),
    }
}
