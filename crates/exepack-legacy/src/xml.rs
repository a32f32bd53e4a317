//! Minimal arena-backed XML tree.
//!
//! Only elements, attributes and text are kept; comments, processing
//! instructions and the prolog are dropped.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeRef(usize);

#[derive(Clone, Debug)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<NodeRef>,
    pub parent: Option<NodeRef>,
}

#[derive(Clone, Debug)]
pub struct XmlTree {
    nodes: Vec<XmlNode>,
    root: NodeRef,
}

impl XmlTree {
    pub fn parse(source: &str) -> Result<Self> {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text(true);

        let mut nodes: Vec<XmlNode> = Vec::new();
        let mut stack: Vec<NodeRef> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    let node = push_node(&mut nodes, &start, stack.last().copied())?;
                    root.get_or_insert(node);
                    stack.push(node);
                }
                Event::Empty(start) => {
                    let node = push_node(&mut nodes, &start, stack.last().copied())?;
                    root.get_or_insert(node);
                }
                Event::End(_) => {
                    stack.pop();
                }
                Event::Text(text) => {
                    if let Some(&current) = stack.last() {
                        let value = text
                            .unescape()
                            .map(|t| t.into_owned())
                            .unwrap_or_else(|_| String::from_utf8_lossy(&text).into_owned());
                        nodes[current.0].text.push_str(&value);
                    }
                }
                Event::CData(data) => {
                    if let Some(&current) = stack.last() {
                        nodes[current.0].text.push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(Error::Malformed("unclosed element at end of document".into()));
        }
        let root = root.ok_or_else(|| Error::Malformed("no root element".into()))?;
        Ok(Self { nodes, root })
    }

    pub fn root(&self) -> NodeRef {
        self.root
    }

    pub fn node(&self, node: NodeRef) -> &XmlNode {
        &self.nodes[node.0]
    }

    pub fn name(&self, node: NodeRef) -> &str {
        &self.nodes[node.0].name
    }

    pub fn attr(&self, node: NodeRef, key: &str) -> Option<&str> {
        self.nodes[node.0]
            .attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn children(&self, node: NodeRef) -> &[NodeRef] {
        &self.nodes[node.0].children
    }

    pub fn parent(&self, node: NodeRef) -> Option<NodeRef> {
        self.nodes[node.0].parent
    }

    pub fn next_sibling(&self, node: NodeRef) -> Option<NodeRef> {
        let siblings = self.children(self.parent(node)?);
        let index = siblings.iter().position(|&n| n == node)?;
        siblings.get(index + 1).copied()
    }

    pub fn child_named(&self, node: NodeRef, name: &str) -> Option<NodeRef> {
        self.children(node).iter().copied().find(|&c| self.name(c) == name)
    }

    /// All nodes in document order.
    pub fn iter(&self) -> impl Iterator<Item = NodeRef> + '_ {
        (0..self.nodes.len()).map(NodeRef)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn push_node(nodes: &mut Vec<XmlNode>, start: &BytesStart<'_>, parent: Option<NodeRef>) -> Result<NodeRef> {
    let name = local_name(start.name().as_ref());
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = local_name(attr.key.as_ref());
        if key == "xmlns" || key.starts_with("xmlns:") {
            continue;
        }
        let value = attr
            .unescape_value()
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
        attributes.push((key, value));
    }

    let node = NodeRef(nodes.len());
    nodes.push(XmlNode {
        name,
        attributes,
        text: String::new(),
        children: Vec::new(),
        parent,
    });
    if let Some(parent) = parent {
        nodes[parent.0].children.push(node);
    }
    Ok(node)
}

/// Element or attribute name without its namespace prefix.
fn local_name(raw: &[u8]) -> String {
    let name = String::from_utf8_lossy(raw);
    if name.starts_with("xmlns") {
        return name.into_owned();
    }
    match name.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => name.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_text() {
        let tree = XmlTree::parse(
            r#"<?xml version="1.0"?><a xmlns="urn:x" k="v"><b/><c>hi &amp; bye</c><d><![CDATA[<p>]]></d></a>"#,
        )
        .unwrap();
        let root = tree.root();
        assert_eq!(tree.name(root), "a");
        assert_eq!(tree.attr(root, "k"), Some("v"));
        assert_eq!(tree.attr(root, "xmlns"), None);
        let children = tree.children(root);
        assert_eq!(children.len(), 3);
        assert_eq!(tree.node(children[1]).text, "hi & bye");
        assert_eq!(tree.node(children[2]).text, "<p>");
        assert_eq!(tree.next_sibling(children[0]), Some(children[1]));
        assert_eq!(tree.next_sibling(children[2]), None);
    }

    #[test]
    fn attribute_entities_unescaped() {
        let tree = XmlTree::parse(r#"<unicode value="&lt;p&gt;caf&#233;&lt;/p&gt;"/>"#).unwrap();
        assert_eq!(tree.attr(tree.root(), "value"), Some("<p>café</p>"));
    }

    #[test]
    fn unclosed_document_rejected() {
        assert!(XmlTree::parse("<a><b></b>").is_err());
        assert!(XmlTree::parse("").is_err());
    }
}
