//! Structural queries over the legacy serialized object tree.
//!
//! The legacy serializer writes every object as
//! `<instance class="…" reference="N"><dictionary>…</dictionary></instance>`
//! where each dictionary field is a `<string role="key" value="name"/>`
//! followed by its value node. Objects seen earlier are written again as
//! `<reference key="N"/>`.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::xml::{NodeRef, XmlTree};

/// Parsed legacy document with its `reference` index.
#[derive(Debug)]
pub struct LegacyDocument {
    tree: XmlTree,
    references: HashMap<String, NodeRef>,
}

impl LegacyDocument {
    pub fn parse(source: &str) -> Result<Self> {
        let tree = XmlTree::parse(source)?;
        if tree.name(tree.root()) != "instance" {
            return Err(Error::Malformed(format!(
                "expected <instance> root, found <{}>",
                tree.name(tree.root())
            )));
        }
        let references = tree
            .iter()
            .filter(|&n| tree.name(n) == "instance")
            .filter_map(|n| tree.attr(n, "reference").map(|r| (r.to_string(), n)))
            .collect();
        Ok(Self { tree, references })
    }

    pub fn tree(&self) -> &XmlTree {
        &self.tree
    }

    pub fn root(&self) -> NodeRef {
        self.tree.root()
    }

    /// Follow `<reference key="N"/>` to the instance it points at.
    pub fn resolve(&self, node: NodeRef) -> NodeRef {
        if self.tree.name(node) == "reference" {
            if let Some(target) = self
                .tree
                .attr(node, "key")
                .and_then(|key| self.references.get(key))
            {
                return *target;
            }
        }
        node
    }

    /// Last segment of an instance's class path, e.g. `FreeTextIdevice`.
    pub fn class_name(&self, node: NodeRef) -> Option<&str> {
        let node = self.resolve(node);
        let class = self.tree.attr(node, "class")?;
        Some(class.rsplit('.').next().unwrap_or(class))
    }

    pub fn is_instance(&self, node: NodeRef) -> bool {
        self.tree.name(self.resolve(node)) == "instance"
    }

    /// Value node of dictionary field `key` on an instance or dictionary.
    pub fn field(&self, node: NodeRef, key: &str) -> Option<NodeRef> {
        let node = self.resolve(node);
        let dictionary = match self.tree.name(node) {
            "dictionary" => node,
            _ => self.tree.child_named(node, "dictionary")?,
        };
        self.tree
            .children(dictionary)
            .iter()
            .copied()
            .find(|&c| {
                self.tree.name(c) == "string"
                    && self.tree.attr(c, "role") == Some("key")
                    && self.tree.attr(c, "value") == Some(key)
            })
            .and_then(|k| self.tree.next_sibling(k))
            .map(|v| self.resolve(v))
    }

    /// Field names of an instance, in document order.
    pub fn field_names(&self, node: NodeRef) -> Vec<&str> {
        let node = self.resolve(node);
        let Some(dictionary) = self.tree.child_named(node, "dictionary") else {
            return Vec::new();
        };
        self.tree
            .children(dictionary)
            .iter()
            .filter(|&&c| self.tree.name(c) == "string" && self.tree.attr(c, "role") == Some("key"))
            .filter_map(|&c| self.tree.attr(c, "value"))
            .collect()
    }

    /// Items of a `<list>` (or `<tuple>`), references resolved.
    pub fn items(&self, node: NodeRef) -> Vec<NodeRef> {
        let node = self.resolve(node);
        match self.tree.name(node) {
            "list" | "tuple" => self
                .tree
                .children(node)
                .iter()
                .map(|&c| self.resolve(c))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Scalar text of a `unicode`/`string`/`int`/`bool` node.
    ///
    /// `none` yields `None`. Long strings may carry their value as element
    /// text instead of the `value` attribute.
    pub fn scalar(&self, node: NodeRef) -> Option<String> {
        let node = self.resolve(node);
        match self.tree.name(node) {
            "unicode" | "string" | "int" | "bool" | "float" => Some(
                self.tree
                    .attr(node, "value")
                    .map(str::to_string)
                    .unwrap_or_else(|| self.tree.node(node).text.clone()),
            ),
            _ => None,
        }
    }

    /// Text of a field holding either a scalar or a text-field instance.
    pub fn text(&self, node: NodeRef, key: &str) -> Option<String> {
        let value = self.field(node, key)?;
        self.scalar(value).or_else(|| self.field_content(value))
    }

    /// Content of a legacy field object (`TextAreaField`, `TextField`, …),
    /// preferring the variant with resource paths.
    pub fn field_content(&self, field: NodeRef) -> Option<String> {
        if !self.is_instance(field) {
            return None;
        }
        ["content_w_resourcePaths", "content", "_content"]
            .into_iter()
            .find_map(|key| self.field(field, key).and_then(|v| self.scalar(v)))
    }

    /// Every nested `*Field` instance reachable from `node` that carries text,
    /// in document order.
    pub fn text_fields(&self, node: NodeRef) -> Vec<(String, String)> {
        let mut out = Vec::new();
        self.collect_text_fields(self.resolve(node), &mut out, 0);
        out
    }

    fn collect_text_fields(&self, node: NodeRef, out: &mut Vec<(String, String)>, depth: usize) {
        // Legacy trees nest deeply only through back references, which are
        // never followed here.
        if depth > 32 {
            return;
        }
        for &child in self.tree.children(node) {
            if self.tree.name(child) == "instance" {
                let class = self.class_name(child).unwrap_or_default();
                if class.ends_with("TextAreaField") || class.ends_with("TextField") {
                    if let Some(content) = self.field_content(child).filter(|c| !c.trim().is_empty()) {
                        out.push((class.to_string(), content));
                    }
                    continue;
                }
            }
            self.collect_text_fields(child, out, depth + 1);
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Step {
    Field(String),
    Instance(String),
    Items,
}

/// Chain of "named field → typed instance" steps.
///
/// ```
/// use exepack_legacy::{LegacyDocument, Query};
///
/// let doc = LegacyDocument::parse(r#"
///   <instance class="exe.engine.package.Package" reference="1"><dictionary>
///     <string role="key" value="_root"/>
///     <instance class="exe.engine.node.Node" reference="2"><dictionary>
///       <string role="key" value="_title"/><unicode value="Home"/>
///     </dictionary></instance>
///   </dictionary></instance>"#).unwrap();
/// let root = Query::new().field("_root").instance("Node").first(&doc, doc.root());
/// assert_eq!(doc.text(root.unwrap(), "_title").as_deref(), Some("Home"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
    steps: Vec<Step>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: impl Into<String>) -> Self {
        self.steps.push(Step::Field(key.into()));
        self
    }

    /// Keep only instances whose class name ends with `class`.
    pub fn instance(mut self, class: impl Into<String>) -> Self {
        self.steps.push(Step::Instance(class.into()));
        self
    }

    /// Fan out over list items.
    pub fn items(mut self) -> Self {
        self.steps.push(Step::Items);
        self
    }

    pub fn all(&self, doc: &LegacyDocument, from: NodeRef) -> Vec<NodeRef> {
        let mut current = vec![doc.resolve(from)];
        for step in &self.steps {
            current = match step {
                Step::Field(key) => current.iter().filter_map(|&n| doc.field(n, key)).collect(),
                Step::Instance(class) => current
                    .into_iter()
                    .filter(|&n| doc.class_name(n).is_some_and(|c| c.ends_with(class.as_str())))
                    .collect(),
                Step::Items => current.iter().flat_map(|&n| doc.items(n)).collect(),
            };
            if current.is_empty() {
                break;
            }
        }
        current
    }

    pub fn first(&self, doc: &LegacyDocument, from: NodeRef) -> Option<NodeRef> {
        self.all(doc, from).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<instance xmlns="http://www.exelearning.org/content/v0.3" class="exe.engine.package.Package" reference="1">
<dictionary>
<string role="key" value="_title"/><unicode value="Course"/>
<string role="key" value="_root"/>
<instance class="exe.engine.node.Node" reference="2"><dictionary>
  <string role="key" value="_title"/><unicode value="Home"/>
  <string role="key" value="idevices"/>
  <list>
    <instance class="exe.engine.freetextidevice.FreeTextIdevice" reference="3"><dictionary>
      <string role="key" value="content"/>
      <instance class="exe.engine.field.TextAreaField" reference="4"><dictionary>
        <string role="key" value="content_w_resourcePaths"/><unicode value="&lt;p&gt;hi&lt;/p&gt;"/>
      </dictionary></instance>
    </dictionary></instance>
  </list>
  <string role="key" value="parent"/><none/>
</dictionary></instance>
<string role="key" value="currentNode"/><reference key="2"/>
</dictionary>
</instance>"#;

    #[test]
    fn field_and_reference_resolution() {
        let doc = LegacyDocument::parse(DOC).unwrap();
        let root = doc.root();
        assert_eq!(doc.text(root, "_title").as_deref(), Some("Course"));
        let current = doc.field(root, "currentNode").unwrap();
        assert_eq!(doc.class_name(current), Some("Node"));
        assert_eq!(doc.field(root, "_root"), Some(current));
        assert!(doc.field(root, "missing").is_none());
        assert_eq!(doc.field_names(current), ["_title", "idevices", "parent"]);
    }

    #[test]
    fn query_chain_reaches_text_area() {
        let doc = LegacyDocument::parse(DOC).unwrap();
        let fields = Query::new()
            .field("_root")
            .field("idevices")
            .items()
            .instance("FreeTextIdevice")
            .field("content")
            .instance("TextAreaField")
            .all(&doc, doc.root());
        assert_eq!(fields.len(), 1);
        assert_eq!(doc.field_content(fields[0]).as_deref(), Some("<p>hi</p>"));
    }

    #[test]
    fn wrong_class_filters_everything() {
        let doc = LegacyDocument::parse(DOC).unwrap();
        let none = Query::new()
            .field("_root")
            .field("idevices")
            .items()
            .instance("ImageGalleryIdevice")
            .all(&doc, doc.root());
        assert!(none.is_empty());
    }

    #[test]
    fn text_fields_found_recursively() {
        let doc = LegacyDocument::parse(DOC).unwrap();
        let idevice = Query::new().field("_root").field("idevices").items().first(&doc, doc.root());
        let fields = doc.text_fields(idevice.unwrap());
        assert_eq!(fields, [("TextAreaField".to_string(), "<p>hi</p>".to_string())]);
    }

    #[test]
    fn non_instance_root_rejected() {
        assert!(matches!(LegacyDocument::parse("<ode/>"), Err(Error::Malformed(_))));
    }
}
