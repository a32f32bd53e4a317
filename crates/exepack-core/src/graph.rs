//! Flat-arena project graph.
//!
//! Pages, blocks and content units live in three arenas and refer to each
//! other by [`NodeId`], never by owning pointers. All ids share one
//! namespace. Siblings are ordered by `order`, ties broken by insertion
//! sequence.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageNode {
    pub id: NodeId,
    pub title: String,
    pub parent: Option<NodeId>,
    pub order: i64,
    #[serde(default)]
    pub blocks: Vec<NodeId>,
}

impl PageNode {
    pub fn new(id: impl Into<NodeId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            parent: None,
            order: 0,
            blocks: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<NodeId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockNode {
    pub id: NodeId,
    pub page: NodeId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    pub order: i64,
    #[serde(default)]
    pub units: Vec<NodeId>,
}

impl BlockNode {
    pub fn new(id: impl Into<NodeId>, page: impl Into<NodeId>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            page: page.into(),
            kind: kind.into(),
            title: String::new(),
            order: 0,
            units: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }
}

/// The smallest authored element ("idevice").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentUnit {
    pub id: NodeId,
    pub block: NodeId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
    pub order: i64,
}

impl ContentUnit {
    pub fn new(id: impl Into<NodeId>, block: impl Into<NodeId>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            block: block.into(),
            kind: kind.into(),
            html: String::new(),
            properties: BTreeMap::new(),
            order: 0,
        }
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = html.into();
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    /// A string property, or `""` when absent or not a string.
    pub fn text(&self, key: &str) -> &str {
        self.properties
            .get(key)
            .and_then(serde_json::Value::as_str)
            .unwrap_or("")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectMeta {
    pub title: String,
    pub author: String,
    pub description: String,
    pub language: String,
    pub license: String,
    /// Prefix under which unit resources are addressed, e.g. `content/resources`.
    pub resource_base: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectGraph {
    pub meta: ProjectMeta,
    pages: Vec<PageNode>,
    blocks: Vec<BlockNode>,
    units: Vec<ContentUnit>,
    page_index: HashMap<NodeId, usize>,
    block_index: HashMap<NodeId, usize>,
    unit_index: HashMap<NodeId, usize>,
}

impl ObjectGraph {
    pub fn new(meta: ProjectMeta) -> Self {
        Self {
            meta,
            ..Self::default()
        }
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.page_index.contains_key(id)
            || self.block_index.contains_key(id)
            || self.unit_index.contains_key(id)
    }

    /// Every id in the graph, for collision checks.
    pub fn ids(&self) -> HashSet<NodeId> {
        self.page_index
            .keys()
            .chain(self.block_index.keys())
            .chain(self.unit_index.keys())
            .cloned()
            .collect()
    }

    fn ensure_new(&self, id: &NodeId) -> Result<()> {
        if self.contains(id) {
            Err(Error::DuplicateId(id.clone()))
        } else {
            Ok(())
        }
    }

    /// Insert a page. Its block list starts empty and grows via [`add_block`](Self::add_block).
    pub fn add_page(&mut self, mut page: PageNode) -> Result<()> {
        self.ensure_new(&page.id)?;
        if let Some(parent) = &page.parent {
            if !self.page_index.contains_key(parent) {
                return Err(Error::MissingParent {
                    kind: "page",
                    id: page.id.clone(),
                    parent: parent.clone(),
                });
            }
        }
        page.blocks.clear();
        self.page_index.insert(page.id.clone(), self.pages.len());
        self.pages.push(page);
        Ok(())
    }

    pub fn add_block(&mut self, mut block: BlockNode) -> Result<()> {
        self.ensure_new(&block.id)?;
        let Some(&page) = self.page_index.get(&block.page) else {
            return Err(Error::MissingParent {
                kind: "block",
                id: block.id.clone(),
                parent: block.page.clone(),
            });
        };
        block.units.clear();
        self.pages[page].blocks.push(block.id.clone());
        self.block_index.insert(block.id.clone(), self.blocks.len());
        self.blocks.push(block);
        Ok(())
    }

    pub fn add_unit(&mut self, unit: ContentUnit) -> Result<()> {
        self.ensure_new(&unit.id)?;
        let Some(&block) = self.block_index.get(&unit.block) else {
            return Err(Error::MissingParent {
                kind: "unit",
                id: unit.id.clone(),
                parent: unit.block.clone(),
            });
        };
        self.blocks[block].units.push(unit.id.clone());
        self.unit_index.insert(unit.id.clone(), self.units.len());
        self.units.push(unit);
        Ok(())
    }

    /// Re-parent a page. Rejects moves that would make it its own ancestor.
    pub fn move_page(&mut self, id: &NodeId, parent: Option<NodeId>, order: i64) -> Result<()> {
        let &index = self.page_index.get(id).ok_or_else(|| Error::NotFound {
            kind: "page",
            id: id.clone(),
        })?;
        if let Some(parent) = &parent {
            if !self.page_index.contains_key(parent) {
                return Err(Error::MissingParent {
                    kind: "page",
                    id: id.clone(),
                    parent: parent.clone(),
                });
            }
            if self.is_ancestor_or_self(id, parent) {
                return Err(Error::Cycle {
                    page: id.clone(),
                    parent: parent.clone(),
                });
            }
        }
        let page = &mut self.pages[index];
        page.parent = parent;
        page.order = order;
        Ok(())
    }

    /// Whether `ancestor` is `node` or lies on its parent chain.
    fn is_ancestor_or_self(&self, ancestor: &NodeId, node: &NodeId) -> bool {
        let mut current = Some(node);
        let mut steps = 0;
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.pages.len() {
                return true;
            }
            current = self.page(id).and_then(|p| p.parent.as_ref());
        }
        false
    }

    pub fn page(&self, id: &NodeId) -> Option<&PageNode> {
        self.page_index.get(id).map(|&i| &self.pages[i])
    }

    pub fn block(&self, id: &NodeId) -> Option<&BlockNode> {
        self.block_index.get(id).map(|&i| &self.blocks[i])
    }

    pub fn unit(&self, id: &NodeId) -> Option<&ContentUnit> {
        self.unit_index.get(id).map(|&i| &self.units[i])
    }

    pub fn unit_mut(&mut self, id: &NodeId) -> Option<&mut ContentUnit> {
        self.unit_index.get(id).map(|&i| &mut self.units[i])
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Units in insertion order.
    pub fn units(&self) -> impl Iterator<Item = &ContentUnit> {
        self.units.iter()
    }

    pub fn units_mut(&mut self) -> impl Iterator<Item = &mut ContentUnit> {
        self.units.iter_mut()
    }

    /// Child pages of `parent` (roots when `None`), sorted.
    pub fn children(&self, parent: Option<&NodeId>) -> Vec<&PageNode> {
        let mut children: Vec<(usize, &PageNode)> = self
            .pages
            .iter()
            .enumerate()
            .filter(|(_, p)| p.parent.as_ref() == parent)
            .collect();
        children.sort_by_key(|(seq, p)| (p.order, *seq));
        children.into_iter().map(|(_, p)| p).collect()
    }

    pub fn roots(&self) -> Vec<&PageNode> {
        self.children(None)
    }

    /// Blocks of a page, sorted.
    pub fn blocks_of(&self, page: &NodeId) -> Vec<&BlockNode> {
        let Some(page) = self.page(page) else {
            return Vec::new();
        };
        let mut blocks: Vec<(usize, &BlockNode)> = page
            .blocks
            .iter()
            .filter_map(|id| self.block_index.get(id).map(|&i| (i, &self.blocks[i])))
            .collect();
        blocks.sort_by_key(|(seq, b)| (b.order, *seq));
        blocks.into_iter().map(|(_, b)| b).collect()
    }

    /// Units of a block, sorted.
    pub fn units_of(&self, block: &NodeId) -> Vec<&ContentUnit> {
        let Some(block) = self.block(block) else {
            return Vec::new();
        };
        let mut units: Vec<(usize, &ContentUnit)> = block
            .units
            .iter()
            .filter_map(|id| self.unit_index.get(id).map(|&i| (i, &self.units[i])))
            .collect();
        units.sort_by_key(|(seq, u)| (u.order, *seq));
        units.into_iter().map(|(_, u)| u).collect()
    }

    /// Pre-order traversal of the page tree as `(depth, page)`.
    pub fn walk(&self) -> Vec<(usize, &PageNode)> {
        let mut out = Vec::with_capacity(self.pages.len());
        let mut stack: Vec<(usize, &PageNode)> =
            self.roots().into_iter().rev().map(|p| (0, p)).collect();
        while let Some((depth, page)) = stack.pop() {
            out.push((depth, page));
            for child in self.children(Some(&page.id)).into_iter().rev() {
                stack.push((depth + 1, child));
            }
        }
        out
    }

    fn from_repr(repr: GraphRepr) -> Result<Self> {
        let mut graph = Self::new(repr.meta);
        let mut deferred = Vec::new();
        // Parents may follow their children after a move, so insert parentless
        // first and attach the rest once every page exists.
        for page in repr.pages {
            let parent = page.parent.clone();
            let order = page.order;
            let id = page.id.clone();
            graph.add_page(PageNode {
                parent: None,
                ..page
            })?;
            if let Some(parent) = parent {
                deferred.push((id, parent, order));
            }
        }
        for (id, parent, order) in deferred {
            graph.move_page(&id, Some(parent), order)?;
        }
        for block in repr.blocks {
            graph.add_block(block)?;
        }
        for unit in repr.units {
            graph.add_unit(unit)?;
        }
        Ok(graph)
    }
}

#[derive(Serialize, Deserialize)]
struct GraphRepr {
    #[serde(default)]
    meta: ProjectMeta,
    pages: Vec<PageNode>,
    blocks: Vec<BlockNode>,
    units: Vec<ContentUnit>,
}

impl Serialize for ObjectGraph {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        GraphRepr {
            meta: self.meta.clone(),
            pages: self.pages.clone(),
            blocks: self.blocks.clone(),
            units: self.units.clone(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ObjectGraph {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let repr = GraphRepr::deserialize(deserializer)?;
        Self::from_repr(repr).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ObjectGraph {
        let mut graph = ObjectGraph::new(ProjectMeta {
            title: "Course".into(),
            ..ProjectMeta::default()
        });
        graph.add_page(PageNode::new("root", "Home")).unwrap();
        graph.add_page(PageNode::new("b", "B").with_parent("root").with_order(2)).unwrap();
        graph.add_page(PageNode::new("a", "A").with_parent("root").with_order(1)).unwrap();
        graph.add_page(PageNode::new("a2", "A2").with_parent("root").with_order(1)).unwrap();
        graph.add_block(BlockNode::new("blk", "a", "text")).unwrap();
        graph
            .add_unit(ContentUnit::new("u1", "blk", "text").with_html("<p>x</p>"))
            .unwrap();
        graph
    }

    #[test]
    fn children_sorted_by_order_then_insertion() {
        let graph = sample();
        let ids: Vec<_> = graph
            .children(Some(&"root".into()))
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(ids, ["a", "a2", "b"]);
    }

    #[test]
    fn walk_is_preorder_with_depth() {
        let graph = sample();
        let walked: Vec<_> = graph.walk().iter().map(|(d, p)| (*d, p.id.as_str())).collect();
        assert_eq!(walked, [(0, "root"), (1, "a"), (1, "a2"), (1, "b")]);
    }

    #[test]
    fn ids_are_unique_across_arenas() {
        let mut graph = sample();
        let err = graph.add_block(BlockNode::new("u1", "a", "text")).unwrap_err();
        assert!(matches!(err, Error::DuplicateId(_)));
    }

    #[test]
    fn missing_parent_rejected() {
        let mut graph = sample();
        let err = graph
            .add_page(PageNode::new("orphan", "x").with_parent("nowhere"))
            .unwrap_err();
        assert!(matches!(err, Error::MissingParent { .. }));
        assert!(graph.add_unit(ContentUnit::new("u9", "nope", "text")).is_err());
    }

    #[test]
    fn move_rejects_cycles() {
        let mut graph = sample();
        graph.add_page(PageNode::new("deep", "D").with_parent("a")).unwrap();
        let err = graph.move_page(&"root".into(), Some("deep".into()), 0).unwrap_err();
        assert!(matches!(err, Error::Cycle { .. }));
        let err = graph.move_page(&"a".into(), Some("a".into()), 0).unwrap_err();
        assert!(matches!(err, Error::Cycle { .. }));
        graph.move_page(&"deep".into(), Some("b".into()), 0).unwrap();
        assert_eq!(graph.page(&"deep".into()).unwrap().parent, Some("b".into()));
    }

    #[test]
    fn serde_round_trip_after_move() {
        let mut graph = sample();
        graph.add_page(PageNode::new("late", "L")).unwrap();
        graph.move_page(&"a".into(), Some("late".into()), 0).unwrap();
        let json = serde_json::to_string(&graph).unwrap();
        let back: ObjectGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back, graph);
        assert_eq!(back.units_of(&"blk".into())[0].html, "<p>x</p>");
    }

    #[test]
    fn deserialize_rejects_dangling_block() {
        let json = r#"{"pages":[],"blocks":[{"id":"b","page":"p","type":"text","order":0}],"units":[]}"#;
        assert!(serde_json::from_str::<ObjectGraph>(json).is_err());
    }

    #[test]
    fn unit_text_defaults_to_empty() {
        let unit = ContentUnit::new("u", "b", "text").with_property("history", "<p>h</p>");
        assert_eq!(unit.text("history"), "<p>h</p>");
        assert_eq!(unit.text("missing"), "");
    }
}
