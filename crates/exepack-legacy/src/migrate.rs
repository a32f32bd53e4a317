use std::collections::HashSet;

use exepack_core::{
    BlockNode, ContentUnit, IdGenerator, NodeId, ObjectGraph, PageNode, ProjectMeta, Reference,
    RewriteMode, escape_xml, rewrite, rewrite_html,
};
use serde::Serialize;
use serde_json::Value;

use crate::encoding::decode_document;
use crate::error::{Error, Result};
use crate::idevice::{Extracted, Handler, Payload, Skip};
use crate::query::LegacyDocument;
use crate::xml::NodeRef;

#[derive(Clone, Debug)]
pub struct MigrationOptions {
    pub session_base: String,
    pub mode: RewriteMode,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            session_base: exepack_core::DEFAULT_SESSION_BASE.to_string(),
            mode: RewriteMode::Session,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MigrationWarning {
    /// Legacy class or page title the warning is about.
    pub context: String,
    pub message: String,
}

/// A resource reference found in migrated content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResourceRef {
    pub owner: NodeId,
    /// The reference as written in the legacy document.
    pub original: String,
    /// Target path inside the resources area.
    pub staged: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct MigrationReport {
    pub encoding: String,
    pub pages: usize,
    pub units: usize,
    pub skipped: usize,
    pub warnings: Vec<MigrationWarning>,
    pub referenced: Vec<ResourceRef>,
    pub missing: Vec<ResourceRef>,
}

impl MigrationReport {
    pub(crate) fn warn(&mut self, context: impl Into<String>, message: impl Into<String>) {
        let warning = MigrationWarning {
            context: context.into(),
            message: message.into(),
        };
        tracing::warn!(context = %warning.context, "{}", warning.message);
        self.warnings.push(warning);
    }

    pub fn referenced_paths(&self) -> Vec<&str> {
        self.referenced.iter().map(|r| r.original.as_str()).collect()
    }
}

#[derive(Debug)]
pub struct Migration {
    pub graph: ObjectGraph,
    pub report: MigrationReport,
}

/// Convert a legacy `contentv3.xml` document into an object graph.
///
/// Ids are drawn from `generator` against a set scoped to this call. Units
/// that cannot be migrated are skipped with a warning; only an unusable
/// document root fails the whole run.
pub fn migrate(bytes: &[u8], options: &MigrationOptions, generator: &mut IdGenerator) -> Result<Migration> {
    let decoded = decode_document(bytes);
    let doc = LegacyDocument::parse(&decoded.text)?;

    let mut migrator = Migrator {
        doc: &doc,
        options,
        generator,
        ids: HashSet::new(),
        visited: HashSet::new(),
        report: MigrationReport {
            encoding: decoded.encoding.to_string(),
            ..MigrationReport::default()
        },
        graph: ObjectGraph::new(ProjectMeta::default()),
    };
    if decoded.had_errors {
        migrator
            .report
            .warn("document", format!("invalid {} sequences replaced", decoded.encoding));
    }

    migrator.graph.meta = migrator.meta();
    let root = doc
        .field(doc.root(), "_root")
        .filter(|&n| doc.class_name(n).is_some_and(|c| c.ends_with("Node")))
        .ok_or_else(|| Error::Malformed("package has no root node".into()))?;
    migrator.visit_page(root, None, 0)?;

    let Migrator { graph, report, .. } = migrator;
    tracing::info!(
        pages = report.pages,
        units = report.units,
        skipped = report.skipped,
        warnings = report.warnings.len(),
        "legacy document migrated"
    );
    Ok(Migration { graph, report })
}

struct Migrator<'a> {
    doc: &'a LegacyDocument,
    options: &'a MigrationOptions,
    generator: &'a mut IdGenerator,
    ids: HashSet<NodeId>,
    visited: HashSet<NodeRef>,
    report: MigrationReport,
    graph: ObjectGraph,
}

impl Migrator<'_> {
    fn meta(&self) -> ProjectMeta {
        let root = self.doc.root();
        let text = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| self.doc.text(root, k))
                .unwrap_or_default()
        };
        ProjectMeta {
            title: text(&["_title", "title"]),
            author: text(&["_author", "author"]),
            description: text(&["_description", "description"]),
            language: text(&["_lang", "lang"]),
            license: text(&["license", "_license"]),
            resource_base: match self.options.mode {
                RewriteMode::Session => self.options.session_base.clone(),
                RewriteMode::Relative => String::new(),
            },
        }
    }

    fn next_id(&mut self) -> NodeId {
        self.generator.generate_into(&mut self.ids)
    }

    fn visit_page(&mut self, node: NodeRef, parent: Option<NodeId>, order: i64) -> Result<()> {
        if !self.visited.insert(node) {
            self.report.warn("page", "page reachable twice, ignoring repeat");
            return Ok(());
        }
        let title = self
            .doc
            .text(node, "_title")
            .or_else(|| self.doc.text(node, "title"))
            .unwrap_or_default();
        let id = self.next_id();
        let mut page = PageNode::new(id.clone(), title.clone()).with_order(order);
        page.parent = parent;
        self.graph.add_page(page)?;
        self.report.pages += 1;

        let idevices = self
            .doc
            .field(node, "idevices")
            .map(|l| self.doc.items(l))
            .unwrap_or_default();
        for (index, idevice) in idevices.into_iter().enumerate() {
            self.visit_idevice(idevice, &id, &title, index as i64)?;
        }

        let children = self
            .doc
            .field(node, "children")
            .map(|l| self.doc.items(l))
            .unwrap_or_default();
        for (index, child) in children.into_iter().enumerate() {
            if !self.doc.is_instance(child) {
                self.report.warn(&title, "child page is not an object, skipped");
                continue;
            }
            self.visit_page(child, Some(id.clone()), index as i64)?;
        }
        Ok(())
    }

    fn visit_idevice(&mut self, node: NodeRef, page: &NodeId, page_title: &str, order: i64) -> Result<()> {
        let class = self.doc.class_name(node).unwrap_or("<untyped>").to_string();
        let handler = Handler::for_class(&class);
        let extracted = match handler.extract(self.doc, node) {
            Ok(extracted) => extracted,
            Err(skip) => {
                self.report.skipped += 1;
                let reason = match skip {
                    Skip::NoPayload => "no recognizable content".to_string(),
                    Skip::Malformed(reason) => reason,
                };
                self.report
                    .warn(&class, format!("idevice on page '{page_title}' skipped: {reason}"));
                return Ok(());
            }
        };
        if handler == Handler::Generic {
            self.report
                .warn(&class, "unsupported idevice class, text content migrated as a text unit");
        }
        for field in &extracted.missing {
            self.report
                .warn(&class, format!("field '{field}' missing, left empty"));
        }

        let block_id = self.next_id();
        let unit_id = self.next_id();
        let kind = extracted.kind;
        let title = extracted.title.clone();
        let unit = self.build_unit(handler, extracted, &unit_id, &block_id);

        self.graph.add_block(
            BlockNode::new(block_id, page.clone(), kind)
                .with_title(title)
                .with_order(order),
        )?;
        self.graph.add_unit(unit)?;
        self.report.units += 1;
        Ok(())
    }

    fn build_unit(&mut self, handler: Handler, extracted: Extracted, id: &NodeId, block: &NodeId) -> ContentUnit {
        let mut referenced = Vec::new();
        let mut unit = ContentUnit::new(id.clone(), block.clone(), extracted.kind);
        for (key, payload) in extracted.fields {
            let value = self.convert(payload, id, &mut referenced);
            unit.properties.insert(key, value);
        }
        unit.html = match handler.primary_field() {
            Some(field) => unit.text(field).to_string(),
            None => gallery_html(&unit),
        };

        for original in referenced {
            let staged = Reference::classify(&original)
                .staged_path(id.as_str())
                .unwrap_or_else(|| original.clone());
            self.report.referenced.push(ResourceRef {
                owner: id.clone(),
                original,
                staged,
            });
        }
        unit
    }

    fn convert(&self, payload: Payload, owner: &NodeId, referenced: &mut Vec<String>) -> Value {
        let base = &self.options.session_base;
        let mode = self.options.mode;
        match payload {
            Payload::Html(html) => {
                let rewritten = rewrite_html(&html, base, owner.as_str(), mode);
                for reference in rewritten.referenced {
                    note(referenced, reference);
                }
                Value::String(rewritten.html)
            }
            Payload::Text(text) => Value::String(escape_xml(&text)),
            Payload::Resource(path) => {
                let rewritten = rewrite(&path, base, owner.as_str(), mode);
                if Reference::classify(&path).is_resource() {
                    note(referenced, path);
                }
                Value::String(rewritten)
            }
            Payload::List(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| {
                        Value::Object(
                            item.into_iter()
                                .map(|(k, v)| (k, self.convert(v, owner, referenced)))
                                .collect(),
                        )
                    })
                    .collect(),
            ),
        }
    }
}

fn note(referenced: &mut Vec<String>, reference: String) {
    if !referenced.contains(&reference) {
        referenced.push(reference);
    }
}

fn gallery_html(unit: &ContentUnit) -> String {
    let mut html = String::from("<div class=\"image-gallery\">");
    let images = unit
        .properties
        .get("images")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for image in images {
        let field = |key: &str| image.get(key).and_then(Value::as_str).unwrap_or("");
        html.push_str(&format!(
            "<figure><img src=\"{}\" alt=\"{}\"/><figcaption>{}</figcaption></figure>",
            escape_xml(field("src")),
            field("caption"),
            field("caption"),
        ));
    }
    html.push_str("</div>");
    html
}
