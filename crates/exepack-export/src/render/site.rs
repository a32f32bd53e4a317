//! Page planning and HTML generation shared by the site-based renderers.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;

use exepack_core::rewrite::CUSTOM_DIR;
use exepack_core::{ContentUnit, ObjectGraph, PageNode, escape_xml, is_generated_id, map_references, rebase};
use exepack_fs::{Storage, copy_tree};
use exepack_legacy::{CASE_STUDY, TEXT};

use crate::renderer::RenderResult;

/// Where resources live inside a published site.
pub(crate) const SITE_RESOURCES: &str = "content/resources";

const UNTITLED: &str = "Untitled";

/// One page with its published file name.
#[derive(Debug)]
pub(crate) struct SitePage<'g> {
    pub page: &'g PageNode,
    pub depth: usize,
    pub slug: String,
    /// Path relative to the site root, `/`-separated.
    pub file: String,
}

impl SitePage<'_> {
    pub fn title(&self) -> &str {
        if self.page.title.is_empty() { UNTITLED } else { &self.page.title }
    }

    /// Relative path from this page back to the site root.
    pub fn root_prefix(&self) -> &'static str {
        if self.file.contains('/') { "../" } else { "" }
    }
}

/// The page tree in reading order. The first page becomes `index.html`,
/// every other page `html/<slug>.html`.
#[derive(Debug)]
pub(crate) struct Site<'g> {
    pub graph: &'g ObjectGraph,
    pub pages: Vec<SitePage<'g>>,
}

impl<'g> Site<'g> {
    pub fn plan(graph: &'g ObjectGraph) -> Self {
        let mut used = HashSet::new();
        let pages = graph
            .walk()
            .into_iter()
            .enumerate()
            .map(|(index, (depth, page))| {
                let slug = unique_slug(&page.title, &mut used);
                let file = if index == 0 {
                    "index.html".to_string()
                } else {
                    format!("html/{slug}.html")
                };
                SitePage {
                    page,
                    depth,
                    slug,
                    file,
                }
            })
            .collect();
        Self { graph, pages }
    }

    pub fn title(&self) -> &str {
        let title = self.graph.meta.title.as_str();
        if title.is_empty() { UNTITLED } else { title }
    }

    pub fn language(&self) -> &str {
        let language = self.graph.meta.language.as_str();
        if language.is_empty() { "en" } else { language }
    }

    /// Blocks and units of `page`, with resource references pointing at
    /// `resource_dir`.
    pub fn page_content(&self, page: &PageNode, resource_dir: &str) -> String {
        let mut html = String::new();
        for block in self.graph.blocks_of(&page.id) {
            let _ = writeln!(
                html,
                r#"<section class="block" id="{}" data-type="{}">"#,
                block.id,
                escape_xml(&block.kind)
            );
            if !block.title.is_empty() {
                let _ = writeln!(html, "<h3>{}</h3>", escape_xml(&block.title));
            }
            for unit in self.graph.units_of(&block.id) {
                let body = self.relink(&unit_html(unit), resource_dir);
                let _ = writeln!(
                    html,
                    r#"<div class="unit {}" id="{}">{body}</div>"#,
                    escape_xml(&unit.kind),
                    unit.id
                );
            }
            html.push_str("</section>\n");
        }
        html
    }

    /// Flat navigation list; `href` maps a page to its link target.
    pub fn nav(&self, current: Option<usize>, href: impl Fn(&SitePage<'_>) -> String) -> String {
        let mut html = String::from("<nav id=\"siteNav\">\n<ul>\n");
        for (index, page) in self.pages.iter().enumerate() {
            let active = if current == Some(index) { " active" } else { "" };
            let _ = writeln!(
                html,
                r#"<li class="depth-{}{active}"><a href="{}">{}</a></li>"#,
                page.depth,
                href(page),
                escape_xml(page.title())
            );
        }
        html.push_str("</ul>\n</nav>\n");
        html
    }

    /// Point staged resource references at `target`.
    pub fn relink(&self, html: &str, target: &str) -> String {
        let base = self.graph.meta.resource_base.as_str();
        map_references(html, |reference| {
            if base.is_empty() && !is_staged(reference) {
                return reference.to_string();
            }
            rebase(reference, base, target).into_owned()
        })
    }

    /// Copy the whole resources area below `dir` on `out`.
    pub fn copy_resources(&self, resources: &dyn Storage, out: &dyn Storage, dir: &Path) -> RenderResult<usize> {
        let copied = copy_tree(resources, Path::new(""), out, dir)?;
        tracing::debug!(copied, dir = %dir.display(), "resources copied");
        Ok(copied)
    }
}

/// Relative-mode references start with an owner id or the custom area.
fn is_staged(reference: &str) -> bool {
    reference
        .split_once('/')
        .is_some_and(|(head, _)| head == CUSTOM_DIR || is_generated_id(head))
}

/// The unit body, including fields kept outside the main HTML.
pub(crate) fn unit_html(unit: &ContentUnit) -> String {
    let mut html = unit.html.clone();
    match unit.kind.as_str() {
        TEXT => {
            let feedback = unit.text("textFeedbackTextarea");
            if !feedback.is_empty() {
                let _ = write!(html, r#"<div class="feedback">{feedback}</div>"#);
            }
        }
        CASE_STUDY => {
            let activities = unit
                .properties
                .get("activities")
                .and_then(serde_json::Value::as_array);
            for activity in activities.into_iter().flatten() {
                let text = |key: &str| activity.get(key).and_then(serde_json::Value::as_str).unwrap_or("");
                let _ = write!(html, r#"<div class="activity">{}"#, text("activity"));
                if !text("feedback").is_empty() {
                    let _ = write!(html, r#"<div class="feedback">{}</div>"#, text("feedback"));
                }
                html.push_str("</div>");
            }
        }
        _ => {}
    }
    html
}

pub(crate) fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() { "page".to_string() } else { slug.to_string() }
}

fn unique_slug(title: &str, used: &mut HashSet<String>) -> String {
    let base = slugify(title);
    let mut slug = base.clone();
    let mut n = 2;
    while !used.insert(slug.clone()) {
        slug = format!("{base}-{n}");
        n += 1;
    }
    slug
}

/// An HTML5 page around `main`.
pub(crate) fn html_document(
    site: &Site<'_>,
    title: &str,
    canonical: Option<String>,
    nav: &str,
    main: &str,
) -> String {
    let mut html = String::new();
    let _ = writeln!(html, "<!DOCTYPE html>\n<html lang=\"{}\">\n<head>", escape_xml(site.language()));
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    let _ = writeln!(html, "<title>{} | {}</title>", escape_xml(title), escape_xml(site.title()));
    if let Some(href) = canonical {
        let _ = writeln!(html, "<link rel=\"canonical\" href=\"{}\">", escape_xml(&href));
    }
    let meta = &site.graph.meta;
    if !meta.author.is_empty() {
        let _ = writeln!(html, "<meta name=\"author\" content=\"{}\">", escape_xml(&meta.author));
    }
    if !meta.description.is_empty() {
        let _ = writeln!(html, "<meta name=\"description\" content=\"{}\">", escape_xml(&meta.description));
    }
    html.push_str("</head>\n<body>\n");
    let _ = writeln!(html, "<header><h1>{}</h1></header>", escape_xml(site.title()));
    html.push_str(nav);
    let _ = writeln!(html, "<main>\n{main}</main>");
    if !meta.license.is_empty() {
        let _ = writeln!(html, "<footer><p class=\"license\">{}</p></footer>", escape_xml(&meta.license));
    }
    html.push_str("</body>\n</html>\n");
    html
}

/// `base_url` joined with a site-relative file.
pub(crate) fn canonical(base_url: Option<&str>, file: &str) -> Option<String> {
    base_url.map(|base| format!("{}/{file}", base.trim_end_matches('/')))
}
