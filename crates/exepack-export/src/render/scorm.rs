use std::collections::HashMap;
use std::fmt::Write as _;

use exepack_core::{NodeId, escape_xml};

use super::html::write_site;
use super::site::Site;
use super::{emit_tree, zip_name};
use crate::format::ExportFormat;
use crate::renderer::{RenderContext, RenderResult, Rendered, Renderer};

/// Content-package dialect written into `imsmanifest.xml`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PackageFlavor {
    Scorm12,
    Scorm2004,
    Ims,
}

impl PackageFlavor {
    fn format(self) -> ExportFormat {
        match self {
            Self::Scorm12 => ExportFormat::Scorm12,
            Self::Scorm2004 => ExportFormat::Scorm2004,
            Self::Ims => ExportFormat::Ims,
        }
    }

    fn schema(self) -> (&'static str, &'static str) {
        match self {
            Self::Scorm12 => ("ADL SCORM", "1.2"),
            Self::Scorm2004 => ("ADL SCORM", "2004 3rd Edition"),
            Self::Ims => ("IMS Content", "1.1.3"),
        }
    }

    fn namespaces(self) -> &'static str {
        match self {
            Self::Scorm12 => {
                r#"xmlns="http://www.imsproject.org/xsd/imscp_rootv1p1p2" xmlns:adlcp="http://www.adlnet.org/xsd/adlcp_rootv1p2" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance""#
            }
            Self::Scorm2004 => {
                r#"xmlns="http://www.imsglobal.org/xsd/imscp_v1p1" xmlns:adlcp="http://www.adlnet.org/xsd/adlcp_v1p3" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance""#
            }
            Self::Ims => {
                r#"xmlns="http://www.imsglobal.org/xsd/imscp_v1p1" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance""#
            }
        }
    }

    fn sco_attribute(self) -> &'static str {
        match self {
            Self::Scorm12 => r#" adlcp:scormtype="sco""#,
            Self::Scorm2004 => r#" adlcp:scormType="sco""#,
            Self::Ims => "",
        }
    }
}

/// The multi-page site plus an `imsmanifest.xml`, always zipped.
pub struct ScormRenderer {
    flavor: PackageFlavor,
}

impl ScormRenderer {
    pub fn new(flavor: PackageFlavor) -> Self {
        Self { flavor }
    }
}

impl Renderer for ScormRenderer {
    fn format(&self) -> ExportFormat {
        self.flavor.format()
    }

    fn render(&self, ctx: &RenderContext<'_>) -> RenderResult<Rendered> {
        emit_tree(ctx, true, &zip_name(ctx), |out, dir| {
            write_site(ctx, out, dir)?;
            let manifest = manifest(&Site::plan(ctx.graph), self.flavor);
            out.write(&dir.join("imsmanifest.xml"), manifest.as_bytes())?;
            Ok(())
        })
    }
}

pub(crate) fn manifest(site: &Site<'_>, flavor: PackageFlavor) -> String {
    let files: HashMap<&NodeId, &str> = site
        .pages
        .iter()
        .map(|p| (&p.page.id, p.file.as_str()))
        .collect();
    let (schema, version) = flavor.schema();

    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(xml, "<manifest identifier=\"MANIFEST-{}\" version=\"1.0\" {}>", identifier(site), flavor.namespaces());
    let _ = writeln!(xml, "<metadata>\n<schema>{schema}</schema>\n<schemaversion>{version}</schemaversion>\n</metadata>");
    xml.push_str("<organizations default=\"ORG\">\n<organization identifier=\"ORG\">\n");
    let _ = writeln!(xml, "<title>{}</title>", escape_xml(site.title()));
    for root in site.graph.roots() {
        write_item(&mut xml, site, &root.id, &files);
    }
    xml.push_str("</organization>\n</organizations>\n<resources>\n");
    for page in &site.pages {
        let _ = writeln!(
            xml,
            "<resource identifier=\"RES-{}\" type=\"webcontent\"{} href=\"{}\">\n<file href=\"{}\"/>\n</resource>",
            page.page.id,
            flavor.sco_attribute(),
            page.file,
            page.file
        );
    }
    xml.push_str("</resources>\n</manifest>\n");
    xml
}

fn write_item(xml: &mut String, site: &Site<'_>, id: &NodeId, files: &HashMap<&NodeId, &str>) {
    let Some(page) = site.graph.page(id) else {
        return;
    };
    let title = if page.title.is_empty() { "Untitled" } else { &page.title };
    let _ = writeln!(
        xml,
        "<item identifier=\"ITEM-{id}\" identifierref=\"RES-{id}\" isvisible=\"true\">\n<title>{}</title>",
        escape_xml(title)
    );
    for child in site.graph.children(Some(id)) {
        if files.contains_key(&child.id) {
            write_item(xml, site, &child.id, files);
        }
    }
    xml.push_str("</item>\n");
}

fn identifier(site: &Site<'_>) -> String {
    site.pages
        .first()
        .map(|p| p.page.id.to_string())
        .unwrap_or_else(|| "EMPTY".to_string())
}

#[cfg(test)]
mod tests {
    use exepack_core::{ObjectGraph, PageNode, ProjectMeta};

    use super::*;

    fn graph() -> ObjectGraph {
        let mut graph = ObjectGraph::new(ProjectMeta {
            title: "Course".into(),
            ..ProjectMeta::default()
        });
        graph.add_page(PageNode::new("p1", "Intro")).unwrap();
        graph.add_page(PageNode::new("p2", "Part A").with_parent("p1")).unwrap();
        graph.add_page(PageNode::new("p3", "Outro").with_order(1)).unwrap();
        graph
    }

    #[test]
    fn items_nest_like_pages() {
        let graph = graph();
        let site = Site::plan(&graph);
        let xml = manifest(&site, PackageFlavor::Scorm12);
        let intro = xml.find("ITEM-p1").unwrap();
        let part = xml.find("ITEM-p2").unwrap();
        let outro = xml.find("ITEM-p3").unwrap();
        assert!(intro < part && part < outro);
        let close_after_part = xml[part..].find("</item>\n</item>").map(|i| i + part).unwrap();
        assert!(close_after_part < outro);
        assert!(xml.contains(r#"adlcp:scormtype="sco" href="html/part-a.html""#));
        assert!(xml.contains("<schemaversion>1.2</schemaversion>"));
    }

    #[test]
    fn flavors_differ() {
        let graph = graph();
        let site = Site::plan(&graph);
        let scorm2004 = manifest(&site, PackageFlavor::Scorm2004);
        assert!(scorm2004.contains("adlcp_v1p3"));
        assert!(scorm2004.contains("2004 3rd Edition"));
        let ims = manifest(&site, PackageFlavor::Ims);
        assert!(!ims.contains("adlcp"));
        assert!(ims.contains("<schema>IMS Content</schema>"));
    }
}
