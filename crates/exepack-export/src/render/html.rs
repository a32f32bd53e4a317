use std::path::Path;

use exepack_fs::Storage;

use super::site::{SITE_RESOURCES, Site, canonical, html_document};
use super::{emit_tree, zip_name};
use crate::format::ExportFormat;
use crate::renderer::{RenderContext, RenderResult, Rendered, Renderer};

/// One HTML file per page plus shared resources.
pub struct Html5Renderer;

impl Renderer for Html5Renderer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Html5
    }

    fn render(&self, ctx: &RenderContext<'_>) -> RenderResult<Rendered> {
        emit_tree(ctx, ctx.package, &zip_name(ctx), |out, dir| write_site(ctx, out, dir))
    }
}

/// Write the multi-page site below `dir`. Shared with the package formats.
pub(crate) fn write_site(ctx: &RenderContext<'_>, out: &dyn Storage, dir: &Path) -> RenderResult<()> {
    let site = Site::plan(ctx.graph);
    for (index, page) in site.pages.iter().enumerate() {
        let prefix = page.root_prefix();
        let nav = site.nav(Some(index), |target| format!("{prefix}{}", target.file));
        let mut main = format!("<h2>{}</h2>\n", exepack_core::escape_xml(page.title()));
        main.push_str(&site.page_content(page.page, &format!("{prefix}{SITE_RESOURCES}")));
        let html = html_document(&site, page.title(), canonical(ctx.base_url, &page.file), &nav, &main);
        out.write(&dir.join(&page.file), html.as_bytes())?;
    }
    if site.pages.is_empty() {
        let html = html_document(&site, site.title(), canonical(ctx.base_url, "index.html"), "", "");
        out.write(&dir.join("index.html"), html.as_bytes())?;
    }
    site.copy_resources(ctx.resources, out, &dir.join(SITE_RESOURCES))?;
    tracing::debug!(pages = site.pages.len(), dir = %dir.display(), "site written");
    Ok(())
}

/// Every page as a section of one `index.html`.
pub struct SinglePageRenderer;

impl Renderer for SinglePageRenderer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Html5SinglePage
    }

    fn render(&self, ctx: &RenderContext<'_>) -> RenderResult<Rendered> {
        emit_tree(ctx, ctx.package, &zip_name(ctx), |out, dir| {
            let site = Site::plan(ctx.graph);
            let nav = site.nav(None, |page| format!("#{}", page.slug));
            let mut main = String::new();
            for page in &site.pages {
                main.push_str(&format!(
                    "<section class=\"page\" id=\"{}\">\n<h2>{}</h2>\n",
                    page.slug,
                    exepack_core::escape_xml(page.title())
                ));
                main.push_str(&site.page_content(page.page, SITE_RESOURCES));
                main.push_str("</section>\n");
            }
            let html = html_document(&site, site.title(), canonical(ctx.base_url, "index.html"), &nav, &main);
            out.write(&dir.join("index.html"), html.as_bytes())?;
            site.copy_resources(ctx.resources, out, &dir.join(SITE_RESOURCES))?;
            Ok(())
        })
    }
}
