use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::Utc;
use exepack_archive::{Compression, create_archive};
use exepack_core::escape_xml;
use exepack_fs::Storage;
use once_cell::sync::Lazy;
use regex::Regex;

use super::site::{Site, SitePage};
use super::{package_with, write_options};
use crate::format::ExportFormat;
use crate::renderer::{RenderContext, RenderResult, Rendered, Renderer};

static VOID_ELEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)<(area|base|br|col|embed|hr|img|input|link|meta|param|source|track|wbr)\b((?:[^>\x22']|\x22[^\x22]*\x22|'[^']*')*?)\s*/?>",
    )
    .unwrap()
});

const MIMETYPE: &[u8] = b"application/epub+zip";
const CONTAINER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
<rootfiles>
<rootfile full-path="EPUB/package.opf" media-type="application/oebps-package+xml"/>
</rootfiles>
</container>
"#;

/// EPUB 3 book with one XHTML document per page.
///
/// `mimetype` is the first entry and stored uncompressed, as reading
/// systems require. Unit HTML passes through [`to_xhtml`] so content
/// documents stay well-formed.
pub struct EpubRenderer;

impl Renderer for EpubRenderer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Epub3
    }

    fn render(&self, ctx: &RenderContext<'_>) -> RenderResult<Rendered> {
        let dir = PathBuf::from("epub3-book");
        let built = build_book(ctx, &dir);
        let stored = built.and_then(|()| {
            let mut handle = create_archive(ctx.scratch_dir, write_options(ctx))?;
            package_with(&mut handle, ctx, &format!("{}.epub", ctx.name), |handle| {
                handle.add_bytes(Path::new("mimetype"), MIMETYPE, Compression::Stored)?;
                handle.add_directory(ctx.scratch, &dir)
            })
        });
        if let Err(e) = ctx.scratch.remove(&dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to remove book build directory");
        }
        Ok(Rendered::Package(stored?))
    }
}

fn build_book(ctx: &RenderContext<'_>, dir: &Path) -> RenderResult<()> {
    let out = ctx.scratch;
    let site = Site::plan(ctx.graph);
    let content = dir.join("EPUB");

    out.write(&dir.join("META-INF/container.xml"), CONTAINER.as_bytes())?;
    for page in &site.pages {
        let body = to_xhtml(&site.page_content(page.page, "resources"));
        out.write(&content.join(xhtml_name(page)), xhtml(&site, page.title(), &body).as_bytes())?;
    }
    out.write(&content.join("nav.xhtml"), nav(&site).as_bytes())?;
    site.copy_resources(ctx.resources, out, &content.join("resources"))?;

    let resources: Vec<String> = ctx
        .resources
        .walk_files(Path::new(""))?
        .into_iter()
        .filter_map(|entry| entry.path.to_str().map(|p| p.replace('\\', "/")))
        .collect();
    out.write(&content.join("package.opf"), package_opf(&site, &resources).as_bytes())?;
    Ok(())
}

fn xhtml_name(page: &SitePage<'_>) -> String {
    format!("{}.xhtml", page.slug)
}

fn xhtml(site: &Site<'_>, title: &str, body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE html>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\" xml:lang=\"{lang}\" lang=\"{lang}\">\n\
         <head>\n<meta charset=\"utf-8\"/>\n<title>{title}</title>\n</head>\n\
         <body>\n<h1>{title}</h1>\n{body}</body>\n</html>\n",
        lang = escape_xml(site.language()),
        title = escape_xml(title),
    )
}

fn nav(site: &Site<'_>) -> String {
    let mut list = String::from("<nav epub:type=\"toc\" id=\"toc\">\n<ol>\n");
    for page in &site.pages {
        let _ = writeln!(
            list,
            "<li class=\"depth-{}\"><a href=\"{}\">{}</a></li>",
            page.depth,
            xhtml_name(page),
            escape_xml(page.title())
        );
    }
    list.push_str("</ol>\n</nav>\n");
    xhtml(site, site.title(), &list)
}

fn package_opf(site: &Site<'_>, resources: &[String]) -> String {
    let meta = &site.graph.meta;
    let identifier = site
        .pages
        .first()
        .map(|p| p.page.id.to_string())
        .unwrap_or_else(|| "empty".to_string());

    let mut opf = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    opf.push_str(
        "<package xmlns=\"http://www.idpf.org/2007/opf\" version=\"3.0\" unique-identifier=\"uid\">\n\
         <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n",
    );
    let _ = writeln!(opf, "<dc:identifier id=\"uid\">urn:exepack:{identifier}</dc:identifier>");
    let _ = writeln!(opf, "<dc:title>{}</dc:title>", escape_xml(site.title()));
    let _ = writeln!(opf, "<dc:language>{}</dc:language>", escape_xml(site.language()));
    if !meta.author.is_empty() {
        let _ = writeln!(opf, "<dc:creator>{}</dc:creator>", escape_xml(&meta.author));
    }
    if !meta.license.is_empty() {
        let _ = writeln!(opf, "<dc:rights>{}</dc:rights>", escape_xml(&meta.license));
    }
    let _ = writeln!(
        opf,
        "<meta property=\"dcterms:modified\">{}</meta>",
        Utc::now().format("%Y-%m-%dT%H:%M:%SZ")
    );
    opf.push_str("</metadata>\n<manifest>\n");
    opf.push_str("<item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\"/>\n");
    for (index, page) in site.pages.iter().enumerate() {
        let _ = writeln!(
            opf,
            "<item id=\"page-{index}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>",
            xhtml_name(page)
        );
    }
    for (index, path) in resources.iter().enumerate() {
        let _ = writeln!(
            opf,
            "<item id=\"res-{index}\" href=\"resources/{}\" media-type=\"{}\"/>",
            escape_xml(path),
            media_type(path)
        );
    }
    opf.push_str("</manifest>\n<spine>\n");
    for index in 0..site.pages.len() {
        let _ = writeln!(opf, "<itemref idref=\"page-{index}\"/>");
    }
    opf.push_str("</spine>\n</package>\n");
    opf
}

/// Self-close HTML void elements and replace `&nbsp;`, the one named entity
/// legacy content uses that XHTML does not predefine.
///
/// Only void elements are touched; other HTML-only syntax is kept as is.
pub(crate) fn to_xhtml(html: &str) -> String {
    VOID_ELEMENT
        .replace_all(html, |caps: &regex::Captures<'_>| {
            format!("<{}{} />", caps[1].to_ascii_lowercase(), caps[2].trim_end())
        })
        .replace("&nbsp;", "&#160;")
}

pub(crate) fn media_type(path: &str) -> &'static str {
    let extension = path.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("mp3") => "audio/mpeg",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("xhtml" | "html" | "htm") => "application/xhtml+xml",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}
