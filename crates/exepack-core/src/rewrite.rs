//! Resource reference rewriting.
//!
//! Rules, first match wins:
//!
//! 1. external (`scheme:`, `//host`) and fragment-only references pass through
//! 2. `resources/custom/<rest>` or `custom/<rest>` → `<base>/custom/<rest>`
//! 3. flat `resources/<name>` → `<base>/<owner>/<name>`, query and fragment kept
//! 4. anything else is left unchanged
//!
//! A reference already under `<base>/<owner>/` or `<base>/custom/` is never
//! touched again, which makes [`rewrite`] idempotent even when the base itself
//! is `resources` or `custom`.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

pub const DEFAULT_SESSION_BASE: &str = "content/resources";
pub const CUSTOM_DIR: &str = "custom";
const LEGACY_RESOURCES_DIR: &str = "resources";

static SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap());

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(\b(?:src|href|data|poster)\s*=\s*)("[^"]*"|'[^']*')"#).unwrap()
});

static CSS_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)url\(\s*(["']?)([^"'()\s]+)(["']?)\s*\)"#).unwrap());

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RewriteMode {
    /// Prefix rewritten references with the session base.
    #[default]
    Session,
    /// Ignore the base; references are relative to the resources area.
    Relative,
}

/// What a reference points at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reference<'a> {
    External,
    /// File in the customization area, path relative to it.
    Custom { rest: &'a str },
    /// File in the legacy flat resources directory.
    Resource { name: &'a str, suffix: &'a str },
    Other,
}

impl<'a> Reference<'a> {
    pub fn classify(reference: &'a str) -> Self {
        if reference.is_empty() {
            return Self::Other;
        }
        if reference.starts_with('#') || reference.starts_with("//") || SCHEME.is_match(reference) {
            return Self::External;
        }
        let path = reference.strip_prefix("./").unwrap_or(reference);
        let in_resources = path
            .strip_prefix(LEGACY_RESOURCES_DIR)
            .and_then(|p| p.strip_prefix('/'));

        let custom = in_resources
            .unwrap_or(path)
            .strip_prefix(CUSTOM_DIR)
            .and_then(|p| p.strip_prefix('/'));
        if let Some(rest) = custom.filter(|r| !r.is_empty()) {
            return Self::Custom { rest };
        }

        if let Some(flat) = in_resources {
            let split = flat.find(['?', '#']).unwrap_or(flat.len());
            let (name, suffix) = flat.split_at(split);
            if !name.is_empty() && !name.contains('/') {
                return Self::Resource { name, suffix };
            }
        }
        Self::Other
    }

    /// Path of the file inside the resources area once staged.
    pub fn staged_path(&self, owner: &str) -> Option<String> {
        match self {
            Self::Custom { rest } => Some(format!("{CUSTOM_DIR}/{}", strip_suffix(rest))),
            Self::Resource { name, .. } => Some(format!("{owner}/{name}")),
            Self::External | Self::Other => None,
        }
    }

    /// Path of the source file relative to the legacy archive root.
    pub fn source_path(&self) -> Option<String> {
        match self {
            Self::Custom { rest } => Some(format!("{LEGACY_RESOURCES_DIR}/{CUSTOM_DIR}/{}", strip_suffix(rest))),
            Self::Resource { name, .. } => Some(format!("{LEGACY_RESOURCES_DIR}/{name}")),
            Self::External | Self::Other => None,
        }
    }

    pub fn is_resource(&self) -> bool {
        matches!(self, Self::Custom { .. } | Self::Resource { .. })
    }
}

fn strip_suffix(path: &str) -> &str {
    &path[..path.find(['?', '#']).unwrap_or(path.len())]
}

fn normalize_base(base: &str) -> &str {
    base.trim_end_matches('/')
}

/// Rewrite one reference for the unit `owner`.
pub fn rewrite(reference: &str, session_base: &str, owner: &str, mode: RewriteMode) -> String {
    let base = match mode {
        RewriteMode::Session => normalize_base(session_base),
        RewriteMode::Relative => "",
    };
    if !base.is_empty() && is_rewritten(reference, base, owner) {
        return reference.to_string();
    }

    let rewritten = match Reference::classify(reference) {
        Reference::Custom { rest } => format!("{CUSTOM_DIR}/{rest}"),
        Reference::Resource { name, suffix } => format!("{owner}/{name}{suffix}"),
        Reference::External | Reference::Other => return reference.to_string(),
    };
    if base.is_empty() {
        rewritten
    } else {
        format!("{base}/{rewritten}")
    }
}

fn is_rewritten(reference: &str, base: &str, owner: &str) -> bool {
    let Some(rest) = reference.strip_prefix(base).and_then(|r| r.strip_prefix('/')) else {
        return false;
    };
    [owner, CUSTOM_DIR]
        .into_iter()
        .any(|dir| rest.strip_prefix(dir).is_some_and(|r| r.starts_with('/')))
}

/// Replace the leading `from` directory of `reference` with `to`.
///
/// References outside `from` are returned unchanged. An empty `to` strips
/// the prefix.
pub fn rebase<'a>(reference: &'a str, from: &str, to: &str) -> Cow<'a, str> {
    let from = normalize_base(from);
    let to = normalize_base(to);
    let rest = if from.is_empty() {
        Some(reference)
    } else {
        reference.strip_prefix(from).and_then(|r| r.strip_prefix('/'))
    };
    match rest {
        Some(rest) if to.is_empty() => Cow::Owned(rest.to_string()),
        Some(rest) => Cow::Owned(format!("{to}/{rest}")),
        None => Cow::Borrowed(reference),
    }
}

/// Result of [`rewrite_html`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RewrittenHtml {
    pub html: String,
    /// Original resource references, deduplicated in first-seen order.
    pub referenced: Vec<String>,
}

/// Apply `f` to every `src`, `href`, `data` and `poster` attribute value and
/// CSS `url()` reference in an HTML fragment.
pub fn map_references(html: &str, mut f: impl FnMut(&str) -> String) -> String {
    let html = ATTRIBUTE.replace_all(html, |caps: &Captures<'_>| {
        let quoted = &caps[2];
        let quote = &quoted[..1];
        let value = &quoted[1..quoted.len() - 1];
        format!("{}{quote}{}{quote}", &caps[1], f(value))
    });
    CSS_URL
        .replace_all(&html, |caps: &Captures<'_>| {
            format!("url({}{}{})", &caps[1], f(&caps[2]), &caps[3])
        })
        .into_owned()
}

/// Rewrite every reference of an HTML fragment with [`rewrite`].
pub fn rewrite_html(html: &str, session_base: &str, owner: &str, mode: RewriteMode) -> RewrittenHtml {
    let mut referenced: Vec<String> = Vec::new();
    let html = map_references(html, |reference| {
        if Reference::classify(reference).is_resource() && !referenced.iter().any(|r| r == reference) {
            referenced.push(reference.to_string());
        }
        rewrite(reference, session_base, owner, mode)
    });
    RewrittenHtml { html, referenced }
}

/// Resource references in `html` without rewriting anything.
pub fn scan_references(html: &str) -> Vec<String> {
    rewrite_html(html, "", "", RewriteMode::Relative).referenced
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const BASE: &str = DEFAULT_SESSION_BASE;

    #[test]
    fn flat_resource_goes_under_owner() {
        assert_eq!(
            rewrite("resources/img1.png", BASE, "OWNER", RewriteMode::Session),
            "content/resources/OWNER/img1.png"
        );
        assert_eq!(
            rewrite("./resources/a.mp3?t=3#x", BASE, "O", RewriteMode::Session),
            "content/resources/O/a.mp3?t=3#x"
        );
        assert_eq!(rewrite("resources/img1.png", BASE, "O", RewriteMode::Relative), "O/img1.png");
    }

    #[test]
    fn custom_area_has_its_own_base() {
        assert_eq!(
            rewrite("resources/custom/logo.svg", BASE, "O", RewriteMode::Session),
            "content/resources/custom/logo.svg"
        );
        assert_eq!(
            rewrite("custom/css/site.css", BASE, "O", RewriteMode::Session),
            "content/resources/custom/css/site.css"
        );
        assert_eq!(rewrite("custom/a.png", BASE, "O", RewriteMode::Relative), "custom/a.png");
    }

    #[test]
    fn base_named_like_legacy_directory() {
        assert_eq!(
            rewrite("resources/img1.png", "resources", "OWNER", RewriteMode::Session),
            "resources/OWNER/img1.png"
        );
        assert_eq!(
            rewrite("resources/OWNER/img1.png", "resources", "OWNER", RewriteMode::Session),
            "resources/OWNER/img1.png"
        );
        assert_eq!(
            rewrite("resources/custom/a.css", "resources", "OWNER", RewriteMode::Session),
            "resources/custom/a.css"
        );
        assert_eq!(
            rewrite("custom/a.css", "custom", "OWNER", RewriteMode::Session),
            "custom/custom/a.css"
        );
        let r = Reference::classify("resources/img1.png");
        assert_eq!(
            rewrite("resources/img1.png", "resources", "OWNER", RewriteMode::Session),
            format!("resources/{}", r.staged_path("OWNER").unwrap())
        );
    }

    #[test]
    fn external_and_other_unchanged() {
        for reference in [
            "http://example.com/resources/a.png",
            "https://x.org",
            "//cdn.example/a.js",
            "data:image/png;base64,AAAA",
            "mailto:a@b.c",
            "#section",
            "resources/nested/dir.png",
            "images/a.png",
            "resources/",
            "",
        ] {
            assert_eq!(rewrite(reference, BASE, "O", RewriteMode::Session), reference);
        }
    }

    #[test]
    fn rebase_prefix() {
        assert_eq!(rebase("content/resources/O/a.png", BASE, "../content/resources"), "../content/resources/O/a.png");
        assert_eq!(rebase("content/resources/O/a.png", BASE, ""), "O/a.png");
        assert_eq!(rebase("http://x/a.png", BASE, "res"), "http://x/a.png");
        assert_eq!(rebase("O/a.png", "", "resources"), "resources/O/a.png");
    }

    #[test]
    fn html_attributes_and_css() {
        let html = r#"<p><img src="resources/img1.png" alt="a"><img src='resources/img2.png'>
<a href="http://example.com">x</a><span style="background:url(resources/img1.png)"></span>
<video poster="resources/p.jpg"></video></p>"#;
        let out = rewrite_html(html, BASE, "U1", RewriteMode::Session);
        assert!(out.html.contains(r#"src="content/resources/U1/img1.png""#));
        assert!(out.html.contains("src='content/resources/U1/img2.png'"));
        assert!(out.html.contains("url(content/resources/U1/img1.png)"));
        assert!(out.html.contains(r#"poster="content/resources/U1/p.jpg""#));
        assert!(out.html.contains(r#"href="http://example.com""#));
        assert_eq!(out.referenced, ["resources/img1.png", "resources/img2.png", "resources/p.jpg"]);
    }

    #[test]
    fn map_references_visits_attributes_in_order() {
        let mut seen = Vec::new();
        let out = map_references(r#"<a href="x.html"><img src='y.png'></a><b style="background:url('z.gif')">"#, |r| {
            seen.push(r.to_string());
            r.to_uppercase()
        });
        assert_eq!(seen, ["x.html", "y.png", "z.gif"]);
        assert!(out.contains(r#"href="X.HTML""#));
        assert!(out.contains("url('Z.GIF')"));
    }

    #[test]
    fn staging_paths() {
        let r = Reference::classify("resources/a.png?v=2");
        assert_eq!(r.source_path().as_deref(), Some("resources/a.png"));
        assert_eq!(r.staged_path("U").as_deref(), Some("U/a.png"));
        let c = Reference::classify("custom/x/y.css");
        assert_eq!(c.source_path().as_deref(), Some("resources/custom/x/y.css"));
        assert_eq!(c.staged_path("U").as_deref(), Some("custom/x/y.css"));
    }

    fn reference_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z0-9_.]{0,12}",
            "(\\./)?resources/[a-z0-9_.]{0,10}(\\?[a-z=0-9]{0,4})?(#[a-z]{0,3})?",
            "(resources/)?custom/[a-z/]{0,12}",
            "(https?|data|mailto):[a-z/.]{0,10}",
            "#[a-z]{0,5}",
            "[a-z/.]{0,20}",
        ]
    }

    proptest! {
        #[test]
        fn rewrite_is_idempotent(
            reference in reference_strategy(),
            base in "(content/resources|resources|custom|[a-z]{1,6}(/[a-z]{1,6})?)/?",
            owner in "[A-Z0-9]{1,20}",
            relative in any::<bool>(),
        ) {
            let mode = if relative { RewriteMode::Relative } else { RewriteMode::Session };
            let once = rewrite(&reference, &base, &owner, mode);
            let twice = rewrite(&once, &base, &owner, mode);
            prop_assert_eq!(twice, once);
        }

        #[test]
        fn flat_resource_always_lands_under_owner(
            name in "[a-z0-9_]{1,10}\\.png",
            base in "(content/resources|resources|custom|[a-z]{1,6}(/[a-z]{1,6})?)",
            owner in "[A-Z0-9]{1,20}",
        ) {
            let reference = format!("resources/{name}");
            prop_assert_eq!(
                rewrite(&reference, &base, &owner, RewriteMode::Session),
                format!("{base}/{owner}/{name}")
            );
        }

        #[test]
        fn html_rewrite_is_idempotent(name in "[a-z]{1,8}\\.png", owner in "[A-Z]{6}") {
            let html = format!(r#"<img src="resources/{name}"><a href="custom/{name}">x</a>"#);
            let once = rewrite_html(&html, BASE, &owner, RewriteMode::Session);
            let twice = rewrite_html(&once.html, BASE, &owner, RewriteMode::Session);
            prop_assert_eq!(twice.html, once.html);
            prop_assert!(twice.referenced.is_empty());
        }
    }
}
