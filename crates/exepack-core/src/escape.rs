use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;

static XML_ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .build(["&", "<", ">", "\"", "'"])
        .expect("static escape patterns are valid")
});

/// Escape the five XML reserved characters.
///
/// ```
/// use exepack_core::escape_xml;
/// assert_eq!(escape_xml("Tom & \"Jerry\""), "Tom &amp; &quot;Jerry&quot;");
/// ```
#[inline]
pub fn escape_xml(s: &str) -> String {
    XML_ESCAPER.replace_all(s, &["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"])
}
