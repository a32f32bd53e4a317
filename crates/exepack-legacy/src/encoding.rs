//! Transcoding of legacy documents to UTF-8.
//!
//! Order of evidence: byte-order mark, valid UTF-8, the `encoding` label in
//! the XML declaration, then statistical detection.

use std::borrow::Cow;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use regex::bytes::Regex;

static DECLARED_ENCODING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*<\?xml[^>]*\bencoding\s*=\s*["']([A-Za-z0-9._:\-]+)["']"#).unwrap());

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    /// WHATWG name of the source encoding.
    pub encoding: &'static str,
    /// Malformed sequences were replaced with U+FFFD.
    pub had_errors: bool,
}

pub fn decode_document(bytes: &[u8]) -> Decoded {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return decode_with(encoding, &bytes[bom_len..]);
    }
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Decoded {
            text: text.to_string(),
            encoding: UTF_8.name(),
            had_errors: false,
        };
    }
    let encoding = declared_encoding(bytes)
        .filter(|e| *e != UTF_8)
        .unwrap_or_else(|| detect(bytes));
    tracing::debug!(encoding = encoding.name(), "transcoding legacy document");
    decode_with(encoding, bytes)
}

fn decode_with(encoding: &'static Encoding, bytes: &[u8]) -> Decoded {
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    Decoded {
        text: match text {
            Cow::Borrowed(slice) => slice.to_owned(),
            Cow::Owned(string) => string,
        },
        encoding: encoding.name(),
        had_errors,
    }
}

fn declared_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(256)];
    let label = DECLARED_ENCODING.captures(head)?.get(1)?;
    Encoding::for_label(label.as_bytes())
}

fn detect(bytes: &[u8]) -> &'static Encoding {
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_passes_through() {
        let decoded = decode_document("<a>café</a>".as_bytes());
        assert_eq!(decoded.text, "<a>café</a>");
        assert_eq!(decoded.encoding, "UTF-8");
    }

    #[test]
    fn bom_is_stripped() {
        let decoded = decode_document(b"\xEF\xBB\xBF<a/>");
        assert_eq!(decoded.text, "<a/>");
    }

    #[test]
    fn declared_latin1_label() {
        let bytes = b"<?xml version=\"1.0\" encoding=\"iso-8859-1\"?><a>caf\xE9</a>";
        let decoded = decode_document(bytes);
        assert_eq!(decoded.encoding, "windows-1252");
        assert!(decoded.text.ends_with("<a>café</a>"));
        assert!(!decoded.had_errors);
    }

    #[test]
    fn undeclared_windows_1252_detected() {
        let bytes = b"<a>El ni\xF1o comi\xF3 una pi\xF1a en la monta\xF1a, \xA1qu\xE9 d\xEDa!</a>";
        let decoded = decode_document(bytes);
        assert!(decoded.text.contains("niño"), "{}", decoded.text);
    }

    #[test]
    fn false_utf8_declaration_is_ignored() {
        let bytes = b"<?xml version=\"1.0\" encoding=\"utf-8\"?><a>se\xF1or y se\xF1ora espa\xF1oles</a>";
        let decoded = decode_document(bytes);
        assert_ne!(decoded.encoding, "UTF-8");
        assert!(decoded.text.contains("señor"));
    }
}
