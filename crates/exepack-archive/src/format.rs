use std::fmt;
use std::io::{self, Read, Seek};

/// Container formats recognised by their magic bytes.
///
/// Only [`ArchiveFormat::Zip`] is a valid project archive; the others are
/// detected so the error can say what was uploaded instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Gzip,
    Tar,
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Zip => "zip",
            Self::Gzip => "gzip",
            Self::Tar => "tar",
        })
    }
}

pub fn detect_format(data: &[u8]) -> Option<ArchiveFormat> {
    match data {
        // local file header, empty archive, spanned archive
        [0x50, 0x4B, 0x03, 0x04, ..] | [0x50, 0x4B, 0x05, 0x06, ..] | [0x50, 0x4B, 0x07, 0x08, ..] => {
            Some(ArchiveFormat::Zip)
        }
        [0x1F, 0x8B, ..] => Some(ArchiveFormat::Gzip),
        _ if is_tar_header(data) => Some(ArchiveFormat::Tar),
        _ => None,
    }
}

fn is_tar_header(data: &[u8]) -> bool {
    data.len() >= 263 && data[257..262] == *b"ustar"
}

/// Sniff the container format and rewind the reader.
pub fn detect_from_reader<R: Read + Seek>(reader: &mut R) -> io::Result<Option<ArchiveFormat>> {
    let mut header = Vec::with_capacity(512);
    reader.by_ref().take(512).read_to_end(&mut header)?;
    reader.rewind()?;
    Ok(detect_format(&header))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn detect_zip_format() {
        let zip_header = [0x50, 0x4B, 0x03, 0x04, 0x14, 0x00, 0x00, 0x00];
        assert_eq!(detect_format(&zip_header), Some(ArchiveFormat::Zip));
    }

    #[test]
    fn detect_empty_zip_format() {
        let empty = [0x50, 0x4B, 0x05, 0x06, 0x00, 0x00];
        assert_eq!(detect_format(&empty), Some(ArchiveFormat::Zip));
    }

    #[test]
    fn detect_gzip_format() {
        assert_eq!(detect_format(&[0x1F, 0x8B, 0x08]), Some(ArchiveFormat::Gzip));
    }

    #[test]
    fn detect_unknown_format() {
        assert_eq!(detect_format(b"<?xml version"), None);
        assert_eq!(detect_format(&[]), None);
    }

    #[test]
    fn detect_from_short_reader_rewinds() {
        let mut cursor = Cursor::new(vec![0x50, 0x4B, 0x05, 0x06]);
        assert_eq!(detect_from_reader(&mut cursor).unwrap(), Some(ArchiveFormat::Zip));
        assert_eq!(cursor.position(), 0);
    }
}
