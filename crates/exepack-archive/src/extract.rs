//! Streaming extraction into a storage backend.

use std::io::{Read, Seek, Write};
use std::path::Path;

use exepack_fs::Storage;

use crate::entry::{ArchiveReport, Entry, EntryKind};
use crate::error::{Error, Result};
use crate::format::{self, ArchiveFormat};
use crate::options::{Digest, ExtractOptions, copy_bounded};
use crate::sanitize::sanitize_entry_path;

/// Extract every entry of a ZIP container into `destination` on `storage`.
///
/// All entry names are validated before anything is written, so a single
/// traversal attempt rejects the whole archive and leaves the destination
/// untouched. File contents are streamed through one bounded buffer.
pub fn extract<R: Read + Seek>(
    mut reader: R,
    storage: &dyn Storage,
    destination: &Path,
    options: &ExtractOptions,
) -> Result<ArchiveReport> {
    match format::detect_from_reader(&mut reader)? {
        Some(ArchiveFormat::Zip) => {}
        detected => return Err(Error::UnsupportedFormat { detected }),
    }

    let mut archive = zip::ZipArchive::new(reader)?;

    for name in archive.file_names() {
        sanitize_entry_path(name)?;
    }

    storage.create_dir_all(destination)?;

    let mut report = ArchiveReport::default();
    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        let sanitized = sanitize_entry_path(file.name())?;
        let target = destination.join(&sanitized.relative);

        if file.is_dir() {
            storage.create_dir_all(&target)?;
            report.entries.push(Entry::new(
                sanitized.original,
                target,
                0,
                EntryKind::Directory,
            ));
            continue;
        }

        let mut digest = Digest::for_strategy(options.hash_strategy);
        let mut out = storage.create(&target)?;
        let written = copy_bounded(&mut file, &mut out, options.buffer_size, digest.as_mut())
            .and_then(|n| out.flush().map(|()| n))
            .map_err(|e| Error::ExtractionFailed {
                path: target.clone(),
                source: e,
            })?;

        tracing::trace!(entry = %sanitized.original, bytes = written, "extracted");
        report.total_bytes += written;
        let mut entry = Entry::new(sanitized.original, target, written, EntryKind::File);
        if let Some(digest) = digest {
            entry = entry.with_hash(digest.finish());
        }
        report.entries.push(entry);
    }

    report.entry_count = report.entries.len();
    tracing::debug!(
        entries = report.entry_count,
        bytes = report.total_bytes,
        destination = %destination.display(),
        "archive extracted"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use exepack_fs::LocalStorage;
    use tempfile::tempdir;

    use super::*;

    fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn extract_rejects_non_zip() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let result = extract(
            Cursor::new(vec![0xDE, 0xAD, 0xBE, 0xEF]),
            &storage,
            Path::new("raw"),
            &ExtractOptions::default(),
        );
        assert!(matches!(result, Err(Error::UnsupportedFormat { detected: None })));
    }

    #[test]
    fn extract_creates_empty_directories() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let data = zip_with(&[("empty/", b""), ("resources/a.txt", b"abc")]);
        let report = extract(Cursor::new(data), &storage, Path::new("raw"), &ExtractOptions::default())
            .unwrap();
        assert!(dir.path().join("raw/empty").is_dir());
        assert_eq!(std::fs::read(dir.path().join("raw/resources/a.txt")).unwrap(), b"abc");
        assert_eq!(report.entry_count, 2);
        assert_eq!(report.total_bytes, 3);
    }

    #[test]
    fn extract_with_sha256() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let data = zip_with(&[("hello.txt", b"hello world")]);
        let options = ExtractOptions::default().hash_strategy(crate::HashStrategy::Sha256);
        let report = extract(Cursor::new(data), &storage, Path::new(""), &options).unwrap();
        assert_eq!(
            report.find("hello.txt").unwrap().hash.as_deref(),
            Some("b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9")
        );
    }

    #[test]
    fn traversal_rejected_before_any_write() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("dest");
        std::fs::create_dir_all(&dest).unwrap();
        let storage = LocalStorage::new(&dest);
        let data = zip_with(&[("ok.txt", b"fine"), ("../../etc/passwd", b"root:x")]);
        let result = extract(Cursor::new(data), &storage, Path::new("raw"), &ExtractOptions::default());
        assert!(matches!(result, Err(Error::ZipSlip { .. })));
        assert!(!dest.join("raw/ok.txt").exists());
        assert!(!dir.path().join("etc/passwd").exists());
    }
}
