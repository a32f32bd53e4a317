//! Storage backend abstraction.
//!
//! Every stage that reads or writes project files goes through [`Storage`]
//! with paths relative to the backend root, so the archive codec and the
//! renderers never build absolute paths themselves.

use std::fs;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};

use crate::primitives::{AtomicWriteOptions, atomic_write};
use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageKind {
    File,
    Directory,
}

/// A direct child of a listed directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageEntry {
    /// Path relative to the storage root.
    pub path: PathBuf,
    pub kind: StorageKind,
    pub size: u64,
}

impl StorageEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == StorageKind::Directory
    }
}

pub trait Storage {
    /// List the direct children of `dir`, sorted by path.
    fn list(&self, dir: &Path) -> Result<Vec<StorageEntry>>;

    fn open(&self, path: &Path) -> Result<Box<dyn Read>>;

    /// Open `path` for writing, creating missing parent directories.
    fn create(&self, path: &Path) -> Result<Box<dyn Write>>;

    fn create_dir_all(&self, path: &Path) -> Result<()>;

    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// Remove a file or a whole directory tree. Missing paths are fine.
    fn remove(&self, path: &Path) -> Result<()>;

    fn write(&self, path: &Path, content: &[u8]) -> Result<()> {
        let mut writer = self.create(path)?;
        writer
            .write_all(content)
            .and_then(|()| writer.flush())
            .map_err(|e| Error::Write {
                path: path.to_path_buf(),
                source: e,
            })
    }

    /// Every file below `dir`, depth first in sorted order.
    fn walk_files(&self, dir: &Path) -> Result<Vec<StorageEntry>> {
        let mut files = Vec::new();
        for entry in self.list(dir)? {
            if entry.is_dir() {
                files.extend(self.walk_files(&entry.path)?);
            } else {
                files.push(entry);
            }
        }
        Ok(files)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let mut content = String::new();
        self.open(path)?
            .read_to_string(&mut content)
            .map_err(|e| Error::Read {
                path: path.to_path_buf(),
                source: e,
            })?;
        Ok(content)
    }
}

/// Stream every file below `from_dir` on `from` to the same relative path
/// below `to_dir` on `to`. Returns the number of files copied.
pub fn copy_tree(from: &dyn Storage, from_dir: &Path, to: &dyn Storage, to_dir: &Path) -> Result<usize> {
    let files = from.walk_files(from_dir)?;
    for file in &files {
        let relative = file.path.strip_prefix(from_dir).unwrap_or(&file.path);
        let target = to_dir.join(relative);
        let mut reader = from.open(&file.path)?;
        let mut writer = to.create(&target)?;
        io::copy(&mut reader, &mut writer)
            .and_then(|_| writer.flush())
            .map_err(|e| Error::Write {
                path: target.clone(),
                source: e,
            })?;
    }
    Ok(files.len())
}

/// [`Storage`] backed by a directory on the local filesystem.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a relative storage path to a filesystem path under the root.
    ///
    /// Absolute paths and `..` components are rejected so nothing can be
    /// read or written outside the root.
    pub fn resolve(&self, path: &Path) -> Result<PathBuf> {
        let mut resolved = self.root.clone();
        for component in path.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(Error::OutsideRoot(path.to_path_buf()));
                }
            }
        }
        Ok(resolved)
    }
}

impl Storage for LocalStorage {
    fn list(&self, dir: &Path) -> Result<Vec<StorageEntry>> {
        let full = self.resolve(dir)?;
        let read_dir = fs::read_dir(&full).map_err(|e| Error::Read {
            path: full.clone(),
            source: e,
        })?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| Error::Read {
                path: full.clone(),
                source: e,
            })?;
            let metadata = entry.metadata().map_err(|e| Error::Read {
                path: entry.path(),
                source: e,
            })?;
            let kind = if metadata.is_dir() {
                StorageKind::Directory
            } else if metadata.is_file() {
                StorageKind::File
            } else {
                continue;
            };
            entries.push(StorageEntry {
                path: dir.join(entry.file_name()),
                kind,
                size: metadata.len(),
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Read>> {
        let full = self.resolve(path)?;
        let file = fs::File::open(&full).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(full.clone())
            } else {
                Error::Read {
                    path: full.clone(),
                    source: e,
                }
            }
        })?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn create(&self, path: &Path) -> Result<Box<dyn Write>> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let file = fs::File::create(&full).map_err(|e| Error::Write {
            path: full.clone(),
            source: e,
        })?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let full = self.resolve(path)?;
        fs::create_dir_all(&full).map_err(|e| Error::Write {
            path: full,
            source: e,
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).map(|p| p.exists()).unwrap_or(false)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.resolve(path).map(|p| p.is_dir()).unwrap_or(false)
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let full = self.resolve(path)?;
        let result = if full.is_dir() {
            fs::remove_dir_all(&full)
        } else {
            fs::remove_file(&full)
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Write {
                path: full,
                source: e,
            }),
        }
    }

    fn write(&self, path: &Path, content: &[u8]) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        atomic_write(&full, content, AtomicWriteOptions::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_list_sorted_with_kinds() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b/inner")).unwrap();
        fs::write(dir.path().join("a.txt"), "12345").unwrap();
        let storage = LocalStorage::new(dir.path());

        let entries = storage.list(Path::new("")).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, Path::new("a.txt"));
        assert_eq!(entries[0].size, 5);
        assert!(entries[1].is_dir());

        let nested = storage.list(Path::new("b")).unwrap();
        assert_eq!(nested[0].path, Path::new("b/inner"));
    }

    #[test]
    fn test_create_makes_parents() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        storage
            .write(Path::new("html/pages/intro.html"), b"intro")
            .unwrap();
        assert_eq!(
            storage.read_to_string(Path::new("html/pages/intro.html")).unwrap(),
            "intro"
        );
    }

    #[test]
    fn test_parent_dir_rejected() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("root"));
        let result = storage.create(Path::new("../escape.txt"));
        assert!(matches!(result, Err(Error::OutsideRoot(_))));
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[test]
    fn test_remove_file_tree_and_missing() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        storage.write(Path::new("out/site/index.html"), b"x").unwrap();
        storage.write(Path::new("book.epub"), b"x").unwrap();
        storage.remove(Path::new("book.epub")).unwrap();
        storage.remove(Path::new("out")).unwrap();
        storage.remove(Path::new("never-existed")).unwrap();
        assert!(!storage.exists(Path::new("book.epub")));
        assert!(!storage.exists(Path::new("out")));
    }

    #[test]
    fn test_walk_and_copy_tree() {
        let dir = tempdir().unwrap();
        let from = LocalStorage::new(dir.path().join("from"));
        let to = LocalStorage::new(dir.path().join("to"));
        from.write(Path::new("b/z.png"), b"z").unwrap();
        from.write(Path::new("a.css"), b"a").unwrap();
        from.create_dir_all(Path::new("empty")).unwrap();

        let files: Vec<_> = from.walk_files(Path::new("")).unwrap().into_iter().map(|e| e.path).collect();
        assert_eq!(files, [Path::new("a.css"), Path::new("b/z.png")]);

        let copied = copy_tree(&from, Path::new("b"), &to, Path::new("site/res")).unwrap();
        assert_eq!(copied, 1);
        assert_eq!(to.read_to_string(Path::new("site/res/z.png")).unwrap(), "z");
    }

    #[test]
    fn test_open_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let err = storage.open(Path::new("missing.png")).err().unwrap();
        assert!(err.is_not_found());
    }
}
