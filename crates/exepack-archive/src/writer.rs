//! Writable archive handle.
//!
//! ```text
//! unopened --open--> open --close--> closed --store_archive--> stored
//!                      \_______________store_archive_______________/
//! ```
//!
//! Every file goes through a scratch buffer in the handle's scratch
//! directory before it reaches the container, so a source that fails
//! mid-read never leaves a truncated entry behind. Buffers live until
//! [`ArchiveHandle::close`], which releases them on every path.

use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use exepack_fs::Storage;
use tempfile::{NamedTempFile, TempPath};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::error::{Error, Result};
use crate::options::{Compression, WriteOptions, copy_bounded};
use crate::sanitize::entry_name;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandleState {
    Unopened,
    Open,
    Closed,
    Stored,
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unopened => "unopened",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Stored => "stored",
        })
    }
}

pub struct ArchiveHandle {
    scratch_dir: PathBuf,
    options: WriteOptions,
    state: HandleState,
    writer: Option<ZipWriter<NamedTempFile>>,
    finished: Option<NamedTempFile>,
    buffers: Vec<TempPath>,
    entries: HashSet<String>,
}

/// Open a new, empty container backed by a file in `scratch_dir`.
pub fn create_archive(scratch_dir: impl Into<PathBuf>, options: WriteOptions) -> Result<ArchiveHandle> {
    let mut handle = ArchiveHandle::unopened(scratch_dir, options);
    handle.open()?;
    Ok(handle)
}

impl ArchiveHandle {
    pub fn unopened(scratch_dir: impl Into<PathBuf>, options: WriteOptions) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            options,
            state: HandleState::Unopened,
            writer: None,
            finished: None,
            buffers: Vec::new(),
            entries: HashSet::new(),
        }
    }

    pub fn open(&mut self) -> Result<()> {
        self.expect_state(HandleState::Unopened, "open")?;
        let file = tempfile::Builder::new()
            .prefix("archive-")
            .suffix(".zip")
            .tempfile_in(&self.scratch_dir)?;
        tracing::debug!(path = %file.path().display(), "archive opened");
        self.writer = Some(ZipWriter::new(file));
        self.state = HandleState::Open;
        Ok(())
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Scratch buffers currently held by the handle.
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Location of the container's scratch copy, while one exists.
    pub fn scratch_path(&self) -> Option<&Path> {
        match (&self.writer, &self.finished) {
            (Some(writer), _) => Some(writer.get_ref().path()),
            (None, Some(file)) => Some(file.path()),
            (None, None) => None,
        }
    }

    fn expect_state(&self, expected: HandleState, operation: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn writer(&mut self, operation: &'static str) -> Result<&mut ZipWriter<NamedTempFile>> {
        self.expect_state(HandleState::Open, operation)?;
        self.writer.as_mut().ok_or(Error::InvalidState {
            operation,
            state: self.state,
        })
    }

    /// Add an explicit directory entry. Repeated directories are ignored.
    pub fn add_directory_entry(&mut self, path: &Path) -> Result<()> {
        self.expect_state(HandleState::Open, "add a directory")?;
        let name = format!("{}/", entry_name(path)?);
        if self.entries.contains(&name) {
            return Ok(());
        }
        let writer = self.writer("add a directory")?;
        writer.add_directory(name.as_str(), SimpleFileOptions::default())?;
        self.entries.insert(name);
        Ok(())
    }

    /// Recursively add the tree at `tree_root` with its relative layout.
    pub fn add_directory(&mut self, storage: &dyn Storage, tree_root: &Path) -> Result<()> {
        self.add_directory_at(storage, tree_root, Path::new(""))
    }

    /// Like [`ArchiveHandle::add_directory`], placing the tree under `prefix`.
    pub fn add_directory_at(
        &mut self,
        storage: &dyn Storage,
        tree_root: &Path,
        prefix: &Path,
    ) -> Result<()> {
        self.expect_state(HandleState::Open, "add a directory")?;
        if prefix.components().next().is_some() {
            let mut parent = PathBuf::new();
            for component in prefix.components() {
                parent.push(component);
                self.add_directory_entry(&parent)?;
            }
        }
        self.walk(storage, tree_root, prefix)
    }

    fn walk(&mut self, storage: &dyn Storage, dir: &Path, prefix: &Path) -> Result<()> {
        for child in storage.list(dir)? {
            let Some(name) = child.path.file_name() else {
                continue;
            };
            let relative = prefix.join(name);
            if child.is_dir() {
                self.add_directory_entry(&relative)?;
                self.walk(storage, &child.path, &relative)?;
            } else {
                self.add_file(storage, &child.path, &relative)?;
            }
        }
        Ok(())
    }

    pub fn add_file(&mut self, storage: &dyn Storage, source: &Path, entry: &Path) -> Result<()> {
        let compression = self.options.compression;
        self.add_file_with(storage, source, entry, compression)
    }

    /// Stage `source` into a scratch buffer, then stream it into the container.
    ///
    /// A failure while staging removes the buffer and leaves the handle open
    /// and usable.
    pub fn add_file_with(
        &mut self,
        storage: &dyn Storage,
        source: &Path,
        entry: &Path,
        compression: Compression,
    ) -> Result<()> {
        self.expect_state(HandleState::Open, "add a file")?;
        let name = entry_name(entry)?;
        if self.entries.contains(&name) {
            return Err(Error::DuplicateEntry(name));
        }

        let mut buffer = self.stage(storage, source).map_err(|e| Error::AddFailed {
            path: source.to_path_buf(),
            source: Box::new(e),
        })?;
        let size = buffer.as_file().metadata().map(|m| m.len()).unwrap_or(0);

        let buffer_size = self.options.buffer_size;
        let options = SimpleFileOptions::default()
            .compression_method(compression.method())
            .large_file(size >= u64::from(u32::MAX));
        let writer = self.writer("add a file")?;
        writer.start_file(name.as_str(), options)?;
        copy_bounded(buffer.as_file_mut(), writer, buffer_size, None).map_err(|e| Error::AddFailed {
            path: source.to_path_buf(),
            source: Box::new(Error::Io(e)),
        })?;

        self.entries.insert(name);
        self.buffers.push(buffer.into_temp_path());
        Ok(())
    }

    fn stage(&self, storage: &dyn Storage, source: &Path) -> Result<NamedTempFile> {
        let mut buffer = tempfile::Builder::new()
            .prefix("buffer-")
            .tempfile_in(&self.scratch_dir)?;
        let mut reader = storage.open(source)?;
        // `buffer` is dropped, and its file removed, if the copy fails.
        copy_bounded(&mut reader, &mut buffer, self.options.buffer_size, None)?;
        buffer.flush()?;
        buffer.rewind()?;
        Ok(buffer)
    }

    /// Add a generated entry (manifests, navigation documents).
    pub fn add_bytes(&mut self, entry: &Path, content: &[u8], compression: Compression) -> Result<()> {
        self.expect_state(HandleState::Open, "add bytes")?;
        let name = entry_name(entry)?;
        if self.entries.contains(&name) {
            return Err(Error::DuplicateEntry(name));
        }
        let writer = self.writer("add bytes")?;
        let options = SimpleFileOptions::default().compression_method(compression.method());
        writer.start_file(name.as_str(), options)?;
        writer.write_all(content)?;
        self.entries.insert(name);
        Ok(())
    }

    /// Finalize the container and release every scratch buffer.
    ///
    /// Closing a closed (or stored) handle is a no-op.
    pub fn close(&mut self) -> Result<()> {
        match self.state {
            HandleState::Closed | HandleState::Stored => return Ok(()),
            HandleState::Unopened => {
                return Err(Error::InvalidState {
                    operation: "close",
                    state: self.state,
                });
            }
            HandleState::Open => {}
        }

        let released = self.buffers.len();
        self.buffers.clear();
        self.state = HandleState::Closed;

        let writer = self.writer.take().ok_or(Error::InvalidState {
            operation: "close",
            state: HandleState::Open,
        })?;
        let file = writer.finish()?;
        tracing::debug!(entries = self.entries.len(), released, "archive closed");
        self.finished = Some(file);
        Ok(())
    }

    /// Close if needed, stream the finished container to
    /// `destination/name` on `storage` and drop the scratch copy.
    ///
    /// A failed copy removes the partially written destination file.
    pub fn store_archive(
        &mut self,
        storage: &dyn Storage,
        destination: &Path,
        name: &str,
    ) -> Result<PathBuf> {
        if self.state == HandleState::Open {
            self.close()?;
        }
        self.expect_state(HandleState::Closed, "store")?;
        let mut finished = self.finished.take().ok_or(Error::InvalidState {
            operation: "store",
            state: self.state,
        })?;
        self.state = HandleState::Stored;

        let target = destination.join(name);
        let result = write_to_storage(&mut finished, storage, &target, self.options.buffer_size);
        drop(finished);

        if let Err(e) = result {
            if let Err(cleanup) = storage.remove(&target) {
                tracing::warn!(target = %target.display(), error = %cleanup, "failed to remove partial archive");
            }
            return Err(e);
        }
        tracing::info!(target = %target.display(), entries = self.entries.len(), "archive stored");
        Ok(target)
    }
}

fn write_to_storage(
    finished: &mut NamedTempFile,
    storage: &dyn Storage,
    target: &Path,
    buffer_size: usize,
) -> Result<()> {
    let file: &mut File = finished.as_file_mut();
    file.rewind()?;
    let mut out = storage.create(target)?;
    copy_bounded(file, &mut out, buffer_size, None).map_err(|e| Error::ExtractionFailed {
        path: target.to_path_buf(),
        source: e,
    })?;
    out.flush()?;
    Ok(())
}
