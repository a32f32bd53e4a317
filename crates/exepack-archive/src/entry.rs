use std::path::PathBuf;

/// One entry written during extraction.
#[derive(Clone, Debug)]
pub struct Entry {
    pub original_path: String,
    pub target_path: PathBuf,
    pub size: u64,
    pub kind: EntryKind,
    pub hash: Option<String>,
}

impl Entry {
    pub fn new(original_path: String, target_path: PathBuf, size: u64, kind: EntryKind) -> Self {
        Self {
            original_path,
            target_path,
            size,
            kind,
            hash: None,
        }
    }

    pub fn with_hash(mut self, hash: String) -> Self {
        self.hash = Some(hash);
        self
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, EntryKind::File)
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Clone, Debug, Default)]
pub struct ArchiveReport {
    pub entry_count: usize,
    pub total_bytes: u64,
    pub entries: Vec<Entry>,
}

impl ArchiveReport {
    pub fn files(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|e| e.is_file())
    }

    pub fn find(&self, original_path: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.original_path == original_path)
    }
}
