use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rand::Rng;

use crate::storage::LocalStorage;
use crate::{Error, Result};

const MAX_ID_ATTEMPTS: u32 = 16;
const SUFFIX_LEN: usize = 6;
const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// The fixed sub-directories of a session workspace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Area {
    /// Extracted input archive or copied-in upload.
    Raw,
    /// Resource files referenced by the object graph.
    Resources,
    /// Renderer output.
    Export,
    /// Codec buffers and spooled input.
    Scratch,
}

impl Area {
    pub const ALL: [Area; 4] = [Area::Raw, Area::Resources, Area::Export, Area::Scratch];

    pub fn dir_name(self) -> &'static str {
        match self {
            Area::Raw => "raw",
            Area::Resources => "resources",
            Area::Export => "export",
            Area::Scratch => "scratch",
        }
    }
}

/// Ephemeral, isolated filesystem root owned by one pipeline run.
///
/// The id is `<YYYYMMDDHHMMSS>-<suffix>`; all areas exist once `create`
/// returns. The tree is removed by [`SessionWorkspace::close`] or, failing
/// that, on drop.
#[derive(Debug)]
pub struct SessionWorkspace {
    id: String,
    root: PathBuf,
    closed: bool,
}

impl SessionWorkspace {
    pub fn create(parent: impl AsRef<Path>) -> Result<Self> {
        let parent = parent.as_ref();
        fs::create_dir_all(parent).map_err(|e| Error::Write {
            path: parent.to_path_buf(),
            source: e,
        })?;
        let parent = parent.canonicalize().map_err(|e| Error::Read {
            path: parent.to_path_buf(),
            source: e,
        })?;

        for _ in 0..MAX_ID_ATTEMPTS {
            let id = generate_id();
            let root = parent.join(&id);
            match fs::create_dir(&root) {
                Ok(()) => {
                    let workspace = Self {
                        id,
                        root,
                        closed: false,
                    };
                    // On failure the partially built workspace is dropped and removed.
                    workspace.create_areas()?;
                    tracing::debug!(id = %workspace.id, root = %workspace.root.display(), "workspace created");
                    return Ok(workspace);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    tracing::debug!(%id, "workspace id collision, retrying");
                    continue;
                }
                Err(e) => {
                    return Err(Error::Write {
                        path: root,
                        source: e,
                    });
                }
            }
        }

        Err(Error::IdExhausted {
            attempts: MAX_ID_ATTEMPTS,
        })
    }

    fn create_areas(&self) -> Result<()> {
        for area in Area::ALL {
            let path = self.root.join(area.dir_name());
            fs::create_dir(&path).map_err(|e| Error::Write { path, source: e })?;
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, area: Area) -> PathBuf {
        self.root.join(area.dir_name())
    }

    pub fn storage(&self, area: Area) -> LocalStorage {
        LocalStorage::new(self.resolve(area))
    }

    /// Find the root of workspace `id` under `parent`, if it still exists.
    pub fn locate(parent: impl AsRef<Path>, id: &str) -> Option<PathBuf> {
        let root = parent.as_ref().join(id);
        root.is_dir().then_some(root)
    }

    /// Remove the whole workspace tree. Already-removed trees are fine.
    ///
    /// On failure the tree is left for `Drop` to try once more.
    pub fn close(mut self) -> Result<()> {
        self.remove()
    }

    fn remove(&mut self) -> Result<()> {
        remove_tree(&self.root)?;
        self.closed = true;
        tracing::debug!(id = %self.id, "workspace closed");
        Ok(())
    }
}

impl Drop for SessionWorkspace {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = remove_tree(&self.root) {
            tracing::warn!(id = %self.id, error = %e, "failed to remove workspace on drop");
        }
    }
}

fn remove_tree(root: &Path) -> Result<()> {
    match fs::remove_dir_all(root) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Write {
            path: root.to_path_buf(),
            source: e,
        }),
    }
}

fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!("{}-{}", chrono::Local::now().format("%Y%m%d%H%M%S"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_makes_all_areas() {
        let dir = tempdir().unwrap();
        let workspace = SessionWorkspace::create(dir.path()).unwrap();
        for area in Area::ALL {
            assert!(workspace.resolve(area).is_dir(), "{area:?} missing");
        }
        assert_eq!(workspace.id().len(), 14 + 1 + SUFFIX_LEN);
        assert!(workspace.id()[..14].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_ids_are_distinct() {
        let dir = tempdir().unwrap();
        let a = SessionWorkspace::create(dir.path()).unwrap();
        let b = SessionWorkspace::create(dir.path()).unwrap();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.root(), b.root());
    }

    #[test]
    fn test_close_removes_tree() {
        let dir = tempdir().unwrap();
        let workspace = SessionWorkspace::create(dir.path()).unwrap();
        let id = workspace.id().to_string();
        fs::write(workspace.resolve(Area::Raw).join("contentv3.xml"), "<x/>").unwrap();
        workspace.close().unwrap();
        assert!(SessionWorkspace::locate(dir.path(), &id).is_none());
    }

    #[test]
    fn test_close_after_external_removal_is_noop() {
        let dir = tempdir().unwrap();
        let workspace = SessionWorkspace::create(dir.path()).unwrap();
        fs::remove_dir_all(workspace.root()).unwrap();
        workspace.close().unwrap();
    }

    #[test]
    fn test_failed_removal_is_retried_on_drop() {
        let dir = tempdir().unwrap();
        let mut workspace = SessionWorkspace::create(dir.path()).unwrap();
        let root = workspace.root().to_path_buf();

        fs::remove_dir_all(&root).unwrap();
        fs::write(&root, b"not a directory").unwrap();
        assert!(workspace.remove().is_err());
        assert!(!workspace.closed);

        fs::remove_file(&root).unwrap();
        fs::create_dir(&root).unwrap();
        drop(workspace);
        assert!(!root.exists());
    }

    #[test]
    fn test_drop_removes_tree() {
        let dir = tempdir().unwrap();
        let id = {
            let workspace = SessionWorkspace::create(dir.path()).unwrap();
            assert!(SessionWorkspace::locate(dir.path(), workspace.id()).is_some());
            workspace.id().to_string()
        };
        assert!(SessionWorkspace::locate(dir.path(), &id).is_none());
    }

    #[test]
    fn test_storage_is_scoped_to_area() {
        let dir = tempdir().unwrap();
        let workspace = SessionWorkspace::create(dir.path()).unwrap();
        use crate::Storage;
        workspace
            .storage(Area::Export)
            .write(Path::new("index.html"), b"ok")
            .unwrap();
        assert!(workspace.resolve(Area::Export).join("index.html").exists());
    }
}
