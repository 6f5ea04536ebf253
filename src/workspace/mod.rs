//! Request-scoped storage.
//!
//! # Data Flow
//! ```text
//! WorkspaceRoot (injected, created on first use)
//!     → Workspace (<root>/<request-id>, one per inbound request)
//!     → persister.rs (info.json + artifacts → ManifestEntry)
//! ```
//!
//! Workspaces are never deleted by the bridge; they stay on disk for
//! inspection.

pub mod persister;

pub use persister::{persist, ManifestEntry, PersistError, PersistedPart};

use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Parent directory of all request workspaces.
#[derive(Debug, Clone)]
pub struct WorkspaceRoot {
    path: PathBuf,
}

impl WorkspaceRoot {
    /// The directory is not touched until the first workspace is created.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create a fresh workspace with a random id.
    ///
    /// Safe to call concurrently: `create_dir_all` tolerates the root being
    /// created by another request in between.
    pub fn create_workspace(&self) -> io::Result<Workspace> {
        std::fs::create_dir_all(&self.path)?;
        let root = std::fs::canonicalize(&self.path)?;

        let id = Uuid::new_v4().simple().to_string();
        let dir = root.join(&id);
        std::fs::create_dir(&dir)?;

        tracing::debug!(request_id = %id, dir = %dir.display(), "Workspace created");
        Ok(Workspace { id, dir })
    }
}

/// Directory owning every file produced while serving one request.
#[derive(Debug, Clone)]
pub struct Workspace {
    id: String,
    dir: PathBuf,
}

impl Workspace {
    /// Random token identifying the request.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Absolute path of the workspace directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_created_on_first_use() {
        let tmp = tempfile::tempdir().unwrap();
        let root = WorkspaceRoot::new(tmp.path().join("nested").join("tmp"));
        assert!(!root.path().exists());

        let ws = root.create_workspace().unwrap();
        assert!(ws.dir().is_dir());
        assert!(ws.dir().is_absolute());
        assert_eq!(ws.dir().file_name().unwrap().to_str().unwrap(), ws.id());
    }

    #[test]
    fn test_workspaces_are_distinct() {
        let tmp = tempfile::tempdir().unwrap();
        let root = WorkspaceRoot::new(tmp.path());
        let a = root.create_workspace().unwrap();
        let b = root.create_workspace().unwrap();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.dir(), b.dir());
    }

    #[test]
    fn test_concurrent_first_use() {
        let tmp = tempfile::tempdir().unwrap();
        let root = WorkspaceRoot::new(tmp.path().join("shared"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let root = root.clone();
                std::thread::spawn(move || root.create_workspace().map(|ws| ws.id().to_string()))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
    }
}
