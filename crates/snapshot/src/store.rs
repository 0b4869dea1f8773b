//! Sled-backed snapshot store, one database per watch root

use arca_core::{Signature, SignatureError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Default name of the reserved database directory inside the watched tree.
pub const DEFAULT_SNAPSHOT_DIR: &str = ".snapshot";

/// Named tree holding the `path -> "<timestamp>:<size>"` mapping.
const SNAPSHOT_TREE: &str = "snapshot";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to open snapshot database at [{path}]: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: sled::Error,
    },
    #[error("snapshot database error: {0}")]
    Db(#[from] sled::Error),
    #[error("corrupt snapshot entry for [{path}]: {source}")]
    BadEntry {
        path: PathBuf,
        #[source]
        source: SignatureError,
    },
}

/// Durable `absolute path -> signature` map scoped to one watch root.
///
/// The database lives in a reserved subdirectory of the watched tree
/// (default [`DEFAULT_SNAPSHOT_DIR`]); that subdirectory is excluded from
/// watching and from enumeration so the store's own writes never feed back
/// into the pipeline. Single writer per directory; concurrent writers from
/// multiple processes are unsupported.
pub struct SnapshotStore {
    root: PathBuf,
    dir: PathBuf,
    tree: sled::Tree,
    // Keeps the database open for the lifetime of the store.
    _db: sled::Db,
}

impl SnapshotStore {
    /// Open (or create) the snapshot database for `root` under the default
    /// reserved directory name.
    pub fn open(root: &Path) -> Result<Self, SnapshotError> {
        Self::open_named(root, DEFAULT_SNAPSHOT_DIR)
    }

    /// Open with a custom reserved directory name.
    pub fn open_named(root: &Path, dir_name: &str) -> Result<Self, SnapshotError> {
        let dir = root.join(dir_name);
        let db = sled::open(&dir).map_err(|source| SnapshotError::Open {
            path: dir.clone(),
            source,
        })?;
        let tree = db.open_tree(SNAPSHOT_TREE)?;
        debug!(root = %root.display(), db = %dir.display(), "snapshot store open");
        Ok(Self {
            root: root.to_path_buf(),
            dir,
            tree,
            _db: db,
        })
    }

    /// Whether a snapshot database already exists for `root`. Used to tell
    /// a previously-known root (seed the backlog from stored entries) from
    /// a brand new one (rescan the live tree).
    pub fn exists(root: &Path, dir_name: &str) -> bool {
        root.join(dir_name).exists()
    }

    /// The watch root this store serves.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of the reserved database directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// True when `path` lies inside the reserved database directory.
    ///
    /// This is a path-component check: a user file whose name merely
    /// contains the reserved directory string is not excluded.
    pub fn is_reserved(&self, path: &Path) -> bool {
        path.starts_with(&self.dir)
    }

    /// Record the signature for `path`. Writes for paths inside the
    /// reserved directory are silently ignored.
    pub fn put(&self, path: &Path, signature: &Signature) -> Result<(), SnapshotError> {
        if self.is_reserved(path) {
            return Ok(());
        }
        self.tree
            .insert(key(path), signature.to_string().as_bytes())?;
        self.tree.flush()?;
        Ok(())
    }

    /// Last recorded signature for `path`, if any.
    pub fn get(&self, path: &Path) -> Result<Option<Signature>, SnapshotError> {
        let Some(raw) = self.tree.get(key(path))? else {
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&raw);
        let sig = text.parse().map_err(|source| SnapshotError::BadEntry {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(sig))
    }

    /// Drop the entry for `path`, if present.
    pub fn delete(&self, path: &Path) -> Result<(), SnapshotError> {
        self.tree.remove(key(path))?;
        self.tree.flush()?;
        Ok(())
    }

    /// Lazily enumerate every stored `(path, signature)` pair outside the
    /// reserved directory. Order is unspecified.
    pub fn enumerate(
        &self,
    ) -> impl Iterator<Item = Result<(PathBuf, Signature), SnapshotError>> + '_ {
        self.tree.iter().filter_map(move |item| match item {
            Ok((k, v)) => {
                let path = PathBuf::from(String::from_utf8_lossy(&k).into_owned());
                if self.is_reserved(&path) {
                    return None;
                }
                let text = String::from_utf8_lossy(&v);
                match text.parse::<Signature>() {
                    Ok(sig) => Some(Ok((path, sig))),
                    Err(source) => Some(Err(SnapshotError::BadEntry { path, source })),
                }
            }
            Err(e) => Some(Err(e.into())),
        })
    }

    /// Number of tracked files.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

fn key(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}
