//! Object storage: where raw email objects are read from.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::StorageError;

/// Read-only access to stored objects addressed by (container, locator).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, container: &str, locator: &str) -> Result<Vec<u8>, StorageError>;
}

/// Object store backed by a local directory: `<root>/<container>/<locator>`.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a (container, locator) pair to a path under the root.
    ///
    /// Both parts must be relative and free of `..` so reads cannot escape.
    fn object_path(&self, container: &str, locator: &str) -> Result<PathBuf, StorageError> {
        let mut path = self.root.clone();
        for part in [container, locator] {
            if part.is_empty() {
                return Err(StorageError::InvalidLocator {
                    locator: format!("{container}/{locator}"),
                    reason: "empty path segment".to_string(),
                });
            }
            for component in Path::new(part).components() {
                match component {
                    Component::Normal(seg) => path.push(seg),
                    Component::CurDir => {}
                    _ => {
                        return Err(StorageError::InvalidLocator {
                            locator: format!("{container}/{locator}"),
                            reason: "must be a relative path without '..'".to_string(),
                        });
                    }
                }
            }
        }
        Ok(path)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn get_object(&self, container: &str, locator: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(container, locator)?;
        debug!(path = %path.display(), "Reading object");
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound {
                    container: container.to_string(),
                    locator: locator.to_string(),
                }
            } else {
                StorageError::Read {
                    container: container.to_string(),
                    locator: locator.to_string(),
                    source: e,
                }
            }
        })
    }
}
