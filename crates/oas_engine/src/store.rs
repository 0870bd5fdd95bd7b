//! Key-addressed blob storage, used both as a document source and as the
//! publish destination.
use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;

use crate::persist::AtomicFileWriter;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("object {container}/{key} not found")]
    NotFound { container: String, key: String },
    #[error("invalid object location {0:?}")]
    InvalidKey(String),
    #[error("storage io error: {0}")]
    Io(String),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read an object. `token` is passed along for stores that sit behind the
    /// same origin authorization as the documents.
    async fn get(&self, container: &str, key: &str, token: Option<&str>)
        -> Result<Vec<u8>, StoreError>;

    async fn put(
        &self,
        container: &str,
        key: &str,
        body: &[u8],
        content_type: &str,
    ) -> Result<(), StoreError>;
}

/// Containers are directories under `root`; keys are relative paths inside them.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `container/key`, refusing anything that would leave the container.
    pub fn resolve(&self, container: &str, key: &str) -> Result<PathBuf, StoreError> {
        let container = relative_path(container)?;
        let key = relative_path(key)?;
        Ok(self.root.join(container).join(key))
    }
}

fn relative_path(raw: &str) -> Result<PathBuf, StoreError> {
    let path = Path::new(raw);
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(StoreError::InvalidKey(raw.to_string()));
            }
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(StoreError::InvalidKey(raw.to_string()));
    }
    Ok(clean)
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn get(
        &self,
        container: &str,
        key: &str,
        _token: Option<&str>,
    ) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve(container, key)?;
        tokio::fs::read(&path).await.map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                StoreError::NotFound {
                    container: container.to_string(),
                    key: key.to_string(),
                }
            } else {
                StoreError::Io(format!("{}: {err}", path.display()))
            }
        })
    }

    async fn put(
        &self,
        container: &str,
        key: &str,
        body: &[u8],
        _content_type: &str,
    ) -> Result<(), StoreError> {
        let relative = relative_path(container)?.join(relative_path(key)?);
        let writer = AtomicFileWriter::new(self.root.clone());
        let body = body.to_vec();
        tokio::task::spawn_blocking(move || writer.write(&relative, &body))
            .await
            .map_err(|err| StoreError::Io(err.to_string()))?
            .map(|_| ())
            .map_err(|err| StoreError::Io(err.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

/// Process-local store. Writes to containers marked read-only fail.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<(String, String), StoredObject>>,
    read_only: Mutex<Vec<String>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, container: &str, key: &str, body: impl Into<Vec<u8>>) {
        self.lock_objects().insert(
            (container.to_string(), key.to_string()),
            StoredObject {
                body: body.into(),
                content_type: "application/octet-stream".to_string(),
            },
        );
    }

    pub fn object(&self, container: &str, key: &str) -> Option<StoredObject> {
        self.lock_objects()
            .get(&(container.to_string(), key.to_string()))
            .cloned()
    }

    /// Keys present in `container`, in sorted order.
    pub fn keys(&self, container: &str) -> Vec<String> {
        self.lock_objects()
            .keys()
            .filter(|(c, _)| c == container)
            .map(|(_, k)| k.clone())
            .collect()
    }

    pub fn set_read_only(&self, container: &str) {
        self.read_only
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(container.to_string());
    }

    fn lock_objects(&self) -> std::sync::MutexGuard<'_, BTreeMap<(String, String), StoredObject>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(
        &self,
        container: &str,
        key: &str,
        _token: Option<&str>,
    ) -> Result<Vec<u8>, StoreError> {
        self.object(container, key)
            .map(|object| object.body)
            .ok_or_else(|| StoreError::NotFound {
                container: container.to_string(),
                key: key.to_string(),
            })
    }

    async fn put(
        &self,
        container: &str,
        key: &str,
        body: &[u8],
        content_type: &str,
    ) -> Result<(), StoreError> {
        let read_only = self
            .read_only
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|c| c == container);
        if read_only {
            return Err(StoreError::Io(format!("container {container} is read-only")));
        }
        self.lock_objects().insert(
            (container.to_string(), key.to_string()),
            StoredObject {
                body: body.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_cannot_escape_the_container() {
        let store = FsObjectStore::new("/data");
        assert!(store.resolve("specs", "../secrets.json").is_err());
        assert!(store.resolve("specs", "/etc/passwd").is_err());
        assert!(store.resolve("..", "a.json").is_err());
        assert!(store.resolve("specs", "").is_err());
        assert_eq!(
            store.resolve("specs", "./team/a.json").unwrap(),
            PathBuf::from("/data/specs/team/a.json")
        );
    }
}
