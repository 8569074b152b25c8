// Persistence hook for intermediate values
//
// A log stores serialized copies of values under logical ids so a later run
// could pick up where an earlier one stopped. Nothing in the engine writes to
// it on its own; choreographies reach it through `Choreo::log`.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use locus::{ChoreographyError, Result};

/// Raw key-value persistence of JSON strings.
#[async_trait]
pub trait Log: Send + Sync {
    async fn write_raw(&self, id: &str, value: String) -> Result<()>;

    /// `None` when nothing was written under `id`.
    async fn read_raw(&self, id: &str) -> Result<Option<String>>;
}

/// Typed access on top of any [`Log`].
#[async_trait]
pub trait LogExt: Log {
    async fn write<T>(&self, id: &str, value: &T) -> Result<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        let raw = serde_json::to_string(value)?;
        self.write_raw(id, raw).await
    }

    async fn read<T>(&self, id: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.read_raw(id).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

impl<T: Log + ?Sized> LogExt for T {}

#[async_trait]
impl<T: Log + ?Sized> Log for std::sync::Arc<T> {
    async fn write_raw(&self, id: &str, value: String) -> Result<()> {
        (**self).write_raw(id, value).await
    }

    async fn read_raw(&self, id: &str) -> Result<Option<String>> {
        (**self).read_raw(id).await
    }
}

/// Process-local log.
#[derive(Debug, Default)]
pub struct InMemoryLog {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Log for InMemoryLog {
    async fn write_raw(&self, id: &str, value: String) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_owned(), value);
        Ok(())
    }

    async fn read_raw(&self, id: &str) -> Result<Option<String>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }
}

/// One JSON file per id inside a directory. File names are the hex encoding
/// of the id, so any id is a valid name.
#[derive(Debug, Clone)]
pub struct FileLog {
    dir: PathBuf,
}

impl FileLog {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hex::encode(id)))
    }
}

fn io_error(e: std::io::Error) -> ChoreographyError {
    ChoreographyError::Local(e.into())
}

#[async_trait]
impl Log for FileLog {
    async fn write_raw(&self, id: &str, value: String) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(io_error)?;
        tokio::fs::write(self.path(id), value).await.map_err(io_error)
    }

    async fn read_raw(&self, id: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path(id)).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Quote {
        title: String,
        price: u32,
    }

    #[tokio::test]
    async fn in_memory_round_trip() {
        let log = InMemoryLog::new();
        assert_eq!(log.read::<u32>("missing").await.unwrap(), None);

        let quote = Quote {
            title: "TAPL".into(),
            price: 80,
        };
        log.write("quote", &quote).await.unwrap();
        assert_eq!(log.read::<Quote>("quote").await.unwrap(), Some(quote));
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn file_log_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        FileLog::new(dir.path().join("log"))
            .write("step/1", &vec![1, 2, 3])
            .await
            .unwrap();

        let reopened = FileLog::new(dir.path().join("log"));
        assert_eq!(
            reopened.read::<Vec<u32>>("step/1").await.unwrap(),
            Some(vec![1, 2, 3])
        );
        assert_eq!(reopened.read::<Vec<u32>>("step/2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn typed_read_of_wrong_shape_fails() {
        let log = InMemoryLog::new();
        log.write_raw("n", "\"text\"".into()).await.unwrap();
        assert!(matches!(
            log.read::<u32>("n").await,
            Err(ChoreographyError::Serialization(_))
        ));
    }
}
