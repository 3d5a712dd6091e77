//! JSON-array persistence for the paper catalog and the Q/A history.
//!
//! Each file holds one JSON array. Appends run the whole
//! read-modify-write under an async mutex, so two papers finishing at the
//! same time cannot lose each other's catalog entries.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::PersistError;

pub struct JsonLog<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _entry: PhantomData<T>,
}

impl<T> JsonLog<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            _entry: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current entries. A missing file is an empty history;
    /// entries that no longer parse are logged and dropped rather than
    /// taking the session down.
    pub async fn load(&self) -> Result<Vec<T>, PersistError> {
        let _guard = self.lock.lock().await;
        let values = self.load_values().await?;

        let mut entries = Vec::with_capacity(values.len());
        for value in values {
            match serde_json::from_value(value) {
                Ok(entry) => entries.push(entry),
                Err(error) => {
                    warn!(path = %self.path.display(), %error, "skipping unreadable history entry");
                }
            }
        }
        Ok(entries)
    }

    pub async fn append(&self, entry: &T) -> Result<(), PersistError> {
        let _guard = self.lock.lock().await;

        let mut entries = self.load_values().await?;
        entries.push(serde_json::to_value(entry)?);

        let rendered = serde_json::to_string_pretty(&entries)?;
        tokio::fs::write(&self.path, rendered).await?;
        Ok(())
    }

    async fn load_values(&self) -> Result<Vec<serde_json::Value>, PersistError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Vec::new());
            }
            Err(error) => return Err(error.into()),
        };

        match serde_json::from_str(&raw) {
            Ok(entries) => Ok(entries),
            Err(error) => {
                warn!(path = %self.path.display(), %error, "unreadable history file, starting fresh");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QaEntry;
    use chrono::Utc;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn entry(question: &str) -> QaEntry {
        QaEntry {
            question: question.to_string(),
            answer: "an answer".to_string(),
            asked_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn append_creates_the_file_with_one_entry() {
        let dir = tempdir().unwrap();
        let log = JsonLog::<QaEntry>::new(dir.path().join("qa_history.json"));

        log.append(&entry("first?")).await.unwrap();

        let entries = log.load().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].question, "first?");
    }

    #[tokio::test]
    async fn append_extends_an_existing_array() {
        let dir = tempdir().unwrap();
        let log = JsonLog::<QaEntry>::new(dir.path().join("qa_history.json"));

        log.append(&entry("first?")).await.unwrap();
        log.append(&entry("second?")).await.unwrap();

        let entries = log.load().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].question, "second?");
    }

    #[tokio::test]
    async fn the_file_is_a_pretty_printed_array() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("qa_history.json");
        let log = JsonLog::<QaEntry>::new(&path);

        log.append(&entry("only?")).await.unwrap();

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(raw.trim_start().starts_with('['));
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn corrupt_file_is_recovered_from() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("qa_history.json");
        tokio::fs::write(&path, "{ not json [").await.unwrap();

        let log = JsonLog::<QaEntry>::new(&path);
        log.append(&entry("after corruption")).await.unwrap();

        let entries = log.load().await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_appends_lose_nothing() {
        let dir = tempdir().unwrap();
        let log = Arc::new(JsonLog::<QaEntry>::new(dir.path().join("qa_history.json")));

        let tasks: Vec<_> = (0..8)
            .map(|index| {
                let log = Arc::clone(&log);
                tokio::spawn(async move { log.append(&entry(&format!("question {index}"))).await })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let entries = log.load().await.unwrap();
        assert_eq!(entries.len(), 8);
    }
}
