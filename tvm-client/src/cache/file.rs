use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::types::CredentialRecord;

/// Credential cache persisted as a single JSON object on disk.
///
/// Every instance pointed at the same path shares the document. Writes are
/// whole-document read-modify-write with no locking: two processes writing
/// different keys at the same time may lose one of the updates. Each write
/// lands through a rename, so readers only ever see a complete document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up `key`. A missing, unreadable or malformed file is a miss.
    pub async fn read(&self, key: &str) -> Option<CredentialRecord> {
        let mut entries = self.load().await?;
        match entries.remove(key)? {
            Value::Object(fields) => Some(CredentialRecord::new(fields)),
            _ => {
                log::debug!("[tvm] Cache entry is not an object, ignoring");
                None
            }
        }
    }

    /// Set `key` to `record`, keeping every other entry in the file.
    ///
    /// An unreadable or malformed file is replaced by a fresh document.
    pub async fn write(&self, key: &str, record: &CredentialRecord) -> io::Result<()> {
        let mut entries = self.load().await.unwrap_or_default();
        entries.insert(key.to_string(), Value::Object(record.as_map().clone()));

        let content = serde_json::to_vec(&entries)?;
        self.replace_contents(&content).await
    }

    async fn load(&self) -> Option<Map<String, Value>> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) => {
                log::debug!("[tvm] Cache file {} not readable: {e}", self.path.display());
                return None;
            }
        };

        match serde_json::from_slice::<Map<String, Value>>(&content) {
            Ok(entries) => Some(entries),
            Err(e) => {
                log::debug!("[tvm] Cache file {} is invalid: {e}", self.path.display());
                None
            }
        }
    }

    async fn replace_contents(&self, content: &[u8]) -> io::Result<()> {
        write_then_rename(&self.temp_path(), &self.path, content).await
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map_or_else(|| "tvmCache".into(), |n| n.to_string_lossy());
        self.path
            .with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4()))
    }
}

/// Write `content` to `tmp` and move it over `target`.
///
/// On any failure `tmp` is removed, so no partial copy of the credentials
/// stays behind.
async fn write_then_rename(tmp: &Path, target: &Path, content: &[u8]) -> io::Result<()> {
    let result = match tokio::fs::write(tmp, content).await {
        Ok(()) => tokio::fs::rename(tmp, target).await,
        Err(e) => Err(e),
    };
    if result.is_err() {
        let _ = tokio::fs::remove_file(tmp).await;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> CredentialRecord {
        serde_json::from_value(value).unwrap()
    }

    fn cache_in(dir: &tempfile::TempDir) -> FileCache {
        FileCache::new(dir.path().join(".tvmCache"))
    }

    async fn file_json(cache: &FileCache) -> Value {
        let content = tokio::fs::read(cache.path()).await.unwrap();
        serde_json::from_slice(&content).unwrap()
    }

    #[tokio::test]
    async fn missing_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(cache_in(&dir).read("k").await, None);
    }

    #[tokio::test]
    async fn invalid_json_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        tokio::fs::write(cache.path(), b"{not json").await.unwrap();
        assert_eq!(cache.read("k").await, None);
    }

    #[tokio::test]
    async fn non_object_root_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        tokio::fs::write(cache.path(), b"[1,2,3]").await.unwrap();
        assert_eq!(cache.read("k").await, None);
    }

    #[tokio::test]
    async fn non_object_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        tokio::fs::write(cache.path(), br#"{"k": "creds"}"#)
            .await
            .unwrap();
        assert_eq!(cache.read("k").await, None);
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        let r = record(json!({
            "expiration": "2999-01-01T00:00:00Z",
            "params": { "Bucket": "fake" }
        }));

        cache.write("k", &r).await.unwrap();
        assert_eq!(cache.read("k").await, Some(r.clone()));

        cache.write("k", &r).await.unwrap();
        assert_eq!(cache.read("k").await, Some(r));
        assert_eq!(file_json(&cache).await.as_object().map(Map::len), Some(1));
    }

    #[tokio::test]
    async fn write_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        tokio::fs::write(cache.path(), br#"{"prevKey": {"fake": "creds"}}"#)
            .await
            .unwrap();

        cache.write("k", &record(json!({ "a": 1 }))).await.unwrap();

        assert_eq!(
            file_json(&cache).await,
            json!({ "prevKey": { "fake": "creds" }, "k": { "a": 1 } })
        );
    }

    #[tokio::test]
    async fn write_replaces_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        tokio::fs::write(cache.path(), b"garbage").await.unwrap();

        cache.write("k", &record(json!({ "a": 1 }))).await.unwrap();

        assert_eq!(file_json(&cache).await, json!({ "k": { "a": 1 } }));
    }

    #[tokio::test]
    async fn write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        cache.write("k", &record(json!({ "a": 1 }))).await.unwrap();

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec![".tvmCache".to_string()]);
    }

    #[tokio::test]
    async fn failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // 目标是非空目录，rename 必然失败
        let target = dir.path().join(".tvmCache");
        tokio::fs::create_dir(&target).await.unwrap();
        tokio::fs::write(target.join("keep"), b"x").await.unwrap();
        let tmp = dir.path().join(".tvmCache.partial.tmp");

        assert!(write_then_rename(&tmp, &target, b"{}").await.is_err());
        assert!(!tmp.exists());
        assert!(target.join("keep").exists());
    }

    #[tokio::test]
    async fn failed_temp_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join("missing").join(".tvmCache.partial.tmp");
        let target = dir.path().join(".tvmCache");

        assert!(write_then_rename(&tmp, &target, b"{}").await.is_err());
        assert!(!tmp.exists());
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("missing").join(".tvmCache"));
        assert!(cache.write("k", &record(json!({}))).await.is_err());
        assert_eq!(cache.read("k").await, None);
    }
}
