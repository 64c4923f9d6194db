use async_trait::async_trait;
use fd_lock::RwLock;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use super::{check_swap, DocumentStore, StoreError};
use crate::documents::{Document, DocumentId};

const LOCK_FILE: &str = ".haulsign.lock";

/// One pretty-printed JSON file per document.
///
/// Writes go through a temporary file and a rename, so readers never see a
/// half-written document. Inserts and swaps hold an advisory lock on a
/// directory-wide lock file, which makes the version check and the write one
/// step even across processes.
#[derive(Debug, Clone)]
pub struct FileSystemStore {
    directory: PathBuf,
}

impl FileSystemStore {
    pub async fn open(directory: impl AsRef<Path>) -> Result<Self, StoreError> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory).await?;
        info!(directory = ?directory, "File system store ready");
        Ok(Self { directory })
    }

    fn document_path(&self, id: &DocumentId) -> PathBuf {
        // DocumentId only admits [A-Za-z0-9_-], so the id is a safe file name.
        self.directory.join(format!("{id}.json"))
    }

    /// Run `f` on a blocking thread while holding the directory write lock
    async fn with_lock<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    {
        let lock_path = self.directory.join(LOCK_FILE);
        tokio::task::spawn_blocking(move || {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)?;
            let mut lock = RwLock::new(file);
            let _guard = lock.write().map_err(|e| StoreError::Lock {
                reason: format!("{}: {e}", lock_path.display()),
            })?;
            f()
        })
        .await
        .map_err(|e| StoreError::Lock {
            reason: format!("lock task failed: {e}"),
        })?
    }
}

fn read_document(path: &Path) -> Result<Option<Document>, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_document(path: &Path, document: &Document) -> Result<(), StoreError> {
    let serialized = serde_json::to_string_pretty(document)?;
    let temp = path.with_extension("json.tmp");
    {
        use std::io::Write;
        let mut file = File::create(&temp)?;
        file.write_all(serialized.as_bytes())?;
        file.sync_all()?;
    }
    std::fs::rename(&temp, path)?;
    Ok(())
}

#[async_trait]
impl DocumentStore for FileSystemStore {
    async fn insert(&self, document: &Document) -> Result<(), StoreError> {
        let path = self.document_path(document.id());
        let document = document.clone();
        self.with_lock(move || {
            if path.exists() {
                return Err(StoreError::AlreadyExists(document.id().clone()));
            }
            write_document(&path, &document)?;
            debug!(document_id = %document.id(), file = ?path, "Document inserted");
            Ok(())
        })
        .await
    }

    async fn get(&self, id: &DocumentId) -> Result<Option<Document>, StoreError> {
        let path = self.document_path(id);
        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<Document>, StoreError> {
        let mut entries = fs::read_dir(&self.directory).await?;
        let mut documents = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let contents = fs::read_to_string(&path).await?;
            documents.push(serde_json::from_str::<Document>(&contents)?);
        }
        documents.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(documents)
    }

    async fn compare_and_swap(
        &self,
        document: &Document,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let path = self.document_path(document.id());
        let document = document.clone();
        self.with_lock(move || {
            let stored = read_document(&path)?
                .ok_or_else(|| StoreError::NotFound(document.id().clone()))?;
            check_swap(stored.version(), &document, expected_version)?;
            write_document(&path, &document)?;
            debug!(
                document_id = %document.id(),
                version = document.version(),
                file = ?path,
                "Document swapped"
            );
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::{Charges, NewDocument, RecordedEvent};
    use chrono::Utc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_filesystem_store_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSystemStore::open(temp_dir.path()).await.unwrap();
        let doc = Document::new(
            NewDocument::rate_confirmation(Charges::flat(99_000))
                .with_id(DocumentId::parse("RC-001").unwrap()),
        );

        store.insert(&doc).await.unwrap();
        assert!(temp_dir.path().join("RC-001.json").exists());
        assert_eq!(store.fetch(doc.id()).await.unwrap(), doc);
        assert_eq!(store.list().await.unwrap(), vec![doc]);
    }

    #[tokio::test]
    async fn test_filesystem_store_conflict() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSystemStore::open(temp_dir.path()).await.unwrap();
        let doc = Document::new(NewDocument::bill_of_lading(Charges::flat(1)));
        store.insert(&doc).await.unwrap();

        let mut next = doc.clone();
        next.advance(
            doc.status(),
            RecordedEvent::ChargesRevised { total_cents: 1 },
            None,
            Utc::now(),
        );
        store.compare_and_swap(&next, 1).await.unwrap();
        assert!(matches!(
            store.compare_and_swap(&next, 1).await,
            Err(StoreError::Conflict { found: 2, .. })
        ));
        // no temp files left behind
        let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_list_ignores_lock_and_foreign_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSystemStore::open(temp_dir.path()).await.unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "hello").unwrap();
        let doc = Document::new(NewDocument::bill_of_lading(Charges::flat(1)));
        store.insert(&doc).await.unwrap();

        assert!(temp_dir.path().join(LOCK_FILE).exists());
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_inconsistent_file_is_refused_on_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSystemStore::open(temp_dir.path()).await.unwrap();
        let doc = Document::new(
            NewDocument::rate_confirmation(Charges::flat(5_000))
                .with_id(DocumentId::parse("RC-77").unwrap()),
        );
        store.insert(&doc).await.unwrap();

        let path = temp_dir.path().join("RC-77.json");
        let mut json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        json["status"] = serde_json::json!({"kind": "bill_of_lading", "status": "unsigned"});
        std::fs::write(&path, json.to_string()).unwrap();

        assert!(matches!(
            store.get(doc.id()).await,
            Err(StoreError::Serialization(_))
        ));
    }
}
