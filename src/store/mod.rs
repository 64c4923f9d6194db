// Persistence boundary. Documents are read, transformed by value, and written
// back with a compare-and-swap on their version number.

pub mod filesystem;
pub mod memory;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{StoreBackend, StoreConfig};
use crate::documents::{Document, DocumentId};

pub use filesystem::FileSystemStore;
pub use memory::InMemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document {id} changed concurrently: expected version {expected}, found {found}")]
    Conflict {
        id: DocumentId,
        expected: u64,
        found: u64,
    },

    #[error("document {0} not found")]
    NotFound(DocumentId),

    #[error("document {0} already exists")]
    AlreadyExists(DocumentId),

    #[error("document {id} proposes version {proposed}, which does not follow {expected}")]
    VersionSkew {
        id: DocumentId,
        expected: u64,
        proposed: u64,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Lock acquisition failed: {reason}")]
    Lock { reason: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("store backend {0} is not available in this build")]
    Unsupported(String),
}

/// Document persistence with optimistic concurrency
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store a newly created document; fails if the id is taken
    async fn insert(&self, document: &Document) -> Result<(), StoreError>;

    async fn get(&self, id: &DocumentId) -> Result<Option<Document>, StoreError>;

    /// All documents ordered by id
    async fn list(&self) -> Result<Vec<Document>, StoreError>;

    /// Replace the stored document iff its version is still `expected_version`.
    ///
    /// `document.version()` must be `expected_version + 1`.
    async fn compare_and_swap(
        &self,
        document: &Document,
        expected_version: u64,
    ) -> Result<(), StoreError>;

    async fn fetch(&self, id: &DocumentId) -> Result<Document, StoreError> {
        self.get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }
}

/// Shared CAS precondition check used by every backend
pub(crate) fn check_swap(
    stored_version: u64,
    document: &Document,
    expected_version: u64,
) -> Result<(), StoreError> {
    if document.version() != expected_version + 1 {
        return Err(StoreError::VersionSkew {
            id: document.id().clone(),
            expected: expected_version,
            proposed: document.version(),
        });
    }
    if stored_version != expected_version {
        warn!(
            document_id = %document.id(),
            expected = expected_version,
            found = stored_version,
            "Rejecting stale write"
        );
        return Err(StoreError::Conflict {
            id: document.id().clone(),
            expected: expected_version,
            found: stored_version,
        });
    }
    Ok(())
}

/// Build the store selected in configuration
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory document store; nothing survives this process");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StoreBackend::Filesystem => {
            info!(directory = ?config.directory, "Using file system document store");
            Ok(Arc::new(FileSystemStore::open(&config.directory).await?))
        }
        #[cfg(feature = "database")]
        StoreBackend::Sqlite => {
            info!(url = %config.database_url, "Using SQLite document store");
            let store = crate::database::SqliteStore::new(
                &config.database_url,
                config.max_connections,
                config.auto_migrate,
            )
            .await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "database"))]
        StoreBackend::Sqlite => Err(StoreError::Unsupported(
            "sqlite (rebuild with --features database)".to_string(),
        )),
    }
}
