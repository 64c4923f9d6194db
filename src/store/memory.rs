use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::{check_swap, DocumentStore, StoreError};
use crate::documents::{Document, DocumentId};

/// Process-local store; the compare-and-swap runs under the write lock
#[derive(Debug, Default)]
pub struct InMemoryStore {
    documents: RwLock<BTreeMap<DocumentId, Document>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn insert(&self, document: &Document) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        if documents.contains_key(document.id()) {
            return Err(StoreError::AlreadyExists(document.id().clone()));
        }
        documents.insert(document.id().clone(), document.clone());
        debug!(document_id = %document.id(), "Document inserted");
        Ok(())
    }

    async fn get(&self, id: &DocumentId) -> Result<Option<Document>, StoreError> {
        Ok(self.documents.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Document>, StoreError> {
        Ok(self.documents.read().await.values().cloned().collect())
    }

    async fn compare_and_swap(
        &self,
        document: &Document,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        let stored = documents
            .get_mut(document.id())
            .ok_or_else(|| StoreError::NotFound(document.id().clone()))?;
        check_swap(stored.version(), document, expected_version)?;
        *stored = document.clone();
        debug!(
            document_id = %document.id(),
            version = document.version(),
            "Document swapped"
        );
        Ok(())
    }
}
