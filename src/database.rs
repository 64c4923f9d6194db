#[cfg(feature = "database")]
use async_trait::async_trait;
#[cfg(feature = "database")]
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Row, SqlitePool};
#[cfg(feature = "database")]
use tracing::{debug, info};

#[cfg(feature = "database")]
use crate::documents::{Document, DocumentId};
#[cfg(feature = "database")]
use crate::store::{DocumentStore, StoreError};

#[cfg(feature = "database")]
/// SQLite-backed document store
pub struct SqliteStore {
    pool: SqlitePool,
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

#[cfg(feature = "database")]
impl SqliteStore {
    /// Open the database, creating it and running migrations as configured
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        auto_migrate: bool,
    ) -> Result<Self, StoreError> {
        if !sqlx::Sqlite::database_exists(database_url).await? {
            info!("Creating database at {}", database_url);
            sqlx::Sqlite::create_database(database_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        if auto_migrate {
            info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;
            info!("Database migrations completed");
        }

        Ok(Self { pool })
    }

    async fn stored_version(&self, id: &DocumentId) -> Result<Option<u64>, StoreError> {
        let row = sqlx::query("SELECT version FROM documents WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| row.get::<i64, _>("version") as u64))
    }
}

#[cfg(feature = "database")]
fn decode(row: &sqlx::sqlite::SqliteRow) -> Result<Document, StoreError> {
    let body: String = row.get("body");
    Ok(serde_json::from_str(&body)?)
}

#[cfg(feature = "database")]
#[async_trait]
impl DocumentStore for SqliteStore {
    async fn insert(&self, document: &Document) -> Result<(), StoreError> {
        let body = serde_json::to_string(document)?;
        let result = sqlx::query(
            r#"
            INSERT INTO documents (id, kind, status, version, body, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(document.id().as_str())
        .bind(document.kind().as_str())
        .bind(document.status().as_str())
        .bind(document.version() as i64)
        .bind(body)
        .bind(document.updated_at().to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(document_id = %document.id(), "Document inserted");
                Ok(())
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::AlreadyExists(document.id().clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn get(&self, id: &DocumentId) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query("SELECT body FROM documents WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(decode).transpose()
    }

    async fn list(&self) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query("SELECT body FROM documents ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode).collect()
    }

    async fn compare_and_swap(
        &self,
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

        let body = serde_json::to_string(document)?;
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET status = ?1, version = ?2, body = ?3, updated_at = ?4
            WHERE id = ?5 AND version = ?6
            "#,
        )
        .bind(document.status().as_str())
        .bind(document.version() as i64)
        .bind(body)
        .bind(document.updated_at().to_rfc3339())
        .bind(document.id().as_str())
        .bind(expected_version as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            debug!(
                document_id = %document.id(),
                version = document.version(),
                "Document swapped"
            );
            return Ok(());
        }

        match self.stored_version(document.id()).await? {
            None => Err(StoreError::NotFound(document.id().clone())),
            Some(found) => Err(StoreError::Conflict {
                id: document.id().clone(),
                expected: expected_version,
                found,
            }),
        }
    }
}

#[cfg(all(test, feature = "database"))]
mod tests {
    use super::*;
    use crate::documents::{Charges, NewDocument, RecordedEvent};
    use chrono::Utc;
    use tempfile::TempDir;

    async fn store(dir: &TempDir) -> SqliteStore {
        let url = format!("sqlite://{}", dir.path().join("haulsign.db").display());
        SqliteStore::new(&url, 2, true).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_get_and_cas() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;
        let doc = Document::new(NewDocument::rate_confirmation(Charges::flat(5_000)));
        store.insert(&doc).await.unwrap();
        assert!(matches!(
            store.insert(&doc).await,
            Err(StoreError::AlreadyExists(_))
        ));

        let mut next = doc.clone();
        next.advance(
            doc.status(),
            RecordedEvent::ChargesRevised { total_cents: 5_000 },
            None,
            Utc::now(),
        );
        store.compare_and_swap(&next, 1).await.unwrap();
        assert_eq!(store.fetch(doc.id()).await.unwrap(), next);

        assert!(matches!(
            store.compare_and_swap(&next, 1).await,
            Err(StoreError::Conflict {
                expected: 1,
                found: 2,
                ..
            })
        ));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}
