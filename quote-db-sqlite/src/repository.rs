use std::str::FromStr;

use async_trait::async_trait;
use quote_core::{Document, DocumentKind, DocumentRepository, RepositoryError};
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Executor, query, query_scalar};
use tracing::{debug, info};

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Opens `connection_string`: a file path (created when missing) or
    /// `:memory:`.
    ///
    /// Every connection to `:memory:` gets its own empty database, so the
    /// in-memory pool is capped at a single connection.
    pub async fn new(connection_string: &str) -> Result<Self, RepositoryError> {
        let pool = if connection_string == ":memory:" {
            let options = SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| RepositoryError::Configuration(e.to_string()))?;
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(options)
                .await
        } else {
            let options = SqliteConnectOptions::new()
                .filename(connection_string)
                .create_if_missing(true);
            SqlitePoolOptions::new().connect_with(options).await
        }
        .map_err(|e| RepositoryError::Connection(e.to_string()))?;

        info!(database = connection_string, "sqlite database opened");
        Ok(Self { pool })
    }

    pub async fn new_with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<(), RepositoryError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Maps a failed write, telling number collisions apart from other
/// uniqueness violations.
fn write_error(
    error: sqlx::Error,
    document: &Document,
) -> RepositoryError {
    if let sqlx::Error::Database(db) = &error
        && db.is_unique_violation()
    {
        if db.message().contains("documents.number") {
            return RepositoryError::NumberCollision(document.number.clone());
        }
        return RepositoryError::Conflict(db.message().to_string());
    }
    RepositoryError::Database(error.to_string())
}

fn decode(body: &str) -> Result<Document, RepositoryError> {
    serde_json::from_str(body)
        .map_err(|e| RepositoryError::Database(format!("corrupt document body: {e}")))
}

fn encode(document: &Document) -> Result<String, RepositoryError> {
    serde_json::to_string(document).map_err(|e| RepositoryError::Database(e.to_string()))
}

async fn insert_row<'e, E>(
    executor: E,
    document: &Document,
) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let body = encode(document)?;
    let link = document.link();

    query(
        "INSERT INTO documents (
            id, number, kind, status, client_id, issue_date,
            source_quote_id, invoice_kind, body
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&document.id)
    .bind(&document.number)
    .bind(document.kind().as_str())
    .bind(document.status().as_str())
    .bind(&document.client_id)
    .bind(document.issue_date)
    .bind(link.map(|l| l.source_quote_id.as_str()))
    .bind(link.map(|l| l.kind.as_str()))
    .bind(body)
    .execute(executor)
    .await
    .map_err(|e| write_error(e, document))?;

    Ok(())
}

async fn update_row<'e, E>(
    executor: E,
    document: &Document,
) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let body = encode(document)?;

    let result = query(
        "UPDATE documents
         SET number = ?, status = ?, client_id = ?, issue_date = ?, body = ?,
             updated_at = CURRENT_TIMESTAMP
         WHERE id = ?",
    )
    .bind(&document.number)
    .bind(document.status().as_str())
    .bind(&document.client_id)
    .bind(document.issue_date)
    .bind(body)
    .bind(&document.id)
    .execute(executor)
    .await
    .map_err(|e| write_error(e, document))?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound(document.id.clone()));
    }
    Ok(())
}

#[async_trait]
impl DocumentRepository for SqliteRepository {
    async fn get_document(&self, id: &str) -> Result<Document, RepositoryError> {
        let body: String = query_scalar::<_, String>("SELECT body FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

        decode(&body)
    }

    async fn find_by_number(&self, number: &str) -> Result<Option<Document>, RepositoryError> {
        let body: Option<String> = query_scalar::<_, String>("SELECT body FROM documents WHERE number = ?")
            .bind(number)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        body.as_deref().map(decode).transpose()
    }

    async fn list_documents(
        &self,
        kind: Option<DocumentKind>,
    ) -> Result<Vec<Document>, RepositoryError> {
        let bodies: Vec<String> = match kind {
            Some(kind) => {
                query_scalar::<_, String>("SELECT body FROM documents WHERE kind = ? ORDER BY rowid")
                    .bind(kind.as_str())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                query_scalar::<_, String>("SELECT body FROM documents ORDER BY rowid")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        bodies.iter().map(|body| decode(body)).collect()
    }

    async fn insert_document(&self, document: &Document) -> Result<(), RepositoryError> {
        insert_row(&self.pool, document).await?;
        debug!(number = %document.number, "document inserted");
        Ok(())
    }

    async fn update_document(&self, document: &Document) -> Result<(), RepositoryError> {
        update_row(&self.pool, document).await
    }

    async fn commit_derivation(
        &self,
        quote: &Document,
        invoice: &Document,
    ) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        // Dropping `tx` on an early return rolls both writes back.
        update_row(&mut *tx, quote).await?;
        insert_row(&mut *tx, invoice).await?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        debug!(quote = %quote.number, invoice = %invoice.number, "derivation committed");
        Ok(())
    }
}
