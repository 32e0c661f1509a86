//! SQLite connection management for the local registry

use crate::constants::{DATABASE_FILE_NAME, LOCAL_CACHE_DIRECTORY};
use crate::types::{RunAgentError, RunAgentResult};
use sqlx::{sqlite::SqliteConnectOptions, Pool, Sqlite, SqlitePool};
use std::path::PathBuf;

/// Database manager owning the SQLite pool and schema creation
#[derive(Debug)]
pub struct DatabaseManager {
    pool: Pool<Sqlite>,
    db_path: PathBuf,
}

impl DatabaseManager {
    /// Open (or create) the registry database and ensure its schema exists
    pub async fn new(db_path: Option<PathBuf>) -> RunAgentResult<Self> {
        let db_path = db_path.unwrap_or_else(|| LOCAL_CACHE_DIRECTORY.join(DATABASE_FILE_NAME));

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RunAgentError::database(format!("Failed to create database directory: {}", e))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| RunAgentError::database(format!("Failed to connect to database: {}", e)))?;

        let manager = Self { pool, db_path };
        manager.create_tables_if_not_exist().await?;

        Ok(manager)
    }

    /// Create tables if they don't exist (no migrations)
    async fn create_tables_if_not_exist(&self) -> RunAgentResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agents (
                agent_id TEXT PRIMARY KEY,
                project_path TEXT NOT NULL,
                host TEXT NOT NULL DEFAULT '127.0.0.1',
                port INTEGER NOT NULL DEFAULT 8450,
                framework TEXT NOT NULL DEFAULT 'default',
                status TEXT NOT NULL DEFAULT 'registered',
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RunAgentError::database(format!("Failed to create agents table: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            RunAgentError::database(format!("Failed to create user_metadata table: {}", e))
        })?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_agents_status ON agents(status)")
            .execute(&self.pool)
            .await
            .map_err(|e| RunAgentError::database(format!("Failed to create index: {}", e)))?;

        Ok(())
    }

    /// Get the database pool
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Get the database path
    pub fn db_path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Check if database file exists
    pub fn database_exists(&self) -> bool {
        self.db_path.exists()
    }

    /// Close the database connection
    pub async fn close(self) {
        self.pool.close().await;
    }
}

impl Drop for DatabaseManager {
    fn drop(&mut self) {
        tracing::debug!("DatabaseManager dropped for path: {}", self.db_path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_database_manager_creation() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let manager = DatabaseManager::new(Some(db_path.clone())).await;
        assert!(manager.is_ok());

        let manager = manager.unwrap();
        assert_eq!(manager.db_path(), &db_path);
        assert!(manager.database_exists());
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let first = DatabaseManager::new(Some(db_path.clone())).await.unwrap();
        first.close().await;

        // Reopening against the same file must not fail
        let second = DatabaseManager::new(Some(db_path)).await;
        assert!(second.is_ok());
    }
}
