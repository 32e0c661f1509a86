//! Registry operations over the local agent database
//!
//! The registry is the one piece of shared mutable state on a host: agent
//! servers write lifecycle transitions, client SDKs read addresses. Writes
//! are serialized through SQLite; each call observes a consistent snapshot.

use crate::constants::MAX_LOCAL_AGENTS;
use crate::db::manager::DatabaseManager;
use crate::db::models::{AgentRecord, AgentStatus, AgentSummary, CapacityInfo};
use crate::types::{ErrorCode, RunAgentError, RunAgentResult};
use chrono::Utc;
use sqlx::Row;
use std::path::PathBuf;

/// High-level registry service
#[derive(Debug)]
pub struct DatabaseService {
    manager: DatabaseManager,
}

impl DatabaseService {
    /// Open the registry at the default (or given) path
    pub async fn new(db_path: Option<PathBuf>) -> RunAgentResult<Self> {
        let manager = DatabaseManager::new(db_path).await?;
        Ok(Self { manager })
    }

    /// Path of the backing database file
    pub fn db_path(&self) -> &PathBuf {
        self.manager.db_path()
    }

    /// Register a new agent record.
    ///
    /// Fails with `AGENT_EXISTS` on a duplicate id, `CAPACITY_EXCEEDED` when
    /// the live count is at the ceiling, and `ADDRESS_IN_USE` when another
    /// live record already holds the same `(host, port)`. The checks and the
    /// insert run in one transaction so two racing servers fail
    /// deterministically: the loser sees the winner's row.
    pub async fn register_agent(&self, record: AgentRecord) -> RunAgentResult<()> {
        let mut tx = self.manager.pool().begin().await.map_err(|e| {
            RunAgentError::database(format!("Failed to begin transaction: {}", e))
        })?;

        let existing: Option<String> =
            sqlx::query_scalar("SELECT agent_id FROM agents WHERE agent_id = ?")
                .bind(&record.agent_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| RunAgentError::database(format!("Failed to query agent: {}", e)))?;

        if existing.is_some() {
            return Err(RunAgentError::execution(
                ErrorCode::AgentExists,
                format!("Agent '{}' is already registered", record.agent_id),
                Some("Unregister the existing agent or pick a different agent id".to_string()),
                None,
            ));
        }

        let live_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM agents WHERE status != 'stopped'")
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| RunAgentError::database(format!("Failed to count agents: {}", e)))?;

        if live_count as usize >= MAX_LOCAL_AGENTS {
            return Err(RunAgentError::execution(
                ErrorCode::CapacityExceeded,
                format!(
                    "Maximum of {} local agents reached ({} live)",
                    MAX_LOCAL_AGENTS, live_count
                ),
                Some("Stop or delete an existing agent before registering a new one".to_string()),
                None,
            ));
        }

        let holder: Option<String> = sqlx::query_scalar(
            "SELECT agent_id FROM agents WHERE host = ? AND port = ? AND status != 'stopped'",
        )
        .bind(&record.host)
        .bind(record.port)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| RunAgentError::database(format!("Failed to query address: {}", e)))?;

        if let Some(holder) = holder {
            return Err(RunAgentError::execution(
                ErrorCode::AddressInUse,
                format!(
                    "Address {}:{} is held by agent '{}'",
                    record.host, record.port, holder
                ),
                Some("Pick a different port or stop the agent bound to that address".to_string()),
                None,
            ));
        }

        sqlx::query(
            "INSERT INTO agents (agent_id, project_path, host, port, framework, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.agent_id)
        .bind(&record.project_path)
        .bind(&record.host)
        .bind(record.port)
        .bind(&record.framework)
        .bind(&record.status)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| RunAgentError::database(format!("Failed to insert agent: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| RunAgentError::database(format!("Failed to commit transaction: {}", e)))?;

        tracing::info!(
            "Registered agent {} at {}:{}",
            record.agent_id,
            record.host,
            record.port
        );
        Ok(())
    }

    /// Get an agent by id
    pub async fn get_agent(&self, agent_id: &str) -> RunAgentResult<Option<AgentRecord>> {
        let record = sqlx::query_as::<_, AgentRecord>("SELECT * FROM agents WHERE agent_id = ?")
            .bind(agent_id)
            .fetch_optional(self.manager.pool())
            .await
            .map_err(|e| RunAgentError::database(format!("Failed to get agent: {}", e)))?;

        Ok(record)
    }

    /// Get an agent's address by id, for local discovery
    pub async fn get_agent_address(&self, agent_id: &str) -> RunAgentResult<Option<(String, u16)>> {
        Ok(self
            .get_agent(agent_id)
            .await?
            .map(|record| (record.host, record.port as u16)))
    }

    /// List all agent records; order unspecified
    pub async fn list_agents(&self) -> RunAgentResult<Vec<AgentRecord>> {
        let records = sqlx::query_as::<_, AgentRecord>("SELECT * FROM agents")
            .fetch_all(self.manager.pool())
            .await
            .map_err(|e| RunAgentError::database(format!("Failed to list agents: {}", e)))?;

        Ok(records)
    }

    /// Update an agent's lifecycle status, touching `updated_at` atomically
    pub async fn update_agent_status(
        &self,
        agent_id: &str,
        status: AgentStatus,
    ) -> RunAgentResult<bool> {
        let result = sqlx::query("UPDATE agents SET status = ?, updated_at = ? WHERE agent_id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(agent_id)
            .execute(self.manager.pool())
            .await
            .map_err(|e| RunAgentError::database(format!("Failed to update status: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    /// Write back an agent's bound address (used after an OS-assigned port)
    pub async fn update_agent_address(
        &self,
        agent_id: &str,
        host: &str,
        port: u16,
    ) -> RunAgentResult<bool> {
        let result =
            sqlx::query("UPDATE agents SET host = ?, port = ?, updated_at = ? WHERE agent_id = ?")
                .bind(host)
                .bind(port as i32)
                .bind(Utc::now())
                .bind(agent_id)
                .execute(self.manager.pool())
                .await
                .map_err(|e| RunAgentError::database(format!("Failed to update address: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete an agent record
    pub async fn delete_agent(&self, agent_id: &str) -> RunAgentResult<bool> {
        let result = sqlx::query("DELETE FROM agents WHERE agent_id = ?")
            .bind(agent_id)
            .execute(self.manager.pool())
            .await
            .map_err(|e| RunAgentError::database(format!("Failed to delete agent: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark every live record holding `(host, port)` as stopped.
    ///
    /// Callers must first verify the listener is actually gone (the port
    /// binds); a record left `running` by a crash is stale, a record whose
    /// listener answers is not.
    pub async fn reclaim_address(&self, host: &str, port: u16) -> RunAgentResult<usize> {
        let result = sqlx::query(
            "UPDATE agents SET status = 'stopped', updated_at = ? WHERE host = ? AND port = ? AND status != 'stopped'",
        )
        .bind(Utc::now())
        .bind(host)
        .bind(port as i32)
        .execute(self.manager.pool())
        .await
        .map_err(|e| RunAgentError::database(format!("Failed to reclaim address: {}", e)))?;

        let reclaimed = result.rows_affected() as usize;
        if reclaimed > 0 {
            tracing::warn!(
                "Marked {} stale record(s) at {}:{} as stopped",
                reclaimed,
                host,
                port
            );
        }
        Ok(reclaimed)
    }

    /// Current registry capacity
    pub async fn get_capacity_info(&self) -> RunAgentResult<CapacityInfo> {
        let live_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM agents WHERE status != 'stopped'")
                .fetch_one(self.manager.pool())
                .await
                .map_err(|e| RunAgentError::database(format!("Failed to count agents: {}", e)))?;

        let current_count = live_count as usize;
        let agents = self
            .list_agents()
            .await?
            .into_iter()
            .map(AgentSummary::from)
            .collect();

        Ok(CapacityInfo {
            current_count,
            max_capacity: MAX_LOCAL_AGENTS,
            remaining_slots: MAX_LOCAL_AGENTS.saturating_sub(current_count),
            is_full: current_count >= MAX_LOCAL_AGENTS,
            agents,
        })
    }

    /// Store an ancillary key/value pair (e.g. a locally saved API key)
    pub async fn set_user_metadata(&self, key: &str, value: &str) -> RunAgentResult<()> {
        sqlx::query(
            "INSERT INTO user_metadata (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(self.manager.pool())
        .await
        .map_err(|e| RunAgentError::database(format!("Failed to set metadata: {}", e)))?;

        Ok(())
    }

    /// Read an ancillary key/value pair
    pub async fn get_user_metadata(&self, key: &str) -> RunAgentResult<Option<String>> {
        let row = sqlx::query("SELECT value FROM user_metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(self.manager.pool())
            .await
            .map_err(|e| RunAgentError::database(format!("Failed to get metadata: {}", e)))?;

        Ok(row.map(|r| r.get("value")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn service() -> (TempDir, DatabaseService) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let service = DatabaseService::new(Some(db_path)).await.unwrap();
        (temp_dir, service)
    }

    fn record(agent_id: &str, port: u16) -> AgentRecord {
        AgentRecord::new(
            agent_id.to_string(),
            "/path/to/project".to_string(),
            "127.0.0.1".to_string(),
            port,
        )
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let (_guard, service) = service().await;

        service.register_agent(record("agent-1", 8450)).await.unwrap();

        let fetched = service.get_agent("agent-1").await.unwrap().unwrap();
        assert_eq!(fetched.agent_id, "agent-1");
        assert_eq!(fetched.agent_status(), AgentStatus::Registered);

        let address = service.get_agent_address("agent-1").await.unwrap();
        assert_eq!(address, Some(("127.0.0.1".to_string(), 8450)));

        assert!(service.get_agent("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_agent_id() {
        let (_guard, service) = service().await;

        service.register_agent(record("agent-1", 8450)).await.unwrap();
        let err = service
            .register_agent(record("agent-1", 8451))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::AgentExists);
    }

    #[tokio::test]
    async fn test_address_in_use() {
        let (_guard, service) = service().await;

        service.register_agent(record("agent-1", 8450)).await.unwrap();
        let err = service
            .register_agent(record("agent-2", 8450))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::AddressInUse);

        // A stopped holder releases the address
        service
            .update_agent_status("agent-1", AgentStatus::Stopped)
            .await
            .unwrap();
        assert!(service.register_agent(record("agent-2", 8450)).await.is_ok());
    }

    #[tokio::test]
    async fn test_capacity_ceiling() {
        let (_guard, service) = service().await;

        for i in 0..MAX_LOCAL_AGENTS {
            service
                .register_agent(record(&format!("agent-{}", i), 8450 + i as u16))
                .await
                .unwrap();
        }

        let err = service
            .register_agent(record("agent-overflow", 8460))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::CapacityExceeded);

        // Deleting one frees a slot
        service.delete_agent("agent-0").await.unwrap();
        assert!(service
            .register_agent(record("agent-overflow", 8460))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_register_unregister_round_trip() {
        let (_guard, service) = service().await;

        let before = service.list_agents().await.unwrap().len();
        service.register_agent(record("agent-1", 8450)).await.unwrap();
        assert!(service.delete_agent("agent-1").await.unwrap());
        assert_eq!(service.list_agents().await.unwrap().len(), before);
        assert!(!service.delete_agent("agent-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_status_update_touches_updated_at() {
        let (_guard, service) = service().await;

        service.register_agent(record("agent-1", 8450)).await.unwrap();
        let created = service.get_agent("agent-1").await.unwrap().unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        service
            .update_agent_status("agent-1", AgentStatus::Running)
            .await
            .unwrap();

        let updated = service.get_agent("agent-1").await.unwrap().unwrap();
        assert_eq!(updated.agent_status(), AgentStatus::Running);
        assert!(updated.updated_at > created.updated_at);
    }

    #[tokio::test]
    async fn test_reclaim_address() {
        let (_guard, service) = service().await;

        service
            .register_agent(record("agent-1", 8450).with_status(AgentStatus::Running))
            .await
            .unwrap();

        let reclaimed = service.reclaim_address("127.0.0.1", 8450).await.unwrap();
        assert_eq!(reclaimed, 1);

        let record = service.get_agent("agent-1").await.unwrap().unwrap();
        assert_eq!(record.agent_status(), AgentStatus::Stopped);

        // Second pass finds nothing live
        assert_eq!(service.reclaim_address("127.0.0.1", 8450).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_capacity_info() {
        let (_guard, service) = service().await;

        service.register_agent(record("agent-1", 8450)).await.unwrap();
        service
            .register_agent(record("agent-2", 8451).with_status(AgentStatus::Error))
            .await
            .unwrap();

        let info = service.get_capacity_info().await.unwrap();
        // error records still count against capacity
        assert_eq!(info.current_count, 2);
        assert_eq!(info.max_capacity, MAX_LOCAL_AGENTS);
        assert_eq!(info.remaining_slots, MAX_LOCAL_AGENTS - 2);
        assert!(!info.is_full);
        assert_eq!(info.agents.len(), 2);
    }

    #[tokio::test]
    async fn test_user_metadata() {
        let (_guard, service) = service().await;

        assert!(service.get_user_metadata("api_key").await.unwrap().is_none());
        service.set_user_metadata("api_key", "ra-123").await.unwrap();
        assert_eq!(
            service.get_user_metadata("api_key").await.unwrap(),
            Some("ra-123".to_string())
        );

        service.set_user_metadata("api_key", "ra-456").await.unwrap();
        assert_eq!(
            service.get_user_metadata("api_key").await.unwrap(),
            Some("ra-456".to_string())
        );
    }
}
