//! Database models for the local agent registry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle status of a registered agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Registered,
    Starting,
    Running,
    Stopping,
    Stopped,
    Error,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Registered => "registered",
            AgentStatus::Starting => "starting",
            AgentStatus::Running => "running",
            AgentStatus::Stopping => "stopping",
            AgentStatus::Stopped => "stopped",
            AgentStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "registered" => Some(AgentStatus::Registered),
            "starting" => Some(AgentStatus::Starting),
            "running" => Some(AgentStatus::Running),
            "stopping" => Some(AgentStatus::Stopping),
            "stopped" => Some(AgentStatus::Stopped),
            "error" => Some(AgentStatus::Error),
            _ => None,
        }
    }

    /// Live records count against capacity and hold their address
    pub fn is_live(&self) -> bool {
        !matches!(self, AgentStatus::Stopped)
    }
}

/// Registry row for a registered agent
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AgentRecord {
    pub agent_id: String,
    pub project_path: String,
    pub host: String,
    pub port: i32,
    pub framework: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentRecord {
    /// Create a new record in the `registered` state
    pub fn new(agent_id: String, project_path: String, host: String, port: u16) -> Self {
        let now = Utc::now();
        Self {
            agent_id,
            project_path,
            host,
            port: port as i32,
            framework: "default".to_string(),
            status: AgentStatus::Registered.as_str().to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the framework tag for this agent
    pub fn with_framework<S: Into<String>>(mut self, framework: S) -> Self {
        self.framework = framework.into();
        self
    }

    /// Set the status for this agent
    pub fn with_status(mut self, status: AgentStatus) -> Self {
        self.status = status.as_str().to_string();
        self
    }

    /// Parsed lifecycle status; rows written by older versions fall back to `error`
    pub fn agent_status(&self) -> AgentStatus {
        AgentStatus::parse(&self.status).unwrap_or(AgentStatus::Error)
    }

    pub fn is_live(&self) -> bool {
        self.agent_status().is_live()
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Agent summary used in capacity reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSummary {
    pub agent_id: String,
    pub framework: String,
    pub status: String,
    pub host: String,
    pub port: i32,
}

impl From<AgentRecord> for AgentSummary {
    fn from(record: AgentRecord) -> Self {
        Self {
            agent_id: record.agent_id,
            framework: record.framework,
            status: record.status,
            host: record.host,
            port: record.port,
        }
    }
}

/// Registry capacity information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityInfo {
    pub current_count: usize,
    pub max_capacity: usize,
    pub remaining_slots: usize,
    pub is_full: bool,
    pub agents: Vec<AgentSummary>,
}
