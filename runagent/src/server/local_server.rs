//! Local agent server
//!
//! Composes the loader, dispatcher and endpoints for one project: loads the
//! project, registers the agent in the local registry, binds a listener and
//! serves the unary and streaming endpoints, tracking lifecycle status
//! through `registered → starting → running → stopping → stopped` (or
//! `error`).

use crate::constants::{DEFAULT_PORT_START, SHUTDOWN_DRAIN_SECONDS};
use crate::server::callables::CallableRegistry;
use crate::server::dispatcher::Dispatcher;
use crate::server::handlers::{self, ServerState};
use crate::server::loader::ProjectLoader;
use crate::types::{ProjectConfig, RunAgentError, RunAgentResult};
use crate::utils::port::PortManager;
use axum::{
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[cfg(feature = "db")]
use crate::db::{AgentRecord, AgentStatus, DatabaseService};

/// Handle for stopping a running server from another task
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Stop accepting connections and begin the drain
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// Local server hosting one loaded project
#[derive(Debug)]
pub struct LocalServer {
    agent_id: String,
    project_path: PathBuf,
    host: String,
    port: u16,
    config: ProjectConfig,
    dispatcher: Arc<Dispatcher>,
    auth_token: Option<String>,
    #[cfg(feature = "db")]
    db_service: Option<Arc<DatabaseService>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl LocalServer {
    /// Create a server for a project, loading it immediately.
    ///
    /// `port` 0 requests an OS-assigned port, written back to the registry
    /// once bound.
    pub async fn new(
        agent_id: String,
        project_path: PathBuf,
        registry: &CallableRegistry,
        host: &str,
        port: u16,
    ) -> RunAgentResult<Self> {
        let (config, resolved) = ProjectLoader::load(&project_path, registry)?;
        let dispatcher = Arc::new(Dispatcher::new(resolved));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            agent_id,
            project_path,
            host: host.to_string(),
            port,
            config,
            dispatcher,
            auth_token: None,
            #[cfg(feature = "db")]
            db_service: None,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        })
    }

    /// Create a server from a project path with a generated agent id and an
    /// allocated port from the local range
    pub async fn from_path(
        project_path: PathBuf,
        registry: &CallableRegistry,
        host: Option<&str>,
        port: Option<u16>,
    ) -> RunAgentResult<Self> {
        let host = host.unwrap_or("127.0.0.1");
        let port = match port {
            Some(port) => port,
            None => PortManager::find_available_port(host, DEFAULT_PORT_START)?,
        };
        let agent_id = uuid::Uuid::new_v4().to_string();

        Self::new(agent_id, project_path, registry, host, port).await
    }

    /// Require a bearer token on the invocation and architecture endpoints
    pub fn with_auth_token<S: Into<String>>(mut self, token: S) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Use a specific registry database instead of the default one under
    /// `~/.runagent`
    #[cfg(feature = "db")]
    pub fn with_db_service(mut self, db_service: Arc<DatabaseService>) -> Self {
        self.db_service = Some(db_service);
        self
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Handle that stops this server once `start` is running
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Get server information
    pub fn get_info(&self) -> ServerInfo {
        ServerInfo {
            agent_id: self.agent_id.clone(),
            project_path: self.project_path.clone(),
            host: self.host.clone(),
            port: self.port,
            url: format!("http://{}:{}", self.host, self.port),
        }
    }

    fn create_router(state: ServerState) -> Router {
        Router::new()
            .route("/api/v1", get(handlers::root))
            .route("/api/v1/health", get(handlers::health_check))
            .route(
                "/api/v1/agents/:agent_id/architecture",
                get(handlers::get_agent_architecture),
            )
            .route("/api/v1/agents/:agent_id/run", post(handlers::run_agent))
            .route(
                "/api/v1/agents/:agent_id/run-stream",
                get(handlers::websocket_handler),
            )
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(CorsLayer::permissive()),
            )
    }

    #[cfg(feature = "db")]
    async fn registry_service(&self) -> RunAgentResult<Arc<DatabaseService>> {
        match &self.db_service {
            Some(service) => Ok(service.clone()),
            None => Ok(Arc::new(DatabaseService::new(None).await?)),
        }
    }

    /// Register, bind and serve until shut down.
    ///
    /// On stop the record moves to `stopping`, in-flight requests and
    /// sockets drain for up to the drain deadline, then the record is
    /// marked `stopped`.
    pub async fn start(self) -> RunAgentResult<()> {
        #[cfg(feature = "db")]
        let db_service = self.registry_service().await?;

        #[cfg(feature = "db")]
        {
            // Crash recovery: a live record whose listener no longer binds
            // is stale and releases its address
            if self.port != 0 && PortManager::is_port_available(&self.host, self.port) {
                db_service.reclaim_address(&self.host, self.port).await?;
            }

            if db_service.get_agent(&self.agent_id).await?.is_none() {
                let record = AgentRecord::new(
                    self.agent_id.clone(),
                    self.project_path.to_string_lossy().to_string(),
                    self.host.clone(),
                    self.port,
                )
                .with_framework(self.config.framework.clone());
                db_service.register_agent(record).await?;
            }

            db_service
                .update_agent_status(&self.agent_id, AgentStatus::Starting)
                .await?;
        }

        let listener = match TcpListener::bind((self.host.as_str(), self.port)).await {
            Ok(listener) => listener,
            Err(e) => {
                #[cfg(feature = "db")]
                db_service
                    .update_agent_status(&self.agent_id, AgentStatus::Error)
                    .await?;
                return Err(RunAgentError::connection(format!(
                    "Failed to bind to {}:{}: {}",
                    self.host, self.port, e
                )));
            }
        };

        let bound_port = listener
            .local_addr()
            .map_err(|e| RunAgentError::connection(format!("Failed to read bound address: {}", e)))?
            .port();

        #[cfg(feature = "db")]
        if self.port == 0 {
            db_service
                .update_agent_address(&self.agent_id, &self.host, bound_port)
                .await?;
        }

        let draining = Arc::new(AtomicBool::new(false));
        let state = ServerState {
            agent_id: self.agent_id.clone(),
            config: self.config.clone(),
            dispatcher: self.dispatcher.clone(),
            auth_token: self.auth_token.clone(),
            host: self.host.clone(),
            port: bound_port,
            draining: draining.clone(),
        };
        let app = Self::create_router(state);

        #[cfg(feature = "db")]
        db_service
            .update_agent_status(&self.agent_id, AgentStatus::Running)
            .await?;

        tracing::info!(
            "Agent {} serving on http://{}:{}",
            self.agent_id,
            self.host,
            bound_port
        );

        // The graceful shutdown is gated on its own channel so the stopping
        // transition is persisted before axum stops accepting connections
        let (drain_tx, mut drain_signal_rx) = watch::channel(false);
        let serve_fut = async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = drain_signal_rx.changed().await;
                })
                .await
        };
        tokio::pin!(serve_fut);

        let mut stop_rx = self.shutdown_rx.clone();
        let result = tokio::select! {
            res = &mut serve_fut => {
                res.map_err(|e| RunAgentError::server(format!("Server error: {}", e)))
            }
            _ = stop_rx.changed() => {
                // Shutdown observed: stop reporting healthy, record the
                // transient state, then wait out in-flight work
                draining.store(true, Ordering::SeqCst);
                #[cfg(feature = "db")]
                db_service
                    .update_agent_status(&self.agent_id, AgentStatus::Stopping)
                    .await?;
                let _ = drain_tx.send(true);

                tokio::select! {
                    res = &mut serve_fut => {
                        res.map_err(|e| RunAgentError::server(format!("Server error: {}", e)))
                    }
                    _ = tokio::time::sleep(Duration::from_secs(SHUTDOWN_DRAIN_SECONDS)) => {
                        tracing::warn!("Drain deadline reached, abandoning in-flight requests");
                        Ok(())
                    }
                }
            }
        };

        #[cfg(feature = "db")]
        {
            let final_status = if result.is_ok() {
                AgentStatus::Stopped
            } else {
                AgentStatus::Error
            };
            db_service
                .update_agent_status(&self.agent_id, final_status)
                .await?;
        }

        tracing::info!("Agent {} stopped", self.agent_id);
        result
    }
}

/// Server information
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub agent_id: String,
    pub project_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub url: String,
}
