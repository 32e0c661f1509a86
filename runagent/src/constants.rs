//! Constants and configuration values for the RunAgent SDK

use once_cell::sync::Lazy;
use std::path::PathBuf;

/// Environment variable for API key
pub const ENV_RUNAGENT_API_KEY: &str = "RUNAGENT_API_KEY";

/// Environment variable for base URL
pub const ENV_RUNAGENT_BASE_URL: &str = "RUNAGENT_BASE_URL";

/// Environment variable for cache directory
pub const ENV_LOCAL_CACHE_DIRECTORY: &str = "RUNAGENT_CACHE_DIR";

/// Environment variable for logging level
pub const ENV_RUNAGENT_LOGGING_LEVEL: &str = "RUNAGENT_LOGGING_LEVEL";

/// Default base URL for remote deployments
pub const DEFAULT_BASE_URL: &str = "http://localhost:8330/";

/// Agent config file names, probed in order at the project root
pub const AGENT_CONFIG_FILE_NAMES: &[&str] = &[
    "runagent.config.json",
    "runagent.config.yaml",
    "runagent.config.yml",
];

/// API path prefix shared by every endpoint
pub const API_PREFIX: &str = "/api/v1";

/// Default port range for local servers
pub const DEFAULT_PORT_START: u16 = 8450;
pub const DEFAULT_PORT_END: u16 = 8500;

/// Database file name
pub const DATABASE_FILE_NAME: &str = "runagent_local.db";

/// Maximum number of live local agents
pub const MAX_LOCAL_AGENTS: usize = 5;

/// Default invocation timeout in seconds
pub const DEFAULT_TIMEOUT_SECONDS: i64 = 300;

/// How long a stopping server waits for in-flight work to drain
pub const SHUTDOWN_DRAIN_SECONDS: u64 = 10;

/// Tag suffix that designates a streaming entrypoint
pub const STREAM_TAG_SUFFIX: &str = "_stream";

/// Local cache directory (computed at runtime) - matches the Python SDK:
/// os.path.expanduser("~/.runagent"), overridable via RUNAGENT_CACHE_DIR
pub static LOCAL_CACHE_DIRECTORY: Lazy<PathBuf> = Lazy::new(|| {
    if let Ok(env_path) = std::env::var(ENV_LOCAL_CACHE_DIRECTORY) {
        return PathBuf::from(env_path);
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".runagent")
});
