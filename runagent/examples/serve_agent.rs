//! Serve a project directory with host-registered entrypoints
//!
//! Usage: cargo run --example serve_agent -- ./my-agent
//!
//! The project directory needs a runagent.config.json declaring the
//! entrypoints registered below.

use futures::StreamExt;
use runagent::server::{CallableRegistry, LocalServer};
use serde_json::json;

#[tokio::main]
async fn main() -> runagent::RunAgentResult<()> {
    runagent::init_logging();

    let project_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "./my-agent".to_string());

    let mut registry = CallableRegistry::new();
    registry.register_fn("main.py", "run", |_args, kwargs| async move {
        let q = kwargs.get("q").and_then(|v| v.as_str()).unwrap_or_default();
        Ok(json!(format!("ok:{}", q)))
    });
    registry.register_stream_fn("main.py", "run_stream", |_args, kwargs| {
        let q = kwargs
            .get("q")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        futures::stream::iter(
            q.split_whitespace()
                .map(|word| Ok(json!(word)))
                .collect::<Vec<_>>(),
        )
        .boxed()
    });

    let server = LocalServer::from_path(project_path.into(), &registry, None, None).await?;
    let info = server.get_info();
    println!("Serving agent {} at {}", info.agent_id, info.url);

    server.start().await
}
