//! Example showing direct struct construction
//!
//! This shows how to pass a config object directly to the client constructor.

use runagent::RunAgentClient;
use serde_json::json;
use std::collections::HashMap;

#[tokio::main]
async fn main() -> runagent::RunAgentResult<()> {
    // Direct struct construction
    let client = RunAgentClient::new(runagent::RunAgentClientConfig {
        agent_id: "a6977384-6c88-40dc-a629-e6bf077786ae".to_string(),
        entrypoint_tag: "solve".to_string(),
        local: Some(true),
        host: Some("127.0.0.1".to_string()),
        port: Some(8450),
        api_key: None,
        base_url: None,
        extra_params: HashMap::new(),
    })
    .await?;

    let response = client.run(&[("q", json!("Hello!"))]).await?;

    println!("Response: {}", response);
    Ok(())
}
