//! Sync example using blocking RunAgentClient
//!
//! This is useful for simple scripts or when you can't use async/await.
//! Note: For better performance, prefer the async version.

use runagent::blocking::{RunAgentClient, RunAgentClientConfig};
use serde_json::json;

fn main() -> runagent::RunAgentResult<()> {
    let agent_id = "a6977384-6c88-40dc-a629-e6bf077786ae";

    // Unary call with an explicit address (skips registry lookup)
    let client = RunAgentClient::new(
        RunAgentClientConfig::new(agent_id, "solve")
            .with_local(true)
            .with_address("127.0.0.1", 8450),
    )?;

    let response = client.run(&[("q", json!("Hello!"))])?;
    println!("Response: {}", response);

    // Streaming call over the same agent
    let streaming = RunAgentClient::new(
        RunAgentClientConfig::new(agent_id, "solve_stream")
            .with_local(true)
            .with_address("127.0.0.1", 8450),
    )?;

    for chunk in streaming.run_stream(&[("q", json!("stream these words"))])? {
        println!(">> {}", chunk?);
    }

    Ok(())
}
