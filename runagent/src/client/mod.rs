//! Client components for interacting with RunAgent deployments

pub mod rest_client;
pub mod runagent_client;
pub mod socket_client;

// Re-export the main client
pub use rest_client::RestClient;
pub use runagent_client::{RunAgentClient, RunAgentClientConfig};
pub use socket_client::SocketClient;
