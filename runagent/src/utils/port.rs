//! Port management utilities for allocating available ports

use crate::constants::{DEFAULT_PORT_END, DEFAULT_PORT_START};
use crate::types::{RunAgentError, RunAgentResult};
use std::net::{SocketAddr, TcpListener};

/// Port manager for finding and allocating available ports
pub struct PortManager;

impl PortManager {
    /// Check if a specific port is available on the given host
    pub fn is_port_available(host: &str, port: u16) -> bool {
        let addr = format!("{}:{}", host, port);

        if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
            TcpListener::bind(socket_addr).is_ok()
        } else {
            false
        }
    }

    /// Find the next available port starting from a given port
    pub fn find_available_port(host: &str, start_port: u16) -> RunAgentResult<u16> {
        for port in start_port..=DEFAULT_PORT_END {
            if Self::is_port_available(host, port) {
                return Ok(port);
            }
        }

        Err(RunAgentError::connection(format!(
            "No available ports found in range {}-{}",
            start_port, DEFAULT_PORT_END
        )))
    }

    /// Allocate a unique host:port combination, avoiding used ports
    pub fn allocate_unique_address(used_ports: &[u16]) -> RunAgentResult<(String, u16)> {
        let host = "127.0.0.1".to_string();

        for port in DEFAULT_PORT_START..=DEFAULT_PORT_END {
            if !used_ports.contains(&port) && Self::is_port_available(&host, port) {
                return Ok((host, port));
            }
        }

        Err(RunAgentError::connection(
            "No available ports found for allocation".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_port_available() {
        // Port 0 lets the OS choose
        assert!(PortManager::is_port_available("127.0.0.1", 0));
        assert!(!PortManager::is_port_available("invalid.host", 8080));
    }

    #[test]
    fn test_find_available_port() {
        let result = PortManager::find_available_port("127.0.0.1", DEFAULT_PORT_START);
        assert!(result.is_ok());

        if let Ok(port) = result {
            assert!(port >= DEFAULT_PORT_START);
            assert!(port <= DEFAULT_PORT_END);
        }
    }

    #[test]
    fn test_allocate_unique_address() {
        let used_ports = vec![8450, 8451, 8452];
        let result = PortManager::allocate_unique_address(&used_ports);

        assert!(result.is_ok());

        if let Ok((host, port)) = result {
            assert_eq!(host, "127.0.0.1");
            assert!(!used_ports.contains(&port));
            assert!(port >= DEFAULT_PORT_START);
            assert!(port <= DEFAULT_PORT_END);
        }
    }
}
