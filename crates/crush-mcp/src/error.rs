use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpClientError {
    #[error("failed to spawn MCP server process: {0}")]
    Spawn(String),
    #[error("failed to connect to MCP server: {0}")]
    Connect(String),
    #[error("MCP protocol error: {0}")]
    Protocol(String),
    #[error("no such MCP client: {0}")]
    UnknownClient(String),
}
