// SPDX-License-Identifier: Apache-2.0
//! MCP client manager (C7): connects outward to external MCP servers as a
//! tool/prompt/resource source, the inverse of running as an MCP server.

mod bridge;
mod client;
mod error;

pub use bridge::{PromptDescriptor, ResourceDescriptor, ToolCallOutput, ToolDescriptor};
pub use client::{ClientState, McpManager, SharedMcpManager, StdioServerConfig};
pub use error::McpClientError;
