use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;

use rmcp::model::{CallToolRequestParam, ReadResourceRequestParam};
use rmcp::service::{DynService, RunningService};
use rmcp::{RoleClient, ServiceExt};
use tokio::sync::RwLock;

use crush_bus::{Event, EventBus, McpEvent};

use crate::bridge::{
    call_result_to_output, mcp_prompt_to_descriptor, mcp_resource_to_descriptor,
    mcp_tool_to_descriptor, PromptDescriptor, ResourceDescriptor, ToolCallOutput, ToolDescriptor,
};
use crate::error::McpClientError;

pub type Result<T> = std::result::Result<T, McpClientError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disabled,
    Starting,
    Connected,
    Error,
}

impl ClientState {
    fn label(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Starting => "starting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StdioServerConfig {
    pub command: String,
    pub args: Vec<String>,
}

struct ClientEntry {
    state: ClientState,
    service: Option<RunningService<RoleClient, Box<dyn DynService<RoleClient>>>>,
    tools: Vec<ToolDescriptor>,
    prompts: Vec<PromptDescriptor>,
    resources: Vec<ResourceDescriptor>,
}

/// Manages named MCP client connections: `Disabled -> Starting ->
/// (Connected | Error)`, with prompt/tool/resource catalogs fetched on
/// connect and refreshed on list-changed notifications.
pub struct McpManager {
    bus: EventBus,
    clients: RwLock<HashMap<String, ClientEntry>>,
}

impl McpManager {
    pub fn new(bus: EventBus) -> Self {
        Self { bus, clients: RwLock::new(HashMap::new()) }
    }

    fn publish_state(&self, name: &str, state: ClientState) {
        self.bus.publish(Event::Mcp(McpEvent::StateChanged {
            client: name.to_string(),
            state: state.label().to_string(),
        }));
    }

    /// Connect to a stdio-transport MCP server named `name`, fetching its
    /// tool/prompt/resource catalogs once connected.
    pub async fn connect_stdio(&self, name: &str, config: StdioServerConfig) -> Result<()> {
        self.publish_state(name, ClientState::Starting);

        let mut cmd = tokio::process::Command::new(&config.command);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let transport = match rmcp::transport::TokioChildProcess::new(cmd) {
            Ok(t) => t,
            Err(e) => {
                self.publish_state(name, ClientState::Error);
                return Err(McpClientError::Spawn(e.to_string()));
            }
        };

        let service = match ().into_dyn().serve(transport).await {
            Ok(service) => service,
            Err(e) => {
                self.publish_state(name, ClientState::Error);
                return Err(McpClientError::Connect(e.to_string()));
            }
        };

        let tools = service
            .list_all_tools()
            .await
            .map_err(|e| McpClientError::Protocol(e.to_string()))?
            .into_iter()
            .map(mcp_tool_to_descriptor)
            .collect();
        let prompts = service
            .list_all_prompts()
            .await
            .unwrap_or_default()
            .into_iter()
            .map(mcp_prompt_to_descriptor)
            .collect();
        let resources = service
            .list_all_resources()
            .await
            .unwrap_or_default()
            .into_iter()
            .map(mcp_resource_to_descriptor)
            .collect();

        let mut clients = self.clients.write().await;
        clients.insert(
            name.to_string(),
            ClientEntry { state: ClientState::Connected, service: Some(service), tools, prompts, resources },
        );
        drop(clients);
        self.publish_state(name, ClientState::Connected);
        Ok(())
    }

    pub async fn state(&self, name: &str) -> ClientState {
        self.clients.read().await.get(name).map(|e| e.state).unwrap_or(ClientState::Disabled)
    }

    /// All tools across every connected client, merged under
    /// `mcp_<client>_<tool>` ids for registration into a tool registry.
    pub async fn merged_tools(&self) -> Vec<(String, ToolDescriptor)> {
        let clients = self.clients.read().await;
        let mut out = Vec::new();
        for (name, entry) in clients.iter() {
            for tool in &entry.tools {
                out.push((format!("mcp_{name}_{}", tool.name), tool.clone()));
            }
        }
        out
    }

    pub async fn call_tool(&self, client: &str, tool: &str, args: serde_json::Value) -> Result<ToolCallOutput> {
        let clients = self.clients.read().await;
        let entry = clients.get(client).ok_or_else(|| McpClientError::UnknownClient(client.to_string()))?;
        let service = entry.service.as_ref().ok_or_else(|| McpClientError::UnknownClient(client.to_string()))?;
        let arguments = match args {
            serde_json::Value::Object(map) => Some(map),
            _ => None,
        };
        let result = service
            .call_tool(CallToolRequestParam { name: tool.to_string().into(), arguments })
            .await
            .map_err(|e| McpClientError::Protocol(e.to_string()))?;
        Ok(call_result_to_output(result))
    }

    pub async fn read_resource(&self, client: &str, uri: &str) -> Result<String> {
        let clients = self.clients.read().await;
        let entry = clients.get(client).ok_or_else(|| McpClientError::UnknownClient(client.to_string()))?;
        let service = entry.service.as_ref().ok_or_else(|| McpClientError::UnknownClient(client.to_string()))?;
        let result = service
            .read_resource(ReadResourceRequestParam { uri: uri.to_string() })
            .await
            .map_err(|e| McpClientError::Protocol(e.to_string()))?;
        Ok(result
            .contents
            .into_iter()
            .filter_map(|c| c.as_text().map(|t| t.text.clone()))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Re-fetch the tool catalog for `client` (called on a `ListChanged`
    /// notification).
    pub async fn refresh_tools(&self, client: &str) -> Result<()> {
        let mut clients = self.clients.write().await;
        let entry = clients.get_mut(client).ok_or_else(|| McpClientError::UnknownClient(client.to_string()))?;
        let service = entry.service.as_ref().ok_or_else(|| McpClientError::UnknownClient(client.to_string()))?;
        let tools = service
            .list_all_tools()
            .await
            .map_err(|e| McpClientError::Protocol(e.to_string()))?
            .into_iter()
            .map(mcp_tool_to_descriptor)
            .collect();
        entry.tools = tools;
        drop(clients);
        self.bus.publish(Event::Mcp(McpEvent::ToolsListChanged { client: client.to_string() }));
        Ok(())
    }

    pub async fn disconnect(&self, name: &str) {
        let mut clients = self.clients.write().await;
        if let Some(mut entry) = clients.remove(name) {
            if let Some(service) = entry.service.take() {
                let _ = service.cancel().await;
            }
        }
    }
}

pub type SharedMcpManager = Arc<McpManager>;
