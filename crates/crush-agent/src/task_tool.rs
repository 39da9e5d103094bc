// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crush_config::{AgentConfig, AgentMode};
use crush_store::{MessagePart, Role as StoreRole, Store};
use crush_tools::{
    events::{TodoItem, ToolEvent},
    sub_agent_runner::{SubAgentRequest, SubAgentRunner},
    AgenticFetchTool, BashTool, DownloadTool, EditTool, FetchTool, GlobTool, LsTool,
    MultiEditTool, TodoTool, ToolRegistry, ViewTool, WriteTool,
};

use crate::agent::Agent;
use crate::events::AgentEvent;
use crate::runtime_context::AgentRuntimeContext;

/// Bounds re-entrant sub-agent nesting: a child session spawned by
/// `sub_agent` or `agentic_fetch` cannot itself spawn another child once this
/// depth is reached.
const MAX_DEPTH: usize = 3;

/// Derive a deterministic child-session id from the parent turn and tool
/// call that spawned it: `sha256(parent_message_id || 0x00 || tool_call_id)`
/// truncated to 128 bits and hex-encoded. Re-entering the same call (e.g. a
/// retried turn) always maps to the same child session id, so the sub-agent
/// runner can attach to the existing row instead of forking a duplicate.
fn child_session_id(parent_message_id: &str, tool_call_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(parent_message_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(tool_call_id.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}

/// Re-entry point from `crush-tools` back into the agent coordinator.
///
/// Implements [`SubAgentRunner`] so that `sub_agent` and `agentic_fetch` can
/// spawn a bounded child session without `crush-tools` depending on
/// `crush-agent`.
pub struct AgentSubAgentRunner {
    model: Arc<dyn crush_model::ModelProvider>,
    agent_config: Arc<AgentConfig>,
    depth: Arc<AtomicUsize>,
    /// The top-level session these sub-agents are spawned from, and the
    /// store to record child sessions/messages in. `None` when the embedder
    /// (e.g. a unit test) has not wired persistence in — the sub-agent still
    /// runs, it just isn't recorded anywhere.
    store: Option<(Arc<Store>, String)>,
}

impl AgentSubAgentRunner {
    pub fn new(model: Arc<dyn crush_model::ModelProvider>, agent_config: Arc<AgentConfig>) -> Self {
        Self {
            model,
            agent_config,
            depth: Arc::new(AtomicUsize::new(0)),
            store: None,
        }
    }

    /// Attach persistence: child sessions spawned by this runner are created
    /// under `parent_session_id` in `store`, and their messages are recorded
    /// there as they stream in (which announces them on the event bus, since
    /// every store mutation is published).
    pub fn with_store(mut self, store: Arc<Store>, parent_session_id: impl Into<String>) -> Self {
        self.store = Some((store, parent_session_id.into()));
        self
    }

    /// Build the restricted tool set available to a child session: every
    /// built-in tool except `sub_agent`/`agentic_fetch`, unless `allowed`
    /// narrows it further.
    fn build_sub_registry(allowed: Option<&[String]>) -> ToolRegistry {
        let todos: Arc<Mutex<Vec<TodoItem>>> = Arc::new(Mutex::new(Vec::new()));
        let (tx, _rx) = mpsc::channel::<ToolEvent>(64);

        let mut reg = ToolRegistry::new();
        reg.register(ViewTool);
        reg.register(WriteTool);
        reg.register(EditTool);
        reg.register(MultiEditTool);
        reg.register(LsTool);
        reg.register(GlobTool);
        reg.register(BashTool::default());
        reg.register(FetchTool);
        reg.register(DownloadTool);
        reg.register(TodoTool::new(todos, tx));

        if let Some(names) = allowed {
            let mut restricted = ToolRegistry::new();
            for name in names {
                if let Some(tool) = reg.get(name) {
                    restricted.register_dyn(tool);
                }
            }
            return restricted;
        }

        reg
    }
}

#[async_trait]
impl SubAgentRunner for AgentSubAgentRunner {
    async fn run_sub_agent(&self, request: SubAgentRequest) -> Result<String, String> {
        let current_depth = self.depth.load(Ordering::Relaxed);
        if current_depth >= MAX_DEPTH {
            return Err(format!("maximum sub-agent depth ({MAX_DEPTH}) reached"));
        }

        self.depth.fetch_add(1, Ordering::Relaxed);
        debug!(depth = current_depth + 1, "spawning bounded sub-agent session");

        let mut sub_config = (*self.agent_config).clone();
        if let Some(max_rounds) = request.max_rounds {
            sub_config.max_tool_rounds = max_rounds;
        }
        if let Some(prompt) = &request.system_prompt {
            sub_config.system_prompt = Some(prompt.clone());
        }

        let tools = Arc::new(Self::build_sub_registry(request.allowed_tools.as_deref()));
        let mode_lock = Arc::new(Mutex::new(AgentMode::Agent));
        let (tool_tx, tool_rx) = mpsc::channel::<ToolEvent>(64);
        drop(tool_tx);

        let mut agent = Agent::new(
            self.model.clone(),
            tools,
            Arc::new(sub_config),
            AgentRuntimeContext::default(),
            mode_lock,
            tool_rx,
            128_000,
        );

        // Attach (or reuse) a persisted child session keyed on the parent
        // turn + tool call, and publish the child's first user turn so it
        // is observable on the event bus before the model runs.
        let child_session = match &self.store {
            Some((store, parent_session_id)) => {
                let parent_message_id = if request.parent_message_id.is_empty() {
                    parent_session_id.clone()
                } else {
                    request.parent_message_id.clone()
                };
                let id = child_session_id(&parent_message_id, &request.tool_call_id);
                match store
                    .get_or_create_child_session(id.clone(), parent_session_id.clone(), "sub-agent")
                    .await
                {
                    Ok(session) => {
                        let _ = store
                            .create_message(&session.id, StoreRole::User, vec![MessagePart::text(request.prompt.clone())])
                            .await;
                        Some((store.clone(), session.id))
                    }
                    Err(e) => {
                        debug!(error = %e, "sub-agent: failed to create child session; continuing unrecorded");
                        None
                    }
                }
            }
            None => None,
        };

        let (tx, rx) = mpsc::channel::<AgentEvent>(256);

        // The drain must run concurrently with `submit`, not after it:
        // `submit` streams every event (including per-token text deltas)
        // through `tx` and awaits until the turn completes, so if nothing is
        // reading from `rx` at the same time the channel fills and `submit`
        // blocks forever on a full 256-capacity buffer for any turn that
        // emits more than 256 events.
        let drain_child = child_session.clone();
        let drain = tokio::spawn(drain_events(rx, drain_child));

        let submit_result = agent.submit(&request.prompt, tx).await;
        let output = drain.await.unwrap_or_default();

        if let Some((store, session_id)) = &child_session {
            if !output.is_empty() {
                let _ = store
                    .create_message(session_id, StoreRole::Assistant, vec![MessagePart::text(output.clone())])
                    .await;
            }
        }

        self.depth.fetch_sub(1, Ordering::Relaxed);

        match submit_result {
            Ok(_) if output.is_empty() => Ok("(sub-agent produced no text output)".to_string()),
            Ok(_) => Ok(output),
            Err(e) => Err(format!("sub-agent error: {e}")),
        }
    }
}

/// Drain `rx` to completion, concurrently with the submit that feeds it.
/// Accumulates the child's text and, when a child session is attached,
/// records tool-call/tool-result/thinking events as store messages so they
/// are announced on the event bus as they arrive rather than after the fact.
async fn drain_events(mut rx: mpsc::Receiver<AgentEvent>, child_session: Option<(Arc<Store>, String)>) -> String {
    let mut output = String::new();
    while let Some(event) = rx.recv().await {
        match &event {
            AgentEvent::TextDelta(delta) => output.push_str(delta),
            AgentEvent::ToolCallStarted(call) => {
                if let Some((store, session_id)) = &child_session {
                    let _ = store
                        .create_message(
                            session_id,
                            StoreRole::Assistant,
                            vec![MessagePart::ToolCall {
                                id: call.id.clone(),
                                name: call.name.clone(),
                                input_json: call.args.to_string(),
                                finished: false,
                            }],
                        )
                        .await;
                }
            }
            AgentEvent::ToolCallFinished { call_id, output: tool_output, is_error, .. } => {
                if let Some((store, session_id)) = &child_session {
                    let _ = store
                        .create_message(
                            session_id,
                            StoreRole::Tool,
                            vec![MessagePart::ToolResult {
                                tool_call_id: call_id.clone(),
                                content: tool_output.clone(),
                                is_error: *is_error,
                            }],
                        )
                        .await;
                }
            }
            _ => {}
        }
    }
    output
}

/// Built-in `sub_agent` tool — delegates a focused task to a bounded child
/// session via [`AgentSubAgentRunner`].
pub struct SubAgentTool {
    runner: Arc<dyn SubAgentRunner>,
}

impl SubAgentTool {
    pub fn new(runner: Arc<dyn SubAgentRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl crush_tools::Tool for SubAgentTool {
    fn name(&self) -> &str {
        "sub_agent"
    }

    fn description(&self) -> &str {
        "Spawn a sub-agent to complete a focused task and return its final text output. \
         Useful for delegating isolated sub-tasks. The sub-agent has access to the standard \
         file/shell/fetch tools but cannot itself spawn another sub-agent. Maximum nesting \
         depth is 3."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "The task description for the sub-agent"
                },
                "max_rounds": {
                    "type": "integer",
                    "description": "Maximum tool-call rounds (default: from config)"
                }
            },
            "required": ["prompt"]
        })
    }

    fn default_policy(&self) -> crush_tools::ApprovalPolicy {
        crush_tools::ApprovalPolicy::Ask
    }

    async fn execute(&self, call: &crush_tools::ToolCall) -> crush_tools::ToolOutput {
        let prompt = match call.args.get("prompt").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => return crush_tools::ToolOutput::err(&call.id, "missing 'prompt'"),
        };
        let max_rounds = call.args.get("max_rounds").and_then(|v| v.as_u64()).map(|v| v as u32);

        let request = SubAgentRequest {
            prompt,
            system_prompt: None,
            allowed_tools: None,
            max_rounds,
            parent_message_id: String::new(),
            tool_call_id: call.id.clone(),
        };

        match self.runner.run_sub_agent(request).await {
            Ok(text) => crush_tools::ToolOutput::ok(&call.id, text),
            Err(e) => crush_tools::ToolOutput::err(&call.id, e),
        }
    }
}
