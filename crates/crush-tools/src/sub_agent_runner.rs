// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;

/// A request to spawn a child session and run it to completion.
#[derive(Debug, Clone)]
pub struct SubAgentRequest {
    /// The task description handed to the child as its first user turn.
    pub prompt: String,
    /// System prompt override for the child session. `None` inherits the
    /// coordinator's default sub-agent prompt.
    pub system_prompt: Option<String>,
    /// Names of tools the child may use. `None` means the runner's default
    /// restricted subset (no `sub_agent`/`agentic_fetch`, to bound nesting).
    pub allowed_tools: Option<Vec<String>>,
    /// Overrides the coordinator's default max tool-call rounds for this
    /// child turn.
    pub max_rounds: Option<u32>,
    /// Identifies the parent turn that spawned this call. Combined with
    /// `tool_call_id`, this is hashed into the child session's deterministic
    /// id so re-entering the same call attaches to the same child session
    /// rather than forking a new one. Leave empty to let the runner fall
    /// back to its own notion of the current parent turn.
    pub parent_message_id: String,
    /// The id of the tool call that spawned this child, as reported by the
    /// model. Combined with `parent_message_id` to derive the child session
    /// id.
    pub tool_call_id: String,
}

/// Re-entry point from `crush-tools` into the agent coordinator, injected as
/// a trait object so that `sub_agent` and `agentic_fetch` can spawn and drive
/// a child session without `crush-tools` depending on `crush-agent`.
///
/// The coordinator spawns a child session bound to the parent session's
/// cancellation, streams the child's messages up via the event bus, and
/// returns the child's last assistant message as the call's result.
#[async_trait]
pub trait SubAgentRunner: Send + Sync {
    /// Run `request` to completion on a fresh child session and return its
    /// final assistant text. Returns `Err` if the child session errors or
    /// the parent turn is cancelled before the child finishes.
    async fn run_sub_agent(&self, request: SubAgentRequest) -> Result<String, String>;
}
