// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `agentic-fetch`: a fetch that may follow links across several requests to
//! satisfy an open-ended goal, by re-entering the agent coordinator as a
//! bounded sub-agent (see [`crate::sub_agent_runner`]).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::policy::ApprovalPolicy;
use crate::sub_agent_runner::{SubAgentRequest, SubAgentRunner};
use crate::tool::{Tool, ToolCall, ToolOutput};

const DEFAULT_MAX_ROUNDS: u32 = 6;

/// Fetches a starting URL and, if the goal isn't satisfied by that page
/// alone, lets a restricted sub-agent follow links (via `fetch`/`download`)
/// until it can answer or a round budget is exhausted.
pub struct AgenticFetchTool {
    runner: Arc<dyn SubAgentRunner>,
}

impl AgenticFetchTool {
    pub fn new(runner: Arc<dyn SubAgentRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Tool for AgenticFetchTool {
    fn name(&self) -> &str { "agentic_fetch" }

    fn description(&self) -> &str {
        "Fetch a starting URL and, if needed, follow links to satisfy an open-ended \
         research goal. Unlike `fetch`, which returns exactly one page, `agentic_fetch` \
         may issue several requests (bounded) before answering.\n\n\
         ## When to Use\n\
         - The goal requires information that may be split across multiple linked pages\n\
         - You don't know the exact URL that contains the answer\n\n\
         ## When NOT to Use\n\
         - The exact URL and a single page suffice → use `fetch`\n\
         - Binary content → use `download`"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Starting URL (http or https)"
                },
                "goal": {
                    "type": "string",
                    "description": "What to find out or accomplish starting from this URL"
                },
                "max_rounds": {
                    "type": "integer",
                    "description": "Maximum fetch/follow rounds (default 6)"
                }
            },
            "required": ["url", "goal"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy { ApprovalPolicy::Ask }

    fn consent(&self, call: &ToolCall) -> Option<String> {
        call.args.get("url").and_then(|v| v.as_str()).map(String::from)
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let url = match call.args.get("url").and_then(|v| v.as_str()) {
            Some(u) => u.to_string(),
            None => return ToolOutput::err(&call.id, "missing 'url'"),
        };
        let goal = match call.args.get("goal").and_then(|v| v.as_str()) {
            Some(g) => g.to_string(),
            None => return ToolOutput::err(&call.id, "missing 'goal'"),
        };
        let max_rounds = call
            .args
            .get("max_rounds")
            .and_then(|v| v.as_u64())
            .map(|v| v as u32)
            .unwrap_or(DEFAULT_MAX_ROUNDS);

        debug!(url = %url, goal = %goal, max_rounds, "agentic_fetch: spawning sub-agent");

        let prompt = format!(
            "Starting at {url}, use the `fetch` and `download` tools to accomplish this \
             goal, following links as needed: {goal}\n\n\
             Reply with a concise answer once you have enough information."
        );

        let request = SubAgentRequest {
            prompt,
            system_prompt: Some(
                "You are a focused web-research assistant. Use only the tools you are \
                 given; do not guess at facts you have not fetched."
                    .to_string(),
            ),
            allowed_tools: Some(vec!["fetch".to_string(), "download".to_string()]),
            max_rounds: Some(max_rounds),
            parent_message_id: String::new(),
            tool_call_id: call.id.clone(),
        };

        match self.runner.run_sub_agent(request).await {
            Ok(answer) => ToolOutput::ok(&call.id, answer),
            Err(e) => ToolOutput::err(&call.id, format!("agentic_fetch error: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockRunner {
        response: Result<String, String>,
    }

    #[async_trait]
    impl SubAgentRunner for MockRunner {
        async fn run_sub_agent(&self, request: SubAgentRequest) -> Result<String, String> {
            assert_eq!(
                request.allowed_tools.as_deref(),
                Some(&["fetch".to_string(), "download".to_string()][..])
            );
            self.response.clone()
        }
    }

    fn call(args: Value) -> ToolCall {
        ToolCall { id: "af1".into(), name: "agentic_fetch".into(), args }
    }

    #[tokio::test]
    async fn missing_goal_is_error() {
        let tool = AgenticFetchTool::new(Arc::new(MockRunner { response: Ok("x".into()) }));
        let out = tool.execute(&call(json!({"url": "https://example.com"}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("missing 'goal'"));
    }

    #[tokio::test]
    async fn delegates_to_sub_agent_runner() {
        let tool = AgenticFetchTool::new(Arc::new(MockRunner {
            response: Ok("the answer is 42".into()),
        }));
        let out = tool
            .execute(&call(json!({"url": "https://example.com", "goal": "find the answer"})))
            .await;
        assert!(!out.is_error);
        assert_eq!(out.content, "the answer is 42");
    }

    #[tokio::test]
    async fn propagates_runner_error() {
        let tool = AgenticFetchTool::new(Arc::new(MockRunner {
            response: Err("cancelled".into()),
        }));
        let out = tool
            .execute(&call(json!({"url": "https://example.com", "goal": "anything"})))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("cancelled"));
    }
}
