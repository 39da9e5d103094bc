// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod builtin;
pub mod events;
pub mod policy;
pub mod registry;
pub mod sub_agent_runner;
pub mod tool;

pub use events::{TodoItem, ToolEvent};
pub use policy::{ApprovalPolicy, ToolPolicy};
pub use registry::{ToolRegistry, ToolSchema};
pub use sub_agent_runner::{SubAgentRequest, SubAgentRunner};
pub use tool::{OutputCategory, Tool, ToolCall, ToolOutput, ToolOutputPart};

// Built-in tools (spec.md §4.5)
pub use builtin::agentic_fetch::AgenticFetchTool;
pub use builtin::ask_question::{AskQuestionTool, Question, QuestionRequest};
pub use builtin::bash::BashTool;
pub use builtin::download::DownloadTool;
pub use builtin::edit::EditTool;
pub use builtin::fetch::FetchTool;
pub use builtin::glob::GlobTool;
pub use builtin::ls::LsTool;
pub use builtin::multi_edit::MultiEditTool;
pub use builtin::todo::TodoTool;
pub use builtin::view::ViewTool;
pub use builtin::write::WriteTool;
