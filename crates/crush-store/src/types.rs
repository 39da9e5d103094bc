use serde::{Deserialize, Serialize};

/// A conversation session. Non-root sessions (sub-agents) carry a
/// `parent_id` pointing at the session that spawned them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: String,
    pub title: String,
    pub parent_id: Option<String>,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    /// Accumulated cost, in micro-cents, to avoid floating point drift
    /// across many small additions.
    pub cost_cents_micro: i64,
    pub todos: Vec<Todo>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Todo {
    pub id: String,
    pub content: String,
    pub active_form: Option<String>,
    pub status: TodoStatus,
    pub position: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

impl TodoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TodoStatus::Pending => "pending",
            TodoStatus::InProgress => "in-progress",
            TodoStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "in-progress" => TodoStatus::InProgress,
            "completed" => TodoStatus::Completed,
            _ => TodoStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "tool" => Role::Tool,
            _ => Role::System,
        }
    }
}

/// Token/cost usage attached to a `Finish` part.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Usage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub cost_cents_micro: i64,
}

/// One element of a message's ordered content-part list.
///
/// Mirrors the data model's content-part sum type exactly: Text,
/// Reasoning, ToolCall, ToolResult, Attachment, Finish.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePart {
    Text {
        text: String,
    },
    Reasoning {
        text: String,
    },
    ToolCall {
        id: String,
        name: String,
        /// Uninterpreted JSON chosen by the model; validated by the tool.
        input_json: String,
        finished: bool,
    },
    ToolResult {
        tool_call_id: String,
        content: String,
        is_error: bool,
    },
    Attachment {
        file_path: String,
        file_name: String,
        mime_type: String,
        /// Base64-encoded bytes — kept as text so the part list round-trips
        /// through a single JSON column without a second binary column.
        bytes_base64: String,
    },
    Finish {
        reason: String,
        usage: Usage,
    },
}

impl MessagePart {
    /// A stable identity used to decide whether an `AppendParts` fingerprint
    /// has already been applied. Two parts that would produce the same
    /// fingerprint for the caller's purposes are expected to also serialize
    /// identically; the store itself only ever compares caller-supplied
    /// fingerprint strings, never part contents.
    pub fn text(text: impl Into<String>) -> Self {
        MessagePart::Text { text: text.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub session_id: String,
    pub role: Role,
    pub parts: Vec<MessagePart>,
    pub created_at: i64,
    pub finished: bool,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileHistoryEntry {
    pub session_id: String,
    pub path: String,
    pub version: i64,
    pub content: Vec<u8>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileReadRecord {
    pub session_id: String,
    pub path: String,
    pub last_read_at: i64,
}
