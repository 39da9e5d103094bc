// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use crush_tools::{events::TodoItem, ToolCall};

/// Events emitted by the agent during a single turn.
/// Consumers (CI runner, TUI) subscribe to these to drive their output.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// A text chunk streamed from the model
    TextDelta(String),
    /// A complete text response from the model (after streaming finishes)
    TextComplete(String),
    /// A thinking/reasoning chunk from the model (extended thinking API).
    /// Consumers should accumulate deltas and finalise them into a Thinking
    /// segment when the model signals the end of the reasoning block.
    ThinkingDelta(String),
    /// A complete thinking/reasoning block (accumulated from ThinkingDelta events).
    ThinkingComplete(String),
    /// The model has requested a tool call
    ToolCallStarted(ToolCall),
    /// A tool call finished
    ToolCallFinished {
        call_id: String,
        tool_name: String,
        output: String,
        is_error: bool,
    },
    /// Context was compacted; statistics for the UI
    ContextCompacted {
        tokens_before: usize,
        tokens_after: usize,
        strategy: CompactionStrategyUsed,
        turn: u32,
    },
    /// Current token usage update
    TokenUsage {
        input: u32,
        output: u32,
        /// Tokens served from the provider's prompt cache this turn.
        cache_read: u32,
        /// Tokens written into the provider's prompt cache this turn.
        cache_write: u32,
        /// Running total of cache-read tokens across the session.
        cache_read_total: u32,
        /// Running total of cache-write tokens across the session.
        cache_write_total: u32,
        /// Context window size for the active model.
        max_tokens: usize,
    },
    /// The agent has finished processing the current user turn
    TurnComplete,
    /// The current turn was cancelled mid-stream. `partial_text` holds
    /// whatever text had already streamed before the cancellation landed;
    /// it has already been committed to the session as an assistant message.
    Aborted { partial_text: String },
    /// A recoverable error occurred
    Error(String),
    /// The todo list was updated
    TodoUpdate(Vec<TodoItem>),
}

/// Which compaction strategy actually produced a given `ContextCompacted` event.
///
/// Distinct from `CompactionStrategy` (the user's configured preference):
/// `Emergency` is never configured, only ever a runtime fallback when the
/// configured strategy's summarisation call fails or would itself overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionStrategyUsed {
    Structured,
    Narrative,
    Emergency,
}
