// SPDX-License-Identifier: Apache-2.0
//! The session/message store (C2) and file-history store/tracker (C3): a
//! single embedded SQLite database holding sessions, todos, messages, and
//! per-file version history, with writes serialized per session and every
//! durable mutation announced on the event bus.

mod error;
mod schema;
mod store;
mod types;

pub use error::{Result, StoreError};
pub use store::Store;
pub use types::{FileHistoryEntry, FileReadRecord, Message, MessagePart, Role, Session, Todo, TodoStatus, Usage};
