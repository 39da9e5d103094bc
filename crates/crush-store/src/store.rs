use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};

use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crush_bus::{Event, EventBus, FileHistoryEvent, MessageEvent, SessionEvent};

use crate::error::{Result, StoreError};
use crate::types::{FileHistoryEntry, FileReadRecord, Message, MessagePart, Role, Session, Todo, TodoStatus, Usage};

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// The persistent session/message/file-history store (C2, C3).
///
/// Writes affecting a given session are serialized through a per-session
/// `tokio::sync::Mutex` so two concurrent callers touching the same session
/// never interleave a read-modify-write; callers touching different
/// sessions proceed fully in parallel. The underlying `rusqlite::Connection`
/// itself is guarded by a plain `std::sync::Mutex` and all synchronous work
/// runs on the blocking thread pool via `spawn_blocking`.
pub struct Store {
    conn: Arc<StdMutex<Connection>>,
    session_locks: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    bus: EventBus,
}

impl Store {
    pub fn open(path: impl AsRef<Path>, bus: EventBus) -> Result<Self> {
        let conn = Connection::open(path)?;
        crate::schema::init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(StdMutex::new(conn)),
            session_locks: StdMutex::new(HashMap::new()),
            bus,
        })
    }

    pub fn open_in_memory(bus: EventBus) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(StdMutex::new(conn)),
            session_locks: StdMutex::new(HashMap::new()),
            bus,
        })
    }

    fn session_lock(&self, session_id: &str) -> Arc<AsyncMutex<()>> {
        self.session_locks
            .lock()
            .unwrap()
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Run `f` against the connection on the blocking thread pool.
    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            f(&conn)
        })
        .await?
    }

    /// Run `f` against the connection, serialized with every other mutation
    /// of `session_id`.
    async fn run_for_session<T, F>(&self, session_id: &str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;
        self.run(f).await
    }

    fn publish(&self, event: Event) {
        self.bus.publish(event);
    }

    // ───────────────────────── Sessions ─────────────────────────

    pub async fn create_session(&self, title: impl Into<String>) -> Result<Session> {
        let title = title.into();
        let id = Uuid::new_v4().to_string();
        let ts = now();
        let (created_id, created_title) = (id.clone(), title.clone());
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, title, parent_id, created_at, updated_at)
                 VALUES (?1, ?2, NULL, ?3, ?3)",
                params![created_id, created_title, ts],
            )?;
            Ok(())
        })
        .await?;
        self.publish(Event::Session(SessionEvent::Created { session_id: id.clone() }));
        Ok(Session {
            id,
            title,
            parent_id: None,
            prompt_tokens: 0,
            completion_tokens: 0,
            cost_cents_micro: 0,
            todos: Vec::new(),
            created_at: ts,
            updated_at: ts,
        })
    }

    pub async fn create_child_session(&self, parent_id: impl Into<String>, title: impl Into<String>) -> Result<Session> {
        self.insert_child_session(Uuid::new_v4().to_string(), parent_id.into(), title.into()).await
    }

    /// Return the child session `id` if it already exists, otherwise create
    /// it under `parent_id`. Used by the sub-agent runner, which derives `id`
    /// deterministically from the spawning tool call so that re-entering the
    /// same call (e.g. a retried turn) attaches to the same child session
    /// instead of forking a new one.
    pub async fn get_or_create_child_session(
        &self,
        id: impl Into<String>,
        parent_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Session> {
        let id = id.into();
        if let Some(existing) = self.get_session(&id).await? {
            return Ok(existing);
        }
        self.insert_child_session(id, parent_id.into(), title.into()).await
    }

    async fn insert_child_session(&self, id: String, parent_id: String, title: String) -> Result<Session> {
        let exists_parent = parent_id.clone();
        let exists: bool = self
            .run(move |conn| {
                Ok(conn
                    .query_row("SELECT 1 FROM sessions WHERE id = ?1", params![exists_parent], |_| Ok(()))
                    .optional()?
                    .is_some())
            })
            .await?;
        if !exists {
            return Err(StoreError::NotFound { what: "session", id: parent_id });
        }
        let ts = now();
        let (ins_id, ins_parent, ins_title) = (id.clone(), parent_id.clone(), title.clone());
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, title, parent_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![ins_id, ins_title, ins_parent, ts],
            )?;
            Ok(())
        })
        .await?;
        self.publish(Event::Session(SessionEvent::Created { session_id: id.clone() }));
        Ok(Session {
            id,
            title,
            parent_id: Some(parent_id),
            prompt_tokens: 0,
            completion_tokens: 0,
            cost_cents_micro: 0,
            todos: Vec::new(),
            created_at: ts,
            updated_at: ts,
        })
    }

    pub async fn get_session(&self, id: impl Into<String>) -> Result<Option<Session>> {
        let id = id.into();
        self.run(move |conn| Ok(load_session(conn, &id)?)).await
    }

    pub async fn list_sessions(&self) -> Result<Vec<Session>> {
        self.run(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, parent_id, prompt_tokens, completion_tokens,
                        cost_cents_micro, created_at, updated_at
                 FROM sessions ORDER BY updated_at DESC",
            )?;
            let ids: Vec<String> = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .filter_map(|r| r.ok())
                .collect();
            let mut out = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(session) = load_session(conn, &id)? {
                    out.push(session);
                }
            }
            Ok(out)
        })
        .await
    }

    pub async fn delete_session(&self, id: impl Into<String>) -> Result<()> {
        let id = id.into();
        let del_id = id.clone();
        let changed = self
            .run(move |conn| {
                conn.execute(
                    "DELETE FROM message_part_fingerprints
                     WHERE message_id IN (SELECT id FROM messages WHERE session_id = ?1)",
                    params![del_id],
                )?;
                conn.execute("DELETE FROM messages WHERE session_id = ?1", params![del_id])?;
                conn.execute("DELETE FROM file_history WHERE session_id = ?1", params![del_id])?;
                conn.execute("DELETE FROM file_reads WHERE session_id = ?1", params![del_id])?;
                conn.execute("DELETE FROM todos WHERE session_id = ?1", params![del_id])?;
                let changed = conn.execute("DELETE FROM sessions WHERE id = ?1", params![del_id])?;
                Ok(changed)
            })
            .await?;
        if changed == 0 {
            return Err(StoreError::NotFound { what: "session", id });
        }
        self.publish(Event::Session(SessionEvent::Deleted { session_id: id }));
        Ok(())
    }

    pub async fn update_tokens_and_cost(
        &self,
        id: impl Into<String>,
        prompt_delta: i64,
        completion_delta: i64,
        cost_delta_micro: i64,
    ) -> Result<()> {
        let id = id.into();
        let ts = now();
        let upd_id = id.clone();
        let changed = self
            .run_for_session(&id, move |conn| {
                Ok(conn.execute(
                    "UPDATE sessions
                     SET prompt_tokens = prompt_tokens + ?1,
                         completion_tokens = completion_tokens + ?2,
                         cost_cents_micro = cost_cents_micro + ?3,
                         updated_at = ?4
                     WHERE id = ?5",
                    params![prompt_delta, completion_delta, cost_delta_micro, ts, upd_id],
                )?)
            })
            .await?;
        if changed == 0 {
            return Err(StoreError::NotFound { what: "session", id });
        }
        self.publish(Event::Session(SessionEvent::Updated { session_id: id }));
        Ok(())
    }

    pub async fn set_todos(&self, id: impl Into<String>, todos: Vec<Todo>) -> Result<()> {
        let id = id.into();
        let ts = now();
        let (set_id, new_todos) = (id.clone(), todos);
        let changed = self
            .run_for_session(&id, move |conn| {
                let existing = load_todos(conn, &set_id)?;
                if existing == new_todos {
                    return Ok(false);
                }
                conn.execute("DELETE FROM todos WHERE session_id = ?1", params![set_id])?;
                for todo in &new_todos {
                    conn.execute(
                        "INSERT INTO todos (session_id, id, content, active_form, status, position)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![set_id, todo.id, todo.content, todo.active_form, todo.status.as_str(), todo.position],
                    )?;
                }
                conn.execute("UPDATE sessions SET updated_at = ?1 WHERE id = ?2", params![ts, set_id])?;
                Ok(true)
            })
            .await?;
        if changed {
            self.publish(Event::Session(SessionEvent::Updated { session_id: id }));
        }
        Ok(())
    }

    // ───────────────────────── Messages ─────────────────────────

    pub async fn create_message(&self, session_id: impl Into<String>, role: Role, parts: Vec<MessagePart>) -> Result<Message> {
        let session_id = session_id.into();
        let id = Uuid::new_v4().to_string();
        let ts = now();
        let parts_json = serde_json::to_string(&parts)?;
        let (ins_id, ins_session, ins_role, ins_parts) = (id.clone(), session_id.clone(), role.as_str(), parts_json);
        self.run_for_session(&session_id, move |conn| {
            conn.execute(
                "INSERT INTO messages (id, session_id, role, parts_json, created_at, finished, finish_reason)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, NULL)",
                params![ins_id, ins_session, ins_role, ins_parts, ts],
            )?;
            Ok(())
        })
        .await?;
        self.publish(Event::Message(MessageEvent::Created {
            session_id: session_id.clone(),
            message_id: id.clone(),
        }));
        Ok(Message {
            id,
            session_id,
            role,
            parts,
            created_at: ts,
            finished: false,
            finish_reason: None,
        })
    }

    /// Append `parts` to an existing message. If `fingerprint` is `Some` and
    /// has already been applied to this message, this is a no-op — making
    /// repeated delivery of the same streamed chunk idempotent.
    pub async fn append_parts(&self, message_id: impl Into<String>, parts: Vec<MessagePart>, fingerprint: Option<&str>) -> Result<()> {
        let message_id = message_id.into();
        let session_id = self.session_id_of(&message_id).await?;
        let fingerprint = fingerprint.map(|s| s.to_string());
        let (msg_id, new_parts) = (message_id.clone(), parts);
        let applied = self
            .run_for_session(&session_id, move |conn| {
                if let Some(fp) = &fingerprint {
                    let seen: bool = conn
                        .query_row(
                            "SELECT 1 FROM message_part_fingerprints WHERE message_id = ?1 AND fingerprint = ?2",
                            params![msg_id, fp],
                            |_| Ok(()),
                        )
                        .optional()?
                        .is_some();
                    if seen {
                        return Ok(false);
                    }
                    conn.execute(
                        "INSERT INTO message_part_fingerprints (message_id, fingerprint) VALUES (?1, ?2)",
                        params![msg_id, fp],
                    )?;
                }
                let parts_json: String = conn.query_row(
                    "SELECT parts_json FROM messages WHERE id = ?1",
                    params![msg_id],
                    |row| row.get(0),
                )?;
                let mut existing: Vec<MessagePart> = serde_json::from_str(&parts_json)?;
                existing.extend(new_parts);
                let updated = serde_json::to_string(&existing)?;
                conn.execute("UPDATE messages SET parts_json = ?1 WHERE id = ?2", params![updated, msg_id])?;
                Ok(true)
            })
            .await?;
        if applied {
            self.publish(Event::Message(MessageEvent::Updated { session_id, message_id }));
        }
        Ok(())
    }

    pub async fn finish_message(&self, message_id: impl Into<String>, reason: impl Into<String>, usage: Usage) -> Result<()> {
        let message_id = message_id.into();
        let reason = reason.into();
        let session_id = self.session_id_of(&message_id).await?;
        let (msg_id, fin_reason, fin_usage) = (message_id.clone(), reason.clone(), usage);
        self.run_for_session(&session_id, move |conn| {
            let parts_json: String = conn.query_row(
                "SELECT parts_json FROM messages WHERE id = ?1",
                params![msg_id],
                |row| row.get(0),
            )?;
            let mut parts: Vec<MessagePart> = serde_json::from_str(&parts_json)?;
            parts.push(MessagePart::Finish { reason: fin_reason.clone(), usage: fin_usage });
            let updated = serde_json::to_string(&parts)?;
            conn.execute(
                "UPDATE messages SET parts_json = ?1, finished = 1, finish_reason = ?2 WHERE id = ?3",
                params![updated, fin_reason, msg_id],
            )?;
            Ok(())
        })
        .await?;
        self.publish(Event::Message(MessageEvent::Updated { session_id, message_id }));
        Ok(())
    }

    pub async fn list_messages(&self, session_id: impl Into<String>) -> Result<Vec<Message>> {
        let session_id = session_id.into();
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, role, parts_json, created_at, finished, finish_reason
                 FROM messages WHERE session_id = ?1 ORDER BY created_at ASC",
            )?;
            let rows = stmt.query_map(params![session_id], row_to_message)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row??);
            }
            Ok(out)
        })
        .await
    }

    pub async fn list_user_messages(&self, session_id: Option<String>) -> Result<Vec<Message>> {
        self.run(move |conn| {
            let mut out = Vec::new();
            let map_row = row_to_message;
            match &session_id {
                Some(sid) => {
                    let mut stmt = conn.prepare(
                        "SELECT id, session_id, role, parts_json, created_at, finished, finish_reason
                         FROM messages WHERE session_id = ?1 AND role = 'user' ORDER BY created_at ASC",
                    )?;
                    for row in stmt.query_map(params![sid], map_row)? {
                        out.push(row??);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT id, session_id, role, parts_json, created_at, finished, finish_reason
                         FROM messages WHERE role = 'user' ORDER BY created_at ASC",
                    )?;
                    for row in stmt.query_map([], map_row)? {
                        out.push(row??);
                    }
                }
            }
            Ok(out)
        })
        .await
    }

    async fn session_id_of(&self, message_id: &str) -> Result<String> {
        let message_id = message_id.to_string();
        let id_for_err = message_id.clone();
        self.run(move |conn| {
            conn.query_row("SELECT session_id FROM messages WHERE id = ?1", params![message_id], |row| row.get(0))
                .optional()
                .map_err(StoreError::from)
        })
        .await?
        .ok_or(StoreError::NotFound { what: "message", id: id_for_err })
    }

    // ───────────────────────── File history ─────────────────────────

    pub async fn record_version(&self, session_id: impl Into<String>, path: impl Into<String>, content: Vec<u8>) -> Result<FileHistoryEntry> {
        let session_id = session_id.into();
        let path = path.into();
        let ts = now();
        let (rec_session, rec_path, rec_content) = (session_id.clone(), path.clone(), content.clone());
        let version = self
            .run_for_session(&session_id, move |conn| {
                let max: Option<i64> = conn.query_row(
                    "SELECT MAX(version) FROM file_history WHERE session_id = ?1 AND path = ?2",
                    params![rec_session, rec_path],
                    |row| row.get(0),
                )?;
                let version = max.map(|v| v + 1).unwrap_or(0);
                conn.execute(
                    "INSERT INTO file_history (session_id, path, version, content, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![rec_session, rec_path, version, rec_content, ts],
                )?;
                Ok(version)
            })
            .await?;
        self.publish(Event::FileHistory(FileHistoryEvent::Created {
            session_id: session_id.clone(),
            path: path.clone(),
            version,
        }));
        Ok(FileHistoryEntry { session_id, path, version, content, created_at: ts })
    }

    pub async fn list_by_session(&self, session_id: impl Into<String>) -> Result<Vec<FileHistoryEntry>> {
        let session_id = session_id.into();
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT session_id, path, version, content, created_at
                 FROM file_history WHERE session_id = ?1 ORDER BY path ASC, version ASC",
            )?;
            let rows = stmt.query_map(params![session_id], |row| {
                Ok(FileHistoryEntry {
                    session_id: row.get(0)?,
                    path: row.get(1)?,
                    version: row.get(2)?,
                    content: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
    }

    pub async fn record_read(&self, session_id: impl Into<String>, path: impl Into<String>) -> Result<()> {
        let session_id = session_id.into();
        let path = path.into();
        let ts = now();
        let (rec_session, rec_path) = (session_id.clone(), path.clone());
        self.run_for_session(&session_id, move |conn| {
            conn.execute(
                "INSERT INTO file_reads (session_id, path, last_read_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT (session_id, path) DO UPDATE SET last_read_at = excluded.last_read_at",
                params![rec_session, rec_path, ts],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn last_read_time(&self, session_id: impl Into<String>, path: impl Into<String>) -> Result<Option<i64>> {
        let session_id = session_id.into();
        let path = path.into();
        self.run(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT last_read_at FROM file_reads WHERE session_id = ?1 AND path = ?2",
                    params![session_id, path],
                    |row| row.get(0),
                )
                .optional()?)
        })
        .await
    }

    pub async fn list_read_files(&self, session_id: impl Into<String>) -> Result<Vec<FileReadRecord>> {
        let session_id = session_id.into();
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT session_id, path, last_read_at FROM file_reads WHERE session_id = ?1 ORDER BY path ASC",
            )?;
            let rows = stmt.query_map(params![session_id], |row| {
                Ok(FileReadRecord { session_id: row.get(0)?, path: row.get(1)?, last_read_at: row.get(2)? })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
    }
}

fn load_session(conn: &Connection, id: &str) -> rusqlite::Result<Option<Session>> {
    let row = conn
        .query_row(
            "SELECT id, title, parent_id, prompt_tokens, completion_tokens, cost_cents_micro, created_at, updated_at
             FROM sessions WHERE id = ?1",
            params![id],
            |row| {
                Ok(Session {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    parent_id: row.get(2)?,
                    prompt_tokens: row.get(3)?,
                    completion_tokens: row.get(4)?,
                    cost_cents_micro: row.get(5)?,
                    todos: Vec::new(),
                    created_at: row.get(6)?,
                    updated_at: row.get(7)?,
                })
            },
        )
        .optional()?;
    match row {
        Some(mut session) => {
            session.todos = load_todos(conn, id)?;
            Ok(Some(session))
        }
        None => Ok(None),
    }
}

fn load_todos(conn: &Connection, session_id: &str) -> rusqlite::Result<Vec<Todo>> {
    let mut stmt = conn.prepare(
        "SELECT id, content, active_form, status, position FROM todos
         WHERE session_id = ?1 ORDER BY position ASC",
    )?;
    let rows = stmt.query_map(params![session_id], |row| {
        Ok(Todo {
            id: row.get(0)?,
            content: row.get(1)?,
            active_form: row.get(2)?,
            status: TodoStatus::parse(&row.get::<_, String>(3)?),
            position: row.get(4)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Message>> {
    let parts_json: String = row.get(3)?;
    let parts: std::result::Result<Vec<MessagePart>, _> = serde_json::from_str(&parts_json);
    Ok(parts.map(|parts| Message {
        id: row.get(0).unwrap_or_default(),
        session_id: row.get(1).unwrap_or_default(),
        role: Role::parse(&row.get::<_, String>(2).unwrap_or_default()),
        parts,
        created_at: row.get(4).unwrap_or_default(),
        finished: row.get::<_, i64>(5).unwrap_or(0) != 0,
        finish_reason: row.get(6).unwrap_or_default(),
    }).map_err(StoreError::from))
}
