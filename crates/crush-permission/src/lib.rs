// SPDX-License-Identifier: Apache-2.0
//! The permission arbiter (C4): a per-tool-call consent gate yielding
//! allow / allow-for-session / deny, with a global "skip all" (yolo) mode.

mod error;

pub use error::PermissionError;

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::oneshot;
use uuid::Uuid;

use crush_bus::{Event, EventBus, PermissionEvent};

pub type Result<T> = std::result::Result<T, PermissionError>;

/// A request for consent to perform a tool's side effect, built by the tool
/// runtime before the side effect runs.
#[derive(Debug, Clone)]
pub struct PermissionRequest {
    pub id: String,
    pub session_id: String,
    pub tool_name: String,
    pub tool_call_id: String,
    pub params: Value,
    /// Best-effort path this request concerns, if the tool is path-carrying
    /// (e.g. `edit`, `write`). Commands like `bash` leave this `None`.
    pub path: Option<String>,
    pub description: String,
}

impl PermissionRequest {
    pub fn new(
        session_id: impl Into<String>,
        tool_name: impl Into<String>,
        tool_call_id: impl Into<String>,
        params: Value,
        path: Option<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            tool_name: tool_name.into(),
            tool_call_id: tool_call_id.into(),
            params,
            path,
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

struct Pending {
    session_id: String,
    tool_name: String,
    prefix: Option<String>,
    tx: oneshot::Sender<Decision>,
}

struct Grant {
    session_id: String,
    tool_name: String,
    /// `None` means the grant covers every path for this (session, tool)
    /// pair — used for tools that are not path-carrying, e.g. `bash`.
    prefix: Option<String>,
}

/// Directory prefix used for persistent-grant matching: the request path's
/// parent directory, or the path itself if it names a directory already.
fn path_prefix(path: &str) -> String {
    Path::new(path)
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// The permission arbiter. One instance is shared across all sessions; the
/// per-session grant set is tracked internally keyed by session ID.
pub struct Arbiter {
    bus: EventBus,
    yolo: AtomicBool,
    grants: Mutex<Vec<Grant>>,
    pending: Mutex<HashMap<String, Pending>>,
}

impl Arbiter {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            yolo: AtomicBool::new(false),
            grants: Mutex::new(Vec::new()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Enable or disable "skip all" (yolo mode): every request is
    /// auto-allowed without a dialog round trip.
    pub fn set_yolo(&self, enabled: bool) {
        self.yolo.store(enabled, Ordering::Relaxed);
    }

    pub fn is_yolo(&self) -> bool {
        self.yolo.load(Ordering::Relaxed)
    }

    fn grant_matches(&self, req: &PermissionRequest) -> bool {
        let grants = self.grants.lock().unwrap();
        let req_prefix = req.path.as_deref().map(path_prefix);
        grants.iter().any(|g| {
            g.session_id == req.session_id
                && g.tool_name == req.tool_name
                && match (&g.prefix, &req_prefix) {
                    (None, _) => true,
                    (Some(gp), Some(rp)) => rp.starts_with(gp.as_str()),
                    (Some(_), None) => false,
                }
        })
    }

    /// Request consent for `req`. Resolves immediately (without a dialog
    /// round trip) if yolo mode is on or a persistent grant already covers
    /// it; otherwise publishes a `Permission::Requested` event and suspends
    /// until `grant`, `grant_persistent`, or `deny` is called with this
    /// request's ID.
    ///
    /// Returns `Ok(())` on allow, `Err(PermissionError::Denied)` on deny —
    /// callers (the coordinator) must treat `Denied` as a graceful turn-end
    /// signal, never as a tool failure.
    pub async fn request(&self, req: PermissionRequest) -> Result<()> {
        if self.is_yolo() || self.grant_matches(&req) {
            return Ok(());
        }

        let (tx, rx) = oneshot::channel();
        let prefix = req.path.as_deref().map(path_prefix);
        {
            let mut pending = self.pending.lock().unwrap();
            pending.insert(
                req.id.clone(),
                Pending {
                    session_id: req.session_id.clone(),
                    tool_name: req.tool_name.clone(),
                    prefix,
                    tx,
                },
            );
        }
        self.bus.publish(Event::Permission(PermissionEvent::Requested {
            request_id: req.id.clone(),
            session_id: req.session_id.clone(),
        }));

        let decision = rx.await.unwrap_or(Decision::Deny);
        self.bus.publish(Event::Permission(PermissionEvent::Resolved {
            request_id: req.id,
            allowed: decision == Decision::Allow,
        }));
        match decision {
            Decision::Allow => Ok(()),
            Decision::Deny => Err(PermissionError::Denied),
        }
    }

    fn take_pending(&self, request_id: &str) -> Result<Pending> {
        self.pending
            .lock()
            .unwrap()
            .remove(request_id)
            .ok_or_else(|| PermissionError::NotFound { id: request_id.to_string() })
    }

    /// Allow this single request, without recording a persistent grant.
    pub fn grant(&self, request_id: &str) -> Result<()> {
        let pending = self.take_pending(request_id)?;
        let _ = pending.tx.send(Decision::Allow);
        Ok(())
    }

    /// Allow this request and record a persistent grant for (session, tool,
    /// path-prefix) so future matching requests auto-allow.
    pub fn grant_persistent(&self, request_id: &str) -> Result<()> {
        let pending = self.take_pending(request_id)?;
        self.grants.lock().unwrap().push(Grant {
            session_id: pending.session_id.clone(),
            tool_name: pending.tool_name.clone(),
            prefix: pending.prefix.clone(),
        });
        let _ = pending.tx.send(Decision::Allow);
        Ok(())
    }

    pub fn deny(&self, request_id: &str) -> Result<()> {
        let pending = self.take_pending(request_id)?;
        let _ = pending.tx.send(Decision::Deny);
        Ok(())
    }
}
