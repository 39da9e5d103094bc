// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Multi-session registry on top of [`Agent`].
//!
//! The teacher drives exactly one `Agent` per process. A top-level session
//! that can itself spawn sub-agent sessions (see [`crate::task_tool`]) needs
//! several, each serialized against its own FIFO prompt queue so a message
//! submitted while a turn is running waits its turn instead of interleaving
//! with it.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{mpsc, oneshot, Mutex};

use crate::agent::Agent;
use crate::events::AgentEvent;

/// Queue + busy flag for one session, guarded together so a "queue is empty,
/// go idle" transition and a concurrent submit can never race each other.
struct QueueState {
    queue: VecDeque<String>,
    busy: bool,
}

struct SessionRuntime {
    agent: Mutex<Agent>,
    state: StdMutex<QueueState>,
    /// Cancel handle for whichever turn is currently in flight, if any.
    cancel_tx: Mutex<Option<oneshot::Sender<()>>>,
}

/// Owns every registered session's [`Agent`] and drives its per-session turn
/// queue, cancellation, and summarization.
pub struct Coordinator {
    sessions: Mutex<HashMap<String, Arc<SessionRuntime>>>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Register `agent` under `session_id`, replacing any prior runtime
    /// registered under the same id (its queue is dropped).
    pub async fn register(&self, session_id: impl Into<String>, agent: Agent) {
        let runtime = Arc::new(SessionRuntime {
            agent: Mutex::new(agent),
            state: StdMutex::new(QueueState {
                queue: VecDeque::new(),
                busy: false,
            }),
            cancel_tx: Mutex::new(None),
        });
        self.sessions.lock().await.insert(session_id.into(), runtime);
    }

    /// Drop a session's runtime entirely. Any queued prompts are discarded;
    /// an in-flight turn is not cancelled first, so callers that care should
    /// `cancel` before `forget`.
    pub async fn forget(&self, session_id: &str) {
        self.sessions.lock().await.remove(session_id);
    }

    async fn runtime(&self, session_id: &str) -> Result<Arc<SessionRuntime>, String> {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| format!("no such session: {session_id}"))
    }

    /// Submit `prompt` to `session_id`. If the session is idle the turn
    /// starts immediately; if a turn is already running, `prompt` is
    /// appended to the session's FIFO and runs once every prompt ahead of it
    /// (including the one currently in flight) has finished.
    pub async fn submit(
        &self,
        session_id: &str,
        prompt: impl Into<String>,
        tx: mpsc::Sender<AgentEvent>,
    ) -> Result<(), String> {
        let runtime = self.runtime(session_id).await?;
        let prompt = prompt.into();

        let should_drive = {
            let mut state = runtime.state.lock().unwrap();
            if state.busy {
                state.queue.push_back(prompt.clone());
                false
            } else {
                state.busy = true;
                true
            }
        };

        if should_drive {
            tokio::spawn(Self::drive(runtime, prompt, tx));
        }
        Ok(())
    }

    /// Run `prompt`, then keep draining the session's queue until it is
    /// empty, marking the session idle only once nothing remains.
    async fn drive(runtime: Arc<SessionRuntime>, mut prompt: String, tx: mpsc::Sender<AgentEvent>) {
        loop {
            let (cancel_tx, cancel_rx) = oneshot::channel();
            *runtime.cancel_tx.lock().await = Some(cancel_tx);

            let result = {
                let mut agent = runtime.agent.lock().await;
                agent.submit_with_cancel(&prompt, tx.clone(), cancel_rx).await
            };
            runtime.cancel_tx.lock().await.take();

            if let Err(e) = result {
                let _ = tx.send(AgentEvent::Error(format!("{e:#}"))).await;
            }

            let next = {
                let mut state = runtime.state.lock().unwrap();
                match state.queue.pop_front() {
                    Some(p) => Some(p),
                    None => {
                        state.busy = false;
                        None
                    }
                }
            };
            match next {
                Some(p) => prompt = p,
                None => break,
            }
        }
    }

    /// Interrupt the turn currently in flight for `session_id`, if any.
    /// Returns `false` if the session exists but has nothing running.
    pub async fn cancel(&self, session_id: &str) -> Result<bool, String> {
        let runtime = self.runtime(session_id).await?;
        let sender = runtime.cancel_tx.lock().await.take();
        Ok(match sender {
            Some(tx) => {
                let _ = tx.send(());
                true
            }
            None => false,
        })
    }

    /// Drop every prompt queued (but not yet started) for `session_id`.
    /// Does not affect a turn already in flight. Returns the number dropped.
    pub async fn clear_queue(&self, session_id: &str) -> Result<usize, String> {
        let runtime = self.runtime(session_id).await?;
        let mut state = runtime.state.lock().unwrap();
        let n = state.queue.len();
        state.queue.clear();
        Ok(n)
    }

    /// Prompts waiting behind the current turn, in FIFO order.
    pub async fn queued_prompts(&self, session_id: &str) -> Result<Vec<String>, String> {
        let runtime = self.runtime(session_id).await?;
        let prompts = runtime.state.lock().unwrap().queue.iter().cloned().collect();
        Ok(prompts)
    }

    /// Whether a turn is currently running for `session_id` (queued-but-not-
    /// started prompts also count, since the session isn't idle).
    pub async fn is_busy(&self, session_id: &str) -> Result<bool, String> {
        let runtime = self.runtime(session_id).await?;
        let busy = runtime.state.lock().unwrap().busy;
        Ok(busy)
    }

    /// Force the session's history to summarize now rather than waiting for
    /// the proactive, threshold-gated compaction every turn runs through.
    /// Blocks until any turn currently in flight finishes, since compacting
    /// mid-turn would race the agent loop's own view of `session.messages`.
    pub async fn summarize(&self, session_id: &str, tx: mpsc::Sender<AgentEvent>) -> Result<(), String> {
        let runtime = self.runtime(session_id).await?;
        let mut agent = runtime.agent.lock().await;
        agent.summarize(tx).await.map_err(|e| format!("{e:#}"))
    }
}
