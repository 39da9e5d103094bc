// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Background agent task and request/event channel types.

use std::sync::Arc;

use crush_agent::{Agent, AgentEvent, AgentRuntimeContext, AgentSubAgentRunner, SharedSkills, SubAgentTool};
use crush_config::{AgentMode, Config, ModelConfig};
use crush_model::Message;
use crush_store::Store;
use crush_tools::{
    events::ToolEvent, AgenticFetchTool, AskQuestionTool, BashTool, DownloadTool, EditTool,
    FetchTool, GlobTool, LsTool, MultiEditTool, QuestionRequest, SubAgentRunner, TodoItem,
    TodoTool, ToolRegistry, ViewTool, WriteTool,
};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// Request sent from the TUI to the background agent task.
///
/// All model overrides carry an already-resolved `ModelConfig`.  The TUI
/// resolves the config via `SessionState` and `crush_model::resolve_model_from_config`;
/// the agent task only calls `crush_model::from_config` to instantiate the
/// provider, never re-derives which model to use.
pub enum AgentRequest {
    /// Submit a new user message (normal flow).
    Submit {
        content: String,
        /// Pre-resolved model config; agent calls `from_config` to instantiate.
        model_override: Option<ModelConfig>,
        mode_override: Option<AgentMode>,
    },
    /// Replace conversation history and submit (edit-and-resubmit flow).
    Resubmit {
        messages: Vec<Message>,
        new_user_content: String,
        /// Pre-resolved model config; agent calls `from_config` to instantiate.
        model_override: Option<ModelConfig>,
        mode_override: Option<AgentMode>,
    },
    /// Pre-load conversation history (resume flow). Does not trigger a model
    /// call; the agent is just primed for the next submission.
    LoadHistory(Vec<Message>),
}

/// Walk upward from the current directory looking for a `.git` marker.
/// Returns `None` outside a git worktree.
fn detect_project_root() -> Option<std::path::PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    crush_workspace::find_upward(&cwd, ".git")
}

/// Location of the session/message store, following the same XDG
/// convention `crush-config` uses for `config.yaml`: `$XDG_DATA_HOME` (or
/// `~/.local/share` on Linux) when available, falling back to the current
/// directory so the TUI still works in a sandboxed environment with no home.
pub fn default_store_path() -> std::path::PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("crush")
        .join("store.sqlite3")
}

/// Open (creating if necessary) the on-disk session store. Falls back to an
/// in-memory store if the on-disk path cannot be created or opened, so a
/// read-only home directory degrades to "no persistence across restarts"
/// rather than a startup failure.
pub fn open_store() -> Arc<Store> {
    let path = default_store_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match Store::open(&path, crush_bus::EventBus::new()) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            debug!(error = %e, path = %path.display(), "failed to open session store, falling back to in-memory");
            Arc::new(
                Store::open_in_memory(crush_bus::EventBus::new())
                    .expect("in-memory store open never fails"),
            )
        }
    }
}

/// Build the full tool registry available to the top-level agent: the
/// built-in editing/search/execution tools plus the interactive question
/// tool and the sub-agent delegation tools.
fn build_tool_registry(
    model: Arc<dyn crush_model::ModelProvider>,
    agent_config: Arc<crush_config::AgentConfig>,
    question_tx: mpsc::Sender<QuestionRequest>,
    tool_event_tx: mpsc::Sender<ToolEvent>,
    session: Option<(Arc<Store>, String)>,
) -> ToolRegistry {
    let todos = Arc::new(Mutex::new(Vec::<TodoItem>::new()));

    let mut registry = ToolRegistry::new();
    registry.register(ViewTool);
    registry.register(WriteTool);
    registry.register(EditTool);
    registry.register(MultiEditTool);
    registry.register(LsTool);
    registry.register(GlobTool);
    registry.register(BashTool::default());
    registry.register(FetchTool);
    registry.register(DownloadTool);
    registry.register(TodoTool::new(todos, tool_event_tx));
    registry.register(AskQuestionTool::new_tui(question_tx));

    let mut sub_agent_runner = AgentSubAgentRunner::new(model, agent_config);
    if let Some((store, session_id)) = session {
        sub_agent_runner = sub_agent_runner.with_store(store, session_id);
    }
    let runner: Arc<dyn SubAgentRunner> = Arc::new(sub_agent_runner);
    registry.register(SubAgentTool::new(runner.clone()));
    registry.register(AgenticFetchTool::new(runner));

    registry
}

/// Background task that owns the `Agent` and forwards events back to the TUI.
///
/// The startup model is passed as an already-resolved `ModelConfig` (the TUI
/// applied the CLI `--model` override before spawning).  Per-message model
/// overrides in `AgentRequest` variants are also pre-resolved `ModelConfig`
/// values; this task only calls `from_config` to instantiate the provider.
///
/// `cancel_handle` is a shared slot that holds the sender half of a
/// per-submission `oneshot` channel.  The TUI drops (or sends on) the sender
/// to interrupt the current run.  The task creates a fresh channel before
/// every Submit/Resubmit and stores the sender in the slot; it is cleared
/// when the submission completes.
#[allow(clippy::too_many_arguments)]
pub async fn agent_task(
    config: Arc<Config>,
    startup_model_cfg: ModelConfig,
    mode: AgentMode,
    mut rx: mpsc::Receiver<AgentRequest>,
    tx: mpsc::Sender<AgentEvent>,
    question_tx: mpsc::Sender<QuestionRequest>,
    cancel_handle: Arc<tokio::sync::Mutex<Option<tokio::sync::oneshot::Sender<()>>>>,
    shared_skills: SharedSkills,
    session: Option<(Arc<Store>, String)>,
) {
    let model: Arc<dyn crush_model::ModelProvider> =
        match crush_model::from_config(&startup_model_cfg) {
            Ok(m) => Arc::from(m),
            Err(e) => {
                let _ = tx.send(AgentEvent::Error(format!("model init: {e}"))).await;
                return;
            }
        };

    let agent_config = Arc::new(config.agent.clone());
    let (tool_event_tx, tool_event_rx) = mpsc::channel(32);
    let registry = build_tool_registry(
        model.clone(),
        agent_config.clone(),
        question_tx,
        tool_event_tx,
        session,
    );

    let runtime = AgentRuntimeContext {
        project_root: detect_project_root(),
        git_context_note: None,
        ci_context_note: None,
        project_context_file: None,
        append_system_prompt: None,
        system_prompt_override: None,
        skills: Some(shared_skills),
    };

    let mode_lock = Arc::new(Mutex::new(mode));
    let max_context_tokens = model.catalog_context_window().unwrap_or(128_000) as usize;

    let mut agent = Agent::new(
        model,
        Arc::new(registry),
        agent_config,
        runtime,
        mode_lock,
        tool_event_rx,
        max_context_tokens,
    );

    while let Some(req) = rx.recv().await {
        match req {
            AgentRequest::Submit {
                content,
                model_override,
                mode_override,
            } => {
                debug!(msg_len = content.len(), "agent task received message");

                if let Some(ref model_cfg) = model_override {
                    match crush_model::from_config(model_cfg) {
                        Ok(m) => {
                            agent.set_model(Arc::from(m) as Arc<dyn crush_model::ModelProvider>);
                        }
                        Err(e) => {
                            let _ = tx
                                .send(AgentEvent::Error(format!("model override init: {e}")))
                                .await;
                            continue;
                        }
                    }
                }

                if let Some(m) = mode_override {
                    agent.set_mode(m).await;
                }

                let (cancel_tx, cancel_rx) = tokio::sync::oneshot::channel();
                *cancel_handle.lock().await = Some(cancel_tx);
                let result = agent
                    .submit_with_cancel(&content, tx.clone(), cancel_rx)
                    .await;
                cancel_handle.lock().await.take();
                if let Err(e) = result {
                    let _ = tx.send(AgentEvent::Error(format!("{:#}", e))).await;
                }
            }
            AgentRequest::Resubmit {
                messages,
                new_user_content,
                model_override,
                mode_override,
            } => {
                debug!("agent task received resubmit");

                if let Some(ref model_cfg) = model_override {
                    match crush_model::from_config(model_cfg) {
                        Ok(m) => {
                            agent.set_model(Arc::from(m) as Arc<dyn crush_model::ModelProvider>);
                        }
                        Err(e) => {
                            let _ = tx
                                .send(AgentEvent::Error(format!("model override init: {e}")))
                                .await;
                            continue;
                        }
                    }
                }

                if let Some(m) = mode_override {
                    agent.set_mode(m).await;
                }

                let (cancel_tx, cancel_rx) = tokio::sync::oneshot::channel();
                *cancel_handle.lock().await = Some(cancel_tx);
                let result = agent
                    .replace_history_and_submit_with_cancel(
                        messages,
                        &new_user_content,
                        tx.clone(),
                        cancel_rx,
                    )
                    .await;
                cancel_handle.lock().await.take();
                if let Err(e) = result {
                    let _ = tx.send(AgentEvent::Error(format!("{:#}", e))).await;
                }
            }
            AgentRequest::LoadHistory(messages) => {
                debug!(n = messages.len(), "agent task loading history");
                agent.seed_history(messages).await;
            }
        }
    }
}
