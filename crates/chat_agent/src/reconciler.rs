//! Rebuilds the conversation history of one remote thread.
//!
//! The remote run log is authoritative: after every turn the full history is
//! replayed from `list_runs` (ascending) and each run's steps (ascending).
//! Messages are never re-sorted locally. User messages sent from this process
//! are remembered per run and placed immediately before that run's messages.
//! Until the log lists the run they triggered, they stay pending at the end.
//!
//! A reconciler is driven by a single caller; methods that talk to the remote
//! service take `&mut self`, so concurrent turns on one session cannot be
//! expressed.

use std::collections::HashMap;
use std::sync::Arc;

use agent_service::{AgentService, RunRecord, ServiceError, SessionHandle};
use thiserror::Error;

use crate::anchor::SessionAnchor;
use crate::classifier::classify_step;
use crate::message::ConversationMessage;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("no active session; call ensure_session first")]
    NotInitialized,

    #[error(transparent)]
    RemoteUnavailable(#[from] ServiceError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Active(SessionHandle),
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerStatus {
    pub session_handle: Option<SessionHandle>,
    pub session_handle_present: bool,
    pub active: bool,
    pub message_count: usize,
}

/// Messages derived from one remote run, in step order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSegment {
    pub run: RunRecord,
    pub messages: Vec<ConversationMessage>,
}

pub struct HistoryReconciler {
    service: Arc<dyn AgentService>,
    anchor: SessionAnchor,
    agent_name: String,
    state: SessionState,
    history: Vec<ConversationMessage>,
    pending_user_messages: Vec<ConversationMessage>,
    /// Run that pending user messages attach to once it shows up in the log.
    pending_run_id: Option<String>,
    user_turns: HashMap<String, Vec<ConversationMessage>>,
}

impl HistoryReconciler {
    pub fn new(
        service: Arc<dyn AgentService>,
        anchor: SessionAnchor,
        agent_name: impl Into<String>,
    ) -> Self {
        Self {
            service,
            anchor,
            agent_name: agent_name.into(),
            state: SessionState::Uninitialized,
            history: Vec::new(),
            pending_user_messages: Vec::new(),
            pending_run_id: None,
            user_turns: HashMap::new(),
        }
    }

    /// Activates the session, resuming the anchored thread when the remote
    /// still knows it and creating (and anchoring) a new one otherwise.
    pub fn ensure_session(&mut self) -> Result<SessionHandle, ReconcileError> {
        if let SessionState::Active(handle) = &self.state {
            return Ok(handle.clone());
        }

        let handle = match self.anchor.get() {
            Some(anchored) => match self.service.get_session(&anchored) {
                Ok(handle) => {
                    tracing::info!(%handle, "resumed remote session");
                    handle
                }
                Err(error) => {
                    tracing::warn!(
                        handle = %anchored,
                        %error,
                        "anchored session is unavailable; creating a new one"
                    );
                    self.create_session()?
                }
            },
            None => self.create_session()?,
        };

        self.state = SessionState::Active(handle.clone());
        if let Err(error) = self.rebuild_history(&handle) {
            tracing::warn!(%handle, %error, "failed to load session history");
        }

        Ok(handle)
    }

    /// Sends a user message and shows it locally before any run completes.
    pub fn append_user_message(&mut self, content: &str) -> Result<(), ReconcileError> {
        let handle = self.active_handle()?;
        self.service.send_user_message(&handle, content)?;

        let message = ConversationMessage::user(content);
        self.history.push(message.clone());
        self.pending_user_messages.push(message);
        Ok(())
    }

    /// Runs the agent on the session and returns the messages of that run.
    ///
    /// The full history is rebuilt from the remote log as a side effect.
    /// Remote failures come back in-band as a single `Error` message, and a
    /// run that produced nothing yields one fallback `Assistant` message.
    pub fn run_turn(&mut self) -> Result<Vec<ConversationMessage>, ReconcileError> {
        let handle = self.active_handle()?;

        let run = match self.service.run_and_wait(&handle) {
            Ok(run) => run,
            Err(error) => {
                tracing::error!(%handle, %error, "failed to execute run");
                return Ok(vec![turn_failure_message(&error)]);
            }
        };
        tracing::info!(%handle, run_id = %run.run_id, status = %run.status, "run finished");

        if !self.pending_user_messages.is_empty() {
            self.pending_run_id = Some(run.run_id.clone());
        }

        let segments = match self.rebuild_history(&handle) {
            Ok(segments) => segments,
            Err(error) => {
                tracing::error!(%handle, %error, "failed to rebuild history after run");
                return Ok(vec![turn_failure_message(&error)]);
            }
        };

        let mut turn = segments
            .into_iter()
            .find(|segment| segment.run.run_id == run.run_id)
            .map(|segment| segment.messages)
            .unwrap_or_default();

        if turn.is_empty() {
            turn.push(ConversationMessage::fallback());
        }

        Ok(turn)
    }

    /// Re-derives the history from the remote log without starting a run.
    pub fn reload_history(&mut self) -> Result<&[ConversationMessage], ReconcileError> {
        let handle = self.active_handle()?;
        self.rebuild_history(&handle)?;
        Ok(&self.history)
    }

    #[must_use]
    pub fn history(&self) -> &[ConversationMessage] {
        &self.history
    }

    /// Returns the last `count` messages, or all of them when `count` is zero.
    #[must_use]
    pub fn recent_messages(&self, count: usize) -> &[ConversationMessage] {
        if count == 0 {
            return &self.history;
        }

        let start = self.history.len().saturating_sub(count);
        &self.history[start..]
    }

    /// Deletes the remote session (best effort), forgets the anchored handle
    /// and drops local history.
    pub fn clear_history(&mut self) {
        let handle = match &self.state {
            SessionState::Active(handle) => Some(handle.clone()),
            SessionState::Uninitialized | SessionState::Closed => self.anchor.get(),
        };

        if let Some(handle) = handle {
            match self.service.delete_session(&handle) {
                Ok(()) => tracing::info!(%handle, "deleted remote session"),
                Err(error) => {
                    tracing::warn!(%handle, %error, "failed to delete remote session");
                }
            }
        }

        if let Err(error) = self.anchor.clear() {
            tracing::warn!(%error, "failed to clear anchored session handle");
        }

        self.history.clear();
        self.pending_user_messages.clear();
        self.pending_run_id = None;
        self.user_turns.clear();
        self.state = SessionState::Closed;
    }

    /// Releases remote client resources. The anchored handle is kept.
    pub fn close(&mut self) {
        if let Err(error) = self.service.close() {
            tracing::warn!(%error, "failed to close agent service client");
        }

        self.state = SessionState::Closed;
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Active(_))
    }

    #[must_use]
    pub fn status(&self) -> ReconcilerStatus {
        let session_handle = match &self.state {
            SessionState::Active(handle) => Some(handle.clone()),
            SessionState::Uninitialized | SessionState::Closed => None,
        };

        ReconcilerStatus {
            active: session_handle.is_some(),
            session_handle,
            session_handle_present: self.anchor.is_set(),
            message_count: self.history.len(),
        }
    }

    #[must_use]
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn anchor_mut(&mut self) -> &mut SessionAnchor {
        &mut self.anchor
    }

    fn active_handle(&self) -> Result<SessionHandle, ReconcileError> {
        match &self.state {
            SessionState::Active(handle) => Ok(handle.clone()),
            SessionState::Uninitialized | SessionState::Closed => {
                Err(ReconcileError::NotInitialized)
            }
        }
    }

    fn create_session(&mut self) -> Result<SessionHandle, ReconcileError> {
        let handle = self.service.create_session()?;
        tracing::info!(%handle, "created remote session");

        if let Err(error) = self.anchor.set(&handle) {
            tracing::warn!(%handle, %error, "failed to persist session handle");
        }

        self.pending_user_messages.clear();
        self.pending_run_id = None;
        self.user_turns.clear();
        Ok(handle)
    }

    fn rebuild_history(
        &mut self,
        handle: &SessionHandle,
    ) -> Result<Vec<RunSegment>, ServiceError> {
        let segments = replay_runs(self.service.as_ref(), handle, &self.agent_name)?;

        let mut history = Vec::new();
        for segment in &segments {
            if self.pending_run_id.as_deref() == Some(segment.run.run_id.as_str()) {
                self.pending_run_id = None;
                let claimed = std::mem::take(&mut self.pending_user_messages);
                self.user_turns
                    .entry(segment.run.run_id.clone())
                    .or_default()
                    .extend(claimed);
            }
            if let Some(user_messages) = self.user_turns.get(&segment.run.run_id) {
                history.extend(user_messages.iter().cloned());
            }
            history.extend(segment.messages.iter().cloned());
        }
        history.extend(self.pending_user_messages.iter().cloned());

        tracing::debug!(
            %handle,
            runs = segments.len(),
            messages = history.len(),
            "rebuilt session history"
        );
        self.history = history;
        Ok(segments)
    }
}

/// Replays every run of a thread into per-run message segments.
///
/// A failed run contributes one leading `Error` message. A run whose steps
/// cannot be listed contributes only that error (if any); the replay goes on.
pub fn replay_runs(
    service: &dyn AgentService,
    handle: &SessionHandle,
    agent_name: &str,
) -> Result<Vec<RunSegment>, ServiceError> {
    let runs = service.list_runs(handle)?;
    let mut segments = Vec::with_capacity(runs.len());

    for run in runs {
        let mut messages = Vec::new();
        if run.is_failed() {
            messages.push(run_failure_message(&run));
        }

        match service.list_steps(handle, &run.run_id) {
            Ok(steps) => messages.extend(
                steps
                    .iter()
                    .filter_map(|step| classify_step(service, handle, step, agent_name)),
            ),
            Err(error) => {
                tracing::warn!(run_id = %run.run_id, %error, "skipping steps of run");
            }
        }

        segments.push(RunSegment { run, messages });
    }

    Ok(segments)
}

fn run_failure_message(run: &RunRecord) -> ConversationMessage {
    let detail = run.last_error.as_deref().unwrap_or("Unknown error");
    ConversationMessage::error(format!(
        "I encountered an error: agent run {} failed: {detail}",
        run.run_id
    ))
}

pub(crate) fn turn_failure_message(error: &ServiceError) -> ConversationMessage {
    ConversationMessage::error(format!("I encountered an error: {error}"))
}
