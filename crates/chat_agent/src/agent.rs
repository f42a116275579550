//! User-facing chat facade over the history reconciler.

use std::sync::Arc;

use agent_service::{AgentService, ServiceProfile, SessionHandle};
use kv_store::{KeyValueStore, KvStoreError, StorageStats};
use thiserror::Error;

use crate::anchor::SessionAnchor;
use crate::config::ChatConfig;
use crate::message::ConversationMessage;
use crate::reconciler::{turn_failure_message, HistoryReconciler, ReconcileError};
use crate::services::service_for_id;

#[derive(Debug, Error)]
pub enum ChatAgentError {
    #[error("session storage failed: {0}")]
    Storage(#[from] KvStoreError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("{0}")]
    UnsupportedService(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStatus {
    pub agent_name: String,
    pub service_id: String,
    pub initialized: bool,
    pub active: bool,
    pub session_handle_present: bool,
    pub session_handle: Option<SessionHandle>,
    pub message_count: usize,
}

pub struct ChatAgent {
    reconciler: HistoryReconciler,
    profile: ServiceProfile,
    initialized: bool,
}

impl ChatAgent {
    pub fn new(service: Arc<dyn AgentService>, store: KeyValueStore, config: &ChatConfig) -> Self {
        let profile = service.profile();
        let agent_name = config
            .agent_name
            .clone()
            .unwrap_or_else(|| profile.agent_name.clone());

        Self {
            reconciler: HistoryReconciler::new(service, SessionAnchor::new(store), agent_name),
            profile,
            initialized: false,
        }
    }

    /// Resolves the configured service and opens the storage directory.
    pub fn from_config(config: &ChatConfig) -> Result<Self, ChatAgentError> {
        let service =
            service_for_id(&config.service_id).map_err(ChatAgentError::UnsupportedService)?;
        let store = KeyValueStore::open(&config.storage_dir)?;
        Ok(Self::new(service, store, config))
    }

    /// Resumes or creates the remote session and loads its history.
    pub fn initialize(&mut self) -> Result<(), ChatAgentError> {
        match self.reconciler.ensure_session() {
            Ok(handle) => {
                tracing::info!(
                    %handle,
                    agent = %self.reconciler.agent_name(),
                    messages = self.reconciler.history().len(),
                    "chat agent initialized"
                );
                self.initialized = true;
                Ok(())
            }
            Err(error) => {
                tracing::error!(%error, "failed to initialize chat agent");
                self.initialized = false;
                Err(error.into())
            }
        }
    }

    /// Sends `text` and returns the messages produced for this turn.
    ///
    /// The returned list is never empty. Remote failures come back as a
    /// single `Error` message; only a missing `initialize` is an `Err`. After
    /// `reset_history` a fresh session is created transparently.
    pub fn submit_user_turn(
        &mut self,
        text: &str,
    ) -> Result<Vec<ConversationMessage>, ChatAgentError> {
        if !self.initialized {
            return Err(ReconcileError::NotInitialized.into());
        }

        let sent = self
            .reconciler
            .ensure_session()
            .and_then(|_| self.reconciler.append_user_message(text));

        match sent {
            Ok(()) => Ok(self.reconciler.run_turn()?),
            Err(ReconcileError::RemoteUnavailable(error)) => {
                tracing::error!(%error, "failed to send user message");
                Ok(vec![turn_failure_message(&error)])
            }
            Err(error) => Err(error.into()),
        }
    }

    #[must_use]
    pub fn history(&self) -> &[ConversationMessage] {
        self.reconciler.history()
    }

    #[must_use]
    pub fn recent_messages(&self, count: usize) -> &[ConversationMessage] {
        self.reconciler.recent_messages(count)
    }

    /// Re-reads the remote log without starting a run.
    pub fn reload_history(&mut self) -> Result<&[ConversationMessage], ChatAgentError> {
        Ok(self.reconciler.reload_history()?)
    }

    /// Deletes the remote session and forgets it locally.
    pub fn reset_history(&mut self) {
        self.reconciler.clear_history();
    }

    /// Releases the remote client. The anchored handle survives for the next
    /// process.
    pub fn shutdown(&mut self) {
        self.reconciler.close();
        self.initialized = false;
    }

    #[must_use]
    pub fn status(&self) -> AgentStatus {
        let reconciler = self.reconciler.status();
        AgentStatus {
            agent_name: self.reconciler.agent_name().to_string(),
            service_id: self.profile.service_id.clone(),
            initialized: self.initialized,
            active: reconciler.active,
            session_handle_present: reconciler.session_handle_present,
            session_handle: reconciler.session_handle,
            message_count: reconciler.message_count,
        }
    }

    pub fn storage_stats(&mut self) -> Result<StorageStats, ChatAgentError> {
        Ok(self.reconciler.anchor_mut().store_mut().size_stats()?)
    }

    #[must_use]
    pub fn agent_name(&self) -> &str {
        self.reconciler.agent_name()
    }

    #[must_use]
    pub fn profile(&self) -> &ServiceProfile {
        &self.profile
    }
}
