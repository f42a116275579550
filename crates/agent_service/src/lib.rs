//! Contract for a remote agent service that executes runs against a
//! server-side conversation thread.
//!
//! This crate defines only the records a caller observes (runs, steps,
//! messages) and the blocking call surface used to observe them. It excludes
//! transport details and any local history bookkeeping.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque identifier of one remote conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHandle(String);

impl SessionHandle {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionHandle {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionHandle {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Error returned by remote service calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("{resource} '{id}' was not found")]
    NotFound { resource: &'static str, id: String },

    #[error("agent service unavailable: {0}")]
    Unavailable(String),

    #[error("agent service rejected the request: {0}")]
    Rejected(String),
}

impl ServiceError {
    #[must_use]
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Terminal or in-flight status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Expired,
}

impl RunStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One execution of the remote agent against a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl RunRecord {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == RunStatus::Failed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Expired,
}

impl StepStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tool invocation recorded inside a tool-calls step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallEntry {
    pub call_id: String,
    /// Remote tool kind, e.g. `bing_grounding`.
    pub kind: String,
    /// Outbound request target reported by the tool, when it has one.
    #[serde(default)]
    pub request_target: Option<String>,
}

/// Kind-specific payload of a run step.
///
/// Step kinds this crate does not know decode to [`StepDetails::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepDetails {
    ToolCalls {
        #[serde(default)]
        calls: Vec<ToolCallEntry>,
    },
    MessageCreation {
        message_id: String,
    },
    #[serde(other)]
    Unknown,
}

/// One remote-recorded action within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStep {
    pub step_id: String,
    pub status: StepStatus,
    pub details: StepDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlCitation {
    pub title: String,
    pub url: String,
}

/// A message created by the remote agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMessage {
    pub message_id: String,
    #[serde(default)]
    pub text_segments: Vec<String>,
    #[serde(default)]
    pub citations: Vec<UrlCitation>,
}

/// Immutable metadata describing an agent service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceProfile {
    pub service_id: String,
    pub agent_name: String,
}

/// Blocking call surface of a remote agent service.
///
/// Callers issue these sequentially; nothing here is expected to be
/// interleaved for the same thread.
pub trait AgentService: Send + Sync + 'static {
    /// Returns service identity metadata.
    fn profile(&self) -> ServiceProfile;

    fn create_session(&self) -> Result<SessionHandle, ServiceError>;

    /// Confirms the remote thread still exists.
    ///
    /// Returns [`ServiceError::NotFound`] for expired or deleted threads.
    fn get_session(&self, handle: &SessionHandle) -> Result<SessionHandle, ServiceError>;

    fn delete_session(&self, handle: &SessionHandle) -> Result<(), ServiceError>;

    fn send_user_message(&self, handle: &SessionHandle, text: &str) -> Result<(), ServiceError>;

    /// Starts a run on the thread and blocks until it reaches a terminal status.
    fn run_and_wait(&self, handle: &SessionHandle) -> Result<RunRecord, ServiceError>;

    /// Lists every run on the thread in ascending creation order.
    fn list_runs(&self, handle: &SessionHandle) -> Result<Vec<RunRecord>, ServiceError>;

    /// Lists the steps of one run in ascending order.
    fn list_steps(
        &self,
        handle: &SessionHandle,
        run_id: &str,
    ) -> Result<Vec<RunStep>, ServiceError>;

    fn get_message(
        &self,
        handle: &SessionHandle,
        message_id: &str,
    ) -> Result<RemoteMessage, ServiceError>;

    /// Releases any client resources held by the service.
    fn close(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}
