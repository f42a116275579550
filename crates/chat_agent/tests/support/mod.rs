#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use agent_service::{
    AgentService, RemoteMessage, RunRecord, RunStatus, RunStep, ServiceError, ServiceProfile,
    SessionHandle, StepDetails, StepStatus, ToolCallEntry,
};
use agent_service_mock::{MockAgentService, ScriptedRun};
use chat_agent::anchor::SessionAnchor;
use chat_agent::HistoryReconciler;
use kv_store::KeyValueStore;
use tempfile::TempDir;

pub const AGENT_NAME: &str = "Helper";

pub fn open_store(dir: &TempDir) -> KeyValueStore {
    KeyValueStore::open(dir.path()).expect("store should open")
}

pub fn reconciler_with_script(
    dir: &TempDir,
    script: Vec<ScriptedRun>,
) -> (HistoryReconciler, Arc<MockAgentService>) {
    let service = Arc::new(MockAgentService::with_script(script));
    let reconciler = HistoryReconciler::new(
        service.clone(),
        SessionAnchor::new(open_store(dir)),
        AGENT_NAME,
    );
    (reconciler, service)
}

#[derive(Debug, Clone, Copy)]
pub enum LoggedStep<'a> {
    Tool { kind: &'a str, target: &'a str },
    Reply(&'a str),
}

/// Remote service serving one fixed thread log exactly as given.
pub struct FixedLogService {
    handle: SessionHandle,
    runs: Vec<(RunRecord, Vec<RunStep>)>,
    messages: HashMap<String, RemoteMessage>,
}

impl FixedLogService {
    pub fn new(handle: &str) -> Self {
        Self {
            handle: SessionHandle::new(handle),
            runs: Vec::new(),
            messages: HashMap::new(),
        }
    }

    /// Appends a completed run with one message step per reply.
    pub fn with_replies(self, run_id: &str, replies: &[&str]) -> Self {
        let steps = replies
            .iter()
            .map(|&reply| LoggedStep::Reply(reply))
            .collect::<Vec<_>>();
        self.with_run(run_id, &steps)
    }

    /// Appends a completed run whose steps are listed exactly as given.
    pub fn with_run(mut self, run_id: &str, logged: &[LoggedStep<'_>]) -> Self {
        let mut steps = Vec::with_capacity(logged.len());
        for (index, step) in logged.iter().enumerate() {
            let details = match *step {
                LoggedStep::Tool { kind, target } => StepDetails::ToolCalls {
                    calls: vec![ToolCallEntry {
                        call_id: format!("{run_id}_call_{index}"),
                        kind: kind.to_string(),
                        request_target: Some(target.to_string()),
                    }],
                },
                LoggedStep::Reply(reply) => {
                    let message_id = format!("{run_id}_msg_{index}");
                    self.messages.insert(
                        message_id.clone(),
                        RemoteMessage {
                            message_id: message_id.clone(),
                            text_segments: vec![reply.to_string()],
                            citations: Vec::new(),
                        },
                    );
                    StepDetails::MessageCreation { message_id }
                }
            };
            steps.push(RunStep {
                step_id: format!("{run_id}_step_{index}"),
                status: StepStatus::Completed,
                details,
            });
        }

        self.runs.push((
            RunRecord {
                run_id: run_id.to_string(),
                status: RunStatus::Completed,
                last_error: None,
            },
            steps,
        ));
        self
    }

    /// Appends a failed run whose only step is a tool call.
    pub fn with_failed_tool_run(mut self, run_id: &str, error: &str, kind: &str) -> Self {
        self.runs.push((
            RunRecord {
                run_id: run_id.to_string(),
                status: RunStatus::Failed,
                last_error: Some(error.to_string()),
            },
            vec![RunStep {
                step_id: format!("{run_id}_step_0"),
                status: StepStatus::Failed,
                details: StepDetails::ToolCalls {
                    calls: vec![ToolCallEntry {
                        call_id: format!("{run_id}_call_0"),
                        kind: kind.to_string(),
                        request_target: None,
                    }],
                },
            }],
        ));
        self
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    fn check(&self, handle: &SessionHandle) -> Result<(), ServiceError> {
        if handle == &self.handle {
            Ok(())
        } else {
            Err(ServiceError::not_found("thread", handle.as_str()))
        }
    }
}

impl AgentService for FixedLogService {
    fn profile(&self) -> ServiceProfile {
        ServiceProfile {
            service_id: "fixed".to_string(),
            agent_name: AGENT_NAME.to_string(),
        }
    }

    fn create_session(&self) -> Result<SessionHandle, ServiceError> {
        Err(ServiceError::Rejected("fixed log cannot create threads".to_string()))
    }

    fn get_session(&self, handle: &SessionHandle) -> Result<SessionHandle, ServiceError> {
        self.check(handle)?;
        Ok(handle.clone())
    }

    fn delete_session(&self, handle: &SessionHandle) -> Result<(), ServiceError> {
        self.check(handle)
    }

    fn send_user_message(&self, handle: &SessionHandle, _text: &str) -> Result<(), ServiceError> {
        self.check(handle)
    }

    fn run_and_wait(&self, _handle: &SessionHandle) -> Result<RunRecord, ServiceError> {
        Err(ServiceError::Rejected("fixed log cannot start runs".to_string()))
    }

    fn list_runs(&self, handle: &SessionHandle) -> Result<Vec<RunRecord>, ServiceError> {
        self.check(handle)?;
        Ok(self.runs.iter().map(|(run, _)| run.clone()).collect())
    }

    fn list_steps(
        &self,
        handle: &SessionHandle,
        run_id: &str,
    ) -> Result<Vec<RunStep>, ServiceError> {
        self.check(handle)?;
        self.runs
            .iter()
            .find(|(run, _)| run.run_id == run_id)
            .map(|(_, steps)| steps.clone())
            .ok_or_else(|| ServiceError::not_found("run", run_id))
    }

    fn get_message(
        &self,
        handle: &SessionHandle,
        message_id: &str,
    ) -> Result<RemoteMessage, ServiceError> {
        self.check(handle)?;
        self.messages
            .get(message_id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found("message", message_id))
    }
}

/// Wraps the mock and, while lagging, hides the newest run from `list_runs`.
pub struct LaggingService {
    inner: Arc<MockAgentService>,
    lagging: AtomicBool,
}

impl LaggingService {
    pub fn new(inner: Arc<MockAgentService>) -> Self {
        Self {
            inner,
            lagging: AtomicBool::new(false),
        }
    }

    pub fn set_lagging(&self, lagging: bool) {
        self.lagging.store(lagging, Ordering::SeqCst);
    }
}

impl AgentService for LaggingService {
    fn profile(&self) -> ServiceProfile {
        self.inner.profile()
    }

    fn create_session(&self) -> Result<SessionHandle, ServiceError> {
        self.inner.create_session()
    }

    fn get_session(&self, handle: &SessionHandle) -> Result<SessionHandle, ServiceError> {
        self.inner.get_session(handle)
    }

    fn delete_session(&self, handle: &SessionHandle) -> Result<(), ServiceError> {
        self.inner.delete_session(handle)
    }

    fn send_user_message(&self, handle: &SessionHandle, text: &str) -> Result<(), ServiceError> {
        self.inner.send_user_message(handle, text)
    }

    fn run_and_wait(&self, handle: &SessionHandle) -> Result<RunRecord, ServiceError> {
        self.inner.run_and_wait(handle)
    }

    fn list_runs(&self, handle: &SessionHandle) -> Result<Vec<RunRecord>, ServiceError> {
        let mut runs = self.inner.list_runs(handle)?;
        if self.lagging.load(Ordering::SeqCst) {
            runs.pop();
        }
        Ok(runs)
    }

    fn list_steps(
        &self,
        handle: &SessionHandle,
        run_id: &str,
    ) -> Result<Vec<RunStep>, ServiceError> {
        self.inner.list_steps(handle, run_id)
    }

    fn get_message(
        &self,
        handle: &SessionHandle,
        message_id: &str,
    ) -> Result<RemoteMessage, ServiceError> {
        self.inner.get_message(handle, message_id)
    }
}
