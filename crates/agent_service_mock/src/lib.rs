//! Deterministic in-memory implementation of the `agent_service` contract.
//!
//! Threads, runs, steps and messages live in process memory. Runs are either
//! taken from a caller-provided script or generated from canned replies, so
//! the same sequence of calls always produces the same remote log.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use agent_service::{
    AgentService, RemoteMessage, RunRecord, RunStatus, RunStep, ServiceError, ServiceProfile,
    SessionHandle, StepDetails, StepStatus, ToolCallEntry, UrlCitation,
};

/// Stable service identifier used for explicit startup selection.
pub const MOCK_SERVICE_ID: &str = "mock";

const DEFAULT_AGENT_NAME: &str = "MockBot";

const CANNED_REPLIES: [&str; 4] = [
    "That's an interesting question. Here are the **key points**:\n\n1. Start with the basics\n2. Build incrementally\n3. Test early and often",
    "Let me break it down:\n\n- **Pros**: simple to operate\n- **Cons**: more moving parts later\n\nThe right balance depends on your use case.",
    "I can help with that. A good first step:\n\n```rust\nfn main() {\n    println!(\"Hello, World!\");\n}\n```",
    "Here's what I recommend:\n\n1. Ship a **small prototype**\n2. Gather feedback early\n3. Iterate on real data",
];

const CANNED_TOOL_KINDS: [&str; 3] = ["search_knowledge", "analyze_data", "generate_code"];

/// One step a scripted run should record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedStep {
    ToolCall {
        kind: String,
        request_target: Option<String>,
        status: StepStatus,
    },
    /// A tool-calls step that lists no calls.
    EmptyToolCall,
    Message {
        text_segments: Vec<String>,
        citations: Vec<UrlCitation>,
    },
    /// A message-creation step whose message can no longer be fetched.
    DanglingMessage,
    Unknown,
}

impl ScriptedStep {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Message {
            text_segments: vec![text.into()],
            citations: Vec::new(),
        }
    }

    #[must_use]
    pub fn tool_call(kind: impl Into<String>, request_target: impl Into<String>) -> Self {
        Self::ToolCall {
            kind: kind.into(),
            request_target: Some(request_target.into()),
            status: StepStatus::Completed,
        }
    }
}

/// Outcome of one scripted run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedRun {
    Completed(Vec<ScriptedStep>),
    Failed {
        error: Option<String>,
        steps: Vec<ScriptedStep>,
    },
}

impl ScriptedRun {
    #[must_use]
    pub fn reply(text: impl Into<String>) -> Self {
        Self::Completed(vec![ScriptedStep::text(text)])
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: Some(error.into()),
            steps: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct Thread {
    runs: Vec<(RunRecord, Vec<RunStep>)>,
    messages: HashMap<String, RemoteMessage>,
    user_messages: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    threads: HashMap<String, Thread>,
    script: VecDeque<ScriptedRun>,
    next_id: u64,
    generated_runs: usize,
    unavailable: bool,
    fail_deletes: bool,
    closed: bool,
    calls: Vec<String>,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}_{}", self.next_id)
    }

    fn record_call(&mut self, call: String) -> Result<(), ServiceError> {
        self.calls.push(call);
        if self.unavailable {
            return Err(ServiceError::Unavailable(
                "mock service is offline".to_string(),
            ));
        }

        Ok(())
    }

    fn thread_mut(&mut self, handle: &SessionHandle) -> Result<&mut Thread, ServiceError> {
        self.threads
            .get_mut(handle.as_str())
            .ok_or_else(|| ServiceError::not_found("thread", handle.as_str()))
    }

    fn thread(&self, handle: &SessionHandle) -> Result<&Thread, ServiceError> {
        self.threads
            .get(handle.as_str())
            .ok_or_else(|| ServiceError::not_found("thread", handle.as_str()))
    }

    fn generated_run(&mut self) -> ScriptedRun {
        let index = self.generated_runs;
        self.generated_runs += 1;

        let mut steps = Vec::new();
        if index % 3 == 2 {
            let kind = CANNED_TOOL_KINDS[index % CANNED_TOOL_KINDS.len()];
            steps.push(ScriptedStep::tool_call(
                kind,
                format!("mock://tools/{kind}?run={}", index + 1),
            ));
        }
        steps.push(ScriptedStep::text(CANNED_REPLIES[index % CANNED_REPLIES.len()]));

        ScriptedRun::Completed(steps)
    }

    fn materialize(
        &mut self,
        handle: &SessionHandle,
        run: ScriptedRun,
    ) -> Result<RunRecord, ServiceError> {
        let (status, last_error, scripted_steps) = match run {
            ScriptedRun::Completed(steps) => (RunStatus::Completed, None, steps),
            ScriptedRun::Failed { error, steps } => (RunStatus::Failed, error, steps),
        };

        let run_id = self.next_id("run");
        let mut steps = Vec::with_capacity(scripted_steps.len());
        let mut messages = Vec::new();

        for scripted in scripted_steps {
            let step_id = self.next_id("step");
            let step = match scripted {
                ScriptedStep::ToolCall {
                    kind,
                    request_target,
                    status,
                } => RunStep {
                    step_id,
                    status,
                    details: StepDetails::ToolCalls {
                        calls: vec![ToolCallEntry {
                            call_id: self.next_id("call"),
                            kind,
                            request_target,
                        }],
                    },
                },
                ScriptedStep::EmptyToolCall => RunStep {
                    step_id,
                    status: StepStatus::Completed,
                    details: StepDetails::ToolCalls { calls: Vec::new() },
                },
                ScriptedStep::Message {
                    text_segments,
                    citations,
                } => {
                    let message_id = self.next_id("msg");
                    messages.push(RemoteMessage {
                        message_id: message_id.clone(),
                        text_segments,
                        citations,
                    });
                    RunStep {
                        step_id,
                        status: StepStatus::Completed,
                        details: StepDetails::MessageCreation { message_id },
                    }
                }
                ScriptedStep::DanglingMessage => RunStep {
                    step_id,
                    status: StepStatus::Completed,
                    details: StepDetails::MessageCreation {
                        message_id: self.next_id("msg"),
                    },
                },
                ScriptedStep::Unknown => RunStep {
                    step_id,
                    status: StepStatus::Completed,
                    details: StepDetails::Unknown,
                },
            };
            steps.push(step);
        }

        let record = RunRecord {
            run_id,
            status,
            last_error,
        };

        let thread = self.thread_mut(handle)?;
        for message in messages {
            thread.messages.insert(message.message_id.clone(), message);
        }
        thread.runs.push((record.clone(), steps));

        Ok(record)
    }
}

/// Deterministic mock agent service used by `chat_agent` tests and local runs.
#[derive(Debug)]
pub struct MockAgentService {
    agent_name: String,
    state: Mutex<State>,
}

impl Default for MockAgentService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAgentService {
    /// Creates a service that answers every run with canned replies.
    #[must_use]
    pub fn new() -> Self {
        Self::with_agent_name(DEFAULT_AGENT_NAME)
    }

    #[must_use]
    pub fn with_agent_name(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            state: Mutex::new(State::default()),
        }
    }

    /// Creates a service whose next runs follow `script` in order.
    ///
    /// Once the script is exhausted, runs fall back to canned replies.
    #[must_use]
    pub fn with_script(script: Vec<ScriptedRun>) -> Self {
        let service = Self::new();
        lock_unpoisoned(&service.state).script = script.into();
        service
    }

    /// Queues a run outcome for the next `run_and_wait` call.
    pub fn push_run(&self, run: ScriptedRun) {
        lock_unpoisoned(&self.state).script.push_back(run);
    }

    /// Creates (or replaces) a thread whose log already contains `runs`.
    pub fn seed_thread(&self, handle: &str, runs: Vec<ScriptedRun>) {
        let handle = SessionHandle::new(handle);
        let mut state = lock_unpoisoned(&self.state);
        state
            .threads
            .insert(handle.as_str().to_string(), Thread::default());

        for run in runs {
            if let Err(error) = state.materialize(&handle, run) {
                tracing::warn!(%handle, %error, "failed to seed mock run");
            }
        }
    }

    /// Removes a thread as if it had expired remotely.
    pub fn expire_thread(&self, handle: &str) {
        lock_unpoisoned(&self.state).threads.remove(handle);
    }

    /// Makes every subsequent call fail with `ServiceError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        lock_unpoisoned(&self.state).unavailable = unavailable;
    }

    pub fn set_fail_deletes(&self, fail_deletes: bool) {
        lock_unpoisoned(&self.state).fail_deletes = fail_deletes;
    }

    #[must_use]
    pub fn has_thread(&self, handle: &str) -> bool {
        lock_unpoisoned(&self.state).threads.contains_key(handle)
    }

    #[must_use]
    pub fn thread_count(&self) -> usize {
        lock_unpoisoned(&self.state).threads.len()
    }

    /// User messages received on `handle`, in arrival order.
    #[must_use]
    pub fn user_messages(&self, handle: &str) -> Vec<String> {
        lock_unpoisoned(&self.state)
            .threads
            .get(handle)
            .map(|thread| thread.user_messages.clone())
            .unwrap_or_default()
    }

    /// Every call received so far, formatted as `"<method> <args>"`.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        lock_unpoisoned(&self.state).calls.clone()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        lock_unpoisoned(&self.state).closed
    }
}

impl AgentService for MockAgentService {
    fn profile(&self) -> ServiceProfile {
        ServiceProfile {
            service_id: MOCK_SERVICE_ID.to_string(),
            agent_name: self.agent_name.clone(),
        }
    }

    fn create_session(&self) -> Result<SessionHandle, ServiceError> {
        let mut state = lock_unpoisoned(&self.state);
        state.record_call("create_session".to_string())?;

        let handle = SessionHandle::new(state.next_id("thread"));
        state
            .threads
            .insert(handle.as_str().to_string(), Thread::default());
        Ok(handle)
    }

    fn get_session(&self, handle: &SessionHandle) -> Result<SessionHandle, ServiceError> {
        let mut state = lock_unpoisoned(&self.state);
        state.record_call(format!("get_session {handle}"))?;
        state.thread(handle).map(|_| handle.clone())
    }

    fn delete_session(&self, handle: &SessionHandle) -> Result<(), ServiceError> {
        let mut state = lock_unpoisoned(&self.state);
        state.record_call(format!("delete_session {handle}"))?;
        if state.fail_deletes {
            return Err(ServiceError::Rejected(format!(
                "thread '{handle}' cannot be deleted right now"
            )));
        }

        state
            .threads
            .remove(handle.as_str())
            .map(|_| ())
            .ok_or_else(|| ServiceError::not_found("thread", handle.as_str()))
    }

    fn send_user_message(&self, handle: &SessionHandle, text: &str) -> Result<(), ServiceError> {
        let mut state = lock_unpoisoned(&self.state);
        state.record_call(format!("send_user_message {handle}"))?;
        state.thread_mut(handle)?.user_messages.push(text.to_string());
        Ok(())
    }

    fn run_and_wait(&self, handle: &SessionHandle) -> Result<RunRecord, ServiceError> {
        let mut state = lock_unpoisoned(&self.state);
        state.record_call(format!("run_and_wait {handle}"))?;
        state.thread(handle)?;

        let run = match state.script.pop_front() {
            Some(run) => run,
            None => state.generated_run(),
        };
        state.materialize(handle, run)
    }

    fn list_runs(&self, handle: &SessionHandle) -> Result<Vec<RunRecord>, ServiceError> {
        let mut state = lock_unpoisoned(&self.state);
        state.record_call(format!("list_runs {handle}"))?;
        Ok(state
            .thread(handle)?
            .runs
            .iter()
            .map(|(record, _)| record.clone())
            .collect())
    }

    fn list_steps(
        &self,
        handle: &SessionHandle,
        run_id: &str,
    ) -> Result<Vec<RunStep>, ServiceError> {
        let mut state = lock_unpoisoned(&self.state);
        state.record_call(format!("list_steps {handle} {run_id}"))?;
        state
            .thread(handle)?
            .runs
            .iter()
            .find(|(record, _)| record.run_id == run_id)
            .map(|(_, steps)| steps.clone())
            .ok_or_else(|| ServiceError::not_found("run", run_id))
    }

    fn get_message(
        &self,
        handle: &SessionHandle,
        message_id: &str,
    ) -> Result<RemoteMessage, ServiceError> {
        let mut state = lock_unpoisoned(&self.state);
        state.record_call(format!("get_message {handle} {message_id}"))?;
        state
            .thread(handle)?
            .messages
            .get(message_id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found("message", message_id))
    }

    fn close(&self) -> Result<(), ServiceError> {
        let mut state = lock_unpoisoned(&self.state);
        state.calls.push("close".to_string());
        state.closed = true;
        Ok(())
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
