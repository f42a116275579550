//! Maps remote run steps to conversation messages.
//!
//! Every step yields at most one message. Steps that cannot be classified
//! (no tool calls, no text, unknown kind, or a message that can no longer be
//! fetched) yield nothing and never abort the surrounding replay.

use agent_service::{
    AgentService, RemoteMessage, RunStep, SessionHandle, StepDetails, StepStatus, ToolCallEntry,
};

use crate::message::ConversationMessage;

pub const MISSING_REQUEST_TARGET: &str = "No URL provided";

/// Classifies one step, fetching the referenced message for message-creation steps.
pub fn classify_step(
    service: &dyn AgentService,
    handle: &SessionHandle,
    step: &RunStep,
    agent_name: &str,
) -> Option<ConversationMessage> {
    match &step.details {
        StepDetails::ToolCalls { calls } => classify_tool_calls(calls, step.status, agent_name),
        StepDetails::MessageCreation { message_id } => {
            match service.get_message(handle, message_id) {
                Ok(message) => classify_message(&message),
                Err(error) => {
                    tracing::warn!(
                        step_id = %step.step_id,
                        message_id = %message_id,
                        %error,
                        "skipping message-creation step"
                    );
                    None
                }
            }
        }
        StepDetails::Unknown => {
            tracing::debug!(step_id = %step.step_id, "skipping step of unknown kind");
            None
        }
    }
}

/// Renders the first tool call of a step. No calls yields nothing.
#[must_use]
pub fn classify_tool_calls(
    calls: &[ToolCallEntry],
    status: StepStatus,
    agent_name: &str,
) -> Option<ConversationMessage> {
    let call = calls.first()?;
    let content = call
        .request_target
        .as_deref()
        .filter(|target| !target.trim().is_empty())
        .unwrap_or(MISSING_REQUEST_TARGET);

    Some(ConversationMessage::ToolCall {
        content: content.to_string(),
        agent_name: agent_name.to_string(),
        tool_name: format!("{} ({status})", call.kind),
    })
}

/// Renders the last text segment of a message with its citations appended.
#[must_use]
pub fn classify_message(message: &RemoteMessage) -> Option<ConversationMessage> {
    let mut content = message.text_segments.last()?.clone();

    if !message.citations.is_empty() {
        let citations = message
            .citations
            .iter()
            .map(|citation| format!("- [{}]({})", citation.title, citation.url))
            .collect::<Vec<_>>()
            .join("\n");
        content.push_str("\n\n**Citations:**\n");
        content.push_str(&citations);
    }

    Some(ConversationMessage::assistant(content))
}
