//! Line-oriented front end used by the `chat_agent` binary.

use std::io::{self, BufRead, Write};

use crate::agent::ChatAgent;
use crate::commands::{parse_slash_command, SlashCommand};
use crate::message::ConversationMessage;

const HISTORY_PREVIEW_COUNT: usize = 5;
const HISTORY_PREVIEW_CHARS: usize = 100;

const HELP_TEXT: &str = "Commands:
  /help     show this message
  /clear    delete the conversation and start over
  /history  show the last five messages
  /status   show agent and storage status
  /quit     exit (also /exit)
Anything else is sent to the agent.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplControl {
    Continue,
    Exit,
}

pub fn write_welcome(agent: &ChatAgent, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Chatting with {}.", agent.agent_name())?;
    writeln!(out, "{HELP_TEXT}")?;

    let history = agent.history();
    if !history.is_empty() {
        writeln!(out, "Resumed conversation ({} messages).", history.len())?;
        for message in agent.recent_messages(HISTORY_PREVIEW_COUNT) {
            writeln!(out, "{}", render_message(message, agent.agent_name()))?;
        }
    }

    Ok(())
}

/// Handles one input line and writes whatever it produced.
pub fn handle_line(
    agent: &mut ChatAgent,
    line: &str,
    out: &mut impl Write,
) -> io::Result<ReplControl> {
    let input = line.trim();
    if input.is_empty() {
        return Ok(ReplControl::Continue);
    }

    match parse_slash_command(input) {
        Some(SlashCommand::Quit) => {
            writeln!(out, "Goodbye!")?;
            return Ok(ReplControl::Exit);
        }
        Some(SlashCommand::Help) => writeln!(out, "{HELP_TEXT}")?,
        Some(SlashCommand::Clear) => {
            agent.reset_history();
            writeln!(out, "Conversation cleared.")?;
        }
        Some(SlashCommand::History) => write_history(agent, out)?,
        Some(SlashCommand::Status) => write_status(agent, out)?,
        Some(SlashCommand::Unknown(command)) => {
            writeln!(out, "Unknown command: {command}")?;
            writeln!(out, "{HELP_TEXT}")?;
        }
        None => match agent.submit_user_turn(input) {
            Ok(messages) => {
                for message in &messages {
                    writeln!(out, "{}", render_message(message, agent.agent_name()))?;
                }
            }
            Err(error) => writeln!(out, "[error] {error}")?,
        },
    }

    Ok(ReplControl::Continue)
}

/// Reads lines until EOF or `/quit`.
pub fn run(agent: &mut ChatAgent, input: impl BufRead, out: &mut impl Write) -> io::Result<()> {
    write_welcome(agent, out)?;
    out.flush()?;

    for line in input.lines() {
        if handle_line(agent, &line?, out)? == ReplControl::Exit {
            break;
        }
        out.flush()?;
    }

    Ok(())
}

#[must_use]
pub fn render_message(message: &ConversationMessage, agent_name: &str) -> String {
    match message {
        ConversationMessage::User { content } => format!("[you] {content}"),
        ConversationMessage::Assistant { content } => format!("[{agent_name}] {content}"),
        ConversationMessage::ToolCall {
            content,
            agent_name,
            tool_name,
        } => format!("[{agent_name} -> {tool_name}] {content}"),
        ConversationMessage::Error { content } => format!("[error] {content}"),
    }
}

fn write_history(agent: &ChatAgent, out: &mut impl Write) -> io::Result<()> {
    let history = agent.history();
    if history.is_empty() {
        return writeln!(out, "No chat history yet.");
    }

    writeln!(out, "Chat history ({} messages):", history.len())?;
    for (index, message) in agent
        .recent_messages(HISTORY_PREVIEW_COUNT)
        .iter()
        .enumerate()
    {
        writeln!(
            out,
            "{}. {}: {}",
            index + 1,
            message.role(),
            preview(message.content())
        )?;
    }

    Ok(())
}

fn write_status(agent: &mut ChatAgent, out: &mut impl Write) -> io::Result<()> {
    let status = agent.status();
    writeln!(out, "Agent: {}", status.agent_name)?;
    writeln!(out, "Service: {}", status.service_id)?;
    writeln!(out, "Initialized: {}", status.initialized)?;
    writeln!(out, "Active session: {}", status.active)?;
    match &status.session_handle {
        Some(handle) => writeln!(out, "Session handle: {handle}")?,
        None => writeln!(out, "Session handle stored: {}", status.session_handle_present)?,
    }
    writeln!(out, "Messages: {}", status.message_count)?;

    match agent.storage_stats() {
        Ok(stats) => writeln!(
            out,
            "Storage: {} ({} keys, {} files) at {}",
            stats.total_size_human(),
            stats.key_count,
            stats.file_count,
            stats.root.display()
        )?,
        Err(error) => writeln!(out, "Storage: unavailable ({error})")?,
    }

    Ok(())
}

fn preview(content: &str) -> String {
    if content.chars().count() <= HISTORY_PREVIEW_CHARS {
        return content.to_string();
    }

    let mut preview: String = content.chars().take(HISTORY_PREVIEW_CHARS).collect();
    preview.push_str("...");
    preview
}
