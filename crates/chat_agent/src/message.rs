use serde::{Deserialize, Serialize};

/// Reply used when a user turn produced nothing the caller can show.
pub const FALLBACK_REPLY: &str =
    "I wasn't able to generate a response. Please try rephrasing your question.";

/// One entry of the reconciled conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ConversationMessage {
    User {
        content: String,
    },
    Assistant {
        content: String,
    },
    ToolCall {
        content: String,
        agent_name: String,
        tool_name: String,
    },
    Error {
        content: String,
    },
}

impl ConversationMessage {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
        }
    }

    #[must_use]
    pub fn error(content: impl Into<String>) -> Self {
        Self::Error {
            content: content.into(),
        }
    }

    #[must_use]
    pub fn fallback() -> Self {
        Self::assistant(FALLBACK_REPLY)
    }

    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::User { content }
            | Self::Assistant { content }
            | Self::ToolCall { content, .. }
            | Self::Error { content } => content,
        }
    }

    #[must_use]
    pub fn role(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
            Self::ToolCall { .. } => "tool_call",
            Self::Error { .. } => "error",
        }
    }

    #[must_use]
    pub fn is_user(&self) -> bool {
        matches!(self, Self::User { .. })
    }
}
