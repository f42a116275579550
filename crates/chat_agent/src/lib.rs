//! Chat agent that keeps one remote conversation thread alive across runs.
//!
//! ## Session persistence
//!
//! The remote thread handle is stored under the `thread_id` key of a
//! [`kv_store::KeyValueStore`] rooted at `CHAT_AGENT_STORAGE_DIR` (default
//! `storage`). On startup the stored handle is reused when the remote service
//! still knows it; otherwise a new thread is created and its handle stored.
//!
//! ## History
//!
//! The remote run log is the source of truth. After every turn the whole
//! conversation is rebuilt from it: runs in creation order, steps in order
//! within a run. Failed runs contribute one leading error message, tool-call
//! steps become tool messages and message steps become assistant replies.
//!
//! ## Service selection
//!
//! `CHAT_AGENT_SERVICE` picks the remote agent service. Only `mock` is
//! built in. `CHAT_AGENT_NAME` overrides the agent name reported by the
//! service and `CHAT_AGENT_LOG` sets the `tracing` filter (default `warn`).

pub mod agent;
pub mod anchor;
pub mod classifier;
pub mod commands;
pub mod config;
pub mod logging;
pub mod message;
pub mod reconciler;
pub mod repl;
pub mod services;

pub use agent::{AgentStatus, ChatAgent, ChatAgentError};
pub use config::ChatConfig;
pub use message::ConversationMessage;
pub use reconciler::{HistoryReconciler, ReconcileError};
