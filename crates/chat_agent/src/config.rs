//! Startup configuration.

use std::path::PathBuf;

use kv_store::DEFAULT_STORAGE_DIR;

pub const STORAGE_DIR_ENV_VAR: &str = "CHAT_AGENT_STORAGE_DIR";
pub const AGENT_NAME_ENV_VAR: &str = "CHAT_AGENT_NAME";
pub const SERVICE_ENV_VAR: &str = "CHAT_AGENT_SERVICE";
pub const LOG_FILTER_ENV_VAR: &str = "CHAT_AGENT_LOG";

pub const DEFAULT_SERVICE_ID: &str = "mock";
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Configuration built once at startup and passed by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub storage_dir: PathBuf,
    /// Overrides the agent name reported by the service profile.
    pub agent_name: Option<String>,
    pub service_id: String,
    pub log_filter: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            agent_name: None,
            service_id: DEFAULT_SERVICE_ID.to_string(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl ChatConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable lookup. Blank values fall
    /// back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let var = |key: &str| non_blank(lookup(key));

        Self {
            storage_dir: var(STORAGE_DIR_ENV_VAR)
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            agent_name: var(AGENT_NAME_ENV_VAR),
            service_id: var(SERVICE_ENV_VAR).unwrap_or(defaults.service_id),
            log_filter: var(LOG_FILTER_ENV_VAR).unwrap_or(defaults.log_filter),
        }
    }

    #[must_use]
    pub fn with_storage_dir(mut self, storage_dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = storage_dir.into();
        self
    }

    #[must_use]
    pub fn with_agent_name(mut self, agent_name: impl Into<String>) -> Self {
        self.agent_name = Some(agent_name.into());
        self
    }

    #[must_use]
    pub fn with_service_id(mut self, service_id: impl Into<String>) -> Self {
        self.service_id = service_id.into();
        self
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
