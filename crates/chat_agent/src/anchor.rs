use agent_service::SessionHandle;
use kv_store::{KeyValueStore, KvStoreError};

/// Store key holding the remote thread handle.
pub const SESSION_HANDLE_KEY: &str = "thread_id";

/// Persists the one remote session handle a process should resume.
///
/// This is the only writer of [`SESSION_HANDLE_KEY`]. Other session-scoped
/// values may share the underlying store through [`SessionAnchor::store_mut`].
#[derive(Debug)]
pub struct SessionAnchor {
    store: KeyValueStore,
}

impl SessionAnchor {
    #[must_use]
    pub fn new(store: KeyValueStore) -> Self {
        Self { store }
    }

    /// Returns the anchored handle. Unreadable values count as absent.
    pub fn get(&mut self) -> Option<SessionHandle> {
        match self.store.retrieve::<String>(SESSION_HANDLE_KEY) {
            Ok(handle) => handle
                .filter(|handle| !handle.trim().is_empty())
                .map(SessionHandle::from),
            Err(error) => {
                tracing::warn!(%error, "ignoring unreadable session handle");
                None
            }
        }
    }

    pub fn set(&mut self, handle: &SessionHandle) -> Result<(), KvStoreError> {
        self.store.store(SESSION_HANDLE_KEY, handle.as_str())
    }

    pub fn clear(&mut self) -> Result<(), KvStoreError> {
        self.store.delete(SESSION_HANDLE_KEY)
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.store.exists(SESSION_HANDLE_KEY)
    }

    #[must_use]
    pub fn store(&self) -> &KeyValueStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut KeyValueStore {
        &mut self.store
    }
}
