//! Server-side session state shared by tool handlers.
//!
//! A [`SessionContext`] is created empty when a tool server starts and is
//! handed to every handler through
//! [`ToolExecutionContext`](crate::tools::ToolExecutionContext). It holds the
//! identifier of the most recently created artifact and the credential pushed
//! by `set-access-token`. Both fields live until the context is dropped.
//!
//! Writes are last-writer-wins: two concurrent artifact creations on the same
//! context race, and whichever finishes last owns `current_artifact_id`. For
//! multi-tenant use, key contexts by connection through [`SessionStore`]
//! instead of sharing one.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// An opaque bearer credential. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(..)")
    }
}

#[derive(Debug, Default)]
struct SessionState {
    current_artifact_id: Option<String>,
    credential: Option<Credential>,
}

/// Cloneable handle to one session's mutable state.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    inner: Arc<RwLock<SessionState>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned lock only means a handler panicked mid-write; the two
    // optional fields are still coherent, so keep serving.
    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn current_artifact_id(&self) -> Option<String> {
        self.read().current_artifact_id.clone()
    }

    /// Record a newly created artifact, replacing any previous one.
    pub fn set_current_artifact_id(&self, id: impl Into<String>) {
        self.write().current_artifact_id = Some(id.into());
    }

    pub fn credential(&self) -> Option<Credential> {
        self.read().credential.clone()
    }

    pub fn set_credential(&self, credential: Credential) {
        self.write().credential = Some(credential);
    }

    pub fn has_credential(&self) -> bool {
        self.read().credential.is_some()
    }
}

/// Sessions keyed by connection or user-session identifier.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionContext>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the context for a session id.
    pub fn get_or_create(&self, session_id: &str) -> SessionContext {
        if let Some(existing) = self
            .sessions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(session_id)
        {
            return existing.clone();
        }
        self.sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Drop a session's state.
    pub fn remove(&self, session_id: &str) -> Option<SessionContext> {
        self.sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
