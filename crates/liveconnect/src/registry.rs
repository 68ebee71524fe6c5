//! Session registry
//!
//! Hosts that talk to the bridge through plain integer handles (for example from a
//! plugin entry point) look their sessions up here.

use crate::session::BridgeSession;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static REGISTRY: OnceCell<SessionRegistry> = OnceCell::new();

/// Handle-to-session map
pub struct SessionRegistry {
    sessions: DashMap<u64, Arc<BridgeSession>>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// The process-wide registry
    pub fn global() -> &'static SessionRegistry {
        REGISTRY.get_or_init(SessionRegistry::new)
    }

    /// Register a session; handles start at 1 and are never reused
    pub fn register(&self, session: BridgeSession) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.sessions.insert(id, Arc::new(session));
        tracing::debug!(handle = id, "session registered");
        id
    }

    pub fn get(&self, id: u64) -> Option<Arc<BridgeSession>> {
        self.sessions.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove and close a session
    pub fn remove(&self, id: u64) -> Option<Arc<BridgeSession>> {
        let (_, session) = self.sessions.remove(&id)?;
        session.close();
        tracing::debug!(handle = id, "session removed");
        Some(session)
    }

    /// Close and forget every session
    pub fn close_all(&self) -> usize {
        let ids: Vec<u64> = self.sessions.iter().map(|entry| *entry.key()).collect();
        ids.into_iter()
            .filter(|id| self.remove(*id).is_some())
            .count()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
