use std::collections::HashMap;

use super::controller::SessionController;

/// Active voice sessions keyed by server id
///
/// An explicit instance owned by the application and passed by reference to
/// whichever component needs lookup; there is no ambient global state, and
/// dropping the registry tears down every contained session.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<u64, SessionController>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session, replacing (and dropping) any existing session
    /// for the same server.
    pub fn insert(&mut self, session: SessionController) -> Option<SessionController> {
        self.sessions.insert(session.server_id(), session)
    }

    pub fn get(&self, server_id: u64) -> Option<&SessionController> {
        self.sessions.get(&server_id)
    }

    pub fn get_mut(&mut self, server_id: u64) -> Option<&mut SessionController> {
        self.sessions.get_mut(&server_id)
    }

    pub fn remove(&mut self, server_id: u64) -> Option<SessionController> {
        self.sessions.remove(&server_id)
    }

    pub fn contains(&self, server_id: u64) -> bool {
        self.sessions.contains_key(&server_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
