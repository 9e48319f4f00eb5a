// Deputy Session Registry
// Process-wide mapping from session id to the session that owns a device

use indexmap::IndexMap;

use super::{Session, SessionId};
use crate::input::DeviceIdentity;

/// Why an insert was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("device {identity} is already held by session {existing}")]
    Duplicate {
        identity: DeviceIdentity,
        existing: SessionId,
    },

    #[error("registry is full ({limit} session(s))")]
    CapacityReached { limit: usize },
}

/// A refused insert. The session comes back so its handle can be closed.
#[derive(Debug)]
pub struct Rejected<H> {
    pub reason: RegistryError,
    pub session: Session<H>,
}

/// Registry of live sessions, ordered by insertion (and so by id).
///
/// Holds at most one session per device identity.
#[derive(Debug)]
pub struct SessionRegistry<H> {
    sessions: IndexMap<SessionId, Session<H>>,
    limit: Option<usize>,
}

impl<H> Default for SessionRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> SessionRegistry<H> {
    /// Create an unbounded registry
    pub fn new() -> Self {
        Self {
            sessions: IndexMap::new(),
            limit: None,
        }
    }

    /// Create a registry that holds at most `limit` sessions
    pub fn with_capacity_limit(limit: usize) -> Self {
        Self {
            sessions: IndexMap::new(),
            limit: Some(limit),
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Insert a session.
    ///
    /// Refused when another live session already holds the same device
    /// identity, or when the capacity limit is reached.
    pub fn insert(&mut self, session: Session<H>) -> Result<SessionId, Rejected<H>> {
        if let Some(existing) = self.find_by_identity(session.identity()) {
            return Err(Rejected {
                reason: RegistryError::Duplicate {
                    identity: session.identity().clone(),
                    existing,
                },
                session,
            });
        }

        if let Some(limit) = self.limit {
            if self.sessions.len() >= limit {
                return Err(Rejected {
                    reason: RegistryError::CapacityReached { limit },
                    session,
                });
            }
        }

        let id = session.id();
        self.sessions.insert(id, session);
        Ok(id)
    }

    /// Remove a session, preserving the order of the rest
    pub fn remove(&mut self, id: SessionId) -> Option<Session<H>> {
        self.sessions.shift_remove(&id)
    }

    pub fn get(&self, id: SessionId) -> Option<&Session<H>> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session<H>> {
        self.sessions.get_mut(&id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Find the live session holding a device
    pub fn find_by_identity(&self, identity: &DeviceIdentity) -> Option<SessionId> {
        self.sessions
            .values()
            .find(|s| !s.state().is_terminal() && s.identity() == identity)
            .map(|s| s.id())
    }

    /// Snapshot of the sessions in order, for display
    pub fn list(&self) -> Vec<&Session<H>> {
        self.sessions.values().collect()
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
