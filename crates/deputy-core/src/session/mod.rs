// Deputy Sessions
// Exclusively held devices and the registry that owns them

mod registry;
mod view;

use std::fmt;

use crate::input::{DeviceDescriptor, DeviceIdentity};

pub use registry::{Rejected, RegistryError, SessionRegistry};
pub use view::{SessionSummary, SessionWatch};

/// Monotonically increasing session identifier.
///
/// Locations are reused after re-enumeration, ids never are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out session ids, starting at 1
#[derive(Debug, Default)]
pub struct SessionIdAllocator {
    last: u64,
}

impl SessionIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> SessionId {
        self.last += 1;
        SessionId(self.last)
    }
}

/// Lifecycle of a session.
///
/// `Seized -> Monitoring -> Released`, or `Seized -> MonitoringFailed`.
/// Any live state may also end in `Released` on detach or shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum SessionState {
    Seized,
    Monitoring,
    MonitoringFailed,
    Released,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Released)
    }

    fn can_become(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Seized, Monitoring)
                | (Seized, MonitoringFailed)
                | (Seized, Released)
                | (Monitoring, Released)
                | (MonitoringFailed, Released)
        )
    }
}

/// A state change that the lifecycle does not allow
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("session {id}: cannot go from {from} to {to}")]
pub struct InvalidTransition {
    pub id: SessionId,
    pub from: SessionState,
    pub to: SessionState,
}

/// One exclusively held device.
///
/// The native handle is owned here and nowhere else; it leaves the session
/// only through [`Session::take_handle`], which is how it gets closed.
#[derive(Debug)]
pub struct Session<H> {
    id: SessionId,
    descriptor: DeviceDescriptor,
    state: SessionState,
    handle: Option<H>,
    reports_swallowed: u64,
}

impl<H> Session<H> {
    /// Create a session for a freshly seized handle
    pub fn new(id: SessionId, descriptor: DeviceDescriptor, handle: H) -> Self {
        Self {
            id,
            descriptor,
            state: SessionState::Seized,
            handle: Some(handle),
            reports_swallowed: 0,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.descriptor.location
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn reports_swallowed(&self) -> u64 {
        self.reports_swallowed
    }

    /// Whether the handle is still held
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn handle_mut(&mut self) -> Option<&mut H> {
        self.handle.as_mut()
    }

    /// Move to the next lifecycle state
    pub fn transition(&mut self, next: SessionState) -> Result<(), InvalidTransition> {
        if !self.state.can_become(next) {
            return Err(InvalidTransition {
                id: self.id,
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Take the handle out for closing. Returns `None` the second time.
    pub fn take_handle(&mut self) -> Option<H> {
        self.handle.take()
    }

    pub(crate) fn record_swallowed(&mut self) {
        self.reports_swallowed += 1;
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            vendor_id: self.descriptor.vendor_id,
            product_id: self.descriptor.product_id,
            name: self.descriptor.name.clone(),
            location: self.descriptor.location.clone(),
            state: self.state,
            reports_swallowed: self.reports_swallowed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session<u32> {
        let descriptor = DeviceDescriptor::new(DeviceIdentity::new("/dev/input/event5"))
            .with_ids(0x05ac, 0x024f)
            .with_name("Test Keyboard");
        Session::new(SessionId::from_raw(1), descriptor, 42)
    }

    #[test]
    fn test_allocator_is_monotonic() {
        let mut ids = SessionIdAllocator::new();
        let a = ids.next_id();
        let b = ids.next_id();
        assert_eq!(a.get(), 1);
        assert!(b > a);
    }

    #[test]
    fn test_new_session_is_seized_and_open() {
        let s = session();
        assert_eq!(s.state(), SessionState::Seized);
        assert!(s.is_open());
        assert_eq!(s.identity().as_str(), "/dev/input/event5");
    }

    #[test]
    fn test_monitoring_then_released() {
        let mut s = session();
        s.transition(SessionState::Monitoring).unwrap();
        s.transition(SessionState::Released).unwrap();
        assert!(s.state().is_terminal());
    }

    #[test]
    fn test_released_is_final() {
        let mut s = session();
        s.transition(SessionState::Released).unwrap();
        let err = s.transition(SessionState::Monitoring).unwrap_err();
        assert_eq!(err.from, SessionState::Released);
        assert_eq!(err.to, SessionState::Monitoring);
        assert!(s.transition(SessionState::Released).is_err());
    }

    #[test]
    fn test_failed_monitoring_cannot_resume() {
        let mut s = session();
        s.transition(SessionState::MonitoringFailed).unwrap();
        assert!(s.transition(SessionState::Monitoring).is_err());
    }

    #[test]
    fn test_take_handle_once() {
        let mut s = session();
        assert_eq!(s.take_handle(), Some(42));
        assert_eq!(s.take_handle(), None);
        assert!(!s.is_open());
    }

    #[test]
    fn test_summary_fields() {
        let mut s = session();
        s.record_swallowed();
        let summary = s.summary();
        assert_eq!(summary.vendor_id, Some(0x05ac));
        assert_eq!(summary.product_id, Some(0x024f));
        assert_eq!(summary.state, SessionState::Seized);
        assert_eq!(summary.reports_swallowed, 1);
        assert_eq!(summary.name.as_deref(), Some("Test Keyboard"));
    }

    #[test]
    fn test_session_id_display() {
        assert_eq!(SessionId::from_raw(12).to_string(), "#12");
    }
}
