// Deputy Session View
// Read-only snapshot of the registry for the shell

use std::sync::Arc;

use parking_lot::RwLock;

use super::{SessionId, SessionState};
use crate::input::DeviceIdentity;

/// What the shell shows for one seized device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: SessionId,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    pub name: Option<String>,
    pub location: DeviceIdentity,
    pub state: SessionState,
    /// Keyboard reports withheld from the system while monitoring
    pub reports_swallowed: u64,
}

/// Shared, cloneable view of the current sessions.
///
/// The engine republishes after every run-to-completion step; readers on
/// other threads only ever see whole snapshots.
#[derive(Debug, Clone, Default)]
pub struct SessionWatch {
    inner: Arc<RwLock<Vec<SessionSummary>>>,
}

impl SessionWatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot, ordered by session id
    pub fn snapshot(&self) -> Vec<SessionSummary> {
        self.inner.read().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub(crate) fn publish(&self, sessions: Vec<SessionSummary>) {
        *self.inner.write() = sessions;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: u64) -> SessionSummary {
        SessionSummary {
            id: SessionId::from_raw(id),
            vendor_id: Some(0x1234),
            product_id: Some(0x5678),
            name: None,
            location: DeviceIdentity::new(format!("/dev/input/event{}", id)),
            state: SessionState::Monitoring,
            reports_swallowed: 0,
        }
    }

    #[test]
    fn test_clones_share_snapshot() {
        let watch = SessionWatch::new();
        let reader = watch.clone();
        assert!(reader.is_empty());

        watch.publish(vec![summary(1), summary(2)]);
        assert_eq!(reader.len(), 2);
        assert_eq!(reader.snapshot()[1].id, SessionId::from_raw(2));
    }

    #[test]
    fn test_snapshot_readable_from_another_thread() {
        let watch = SessionWatch::new();
        watch.publish(vec![summary(3)]);
        let reader = watch.clone();
        let seen = std::thread::spawn(move || reader.snapshot())
            .join()
            .unwrap();
        assert_eq!(seen, vec![summary(3)]);
    }
}
