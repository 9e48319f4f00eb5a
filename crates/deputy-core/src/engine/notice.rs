// Deputy Notices
// Non-blocking outcomes the shell shows to the user

use std::fmt;

use crate::input::DeviceIdentity;
use crate::session::{RegistryError, SessionId};

/// Something the shell should tell the user about. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Seized {
        id: SessionId,
        identity: DeviceIdentity,
    },
    /// Lost the race for exclusive access
    SeizeAlreadyInUse { identity: DeviceIdentity },
    SeizeFailed {
        identity: DeviceIdentity,
        reason: String,
    },
    /// Opened, then refused by the registry and closed again
    SeizeRejected {
        identity: DeviceIdentity,
        reason: RegistryError,
    },
    /// Held but blind: reports could not be subscribed
    MonitoringFailed { id: SessionId, reason: String },
    Released { id: SessionId },
    /// Removed from the registry, but the handle may still be open
    ReleaseTeardownFailed { id: SessionId, reason: String },
    /// Device detached while held
    Evicted {
        id: SessionId,
        identity: DeviceIdentity,
    },
}

impl Notice {
    /// Whether the user should treat this as a warning
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Notice::SeizeFailed { .. }
                | Notice::SeizeRejected { .. }
                | Notice::MonitoringFailed { .. }
                | Notice::ReleaseTeardownFailed { .. }
        )
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Seized { id, identity } => write!(f, "seized {} as session {}", identity, id),
            Notice::SeizeAlreadyInUse { identity } => {
                write!(f, "{} is already held by another process", identity)
            }
            Notice::SeizeFailed { identity, reason } => {
                write!(f, "could not seize {}: {}", identity, reason)
            }
            Notice::SeizeRejected { identity, reason } => {
                write!(f, "closed {} again: {}", identity, reason)
            }
            Notice::MonitoringFailed { id, reason } => {
                write!(f, "session {} is held but not monitored: {}", id, reason)
            }
            Notice::Released { id } => write!(f, "session {} released", id),
            Notice::ReleaseTeardownFailed { id, reason } => {
                write!(f, "session {} released with errors: {}", id, reason)
            }
            Notice::Evicted { id, identity } => {
                write!(f, "session {} ended: {} was detached", id, identity)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_classification() {
        let id = SessionId::from_raw(1);
        assert!(!Notice::Released { id }.is_warning());
        assert!(Notice::MonitoringFailed {
            id,
            reason: "x".into()
        }
        .is_warning());
        assert!(!Notice::SeizeAlreadyInUse {
            identity: DeviceIdentity::new("/dev/input/event2")
        }
        .is_warning());
    }

    #[test]
    fn test_display() {
        let notice = Notice::Seized {
            id: SessionId::from_raw(3),
            identity: DeviceIdentity::new("/dev/input/event9"),
        };
        assert_eq!(notice.to_string(), "seized /dev/input/event9 as session #3");
    }
}
