// Deputy Seizure Manager
// Exclusive open of an admitted candidate

use crate::host::{Candidate, Host, OpenError};
use crate::session::{Session, SessionIdAllocator};

/// Why a candidate could not be seized
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SeizeFailure {
    /// Lost the race: someone else holds the device exclusively. Not retried.
    #[error("device already in use")]
    AlreadyInUse,

    /// Any other native failure. The candidate is skipped.
    #[error("seize failed: {0}")]
    Other(String),
}

impl From<OpenError> for SeizeFailure {
    fn from(error: OpenError) -> Self {
        match error {
            OpenError::AlreadyInUse => SeizeFailure::AlreadyInUse,
            OpenError::Other(message) => SeizeFailure::Other(message),
        }
    }
}

/// Open `candidate` exclusively and wrap the handle in a new `Seized` session.
///
/// A session id is only allocated on success. This is best effort: a device
/// that injects before the open completes has already been heard.
pub fn attempt_seize<H: Host>(
    host: &mut H,
    ids: &mut SessionIdAllocator,
    candidate: Candidate<H::Device>,
) -> Result<Session<H::Handle>, SeizeFailure> {
    let handle = host.open_exclusive(&candidate.device)?;
    Ok(Session::new(ids.next_id(), candidate.descriptor, handle))
}
