// Deputy Enumeration Watcher
// Discovery subscription and the at-most-once admission of candidates

use std::collections::HashSet;

use super::driver::EngineError;
use crate::host::{Candidate, Host};
use crate::input::{classify, Classification, DeviceIdentity, MatchLevel};

/// Tracks discovery for one engine lifetime.
///
/// Replayed and live candidates go through the same [`admit`] check, so a
/// device location is classified and offered for seizure at most once per
/// attachment. A detach forgets the location; whatever shows up there next
/// is a new device.
///
/// [`admit`]: EnumerationWatcher::admit
#[derive(Debug)]
pub struct EnumerationWatcher {
    level: MatchLevel,
    subscribed: bool,
    offered: HashSet<DeviceIdentity>,
}

impl EnumerationWatcher {
    pub fn new(level: MatchLevel) -> Self {
        Self {
            level,
            subscribed: false,
            offered: HashSet::new(),
        }
    }

    pub fn level(&self) -> MatchLevel {
        self.level
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Subscribe to device notifications and return the replay of devices
    /// already attached. Failure here is fatal to the engine.
    pub fn start<H: Host>(&mut self, host: &mut H) -> Result<Vec<Candidate<H::Device>>, EngineError> {
        if self.subscribed {
            return Err(EngineError::AlreadyStarted);
        }
        let replay = host
            .subscribe_arrivals()
            .map_err(EngineError::DiscoverySubscriptionFailed)?;
        self.subscribed = true;
        log::debug!("Discovery subscribed, {} device(s) already attached", replay.len());
        Ok(replay)
    }

    /// Decide whether a candidate goes to the seizure step.
    ///
    /// Returns `false` for repeats of an already offered location and for
    /// anything the classifier rejects.
    pub fn admit<D>(&mut self, candidate: &Candidate<D>) -> bool {
        let identity = candidate.identity();
        if self.offered.contains(identity) {
            log::debug!("Ignoring repeated notification for {}", identity);
            return false;
        }

        match classify(&candidate.descriptor, self.level) {
            Classification::Keyboard => {
                self.offered.insert(identity.clone());
                true
            }
            Classification::NotKeyboard => {
                log::debug!("Skipping {} (not a keyboard at {} level)", identity, self.level);
                false
            }
        }
    }

    /// Forget a location after its device was detached
    pub fn forget(&mut self, identity: &DeviceIdentity) {
        self.offered.remove(identity);
    }
}
