// Deputy Engine
// Discovery, seizure, report filtering and release on one serial context

use std::collections::VecDeque;
use std::time::Duration;

use super::notice::Notice;
use super::seize::{attempt_seize, SeizeFailure};
use super::watcher::EnumerationWatcher;
use crate::host::{Candidate, Host, HostError, HostEvent};
use crate::input::{DeviceIdentity, InputEvent, MatchLevel, ReportFilter, Verdict};
use crate::session::{
    Session, SessionId, SessionIdAllocator, SessionRegistry, SessionState, SessionSummary,
    SessionWatch,
};
use crate::usage::KeyUsage;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced to the shell
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No discovery, no engine
    #[error("device discovery subscription failed: {0}")]
    DiscoverySubscriptionFailed(#[source] HostError),

    #[error("engine already started")]
    AlreadyStarted,

    #[error("engine is not running")]
    NotRunning,

    #[error("run loop wait failed: {0}")]
    RunLoop(#[source] HostError),
}

/// Engine policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub match_level: MatchLevel,
    pub release_key: KeyUsage,
    /// `Some(1)` gives single-device semantics
    pub max_sessions: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            match_level: MatchLevel::Device,
            release_key: KeyUsage(0x04), // A
            max_sessions: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Running,
    ShutDown,
}

/// Work posted back onto the serial context instead of running inside a
/// report callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deferred {
    Release(SessionId),
}

/// The seizure engine.
///
/// Owns the host, the session registry and every native handle. All
/// operations run to completion on the caller's thread; reports that ask
/// for a release only post a task, which [`Engine::run_deferred`] carries out.
pub struct Engine<H: Host> {
    host: H,
    config: EngineConfig,
    filter: ReportFilter,
    watcher: EnumerationWatcher,
    registry: SessionRegistry<H::Handle>,
    ids: SessionIdAllocator,
    deferred: VecDeque<Deferred>,
    notices: Vec<Notice>,
    watch: SessionWatch,
    lifecycle: Lifecycle,
}

impl<H: Host> Engine<H> {
    pub fn new(host: H, config: EngineConfig) -> Self {
        let registry = match config.max_sessions {
            Some(limit) => SessionRegistry::with_capacity_limit(limit),
            None => SessionRegistry::new(),
        };
        Self {
            host,
            filter: ReportFilter::new(config.release_key),
            watcher: EnumerationWatcher::new(config.match_level),
            registry,
            ids: SessionIdAllocator::new(),
            deferred: VecDeque::new(),
            notices: Vec::new(),
            watch: SessionWatch::new(),
            lifecycle: Lifecycle::Idle,
            config,
        }
    }

    /// Subscribe to discovery and seize every matching device already
    /// attached. Live arrivals follow through [`Engine::pump`].
    pub fn start(&mut self) -> EngineResult<()> {
        if self.lifecycle != Lifecycle::Idle {
            return Err(EngineError::AlreadyStarted);
        }

        let replay = self.watcher.start(&mut self.host)?;
        self.lifecycle = Lifecycle::Running;
        log::info!(
            "Engine started ({} level, release key {})",
            self.config.match_level,
            self.config.release_key
        );

        for candidate in replay {
            self.on_arrival(candidate);
        }
        self.run_deferred();
        Ok(())
    }

    /// Wait for host notifications, handle them, then run posted work.
    ///
    /// Returns the number of notifications handled.
    pub fn pump(&mut self, timeout: Duration) -> EngineResult<usize> {
        if self.lifecycle != Lifecycle::Running {
            return Err(EngineError::NotRunning);
        }

        let events = self.host.wait(timeout).map_err(EngineError::RunLoop)?;
        let count = events.len();
        for event in events {
            self.dispatch(event);
        }
        self.run_deferred();
        Ok(count)
    }

    /// Handle one host notification to completion.
    ///
    /// Releases requested by a report are posted, not performed here.
    pub fn dispatch(&mut self, event: HostEvent<H::Device>) {
        if self.lifecycle != Lifecycle::Running {
            log::debug!("Ignoring host notification, engine not running");
            return;
        }

        match event {
            HostEvent::Arrived(candidate) => self.on_arrival(candidate),
            HostEvent::Detached(identity) => self.on_detach(&identity),
            HostEvent::Lost(id) => self.on_lost(id),
            HostEvent::Report(report) => self.on_report(&report),
        }
        self.publish();
    }

    /// Carry out every posted task
    pub fn run_deferred(&mut self) {
        while let Some(task) = self.deferred.pop_front() {
            match task {
                Deferred::Release(id) => {
                    self.release(id);
                }
            }
        }
        self.publish();
    }

    /// Release a session: unsubscribe, close, drop it from the registry.
    ///
    /// Returns the session's final summary, in the `Released` state, or
    /// `None` (doing nothing) if the session is not registered, which makes
    /// a second release of the same session a no-op.
    pub fn release(&mut self, id: SessionId) -> Option<SessionSummary> {
        let Some(mut session) = self.registry.remove(id) else {
            log::debug!("Session {} already released", id);
            return None;
        };

        let result = self.teardown(&mut session);
        if let Err(e) = session.transition(SessionState::Released) {
            log::debug!("{}", e);
        }
        match result {
            Ok(()) => {
                log::info!("Released {} (session {})", session.identity(), id);
                self.notices.push(Notice::Released { id });
            }
            Err(e) => {
                log::warn!(
                    "Session {} released, but teardown failed ({}); {} may still be held",
                    id,
                    e,
                    session.identity()
                );
                self.notices.push(Notice::ReleaseTeardownFailed {
                    id,
                    reason: e.to_string(),
                });
            }
        }
        self.publish();
        Some(session.summary())
    }

    /// Close every session and stop handling notifications.
    ///
    /// Safe to call more than once; also run on drop.
    pub fn shutdown(&mut self) {
        if self.lifecycle == Lifecycle::ShutDown {
            return;
        }
        self.deferred.clear();

        for id in self.registry.ids() {
            if let Some(mut session) = self.registry.remove(id) {
                if let Err(e) = self.teardown(&mut session) {
                    log::warn!("Shutdown teardown of session {} failed: {}", id, e);
                    self.notices.push(Notice::ReleaseTeardownFailed {
                        id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if self.lifecycle == Lifecycle::Running {
            log::info!("Engine shut down");
        }
        self.lifecycle = Lifecycle::ShutDown;
        self.publish();
    }

    /// Sessions currently held, ordered by id
    pub fn current_sessions(&self) -> Vec<SessionSummary> {
        self.registry.list().iter().map(|s| s.summary()).collect()
    }

    /// Shared view of [`Engine::current_sessions`] for other threads
    pub fn watch(&self) -> SessionWatch {
        self.watch.clone()
    }

    /// Notices raised since the last call
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn registry(&self) -> &SessionRegistry<H::Handle> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    /// Number of posted tasks not yet run
    pub fn pending_tasks(&self) -> usize {
        self.deferred.len()
    }

    fn on_arrival(&mut self, candidate: Candidate<H::Device>) {
        if !self.watcher.admit(&candidate) {
            return;
        }

        let identity = candidate.identity().clone();
        let session = match attempt_seize(&mut self.host, &mut self.ids, candidate) {
            Ok(session) => session,
            Err(SeizeFailure::AlreadyInUse) => {
                log::warn!("Lost the race for {}: already held exclusively", identity);
                self.notices.push(Notice::SeizeAlreadyInUse { identity });
                return;
            }
            Err(SeizeFailure::Other(reason)) => {
                log::warn!("Could not seize {}: {}", identity, reason);
                self.notices.push(Notice::SeizeFailed { identity, reason });
                return;
            }
        };

        let id = match self.registry.insert(session) {
            Ok(id) => id,
            Err(rejected) => {
                log::warn!("Closing {} again: {}", identity, rejected.reason);
                let mut session = rejected.session;
                if let Err(e) = self.teardown(&mut session) {
                    log::warn!("Closing rejected handle for {} failed: {}", identity, e);
                }
                self.notices.push(Notice::SeizeRejected {
                    identity,
                    reason: rejected.reason,
                });
                return;
            }
        };

        log::info!("Seized {} (session {})", identity, id);
        self.notices.push(Notice::Seized { id, identity });
        self.begin_monitoring(id);
    }

    fn begin_monitoring(&mut self, id: SessionId) {
        let Some(session) = self.registry.get_mut(id) else {
            return;
        };
        let Some(handle) = session.handle_mut() else {
            return;
        };

        match self.host.subscribe_reports(handle, id) {
            Ok(()) => {
                let _ = session.transition(SessionState::Monitoring);
                log::debug!("Monitoring session {}", id);
            }
            Err(e) => {
                // Handle stays open; the device remains seized while blind
                let _ = session.transition(SessionState::MonitoringFailed);
                log::warn!("Session {} is held but not monitored: {}", id, e);
                self.notices.push(Notice::MonitoringFailed {
                    id,
                    reason: e.to_string(),
                });
            }
        }
    }

    fn on_report(&mut self, report: &InputEvent) {
        let Some(session) = self.registry.get_mut(report.session) else {
            log::trace!("Report for unknown session {}", report.session);
            return;
        };
        if session.state() != SessionState::Monitoring {
            return;
        }

        match self.filter.evaluate(report) {
            Verdict::Dropped(reason) => {
                log::trace!(
                    "Dropped report page={:#04x} usage={} ({:?})",
                    report.usage_page,
                    report.usage,
                    reason
                );
            }
            Verdict::Swallowed => {
                session.record_swallowed();
                log::trace!("Swallowed usage {} from session {}", report.usage, report.session);
            }
            Verdict::ReleaseRequested => {
                log::info!("Release key pressed on session {}", report.session);
                if !self.deferred.contains(&Deferred::Release(report.session)) {
                    self.deferred.push_back(Deferred::Release(report.session));
                }
            }
        }
    }

    fn on_detach(&mut self, identity: &DeviceIdentity) {
        self.watcher.forget(identity);

        let Some(id) = self.registry.find_by_identity(identity) else {
            return;
        };
        let Some(mut session) = self.registry.remove(id) else {
            return;
        };

        // The device is gone, so teardown errors are expected here
        if let Err(e) = self.teardown(&mut session) {
            log::debug!("Teardown of detached session {}: {}", id, e);
        }
        log::info!("Session {} ended: {} detached", id, identity);
        self.notices.push(Notice::Evicted {
            id,
            identity: identity.clone(),
        });
    }

    /// Evict one session whose handle died. The location stays offered:
    /// only the discovery stream's own detach makes it eligible again, so a
    /// late loss for an old session cannot touch a newer one at the same path.
    fn on_lost(&mut self, id: SessionId) {
        let Some(mut session) = self.registry.remove(id) else {
            log::debug!("Loss reported for session {} which is no longer held", id);
            return;
        };

        if let Err(e) = self.teardown(&mut session) {
            log::debug!("Teardown of lost session {}: {}", id, e);
        }
        let identity = session.identity().clone();
        log::info!("Session {} ended: {} stopped responding", id, identity);
        self.notices.push(Notice::Evicted { id, identity });
    }

    /// Unsubscribe if monitored, then close. Closing is attempted even if
    /// unsubscribing failed; the first error is returned.
    fn teardown(&mut self, session: &mut Session<H::Handle>) -> Result<(), HostError> {
        let mut first_error = None;

        if session.state() == SessionState::Monitoring {
            if let Some(handle) = session.handle_mut() {
                if let Err(e) = self.host.unsubscribe_reports(handle) {
                    first_error = Some(e);
                }
            }
        }

        if let Some(handle) = session.take_handle() {
            if let Err(e) = self.host.close(handle) {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn publish(&self) {
        self.watch.publish(self.current_sessions());
    }
}

/// Every exclusive open is paired with a close, including on panic unwind
impl<H: Host> Drop for Engine<H> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
