// Deputy Host Seam
// The platform primitives the engine is driven by
//
// Every notification (arrival, detach, report) is returned from `wait` and
// handled on the caller's thread, so the engine never runs concurrently
// with itself.

pub mod mock;

use std::time::Duration;

use crate::input::{DeviceDescriptor, DeviceIdentity, InputEvent};
use crate::session::SessionId;

/// A raw device offered by discovery, not yet opened
#[derive(Debug, Clone)]
pub struct Candidate<D> {
    pub descriptor: DeviceDescriptor,
    pub device: D,
}

impl<D> Candidate<D> {
    pub fn new(descriptor: DeviceDescriptor, device: D) -> Self {
        Self { descriptor, device }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.descriptor.location
    }
}

/// One notification delivered on the serial context
#[derive(Debug, Clone)]
pub enum HostEvent<D> {
    /// A device was attached after discovery started
    Arrived(Candidate<D>),
    /// A device went away
    Detached(DeviceIdentity),
    /// A subscribed handle failed or vanished; affects only its own session
    Lost(SessionId),
    /// A subscribed session produced a report value
    Report(InputEvent),
}

/// Host-side failures other than opening a device
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("device notification subscription failed: {0}")]
    Subscription(String),

    #[error("report subscription failed: {0}")]
    ReportSubscription(String),

    #[error("unknown handle")]
    UnknownHandle,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("host error: {0}")]
    Other(String),
}

/// Outcome of a failed exclusive open
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OpenError {
    /// Another process or driver already holds the device exclusively
    #[error("device is already exclusively held")]
    AlreadyInUse,

    #[error("open failed: {0}")]
    Other(String),
}

/// Platform primitives for discovery, exclusive access and report delivery.
pub trait Host {
    /// A discovered, un-opened device
    type Device;
    /// An exclusively opened device. Closing consumes it.
    type Handle;

    /// Register for arrivals and detaches, returning the devices already
    /// attached at the moment of subscription.
    fn subscribe_arrivals(&mut self) -> Result<Vec<Candidate<Self::Device>>, HostError>;

    /// Open a device so that no other process can read it
    fn open_exclusive(&mut self, device: &Self::Device) -> Result<Self::Handle, OpenError>;

    /// Start delivering reports for `handle`, tagged with `session`
    fn subscribe_reports(
        &mut self,
        handle: &mut Self::Handle,
        session: SessionId,
    ) -> Result<(), HostError>;

    /// Stop delivering reports for `handle`
    fn unsubscribe_reports(&mut self, handle: &mut Self::Handle) -> Result<(), HostError>;

    /// Give up exclusive access and release the native handle
    fn close(&mut self, handle: Self::Handle) -> Result<(), HostError>;

    /// Block until notifications are available or `timeout` elapses
    fn wait(&mut self, timeout: Duration) -> Result<Vec<HostEvent<Self::Device>>, HostError>;
}
