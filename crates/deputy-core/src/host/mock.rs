// Deputy Host Seam - Mock Host
// Scripted host for tests
//
// Tests queue arrivals, detaches and reports, pick the outcome of each
// host call per device, and count opens, subscriptions and closes
// afterwards. No hardware or udev is involved.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use super::{Candidate, Host, HostError, HostEvent, OpenError};
use crate::input::{
    DeviceDescriptor, DeviceIdentity, InputEvent, Transport, GENERIC_DESKTOP_KEYBOARD,
    GENERIC_DESKTOP_PAGE, HID_PROTOCOL_KEYBOARD, HID_SUBCLASS_BOOT, USB_CLASS_HID, USB_CLASS_HUB,
};
use crate::session::SessionId;
use crate::usage::KEYBOARD_USAGE_PAGE;

/// A mock device, identified by a number chosen by the test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MockDevice(pub u32);

/// Exclusive handle to a mock device
#[derive(Debug, PartialEq, Eq)]
pub struct MockHandle {
    device: u32,
}

impl MockHandle {
    pub fn device(&self) -> u32 {
        self.device
    }
}

/// USB keyboard matching at both levels, located at `/mock/input<id>`
pub fn keyboard(id: u32) -> Candidate<MockDevice> {
    keyboard_at(id, &format!("/mock/input{}", id))
}

/// USB keyboard at an explicit location (for re-enumeration tests)
pub fn keyboard_at(id: u32, location: &str) -> Candidate<MockDevice> {
    let descriptor = DeviceDescriptor::new(DeviceIdentity::new(location))
        .with_transport(Transport::Usb)
        .with_device_class(0, 0, 0)
        .with_interface_class(USB_CLASS_HID, HID_SUBCLASS_BOOT, HID_PROTOCOL_KEYBOARD)
        .with_primary_usage(GENERIC_DESKTOP_PAGE, GENERIC_DESKTOP_KEYBOARD)
        .with_ids(0x1000 + id as u16, 0x2000 + id as u16)
        .with_name(format!("Mock Keyboard {}", id));
    Candidate::new(descriptor, MockDevice(id))
}

/// USB mouse: Generic Desktop / Mouse, boot mouse interface
pub fn mouse(id: u32) -> Candidate<MockDevice> {
    let descriptor = DeviceDescriptor::new(DeviceIdentity::new(format!("/mock/input{}", id)))
        .with_transport(Transport::Usb)
        .with_device_class(0, 0, 0)
        .with_interface_class(USB_CLASS_HID, HID_SUBCLASS_BOOT, 0x02)
        .with_primary_usage(GENERIC_DESKTOP_PAGE, 0x02)
        .with_ids(0x3000, id as u16);
    Candidate::new(descriptor, MockDevice(id))
}

/// USB hub that otherwise advertises keyboard usages
pub fn hub(id: u32) -> Candidate<MockDevice> {
    let mut candidate = keyboard(id);
    candidate.descriptor = candidate.descriptor.with_device_class(USB_CLASS_HUB, 0, 1);
    candidate
}

/// Keyboard-page report for a session
pub fn key_report(session: SessionId, usage: u16, asserted: bool) -> HostEvent<MockDevice> {
    HostEvent::Report(InputEvent::new(session, KEYBOARD_USAGE_PAGE, usage, asserted))
}

/// Report on an arbitrary usage page
pub fn report(session: SessionId, page: u16, usage: u16, asserted: bool) -> HostEvent<MockDevice> {
    HostEvent::Report(InputEvent::new(session, page, usage, asserted))
}

/// Scripted [`Host`] implementation
#[derive(Debug, Default)]
pub struct MockHost {
    attached: Vec<Candidate<MockDevice>>,
    pending: VecDeque<HostEvent<MockDevice>>,

    discovery_error: Option<String>,
    wait_error: Option<String>,
    open_errors: HashMap<u32, OpenError>,
    failing_report_subscriptions: HashSet<u32>,
    failing_unsubscribes: HashSet<u32>,
    failing_closes: HashSet<u32>,

    discovery_subscriptions: usize,
    open_attempts: HashMap<u32, usize>,
    open_handles: HashSet<u32>,
    subscribed: HashMap<u32, SessionId>,
    unsubscribes: HashMap<u32, usize>,
    closes: HashMap<u32, usize>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Device present before discovery starts (part of the replay)
    pub fn with_attached(mut self, candidate: Candidate<MockDevice>) -> Self {
        self.attached.push(candidate);
        self
    }

    /// Make the discovery subscription fail
    pub fn fail_discovery(mut self, message: &str) -> Self {
        self.discovery_error = Some(message.to_string());
        self
    }

    /// Exclusive open of `device` fails with `error`
    pub fn fail_open(&mut self, device: u32, error: OpenError) {
        self.open_errors.insert(device, error);
    }

    /// Report subscription of `device` fails
    pub fn fail_report_subscription(&mut self, device: u32) {
        self.failing_report_subscriptions.insert(device);
    }

    /// Unsubscribing `device` fails
    pub fn fail_unsubscribe(&mut self, device: u32) {
        self.failing_unsubscribes.insert(device);
    }

    /// Closing `device` fails (the handle is still consumed)
    pub fn fail_close(&mut self, device: u32) {
        self.failing_closes.insert(device);
    }

    /// The next `wait` fails
    pub fn fail_next_wait(&mut self, message: &str) {
        self.wait_error = Some(message.to_string());
    }

    /// Queue a notification for the next `wait`
    pub fn push(&mut self, event: HostEvent<MockDevice>) {
        self.pending.push_back(event);
    }

    pub fn discovery_subscriptions(&self) -> usize {
        self.discovery_subscriptions
    }

    pub fn open_attempts(&self, device: u32) -> usize {
        self.open_attempts.get(&device).copied().unwrap_or(0)
    }

    pub fn is_open(&self, device: u32) -> bool {
        self.open_handles.contains(&device)
    }

    pub fn open_handle_count(&self) -> usize {
        self.open_handles.len()
    }

    pub fn subscriber(&self, device: u32) -> Option<SessionId> {
        self.subscribed.get(&device).copied()
    }

    pub fn unsubscribe_count(&self, device: u32) -> usize {
        self.unsubscribes.get(&device).copied().unwrap_or(0)
    }

    pub fn close_count(&self, device: u32) -> usize {
        self.closes.get(&device).copied().unwrap_or(0)
    }
}

impl Host for MockHost {
    type Device = MockDevice;
    type Handle = MockHandle;

    fn subscribe_arrivals(&mut self) -> Result<Vec<Candidate<MockDevice>>, HostError> {
        if let Some(message) = &self.discovery_error {
            return Err(HostError::Subscription(message.clone()));
        }
        self.discovery_subscriptions += 1;
        Ok(std::mem::take(&mut self.attached))
    }

    fn open_exclusive(&mut self, device: &MockDevice) -> Result<MockHandle, OpenError> {
        *self.open_attempts.entry(device.0).or_default() += 1;
        if let Some(error) = self.open_errors.get(&device.0) {
            return Err(error.clone());
        }
        if !self.open_handles.insert(device.0) {
            // Same device opened twice: the second grab loses, as on a real host
            return Err(OpenError::AlreadyInUse);
        }
        Ok(MockHandle { device: device.0 })
    }

    fn subscribe_reports(
        &mut self,
        handle: &mut MockHandle,
        session: SessionId,
    ) -> Result<(), HostError> {
        if self.failing_report_subscriptions.contains(&handle.device) {
            return Err(HostError::ReportSubscription(format!(
                "mock device {} refused",
                handle.device
            )));
        }
        self.subscribed.insert(handle.device, session);
        Ok(())
    }

    fn unsubscribe_reports(&mut self, handle: &mut MockHandle) -> Result<(), HostError> {
        *self.unsubscribes.entry(handle.device).or_default() += 1;
        self.subscribed.remove(&handle.device);
        if self.failing_unsubscribes.contains(&handle.device) {
            return Err(HostError::Other(format!(
                "mock device {} unsubscribe failed",
                handle.device
            )));
        }
        Ok(())
    }

    fn close(&mut self, handle: MockHandle) -> Result<(), HostError> {
        *self.closes.entry(handle.device).or_default() += 1;
        self.open_handles.remove(&handle.device);
        self.subscribed.remove(&handle.device);
        if self.failing_closes.contains(&handle.device) {
            return Err(HostError::Other(format!(
                "mock device {} close failed",
                handle.device
            )));
        }
        Ok(())
    }

    fn wait(&mut self, _timeout: Duration) -> Result<Vec<HostEvent<MockDevice>>, HostError> {
        if let Some(message) = self.wait_error.take() {
            return Err(HostError::Other(message));
        }
        Ok(self.pending.drain(..).collect())
    }
}
