// Deputy Linux Host
// udev discovery, EVIOCGRAB seizure and poll(2) report delivery

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::descriptor::{build_descriptor, NodeProperties};
use super::scan::ScanDecoder;
use crate::host::{Candidate, Host, HostError, HostEvent, OpenError};
use crate::input::{DeviceIdentity, InputEvent};
use crate::session::SessionId;

const INPUT_SUBSYSTEM: &str = "input";

/// An `/dev/input/event*` node found by discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinuxDevice {
    path: PathBuf,
}

impl LinuxDevice {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Token for a grabbed node owned by the host
#[derive(Debug, PartialEq, Eq)]
pub struct GrabHandle {
    token: u64,
}

struct GrabbedNode {
    device: evdev::Device,
    identity: DeviceIdentity,
    subscriber: Option<SessionId>,
    decoder: ScanDecoder,
}

/// [`Host`] backed by udev and evdev.
///
/// Grabbed nodes live here and are referenced by [`GrabHandle`] tokens, so
/// dropping the host ungrabs anything the engine did not close.
pub struct LinuxHost {
    monitor: Option<udev::MonitorSocket>,
    nodes: BTreeMap<u64, GrabbedNode>,
    next_token: u64,
}

impl LinuxHost {
    pub fn new() -> Self {
        Self {
            monitor: None,
            nodes: BTreeMap::new(),
            next_token: 1,
        }
    }

    /// Number of nodes currently grabbed
    pub fn grabbed_count(&self) -> usize {
        self.nodes.len()
    }

    /// Read a udev monitor event into a host notification
    fn translate(event: &udev::Event) -> Option<HostEvent<LinuxDevice>> {
        match event.event_type() {
            udev::EventType::Add => candidate_from(&event.device()).map(HostEvent::Arrived),
            udev::EventType::Remove => {
                let devnode = event.device().devnode().map(Path::to_path_buf)?;
                is_event_node(&devnode).then(|| {
                    HostEvent::Detached(DeviceIdentity::new(devnode.to_string_lossy()))
                })
            }
            _ => None,
        }
    }

    fn drain_monitor(&self, events: &mut Vec<HostEvent<LinuxDevice>>) {
        let Some(monitor) = self.monitor.as_ref() else {
            return;
        };
        for event in monitor.iter() {
            if let Some(translated) = Self::translate(&event) {
                events.push(translated);
            }
        }
    }

    fn read_node(token: u64, node: &mut GrabbedNode, events: &mut Vec<HostEvent<LinuxDevice>>) {
        let Some(session) = node.subscriber else {
            return;
        };

        let fetched = match node.device.fetch_events() {
            Ok(fetched) => fetched,
            Err(e) if !ends_node(&e) => return,
            Err(e) => {
                if e.raw_os_error() == Some(libc::ENODEV) {
                    log::debug!("Node {} (token {}) is gone", node.identity, token);
                } else {
                    log::warn!("Reading {} failed, dropping it: {}", node.identity, e);
                }
                // Unsubscribed so poll stops reporting it until the engine closes it
                node.subscriber = None;
                events.push(HostEvent::Lost(session));
                return;
            }
        };

        for raw in fetched {
            if let Some(decoded) = node.decoder.feed(raw.event_type().0, raw.code(), raw.value()) {
                events.push(HostEvent::Report(InputEvent::new(
                    session,
                    decoded.usage_page,
                    decoded.usage,
                    decoded.asserted,
                )));
            }
        }
    }
}

impl Default for LinuxHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for LinuxHost {
    type Device = LinuxDevice;
    type Handle = GrabHandle;

    fn subscribe_arrivals(&mut self) -> Result<Vec<Candidate<LinuxDevice>>, HostError> {
        // Monitor first so nothing attached during the scan is missed
        let monitor = udev::MonitorBuilder::new()
            .and_then(|builder| builder.match_subsystem(INPUT_SUBSYSTEM))
            .and_then(|builder| builder.listen())
            .map_err(|e| HostError::Subscription(e.to_string()))?;
        let replay = enumerate_candidates()?;
        self.monitor = Some(monitor);
        Ok(replay)
    }

    fn open_exclusive(&mut self, device: &LinuxDevice) -> Result<GrabHandle, OpenError> {
        let mut opened = evdev::Device::open(&device.path).map_err(|e| open_error(&e))?;
        opened.grab().map_err(|e| open_error(&e))?;

        let token = self.next_token;
        self.next_token += 1;
        self.nodes.insert(
            token,
            GrabbedNode {
                device: opened,
                identity: DeviceIdentity::new(device.path.to_string_lossy()),
                subscriber: None,
                decoder: ScanDecoder::new(),
            },
        );
        Ok(GrabHandle { token })
    }

    fn subscribe_reports(
        &mut self,
        handle: &mut GrabHandle,
        session: SessionId,
    ) -> Result<(), HostError> {
        let node = self
            .nodes
            .get_mut(&handle.token)
            .ok_or(HostError::UnknownHandle)?;
        set_nonblocking(node.device.as_raw_fd())
            .map_err(|e| HostError::ReportSubscription(e.to_string()))?;
        node.subscriber = Some(session);
        Ok(())
    }

    fn unsubscribe_reports(&mut self, handle: &mut GrabHandle) -> Result<(), HostError> {
        let node = self
            .nodes
            .get_mut(&handle.token)
            .ok_or(HostError::UnknownHandle)?;
        node.subscriber = None;
        Ok(())
    }

    fn close(&mut self, handle: GrabHandle) -> Result<(), HostError> {
        let mut node = self
            .nodes
            .remove(&handle.token)
            .ok_or(HostError::UnknownHandle)?;
        // The file descriptor is closed when the node drops, grabbed or not
        node.device.ungrab()?;
        Ok(())
    }

    fn wait(&mut self, timeout: Duration) -> Result<Vec<HostEvent<LinuxDevice>>, HostError> {
        let mut poll_fds = Vec::with_capacity(self.nodes.len() + 1);
        let mut tokens = Vec::with_capacity(self.nodes.len());

        if let Some(monitor) = &self.monitor {
            poll_fds.push(pollfd(monitor.as_raw_fd()));
        }
        let node_offset = poll_fds.len();
        for (&token, node) in &self.nodes {
            if node.subscriber.is_some() {
                poll_fds.push(pollfd(node.device.as_raw_fd()));
                tokens.push(token);
            }
        }

        let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        let mut events = Vec::new();
        if poll_fds.is_empty() {
            std::thread::sleep(timeout);
            return Ok(events);
        }

        let poll_result = unsafe {
            libc::poll(
                poll_fds.as_mut_ptr(),
                poll_fds.len() as libc::nfds_t,
                timeout_ms,
            )
        };

        if poll_result < 0 {
            let err = io::Error::last_os_error();
            // A signal arrived; the caller checks its running flag
            if err.raw_os_error() == Some(libc::EINTR) {
                return Ok(events);
            }
            return Err(HostError::Io(err));
        }
        if poll_result == 0 {
            return Ok(events);
        }

        if node_offset == 1 && poll_fds[0].revents & libc::POLLIN != 0 {
            self.drain_monitor(&mut events);
        }

        for (i, token) in tokens.into_iter().enumerate() {
            let revents = poll_fds[node_offset + i].revents;
            let Some(node) = self.nodes.get_mut(&token) else {
                continue;
            };
            if revents & libc::POLLIN != 0 {
                Self::read_node(token, node, &mut events);
            } else if revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
                if let Some(session) = node.subscriber.take() {
                    log::debug!("Node {} (token {}) hung up", node.identity, token);
                    events.push(HostEvent::Lost(session));
                }
            }
        }

        Ok(events)
    }
}

/// Whether a failed read means the node is unusable. Anything but a
/// would-block or an interrupted read counts.
fn ends_node(err: &io::Error) -> bool {
    !matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Grabbed nodes MUST be ungrabbed, otherwise the keyboard stays dead
/// until it is replugged.
impl Drop for LinuxHost {
    fn drop(&mut self) {
        for node in self.nodes.values_mut() {
            let _ = node.device.ungrab();
        }
    }
}

/// All input event nodes currently attached, without opening any of them
pub fn enumerate_candidates() -> Result<Vec<Candidate<LinuxDevice>>, HostError> {
    let mut enumerator =
        udev::Enumerator::new().map_err(|e| HostError::Subscription(e.to_string()))?;
    enumerator
        .match_subsystem(INPUT_SUBSYSTEM)
        .map_err(|e| HostError::Subscription(e.to_string()))?;

    let mut candidates: Vec<_> = enumerator
        .scan_devices()
        .map_err(|e| HostError::Subscription(e.to_string()))?
        .filter_map(|device| candidate_from(&device))
        .collect();
    candidates.sort_by(|a, b| a.device.path.cmp(&b.device.path));
    Ok(candidates)
}

fn candidate_from(device: &udev::Device) -> Option<Candidate<LinuxDevice>> {
    let props = read_properties(device)?;
    let path = PathBuf::from(&props.devnode);
    Some(Candidate::new(build_descriptor(&props), LinuxDevice { path }))
}

fn read_properties(device: &udev::Device) -> Option<NodeProperties> {
    let devnode = device.devnode()?;
    if !is_event_node(devnode) {
        return None;
    }

    let mut props = NodeProperties {
        devnode: devnode.to_string_lossy().into_owned(),
        bus: text(device.property_value("ID_BUS")),
        ..NodeProperties::default()
    };

    if let Some(input) = device.parent() {
        props.name = text(input.attribute_value("name"));
        props.ev_bits = text(input.attribute_value("capabilities/ev"));
        props.key_bits = text(input.attribute_value("capabilities/key"));
    }

    if let Ok(Some(interface)) = device.parent_with_subsystem_devtype("usb", "usb_interface") {
        props.interface_class = text(interface.attribute_value("bInterfaceClass"));
        props.interface_subclass = text(interface.attribute_value("bInterfaceSubClass"));
        props.interface_protocol = text(interface.attribute_value("bInterfaceProtocol"));
    }

    if let Ok(Some(usb)) = device.parent_with_subsystem_devtype("usb", "usb_device") {
        props.device_class = text(usb.attribute_value("bDeviceClass"));
        props.device_subclass = text(usb.attribute_value("bDeviceSubClass"));
        props.device_protocol = text(usb.attribute_value("bDeviceProtocol"));
        props.vendor_id = text(usb.attribute_value("idVendor"));
        props.product_id = text(usb.attribute_value("idProduct"));
    }

    Some(props)
}

fn is_event_node(path: &Path) -> bool {
    path.file_name()
        .and_then(OsStr::to_str)
        .is_some_and(|name| name.starts_with("event"))
}

fn text(value: Option<&OsStr>) -> Option<String> {
    value
        .and_then(OsStr::to_str)
        .map(|s| s.trim().to_string())
}

fn open_error(error: &io::Error) -> OpenError {
    if error.raw_os_error() == Some(libc::EBUSY) {
        OpenError::AlreadyInUse
    } else {
        OpenError::Other(error.to_string())
    }
}

fn pollfd(fd: libc::c_int) -> libc::pollfd {
    libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    }
}

fn set_nonblocking(fd: libc::c_int) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
