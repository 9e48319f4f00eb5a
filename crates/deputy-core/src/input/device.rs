// Deputy Input Layer - Device Descriptors
// Snapshot of the properties a candidate device is matched on

use std::collections::HashSet;
use std::fmt;

/// USB base class: Human Interface Device
pub const USB_CLASS_HID: u8 = 0x03;
/// USB base class: Hub
pub const USB_CLASS_HUB: u8 = 0x09;
/// HID interface subclass: Boot Interface
pub const HID_SUBCLASS_BOOT: u8 = 0x01;
/// HID interface protocol: Keyboard
pub const HID_PROTOCOL_KEYBOARD: u8 = 0x01;
/// Generic Desktop usage page
pub const GENERIC_DESKTOP_PAGE: u16 = 0x01;
/// Keyboard usage on the Generic Desktop page
pub const GENERIC_DESKTOP_KEYBOARD: u16 = 0x06;

/// Bus a device is attached through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Transport {
    Usb,
    Bluetooth,
    I2c,
    Virtual,
    Other,
}

impl Transport {
    /// Map a udev `ID_BUS` value to a transport
    pub fn from_bus_name(name: &str) -> Self {
        match name {
            "usb" => Transport::Usb,
            "bluetooth" => Transport::Bluetooth,
            "i2c" => Transport::I2c,
            "virtual" => Transport::Virtual,
            _ => Transport::Other,
        }
    }
}

/// Location of a device for as long as it stays attached.
///
/// Not stable across re-enumeration: the host may hand the same location
/// to a different device later, so sessions are keyed by `SessionId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceIdentity(String);

impl DeviceIdentity {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable snapshot of a candidate device, read at match time.
///
/// Every field the host could not read is `None`; the classifier treats
/// missing fields as "not a keyboard".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub transport: Option<Transport>,
    pub device_class: Option<u8>,
    pub device_subclass: Option<u8>,
    pub device_protocol: Option<u8>,
    pub interface_class: Option<u8>,
    pub interface_subclass: Option<u8>,
    pub interface_protocol: Option<u8>,
    pub primary_usage_page: Option<u16>,
    pub primary_usage: Option<u16>,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    pub name: Option<String>,
    pub location: DeviceIdentity,
}

impl DeviceDescriptor {
    /// Create a descriptor with only its location known
    pub fn new(location: DeviceIdentity) -> Self {
        Self {
            transport: None,
            device_class: None,
            device_subclass: None,
            device_protocol: None,
            interface_class: None,
            interface_subclass: None,
            interface_protocol: None,
            primary_usage_page: None,
            primary_usage: None,
            vendor_id: None,
            product_id: None,
            name: None,
            location,
        }
    }

    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_device_class(mut self, class: u8, subclass: u8, protocol: u8) -> Self {
        self.device_class = Some(class);
        self.device_subclass = Some(subclass);
        self.device_protocol = Some(protocol);
        self
    }

    pub fn with_interface_class(mut self, class: u8, subclass: u8, protocol: u8) -> Self {
        self.interface_class = Some(class);
        self.interface_subclass = Some(subclass);
        self.interface_protocol = Some(protocol);
        self
    }

    pub fn with_primary_usage(mut self, page: u16, usage: u16) -> Self {
        self.primary_usage_page = Some(page);
        self.primary_usage = Some(usage);
        self
    }

    pub fn with_ids(mut self, vendor_id: u16, product_id: u16) -> Self {
        self.vendor_id = Some(vendor_id);
        self.product_id = Some(product_id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Whether the device itself enumerates as a USB hub
    pub fn is_hub(&self) -> bool {
        self.device_class == Some(USB_CLASS_HUB) || self.interface_class == Some(USB_CLASS_HUB)
    }
}

/// Key capabilities of an event node, used to derive its primary usage
#[derive(Debug, Clone)]
pub struct DeviceCapabilities {
    /// Whether the device supports EV_KEY events
    pub has_ev_key: bool,
    /// List of supported Linux key codes
    pub supported_keys: Vec<u16>,
}

impl DeviceCapabilities {
    pub fn new(has_ev_key: bool, supported_keys: Vec<u16>) -> Self {
        Self {
            has_ev_key,
            supported_keys,
        }
    }

    /// Create a HashSet from supported keys for O(1) lookups
    pub fn key_set(&self) -> HashSet<u16> {
        self.supported_keys.iter().copied().collect()
    }
}

// QWERTY row key codes: Q, W, E, R, T, Y
const QWERTY_CODES: &[u16] = &[16, 17, 18, 19, 20, 21];

// Representative A-Z and SPACE codes
const A_Z_SPACE_CODES: &[u16] = &[57, 30, 44]; // SPACE, A, Z

/// Determine whether an event node advertises a full keyboard layout.
///
/// The node must support EV_KEY, the whole QWERTY row, A, Z and SPACE.
/// Nodes that pass are given the Generic Desktop / Keyboard primary usage.
pub fn has_keyboard_layout(capabilities: &DeviceCapabilities) -> bool {
    if !capabilities.has_ev_key {
        return false;
    }

    let key_set = capabilities.key_set();
    let qwerty_present = QWERTY_CODES.iter().all(|code| key_set.contains(code));
    let az_present = A_Z_SPACE_CODES.iter().all(|code| key_set.contains(code));

    qwerty_present && az_present
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keyboard_caps() -> DeviceCapabilities {
        let mut keys = vec![0];
        keys.extend_from_slice(QWERTY_CODES);
        keys.extend_from_slice(A_Z_SPACE_CODES);
        keys.extend_from_slice(&[2, 3, 4, 5, 6, 7, 8, 9, 10, 11]); // Numbers
        keys.extend_from_slice(&[14, 15, 28, 29, 42, 56]); // BACKSPACE, TAB, ENTER, CTRL, SHIFT, ALT
        DeviceCapabilities::new(true, keys)
    }

    #[test]
    fn test_keyboard_layout_with_full_keyboard() {
        assert!(has_keyboard_layout(&make_keyboard_caps()));
    }

    #[test]
    fn test_keyboard_layout_without_qwerty() {
        let mut keys = vec![0];
        keys.extend_from_slice(A_Z_SPACE_CODES);
        let caps = DeviceCapabilities::new(true, keys);
        assert!(!has_keyboard_layout(&caps));
    }

    #[test]
    fn test_keyboard_layout_mouse_device() {
        // BTN_LEFT, BTN_RIGHT, BTN_MIDDLE
        let caps = DeviceCapabilities::new(true, vec![272, 273, 274]);
        assert!(!has_keyboard_layout(&caps));
    }

    #[test]
    fn test_keyboard_layout_with_no_ev_key() {
        let mut caps = make_keyboard_caps();
        caps.has_ev_key = false;
        assert!(!has_keyboard_layout(&caps));
    }

    #[test]
    fn test_transport_from_bus_name() {
        assert_eq!(Transport::from_bus_name("usb"), Transport::Usb);
        assert_eq!(Transport::from_bus_name("bluetooth"), Transport::Bluetooth);
        assert_eq!(Transport::from_bus_name("serio"), Transport::Other);
        assert_eq!(Transport::Usb.to_string(), "usb");
    }

    #[test]
    fn test_descriptor_hub_detection() {
        let hub = DeviceDescriptor::new(DeviceIdentity::new("/dev/input/event3"))
            .with_device_class(USB_CLASS_HUB, 0, 1);
        assert!(hub.is_hub());

        let keyboard = DeviceDescriptor::new(DeviceIdentity::new("/dev/input/event4"))
            .with_device_class(0, 0, 0);
        assert!(!keyboard.is_hub());
    }
}
