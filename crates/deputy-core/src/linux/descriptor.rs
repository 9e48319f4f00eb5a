// Deputy Linux Host - Descriptor Parsing
// Turns udev properties and sysfs attributes into a DeviceDescriptor

use crate::input::{
    has_keyboard_layout, DeviceCapabilities, DeviceDescriptor, DeviceIdentity, Transport,
    GENERIC_DESKTOP_KEYBOARD, GENERIC_DESKTOP_PAGE,
};

/// EV_KEY bit in `capabilities/ev`
const EV_KEY_BIT: u16 = 1;

/// Raw strings read for one `/dev/input/event*` node.
///
/// Filled from the event node, its `input` parent and its USB ancestors.
/// Anything that could not be read stays `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeProperties {
    pub devnode: String,
    /// `ID_BUS` udev property
    pub bus: Option<String>,
    pub name: Option<String>,
    /// `capabilities/ev` of the input parent
    pub ev_bits: Option<String>,
    /// `capabilities/key` of the input parent
    pub key_bits: Option<String>,
    /// `bDeviceClass`, `bDeviceSubClass`, `bDeviceProtocol` of the usb_device
    pub device_class: Option<String>,
    pub device_subclass: Option<String>,
    pub device_protocol: Option<String>,
    /// `bInterfaceClass`, `bInterfaceSubClass`, `bInterfaceProtocol` of the usb_interface
    pub interface_class: Option<String>,
    pub interface_subclass: Option<String>,
    pub interface_protocol: Option<String>,
    /// `idVendor`, `idProduct` of the usb_device
    pub vendor_id: Option<String>,
    pub product_id: Option<String>,
}

/// Build the descriptor the classifier sees
pub fn build_descriptor(props: &NodeProperties) -> DeviceDescriptor {
    let mut descriptor = DeviceDescriptor::new(DeviceIdentity::new(props.devnode.clone()));

    descriptor.transport = props.bus.as_deref().map(Transport::from_bus_name);

    if let (Some(class), Some(subclass), Some(protocol)) = (
        parse_hex_u8(props.device_class.as_deref()),
        parse_hex_u8(props.device_subclass.as_deref()),
        parse_hex_u8(props.device_protocol.as_deref()),
    ) {
        descriptor = descriptor.with_device_class(class, subclass, protocol);
    } else {
        descriptor.device_class = parse_hex_u8(props.device_class.as_deref());
    }

    if let (Some(class), Some(subclass), Some(protocol)) = (
        parse_hex_u8(props.interface_class.as_deref()),
        parse_hex_u8(props.interface_subclass.as_deref()),
        parse_hex_u8(props.interface_protocol.as_deref()),
    ) {
        descriptor = descriptor.with_interface_class(class, subclass, protocol);
    }

    if let (Some(vendor), Some(product)) = (
        parse_hex_u16(props.vendor_id.as_deref()),
        parse_hex_u16(props.product_id.as_deref()),
    ) {
        descriptor = descriptor.with_ids(vendor, product);
    }

    if let Some(name) = props.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        descriptor = descriptor.with_name(name);
    }

    if let Some(caps) = capabilities(props) {
        if has_keyboard_layout(&caps) {
            descriptor = descriptor.with_primary_usage(GENERIC_DESKTOP_PAGE, GENERIC_DESKTOP_KEYBOARD);
        }
    }

    descriptor
}

/// Key capabilities advertised by the node, if both bitmasks were readable
pub fn capabilities(props: &NodeProperties) -> Option<DeviceCapabilities> {
    let ev = parse_bitmask(props.ev_bits.as_deref()?)?;
    let keys = parse_bitmask(props.key_bits.as_deref()?)?;
    Some(DeviceCapabilities::new(ev.contains(&EV_KEY_BIT), keys))
}

/// Parse a sysfs hex attribute such as `idVendor` (`046d`) or `bDeviceClass` (`09`)
pub fn parse_hex_u16(value: Option<&str>) -> Option<u16> {
    let value = value?.trim();
    let value = value.strip_prefix("0x").unwrap_or(value);
    u16::from_str_radix(value, 16).ok()
}

pub fn parse_hex_u8(value: Option<&str>) -> Option<u8> {
    parse_hex_u16(value).and_then(|v| u8::try_from(v).ok())
}

/// Parse a sysfs capability bitmask into the list of set bit numbers.
///
/// The kernel prints one hex word per `long`, most significant word first,
/// separated by spaces, with leading zero words omitted.
pub fn parse_bitmask(value: &str) -> Option<Vec<u16>> {
    let word_bits = usize::BITS as usize;
    let mut bits = Vec::new();

    for (index, word) in value.split_whitespace().rev().enumerate() {
        let word = u64::from_str_radix(word, 16).ok()?;
        for bit in 0..word_bits.min(64) {
            if word & (1u64 << bit) != 0 {
                let number = index * word_bits + bit;
                bits.push(u16::try_from(number).ok()?);
            }
        }
    }

    bits.sort_unstable();
    Some(bits)
}
