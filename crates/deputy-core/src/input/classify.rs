// Deputy Input Layer - Device Classifier
// Decides whether a candidate is a keyboard-like HID endpoint worth seizing

use super::device::{
    DeviceDescriptor, Transport, GENERIC_DESKTOP_KEYBOARD, GENERIC_DESKTOP_PAGE,
    HID_PROTOCOL_KEYBOARD, HID_SUBCLASS_BOOT, USB_CLASS_HID,
};

/// Outcome of classifying a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Keyboard,
    NotKeyboard,
}

/// Which descriptor fields a device is matched on.
///
/// One level is selected per engine; the two are never mixed for a device.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MatchLevel {
    /// USB transport and a Generic Desktop / Keyboard top-level collection
    #[default]
    Device,
    /// HID interface with Boot subclass and Keyboard protocol
    Interface,
}

/// Classify a candidate under the given matching level.
///
/// Hubs are rejected before any usage field is looked at. Missing fields
/// fail closed.
pub fn classify(descriptor: &DeviceDescriptor, level: MatchLevel) -> Classification {
    if descriptor.is_hub() {
        return Classification::NotKeyboard;
    }

    let matched = match level {
        MatchLevel::Device => {
            descriptor.transport == Some(Transport::Usb)
                && descriptor.primary_usage_page == Some(GENERIC_DESKTOP_PAGE)
                && descriptor.primary_usage == Some(GENERIC_DESKTOP_KEYBOARD)
        }
        MatchLevel::Interface => {
            descriptor.interface_class == Some(USB_CLASS_HID)
                && descriptor.interface_subclass == Some(HID_SUBCLASS_BOOT)
                && descriptor.interface_protocol == Some(HID_PROTOCOL_KEYBOARD)
        }
    };

    if matched {
        Classification::Keyboard
    } else {
        Classification::NotKeyboard
    }
}
