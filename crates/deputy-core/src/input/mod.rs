// Deputy Input Layer
// Device classification and report filtering

mod classify;
mod device;
mod event;
mod filter;

pub use classify::{classify, Classification, MatchLevel};
pub use device::{
    has_keyboard_layout, DeviceCapabilities, DeviceDescriptor, DeviceIdentity, Transport,
    GENERIC_DESKTOP_KEYBOARD, GENERIC_DESKTOP_PAGE, HID_PROTOCOL_KEYBOARD, HID_SUBCLASS_BOOT,
    USB_CLASS_HID, USB_CLASS_HUB,
};
pub use event::{is_release_trigger, InputEvent, CONSUMER_USAGE_PAGE};
pub use filter::{DropReason, ReportFilter, Verdict};
