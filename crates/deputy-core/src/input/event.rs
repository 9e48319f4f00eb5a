// Deputy Input Layer - Input Events
// A single decoded report value from a seized device

use crate::session::SessionId;
use crate::usage::{is_key_usage, KeyUsage, KEYBOARD_USAGE_PAGE};

/// Consumer usage page (media keys, volume)
pub const CONSUMER_USAGE_PAGE: u16 = 0x0C;

/// One input value delivered by the host for a subscribed session.
///
/// Transient: consumed synchronously by the report filter and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub usage_page: u16,
    pub usage: u16,
    /// `true` on key down, `false` on key up
    pub asserted: bool,
    pub session: SessionId,
}

impl InputEvent {
    pub fn new(session: SessionId, usage_page: u16, usage: u16, asserted: bool) -> Self {
        Self {
            usage_page,
            usage,
            asserted,
            session,
        }
    }

    /// Keyboard-page event for a key usage
    pub fn key(session: SessionId, usage: KeyUsage, asserted: bool) -> Self {
        Self::new(session, KEYBOARD_USAGE_PAGE, usage.code(), asserted)
    }

    /// Whether the event is on the keyboard usage page
    pub fn is_keyboard_page(&self) -> bool {
        self.usage_page == KEYBOARD_USAGE_PAGE
    }

    /// Whether the event is a regular key on the keyboard page
    pub fn is_key(&self) -> bool {
        self.is_keyboard_page() && is_key_usage(self.usage)
    }
}

/// Check if an event is the designated release key being pressed.
///
/// Key-up of the release key never triggers; neither does the same usage
/// code on another page.
pub fn is_release_trigger(event: &InputEvent, release_key: KeyUsage) -> bool {
    event.is_key() && event.usage == release_key.code() && event.asserted
}
