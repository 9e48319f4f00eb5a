// Deputy Linux Host - Report Decoding
// Pairs MSC_SCAN with EV_KEY to recover HID usages from evdev frames

use crate::usage::{usage_from_linux_keycode, KEYBOARD_USAGE_PAGE};

pub const EV_SYN: u16 = 0x00;
pub const EV_KEY: u16 = 0x01;
pub const EV_MSC: u16 = 0x04;
pub const MSC_SCAN: u16 = 0x04;

/// A decoded report value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedUsage {
    pub usage_page: u16,
    pub usage: u16,
    pub asserted: bool,
}

/// Per-node decoder state.
///
/// usbhid emits `MSC_SCAN` carrying `(page << 16) | usage` right before the
/// matching `EV_KEY`. Devices that skip the scan code fall back to a
/// key code translation onto the keyboard page.
#[derive(Debug, Default)]
pub struct ScanDecoder {
    pending_scan: Option<u32>,
}

impl ScanDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw evdev event, returning a usage for key presses and releases
    pub fn feed(&mut self, kind: u16, code: u16, value: i32) -> Option<DecodedUsage> {
        match kind {
            EV_MSC if code == MSC_SCAN => {
                self.pending_scan = Some(value as u32);
                None
            }
            EV_KEY => {
                let scan = self.pending_scan.take();
                // Auto-repeat
                if value == 2 {
                    return None;
                }
                let asserted = value == 1;

                match scan {
                    Some(scan) if scan >> 16 != 0 => Some(DecodedUsage {
                        usage_page: (scan >> 16) as u16,
                        usage: (scan & 0xFFFF) as u16,
                        asserted,
                    }),
                    _ => {
                        let usage = usage_from_linux_keycode(code)?;
                        Some(DecodedUsage {
                            usage_page: KEYBOARD_USAGE_PAGE,
                            usage: usage.code(),
                            asserted,
                        })
                    }
                }
            }
            EV_SYN => {
                self.pending_scan = None;
                None
            }
            _ => None,
        }
    }
}
