// Deputy Key Usage Type
// Keyboard/Keypad page usage codes and their Linux key code mapping

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

include!(concat!(env!("OUT_DIR"), "/usage_codes.rs"));

/// Keyboard/Keypad usage page
pub const KEYBOARD_USAGE_PAGE: u16 = 0x07;

/// Lowest usage code that denotes a real key (KEY_A)
pub const FIRST_KEY_USAGE: u16 = 4;

/// Highest usage code that denotes a real key (RIGHT_META)
pub const LAST_KEY_USAGE: u16 = 231;

const LETTERS: [&str; 26] = [
    "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q", "R",
    "S", "T", "U", "V", "W", "X", "Y", "Z",
];

const DIGITS: [&str; 10] = [
    "KEY_1", "KEY_2", "KEY_3", "KEY_4", "KEY_5", "KEY_6", "KEY_7", "KEY_8", "KEY_9", "KEY_0",
];

const F1_F12: [&str; 12] = [
    "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "F11", "F12",
];

const F13_F24: [&str; 12] = [
    "F13", "F14", "F15", "F16", "F17", "F18", "F19", "F20", "F21", "F22", "F23", "F24",
];

const KEYPAD_DIGITS: [&str; 10] = [
    "KP1", "KP2", "KP3", "KP4", "KP5", "KP6", "KP7", "KP8", "KP9", "KP0",
];

const MODIFIERS: [&str; 8] = [
    "LEFT_CTRL",
    "LEFT_SHIFT",
    "LEFT_ALT",
    "LEFT_META",
    "RIGHT_CTRL",
    "RIGHT_SHIFT",
    "RIGHT_ALT",
    "RIGHT_META",
];

/// Display name for a keyboard-page usage code
pub fn usage_name(code: u16) -> &'static str {
    static USAGE_NAMES: OnceLock<Vec<&'static str>> = OnceLock::new();
    let names = USAGE_NAMES.get_or_init(|| {
        let mut names = vec!["UNKNOWN"; 0x100];
        names[0x00] = "RESERVED";
        names[0x01] = "ERROR_ROLLOVER";
        names[0x02] = "POST_FAIL";
        names[0x03] = "ERROR_UNDEFINED";
        for (i, &name) in LETTERS.iter().enumerate() {
            names[0x04 + i] = name;
        }
        for (i, &name) in DIGITS.iter().enumerate() {
            names[0x1E + i] = name;
        }
        names[0x28] = "ENTER";
        names[0x29] = "ESC";
        names[0x2A] = "BACKSPACE";
        names[0x2B] = "TAB";
        names[0x2C] = "SPACE";
        names[0x2D] = "MINUS";
        names[0x2E] = "EQUAL";
        names[0x2F] = "LEFT_BRACE";
        names[0x30] = "RIGHT_BRACE";
        names[0x31] = "BACKSLASH";
        names[0x32] = "NONUS_HASH";
        names[0x33] = "SEMICOLON";
        names[0x34] = "APOSTROPHE";
        names[0x35] = "GRAVE";
        names[0x36] = "COMMA";
        names[0x37] = "DOT";
        names[0x38] = "SLASH";
        names[0x39] = "CAPSLOCK";
        for (i, &name) in F1_F12.iter().enumerate() {
            names[0x3A + i] = name;
        }
        names[0x46] = "SYSRQ";
        names[0x47] = "SCROLLLOCK";
        names[0x48] = "PAUSE";
        names[0x49] = "INSERT";
        names[0x4A] = "HOME";
        names[0x4B] = "PAGE_UP";
        names[0x4C] = "DELETE";
        names[0x4D] = "END";
        names[0x4E] = "PAGE_DOWN";
        names[0x4F] = "RIGHT";
        names[0x50] = "LEFT";
        names[0x51] = "DOWN";
        names[0x52] = "UP";
        names[0x53] = "NUMLOCK";
        names[0x54] = "KPSLASH";
        names[0x55] = "KPASTERISK";
        names[0x56] = "KPMINUS";
        names[0x57] = "KPPLUS";
        names[0x58] = "KPENTER";
        for (i, &name) in KEYPAD_DIGITS.iter().enumerate() {
            names[0x59 + i] = name;
        }
        names[0x63] = "KPDOT";
        names[0x64] = "KEY_102ND";
        names[0x65] = "COMPOSE";
        names[0x66] = "POWER";
        names[0x67] = "KPEQUAL";
        for (i, &name) in F13_F24.iter().enumerate() {
            names[0x68 + i] = name;
        }
        for (i, &name) in MODIFIERS.iter().enumerate() {
            names[0xE0 + i] = name;
        }
        names
    });
    names.get(code as usize).copied().unwrap_or("UNKNOWN")
}

/// Look up a keyboard-page usage by name (case-insensitive)
pub fn usage_from_name(name: &str) -> Option<KeyUsage> {
    let name_upper = name.trim().to_uppercase();
    if name_upper.is_empty() {
        return None;
    }

    let alias = match name_upper.as_str() {
        "ESCAPE" => Some(0x29),
        "RETURN" => Some(0x28),
        "1" => Some(0x1E),
        "2" => Some(0x1F),
        "3" => Some(0x20),
        "4" => Some(0x21),
        "5" => Some(0x22),
        "6" => Some(0x23),
        "7" => Some(0x24),
        "8" => Some(0x25),
        "9" => Some(0x26),
        "0" => Some(0x27),
        _ => None,
    };
    if let Some(code) = alias {
        return Some(KeyUsage(code));
    }

    (0u16..0x100)
        .find(|&code| {
            let known = usage_name(code);
            known != "UNKNOWN" && known == name_upper
        })
        .map(KeyUsage)
}

/// Whether a usage code names a real key on the keyboard page
pub fn is_key_usage(code: u16) -> bool {
    (FIRST_KEY_USAGE..=LAST_KEY_USAGE).contains(&code)
}

// HID keyboard usage -> Linux key code, as the kernel's boot keyboard driver maps it.
// Only the range up to RIGHT_META is kept; later entries are vendor media keys.
#[rustfmt::skip]
const USAGE_TO_LINUX_KEYCODE: [u8; 232] = [
      0,  0,  0,  0, 30, 48, 46, 32, 18, 33, 34, 35, 23, 36, 37, 38,
     50, 49, 24, 25, 16, 19, 31, 20, 22, 47, 17, 45, 21, 44,  2,  3,
      4,  5,  6,  7,  8,  9, 10, 11, 28,  1, 14, 15, 57, 12, 13, 26,
     27, 43, 43, 39, 40, 41, 51, 52, 53, 58, 59, 60, 61, 62, 63, 64,
     65, 66, 67, 68, 87, 88, 99, 70,119,110,102,104,111,107,109,106,
    105,108,103, 69, 98, 55, 74, 78, 96, 79, 80, 81, 75, 76, 77, 71,
     72, 73, 82, 83, 86,127,116,117,183,184,185,186,187,188,189,190,
    191,192,193,194,134,138,130,132,128,129,131,137,133,135,136,113,
    115,114,  0,  0,  0,121,  0, 89, 93,124, 92, 94, 95,  0,  0,  0,
    122,123, 90, 91, 85,  0,  0,  0,  0,  0,  0,  0,111,  0,  0,  0,
      0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,
      0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,
      0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,
      0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,
     29, 42, 56,125, 97, 54,100,126,
];

/// Translate a Linux key code back to its keyboard-page usage.
///
/// Used when a device reports EV_KEY without a preceding MSC_SCAN.
/// Where two usages share a key code the lower usage wins.
pub fn usage_from_linux_keycode(keycode: u16) -> Option<KeyUsage> {
    static REVERSE: OnceLock<Vec<u16>> = OnceLock::new();
    let reverse = REVERSE.get_or_init(|| {
        let mut reverse = vec![0u16; 0x100];
        for (usage, &code) in USAGE_TO_LINUX_KEYCODE.iter().enumerate() {
            if code != 0 && reverse[code as usize] == 0 {
                reverse[code as usize] = usage as u16;
            }
        }
        reverse
    });

    match reverse.get(keycode as usize) {
        Some(&usage) if usage != 0 => Some(KeyUsage(usage)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_names() {
        assert_eq!(usage_name(0x04), "A");
        assert_eq!(usage_name(0x1D), "Z");
        assert_eq!(usage_name(0x1E), "KEY_1");
        assert_eq!(usage_name(0x27), "KEY_0");
        assert_eq!(usage_name(0x45), "F12");
        assert_eq!(usage_name(0x73), "F24");
        assert_eq!(usage_name(0xE7), "RIGHT_META");
        assert_eq!(usage_name(0x1234), "UNKNOWN");
    }

    #[test]
    fn test_usage_from_name() {
        assert_eq!(usage_from_name("a"), Some(KeyUsage(4)));
        assert_eq!(usage_from_name("F12"), Some(KeyUsage(0x45)));
        assert_eq!(usage_from_name("escape"), Some(KeyUsage(0x29)));
        assert_eq!(usage_from_name("1"), Some(KeyUsage(0x1E)));
        assert_eq!(usage_from_name("right_meta"), Some(KeyUsage(0xE7)));
        assert_eq!(usage_from_name("unknown"), None);
        assert_eq!(usage_from_name("not_a_key"), None);
        assert_eq!(usage_from_name(""), None);
    }

    #[test]
    fn test_key_usage_from_str() {
        let usage: KeyUsage = "f".parse().unwrap();
        assert_eq!(usage.code(), 0x09);
        assert_eq!(usage.to_string(), "F");
        assert!("bogus".parse::<KeyUsage>().is_err());
    }

    #[test]
    fn test_key_usage_range() {
        assert!(!is_key_usage(3));
        assert!(is_key_usage(4));
        assert!(is_key_usage(231));
        assert!(!is_key_usage(232));
    }

    #[test]
    fn test_linux_keycode_translation() {
        assert_eq!(usage_from_linux_keycode(30), Some(KeyUsage(0x04))); // KEY_A
        assert_eq!(usage_from_linux_keycode(44), Some(KeyUsage(0x1D))); // KEY_Z
        assert_eq!(usage_from_linux_keycode(28), Some(KeyUsage(0x28))); // KEY_ENTER
        assert_eq!(usage_from_linux_keycode(29), Some(KeyUsage(0xE0))); // KEY_LEFTCTRL
        assert_eq!(usage_from_linux_keycode(126), Some(KeyUsage(0xE7))); // KEY_RIGHTMETA
        assert_eq!(usage_from_linux_keycode(43), Some(KeyUsage(0x31))); // shared with NONUS_HASH
        assert_eq!(usage_from_linux_keycode(0), None);
        assert_eq!(usage_from_linux_keycode(272), None); // BTN_LEFT
    }
}
