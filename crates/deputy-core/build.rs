use std::env;
use std::fs::File;
use std::io::Write;
use std::path::Path;

fn main() {
    let out_dir = env::var("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("usage_codes.rs");
    let mut f = File::create(&dest_path).unwrap();

    // Generate the KeyUsage newtype wrapper
    writeln!(
        f,
        r#"
/// A usage code on the HID Keyboard/Keypad page (0x07).
///
/// Newtype over u16 so usage codes are never confused with Linux key codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct KeyUsage(pub u16);

impl KeyUsage {{
    /// Get the raw usage code
    pub fn code(self) -> u16 {{
        self.0
    }}

    /// Get the name of this usage
    pub fn name(self) -> &'static str {{
        usage_name(self.0)
    }}
}}

impl From<u16> for KeyUsage {{
    fn from(code: u16) -> Self {{
        KeyUsage(code)
    }}
}}

impl From<KeyUsage> for u16 {{
    fn from(usage: KeyUsage) -> Self {{
        usage.0
    }}
}}

impl fmt::Display for KeyUsage {{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {{
        write!(f, "{{}}", self.name())
    }}
}}

impl FromStr for KeyUsage {{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {{
        usage_from_name(s).ok_or_else(|| format!("Unknown key: {{}}", s))
    }}
}}
"#
    )
    .unwrap();

    println!("cargo:rerun-if-changed=build.rs");
}
