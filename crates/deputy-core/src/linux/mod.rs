// Deputy Linux Host Module
// evdev/udev backend for the host seam

mod descriptor;
mod scan;

#[cfg(feature = "linux-host")]
mod host;

pub use descriptor::{build_descriptor, capabilities, parse_bitmask, NodeProperties};
pub use scan::{DecodedUsage, ScanDecoder};

#[cfg(feature = "linux-host")]
pub use host::{enumerate_candidates, GrabHandle, LinuxDevice, LinuxHost};
