// Deputy Core Library
// Seizes newly attached keyboards until the user confirms them

pub mod config;
pub mod engine;
pub mod host;
pub mod input;
pub mod linux;
pub mod session;
pub mod usage;

pub use config::{Config, ConfigError};
pub use engine::{
    attempt_seize, Engine, EngineConfig, EngineError, EngineResult, EnumerationWatcher, Notice,
    SeizeFailure,
};
pub use host::{Candidate, Host, HostError, HostEvent, OpenError};
pub use input::{
    classify, is_release_trigger, Classification, DeviceDescriptor, DeviceIdentity, InputEvent,
    MatchLevel, ReportFilter, Transport, Verdict,
};
pub use session::{
    RegistryError, Session, SessionId, SessionRegistry, SessionState, SessionSummary,
    SessionWatch,
};
pub use usage::KeyUsage;

#[cfg(feature = "linux-host")]
pub use linux::{enumerate_candidates, LinuxDevice, LinuxHost};
