// Deputy Engine Module
// Enumeration watcher, seizure manager and the serial engine driving them

mod driver;
mod notice;
mod seize;
mod watcher;

pub use driver::{Engine, EngineConfig, EngineError, EngineResult};
pub use notice::Notice;
pub use seize::{attempt_seize, SeizeFailure};
pub use watcher::EnumerationWatcher;
