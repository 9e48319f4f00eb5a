// Deputy Input Layer - Report Filter
// Per-report decision for a monitored session

use super::event::{is_release_trigger, InputEvent};
use crate::usage::KeyUsage;

/// Why a report was dropped without further effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Pointer, consumer-control or vendor page
    NotKeyboardPage,
    /// Reserved or error codes outside [4, 231]
    OutsideKeyRange,
}

/// What the engine should do with a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Dropped(DropReason),
    /// A keyboard report withheld from the system
    Swallowed,
    /// The release key was pressed; the session should be released
    ReleaseRequested,
}

/// Filters reports of monitored sessions against the release key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportFilter {
    release_key: KeyUsage,
}

impl ReportFilter {
    pub fn new(release_key: KeyUsage) -> Self {
        Self { release_key }
    }

    pub fn release_key(&self) -> KeyUsage {
        self.release_key
    }

    /// Evaluate one report.
    ///
    /// Only called for sessions in the `Monitoring` state.
    pub fn evaluate(&self, event: &InputEvent) -> Verdict {
        if !event.is_keyboard_page() {
            return Verdict::Dropped(DropReason::NotKeyboardPage);
        }
        if !event.is_key() {
            return Verdict::Dropped(DropReason::OutsideKeyRange);
        }
        if is_release_trigger(event, self.release_key) {
            return Verdict::ReleaseRequested;
        }
        Verdict::Swallowed
    }
}
