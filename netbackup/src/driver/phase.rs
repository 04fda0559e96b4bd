//! Session phases.

use std::fmt;

/// The logical phase of a backup session.
///
/// ```text
/// Connecting → Authenticating → AwaitingUserPrompt → Escalating
///            → SuppressingPaging → IssuingCommand → Collecting → Done
/// ```
///
/// `Failed` is reachable from every non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Connecting,
    Authenticating,
    AwaitingUserPrompt,
    Escalating,
    SuppressingPaging,
    IssuingCommand,
    Collecting,
    Done,
    Failed,
}

impl Phase {
    /// Whether the session can no longer change phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Connecting => "connecting",
            Phase::Authenticating => "authenticating",
            Phase::AwaitingUserPrompt => "waiting for the command prompt",
            Phase::Escalating => "escalating privilege",
            Phase::SuppressingPaging => "disabling paging",
            Phase::IssuingCommand => "issuing the dump command",
            Phase::Collecting => "collecting output",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(s)
    }
}
