//! Timing configuration for a backup session.

use std::time::Duration;

use super::completion::CompletionStrategy;

/// Timeouts and polling knobs for a session.
///
/// Every wait in the driver is bounded by one of these values; there are
/// no fixed sleeps.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Connection timeout, and the longest a dump may take to produce its
    /// first byte.
    pub timeout: Duration,

    /// How long to wait for each login or escalation prompt.
    pub prompt_timeout: Duration,

    /// How long to wait for the prompt after disabling paging.
    pub paging_timeout: Duration,

    /// Upper bound for each read while collecting.
    pub poll_interval: Duration,

    /// Idle time that ends a dump under quiescence.
    pub idle_window: Duration,

    /// Longest the whole dump may take.
    pub collection_timeout: Duration,

    /// Overrides the family's completion strategy.
    pub completion: Option<CompletionStrategy>,

    /// Bytes from the end of the buffer searched for prompts.
    pub search_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            prompt_timeout: Duration::from_secs(5),
            paging_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
            idle_window: Duration::from_secs(2),
            collection_timeout: Duration::from_secs(120),
            completion: None,
            search_depth: 1000,
        }
    }
}
