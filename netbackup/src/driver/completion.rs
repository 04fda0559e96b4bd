//! End-of-output detection for the configuration dump.
//!
//! The detector is a pure function of what it is shown: the latest chunk,
//! the tail of everything collected so far, how long the stream has been
//! idle, and the family's strategy. The same trace of chunks and timings
//! always produces the same verdicts.
//!
//! Prompt-sighting has a known limitation: a configuration line that looks
//! exactly like the terminal prompt and happens to end a chunk ends the
//! capture early.

use std::time::Duration;

use regex::bytes::Regex;

/// How the end of a dump is recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStrategy {
    /// The terminal prompt appears at the end of the latest output.
    PromptSighting,

    /// No bytes arrive for an idle window after output started flowing.
    Quiescence,
}

/// What the detector is shown after each read.
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    /// Bytes returned by the latest read (may be empty).
    pub chunk: &'a [u8],

    /// The last bytes of the collected output with escapes stripped,
    /// ending with `chunk`.
    pub tail: &'a [u8],

    /// Time since the last chunk of body output arrived.
    pub idle: Duration,

    /// Body bytes collected so far, not counting the command echo.
    pub collected: usize,
}

/// The detector's decision for one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Keep reading.
    Continue,

    /// The terminal prompt ends the output; the last `prompt_len` bytes of
    /// the tail are prompt text, not configuration.
    PromptSighted { prompt_len: usize },

    /// The stream has been idle for the whole window.
    Quiescent,
}

impl Verdict {
    /// Whether this verdict ends collection.
    pub fn is_complete(self) -> bool {
        !matches!(self, Verdict::Continue)
    }
}

/// Decides when a configuration dump is finished.
#[derive(Debug, Clone)]
pub struct CompletionDetector {
    strategy: CompletionStrategy,
    terminal_prompt: Regex,
    idle_window: Duration,
}

impl CompletionDetector {
    /// Create a detector.
    ///
    /// `terminal_prompt` must be anchored at the end of input and may expose
    /// the prompt text as a `prompt` capture group; without the group the
    /// whole match counts as prompt.
    pub fn new(strategy: CompletionStrategy, terminal_prompt: Regex, idle_window: Duration) -> Self {
        Self {
            strategy,
            terminal_prompt,
            idle_window,
        }
    }

    /// The strategy in use.
    pub fn strategy(&self) -> CompletionStrategy {
        self.strategy
    }

    /// The quiescence idle window.
    pub fn idle_window(&self) -> Duration {
        self.idle_window
    }

    /// Judge one observation.
    pub fn observe(&self, obs: &Observation<'_>) -> Verdict {
        match self.strategy {
            CompletionStrategy::PromptSighting => {
                if obs.chunk.is_empty() {
                    return Verdict::Continue;
                }
                match self.terminal_prompt.captures(obs.tail) {
                    Some(caps) => {
                        let start = caps
                            .name("prompt")
                            .or_else(|| caps.get(0))
                            .map(|m| m.start())
                            .unwrap_or(obs.tail.len());
                        Verdict::PromptSighted {
                            prompt_len: obs.tail.len() - start,
                        }
                    }
                    None => Verdict::Continue,
                }
            }
            CompletionStrategy::Quiescence => {
                if obs.collected > 0 && obs.chunk.is_empty() && obs.idle >= self.idle_window {
                    Verdict::Quiescent
                } else {
                    Verdict::Continue
                }
            }
        }
    }
}
