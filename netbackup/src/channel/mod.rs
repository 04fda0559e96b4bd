//! Channel layer for prompt matching.
//!
//! This module handles the prompt-phase side of a session: accumulating
//! output, stripping ANSI escapes, and tail-searching for prompts.

mod ansi;
mod buffer;

pub use ansi::AnsiStripper;
pub use buffer::PatternBuffer;
