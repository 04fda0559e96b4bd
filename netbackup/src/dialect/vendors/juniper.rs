//! Juniper JUNOS dialect.
//!
//! Operational mode has no separate privileged level, so escalation is
//! skipped.
//!
//! # Prompt Examples
//!
//! ```text
//! user@router>              # operational mode
//! {master:0}                # routing-engine indicator (separate line)
//! user@router>              # operational prompt on next line
//! ```
//!
//! Configuration output is full of `{`, `}` and `#` characters, so a
//! terminal prompt cannot be told apart from the body reliably. The dump is
//! finished by quiescence instead.

use std::sync::LazyLock;

use super::{LOGIN_PROMPT, LOGIN_REJECTED, PASSWORD_PROMPT};
use crate::dialect::{DeviceFamily, Dialect, pattern};
use crate::driver::CompletionStrategy;

const USER_PROMPT: &str = r"(?:^|\n)[\w.\-@/:()]{1,63}>\s*$";

const TERMINAL_PROMPT: &str = r"(?:^|\n)(?P<prompt>[\w.\-@/:()]{1,63}>\s*)$";

static JUNOS: LazyLock<Dialect> = LazyLock::new(|| Dialect {
    family: DeviceFamily::Juniper,
    login_prompt: pattern(LOGIN_PROMPT),
    password_prompt: pattern(PASSWORD_PROMPT),
    login_rejected: pattern(LOGIN_REJECTED),
    user_prompt: pattern(USER_PROMPT),
    escalation: None,
    paging_command: "set cli screen-length 0",
    dump_command: "show configuration | no-more",
    terminal_prompt: pattern(TERMINAL_PROMPT),
    completion: CompletionStrategy::Quiescence,
    exit_command: "exit",
});

/// The Juniper JUNOS dialect.
pub fn junos() -> &'static Dialect {
    &JUNOS
}
