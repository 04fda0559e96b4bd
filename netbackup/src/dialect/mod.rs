//! Dialect definitions for multi-vendor support.
//!
//! A [`Dialect`] holds everything the session driver needs to know about a
//! device family's command line: prompt patterns, the privilege escalation
//! command, the paging and dump commands, and how to tell that the dump has
//! finished. Dialects are static and looked up once per session.

pub mod vendors;

use std::fmt;
use std::str::FromStr;

use regex::bytes::Regex;

use crate::driver::CompletionStrategy;
use crate::error::DialectError;

/// Supported device command-line families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceFamily {
    /// Cisco IOS / IOS-XE.
    CiscoIos,
    /// Cisco NX-OS.
    CiscoNxos,
    /// Juniper JUNOS.
    Juniper,
}

impl DeviceFamily {
    /// All supported families.
    pub const ALL: [DeviceFamily; 3] = [
        DeviceFamily::CiscoIos,
        DeviceFamily::CiscoNxos,
        DeviceFamily::Juniper,
    ];

    /// Canonical name, as accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceFamily::CiscoIos => "cisco_ios",
            DeviceFamily::CiscoNxos => "cisco_nxos",
            DeviceFamily::Juniper => "juniper",
        }
    }
}

impl fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceFamily {
    type Err = DialectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cisco_ios" | "ios" => Ok(DeviceFamily::CiscoIos),
            "cisco_nxos" | "nxos" => Ok(DeviceFamily::CiscoNxos),
            "juniper" | "juniper_junos" | "junos" => Ok(DeviceFamily::Juniper),
            _ => Err(DialectError::UnsupportedFamily {
                name: s.to_string(),
            }),
        }
    }
}

/// Privilege escalation for families with a distinct privileged mode.
#[derive(Debug, Clone)]
pub struct Escalation {
    /// Command that requests privileged mode (e.g. `enable`).
    pub command: &'static str,

    /// Prompt asking for the escalation secret.
    pub password_prompt: Regex,

    /// Prompt shown once privileged mode is reached.
    pub privileged_prompt: Regex,
}

/// Static prompt and command knowledge for one device family.
#[derive(Debug, Clone)]
pub struct Dialect {
    /// The family this dialect describes.
    pub family: DeviceFamily,

    /// Username prompt (plaintext login only).
    pub login_prompt: Regex,

    /// Password prompt (plaintext login only).
    pub password_prompt: Regex,

    /// Messages that mean the login was rejected.
    pub login_rejected: Regex,

    /// Base command prompt in any mode.
    pub user_prompt: Regex,

    /// Privilege escalation, `None` for families without a privileged mode.
    pub escalation: Option<Escalation>,

    /// Command that disables output paging.
    pub paging_command: &'static str,

    /// Command that dumps the configuration.
    pub dump_command: &'static str,

    /// Prompt that ends the dump. Must be anchored at the end of input and
    /// expose the prompt text as the `prompt` capture group.
    pub terminal_prompt: Regex,

    /// How the end of the dump is detected.
    pub completion: CompletionStrategy,

    /// Command that ends the session gracefully.
    pub exit_command: &'static str,
}

/// Look up the dialect for a device family.
pub fn dialect_for(family: DeviceFamily) -> &'static Dialect {
    match family {
        DeviceFamily::CiscoIos => vendors::cisco::ios(),
        DeviceFamily::CiscoNxos => vendors::cisco::nxos(),
        DeviceFamily::Juniper => vendors::juniper::junos(),
    }
}

/// Compile a built-in prompt pattern.
pub(crate) fn pattern(p: &str) -> Regex {
    Regex::new(p).expect("built-in prompt pattern must compile")
}
