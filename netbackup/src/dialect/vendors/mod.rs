//! Built-in vendor dialects.

pub mod cisco;
pub mod juniper;

/// Username prompt shared by all built-in dialects.
pub(crate) const LOGIN_PROMPT: &str = r"(?i)(?:user ?name|login)\s*:\s*$";

/// Password prompt shared by all built-in dialects.
pub(crate) const PASSWORD_PROMPT: &str = r"(?i)password\s*:\s*$";

/// Login rejection messages seen on Cisco and Juniper devices.
pub(crate) const LOGIN_REJECTED: &str = r"(?im)^\s*(?:%\s*(?:login invalid|authentication failed|bad passwords|access denied)|login incorrect)";
