//! Cisco IOS and NX-OS dialects.
//!
//! Both families start in user exec mode (`>`) or, depending on AAA
//! configuration, directly in privileged exec (`#`). `enable` escalates.
//!
//! # Prompt Examples
//!
//! ```text
//! router>                   # user exec
//! router#                   # privileged exec
//! router(config)#           # configuration mode (never expected here)
//! ```
//!
//! The dump ends at the privileged prompt, so prompt-sighting is used. The
//! unprivileged prompt also terminates the dump, which covers a device that
//! rejected the escalation and answered with an error.

use std::sync::LazyLock;

use super::{LOGIN_PROMPT, LOGIN_REJECTED, PASSWORD_PROMPT};
use crate::dialect::{DeviceFamily, Dialect, Escalation, pattern};
use crate::driver::CompletionStrategy;

/// Any exec prompt, user or privileged.
const USER_PROMPT: &str = r"(?:^|\n)[\w.\-@/:()]{1,63}[>#]\s*$";

/// Privileged exec prompt. Parentheses are excluded so that configuration
/// mode prompts do not match.
const PRIVILEGED_PROMPT: &str = r"(?:^|\n)[\w.\-@/:]{1,63}#\s*$";

/// Prompt ending a configuration dump.
const TERMINAL_PROMPT: &str = r"(?:^|\n)(?P<prompt>[\w.\-@/:]{1,63}[>#]\s*)$";

static IOS: LazyLock<Dialect> = LazyLock::new(|| build(DeviceFamily::CiscoIos, "show running-config"));

static NXOS: LazyLock<Dialect> =
    LazyLock::new(|| build(DeviceFamily::CiscoNxos, "show running-config | no-more"));

fn build(family: DeviceFamily, dump_command: &'static str) -> Dialect {
    Dialect {
        family,
        login_prompt: pattern(LOGIN_PROMPT),
        password_prompt: pattern(PASSWORD_PROMPT),
        login_rejected: pattern(LOGIN_REJECTED),
        user_prompt: pattern(USER_PROMPT),
        escalation: Some(Escalation {
            command: "enable",
            password_prompt: pattern(PASSWORD_PROMPT),
            privileged_prompt: pattern(PRIVILEGED_PROMPT),
        }),
        paging_command: "terminal length 0",
        dump_command,
        terminal_prompt: pattern(TERMINAL_PROMPT),
        completion: CompletionStrategy::PromptSighting,
        exit_command: "exit",
    }
}

/// The Cisco IOS dialect.
pub fn ios() -> &'static Dialect {
    &IOS
}

/// The Cisco NX-OS dialect.
pub fn nxos() -> &'static Dialect {
    &NXOS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_prompt_match() {
        let d = ios();
        assert!(d.user_prompt.is_match(b"router>"));
        assert!(d.user_prompt.is_match(b"\r\nrouter> "));
        assert!(d.user_prompt.is_match(b"Banner text\r\nsw-01.lab#"));
        assert!(!d.user_prompt.is_match(b"Password: "));
        assert!(!d.user_prompt.is_match(b"router> show"));
    }

    #[test]
    fn test_privileged_prompt_match() {
        let esc = ios().escalation.as_ref().unwrap();
        assert!(esc.privileged_prompt.is_match(b"router#"));
        assert!(esc.privileged_prompt.is_match(b"enable\r\nrouter# "));
        assert!(!esc.privileged_prompt.is_match(b"router>"));
        assert!(!esc.privileged_prompt.is_match(b"router(config)#"));
    }

    #[test]
    fn test_terminal_prompt_captures_prompt_text() {
        let d = ios();
        let data = b"hostname router\n!\nend\nrouter#";
        let caps = d.terminal_prompt.captures(data).unwrap();
        let prompt = caps.name("prompt").unwrap();
        assert_eq!(prompt.as_bytes(), b"router#");
        assert_eq!(&data[..prompt.start()], b"hostname router\n!\nend\n");
    }

    #[test]
    fn test_terminal_prompt_ignores_config_lines() {
        let d = ios();
        assert!(!d.terminal_prompt.is_match(b"banner motd ^C ### ^C\n"));
        assert!(!d.terminal_prompt.is_match(b" description uplink ->"));
        assert!(!d.terminal_prompt.is_match(b"router#\n interface Gi0/1\n"));
    }

    #[test]
    fn test_dump_commands() {
        assert_eq!(ios().dump_command, "show running-config");
        assert_eq!(nxos().dump_command, "show running-config | no-more");
        assert_eq!(ios().paging_command, "terminal length 0");
        assert_eq!(nxos().completion, CompletionStrategy::PromptSighting);
    }

    #[test]
    fn test_login_prompts() {
        let d = ios();
        assert!(d.login_prompt.is_match(b"User Access Verification\r\n\r\nUsername: "));
        assert!(d.login_prompt.is_match(b"login:"));
        assert!(d.password_prompt.is_match(b"Password: "));
        assert!(d.password_prompt.is_match(b"password:"));
        assert!(d.login_rejected.is_match(b"% Login invalid\r\n"));
        assert!(d.login_rejected.is_match(b"% Authentication failed"));
    }
}
