//! Cisco IOS / IOS-XE dialect.
//!
//! # Prompt Examples
//!
//! ```text
//! router>                 # user exec
//! router#                 # privileged exec
//! Username:               # AAA login
//! router login:           # console server login
//! ```

use super::DialectDefinition;

/// Create the IOS dialect definition.
pub fn dialect() -> Result<DialectDefinition, regex::Error> {
    Ok(DialectDefinition::new("ios", r"(?:^|\n)[\w.\-@()/:]{1,63}[>#]")?
        .with_username_prompt(r"(?i)([^:\n]* )?login: ?$")?
        .with_failure_pattern("% Invalid input")
        .with_failure_pattern("% Incomplete command")
        .with_failure_pattern("% Ambiguous command")
        .with_failure_pattern("% Unknown command")
        .with_on_open_command("terminal length 0")
        .with_on_open_command("terminal width 0"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ios_prompt_match() {
        let dialect = dialect().unwrap();
        assert!(dialect.prompt.is_match(b"router>"));
        assert!(dialect.prompt.is_match(b"output\nrouter#"));
        assert!(dialect.prompt.is_match(b"core-sw1.lab# "));
        assert!(!dialect.prompt.is_match(b"router#show run"));
        assert!(!dialect.prompt.is_match(b"Password: "));
    }

    #[test]
    fn test_ios_terminal_setup() {
        let dialect = dialect().unwrap();
        assert_eq!(dialect.on_open_commands, vec!["terminal length 0", "terminal width 0"]);
        assert_eq!(dialect.capture_command, "show running-config");
        assert_eq!(dialect.exit_command, "exit");
    }

    #[test]
    fn test_ios_console_login_prompt() {
        let dialect = dialect().unwrap();
        assert!(
            dialect
                .username_prompts
                .iter()
                .any(|p| p.is_match(b"\nrtr-console login: "))
        );
    }
}
