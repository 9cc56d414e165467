//! Cisco IOS-XR dialect.
//!
//! # Prompt Examples
//!
//! ```text
//! RP/0/RSP0/CPU0:router#
//! RP/0/RP0/CPU0:pe1.lab#
//! ```

use super::DialectDefinition;

/// Create the IOS-XR dialect definition.
///
/// Exec prompts carry a timestamp line before every command's output
/// unless `terminal exec prompt no-timestamp` is set.
pub fn dialect() -> Result<DialectDefinition, regex::Error> {
    Ok(
        DialectDefinition::new("ios_xr", r"(?:^|\n)(?:RP/\d+/\w+/CPU\d+:)?[\w.\-@()/]{1,63}[>#]")?
            .with_username_prompt(r"(?i)([^:\n]* )?login: ?$")?
            .with_failure_pattern("% Invalid input")
            .with_failure_pattern("% Incomplete command")
            .with_failure_pattern("% Ambiguous command")
            .with_failure_pattern("% This command is not authorized")
            .with_on_open_command("terminal exec prompt no-timestamp")
            .with_on_open_command("terminal length 0")
            .with_on_open_command("terminal width 512"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xr_prompt_match() {
        let dialect = dialect().unwrap();
        assert!(dialect.prompt.is_match(b"\nRP/0/RSP0/CPU0:router#"));
        assert!(dialect.prompt.is_match(b"\nRP/0/RP0/CPU0:pe1.lab# "));
        assert!(dialect.prompt.is_match(b"router#"));
        assert!(!dialect.prompt.is_match(b"RP/0/RSP0/CPU0:router#show run"));
    }

    #[test]
    fn test_xr_disables_timestamps_first() {
        let dialect = dialect().unwrap();
        assert_eq!(
            dialect.on_open_commands.first().map(String::as_str),
            Some("terminal exec prompt no-timestamp")
        );
    }
}
