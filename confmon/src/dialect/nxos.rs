//! Cisco NX-OS dialect.

use super::DialectDefinition;

/// Create the NX-OS dialect definition.
pub fn dialect() -> Result<DialectDefinition, regex::Error> {
    Ok(DialectDefinition::new("nxos", r"(?:^|\n)[\w.\-@()/:]{1,63}[>#]")?
        .with_username_prompt(r"(?i)([^:\n]* )?login: ?$")?
        .with_failure_pattern("% Invalid command")
        .with_failure_pattern("% Invalid input")
        .with_failure_pattern("% Incomplete command")
        .with_failure_pattern("% Permission denied")
        .with_on_open_command("terminal length 0")
        .with_on_open_command("terminal width 511"))
}
