//! Fallback dialect for devices with a conventional CLI.
//!
//! Accepts any short last line ending in `>`, `#`, `$` or `%` as a prompt
//! and runs no terminal setup.

use super::DialectDefinition;

/// Create the generic dialect definition.
pub fn dialect() -> Result<DialectDefinition, regex::Error> {
    Ok(DialectDefinition::new("generic", r"(?:^|\n)[^\n]{0,80}[>#$%]")?
        .with_failure_pattern("% Invalid input"))
}
