//! Dialect definition: everything device-type specific about a session.

use std::fmt;

use regex::bytes::Regex;

use crate::channel::patterns::compile_prompt_pattern;
use crate::transport::Protocol;

/// Username prompts understood by every dialect.
const USERNAME_PROMPT: &str = r"(?i)(?:user ?name|user id|login)[^\n:]*:\s?$";

/// Password prompts understood by every dialect.
const PASSWORD_PROMPT: &str = r"(?i)pass(?:word|code)[^\n:]*:\s?$";

/// Messages a device prints when it rejects the credentials.
const LOGIN_FAILURE: &str =
    r"(?i)(?:login invalid|login incorrect|authentication failed|access denied|bad passwords?)";

/// Prompt patterns, command quirks and login behavior of one device family.
#[derive(Clone)]
pub struct DialectDefinition {
    /// Dialect name (e.g., "ios", "nxos").
    pub name: String,

    /// Patterns for the username prompt.
    pub username_prompts: Vec<Regex>,

    /// Patterns for the password prompt.
    pub password_prompts: Vec<Regex>,

    /// Pattern for the command prompt once logged in.
    pub prompt: Regex,

    /// Patterns the device prints when login fails.
    pub login_failures: Vec<Regex>,

    /// Output substrings that mark a failed command.
    pub failed_when_contains: Vec<String>,

    /// Terminal setup commands run after login.
    pub on_open_commands: Vec<String>,

    /// Command that prints the running configuration.
    pub capture_command: String,

    /// Command that ends the session.
    pub exit_command: String,

    /// Protocols this dialect can be driven over.
    pub protocols: Vec<Protocol>,
}

impl DialectDefinition {
    /// Create a dialect with the shared login patterns and `prompt` as its
    /// command prompt.
    pub fn new(name: impl Into<String>, prompt: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            username_prompts: vec![Regex::new(USERNAME_PROMPT)?],
            password_prompts: vec![Regex::new(PASSWORD_PROMPT)?],
            prompt: compile_prompt_pattern(prompt)?,
            login_failures: vec![Regex::new(LOGIN_FAILURE)?],
            failed_when_contains: vec![],
            on_open_commands: vec![],
            capture_command: "show running-config".to_string(),
            exit_command: "exit".to_string(),
            protocols: vec![Protocol::Ssh, Protocol::Telnet],
        })
    }

    /// Add a username prompt pattern.
    pub fn with_username_prompt(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.username_prompts.push(Regex::new(pattern)?);
        Ok(self)
    }

    /// Add a password prompt pattern.
    pub fn with_password_prompt(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.password_prompts.push(Regex::new(pattern)?);
        Ok(self)
    }

    /// Add a login failure pattern.
    pub fn with_login_failure(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.login_failures.push(Regex::new(pattern)?);
        Ok(self)
    }

    /// Add a failure pattern.
    pub fn with_failure_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.failed_when_contains.push(pattern.into());
        self
    }

    /// Add an on_open command.
    pub fn with_on_open_command(mut self, command: impl Into<String>) -> Self {
        self.on_open_commands.push(command.into());
        self
    }

    /// Set the running-config command.
    pub fn with_capture_command(mut self, command: impl Into<String>) -> Self {
        self.capture_command = command.into();
        self
    }

    /// Set the exit command.
    pub fn with_exit_command(mut self, command: impl Into<String>) -> Self {
        self.exit_command = command.into();
        self
    }

    /// Restrict the protocols this dialect supports.
    pub fn with_protocols(mut self, protocols: &[Protocol]) -> Self {
        self.protocols = protocols.to_vec();
        self
    }

    pub fn supports(&self, protocol: Protocol) -> bool {
        self.protocols.contains(&protocol)
    }

    /// First failure pattern contained in `output`, if any.
    pub fn detect_failure(&self, output: &str) -> Option<&str> {
        self.failed_when_contains
            .iter()
            .find(|p| output.contains(p.as_str()))
            .map(String::as_str)
    }
}

impl fmt::Debug for DialectDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialectDefinition")
            .field("name", &self.name)
            .field("prompt", &self.prompt.as_str())
            .field("failed_when_contains", &self.failed_when_contains)
            .field("on_open_commands", &self.on_open_commands)
            .field("capture_command", &self.capture_command)
            .field("exit_command", &self.exit_command)
            .field("protocols", &self.protocols)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_login_patterns() {
        let dialect = DialectDefinition::new("test", r"[>#]").unwrap();
        let user = &dialect.username_prompts[0];
        assert!(user.is_match(b"\nUsername: "));
        assert!(user.is_match(b"\nrouter login: "));
        assert!(user.is_match(b"User Name:"));
        assert!(!user.is_match(b"Username: admin\n"));

        let pass = &dialect.password_prompts[0];
        assert!(pass.is_match(b"\nPassword: "));
        assert!(pass.is_match(b"\nPassword:"));
        assert!(!pass.is_match(b"router#"));

        let failure = &dialect.login_failures[0];
        assert!(failure.is_match(b"% Login invalid\n"));
        assert!(failure.is_match(b"% Authentication failed"));
    }

    #[test]
    fn test_detect_failure() {
        let dialect = DialectDefinition::new("test", r"[>#]")
            .unwrap()
            .with_failure_pattern("% Invalid input");
        assert_eq!(
            dialect.detect_failure("   ^\n% Invalid input detected at '^' marker."),
            Some("% Invalid input")
        );
        assert_eq!(dialect.detect_failure("hostname R1"), None);
    }

    #[test]
    fn test_protocol_support() {
        let dialect = DialectDefinition::new("test", r"[>#]")
            .unwrap()
            .with_protocols(&[Protocol::Ssh]);
        assert!(dialect.supports(Protocol::Ssh));
        assert!(!dialect.supports(Protocol::Telnet));
    }
}
