//! Output of one command.

use std::fmt;
use std::time::Duration;

/// What a device printed in answer to one command.
#[derive(Debug, Clone)]
pub struct Response {
    pub command: String,

    /// Output with the command echo and surrounding blank lines removed.
    pub result: String,

    /// Everything read before the prompt.
    pub raw_result: String,

    /// The prompt that ended the output.
    pub prompt: String,

    pub elapsed: Duration,

    /// Set when the output matched one of the dialect's failure patterns.
    pub failure_message: Option<String>,
}

impl Response {
    /// Build a response from the text read before the prompt.
    pub fn new(
        command: impl Into<String>,
        raw_result: impl Into<String>,
        prompt: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        let command = command.into();
        let raw_result = raw_result.into();
        Self {
            result: strip_echo(&raw_result, &command),
            command,
            raw_result,
            prompt: prompt.into(),
            elapsed,
            failure_message: None,
        }
    }

    pub fn with_failure(mut self, failure_message: impl Into<String>) -> Self {
        self.failure_message = Some(failure_message.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.failure_message.is_none()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.result)
    }
}

/// Drop the echoed command and the blank lines around the output.
fn strip_echo(raw: &str, command: &str) -> String {
    let output = raw.trim_start();
    let output = output.strip_prefix(command).unwrap_or(output);
    output.trim_start_matches([' ', '\r', '\n']).trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_echo() {
        let response = Response::new(
            "show running-config",
            "show running-config\nBuilding configuration...\n\nhostname R1\n",
            "R1#",
            Duration::from_millis(5),
        );
        assert_eq!(response.result, "Building configuration...\n\nhostname R1");
        assert!(response.raw_result.starts_with("show running-config"));
        assert!(response.is_success());
    }

    #[test]
    fn test_without_echo() {
        let response = Response::new("show run", "\n\nhostname R1\n\n", "R1#", Duration::ZERO);
        assert_eq!(response.to_string(), "hostname R1");
    }

    #[test]
    fn test_empty_output() {
        let response = Response::new("terminal length 0", " \nterminal length 0\n", "R1#", Duration::ZERO);
        assert_eq!(response.result, "");
    }

    #[test]
    fn test_with_failure() {
        let response = Response::new("show bogus", "% Invalid input", "R1#", Duration::ZERO)
            .with_failure("% Invalid input");
        assert!(!response.is_success());
        assert_eq!(response.failure_message.as_deref(), Some("% Invalid input"));
    }
}
