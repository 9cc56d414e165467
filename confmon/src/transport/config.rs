//! Where and how to reach a device.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

/// Wire protocol used to reach a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Ssh,
    Telnet,
}

impl Protocol {
    /// Well-known port for this protocol.
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Ssh => 22,
            Protocol::Telnet => 23,
        }
    }

    /// Line terminator appended to every command.
    pub fn line_ending(self) -> &'static str {
        match self {
            Protocol::Ssh => "\n",
            // NVT end of line
            Protocol::Telnet => "\r\n",
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ssh" | "ssh2" => Ok(Protocol::Ssh),
            "telnet" => Ok(Protocol::Telnet),
            other => Err(format!("unsupported protocol '{other}'")),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Ssh => f.write_str("ssh"),
            Protocol::Telnet => f.write_str("telnet"),
        }
    }
}

/// What to do with an SSH server key, in the spirit of `StrictHostKeyChecking`.
#[derive(Debug, Clone, Default)]
pub enum HostKeyVerification {
    /// Only hosts already listed in known_hosts are accepted.
    Strict,

    /// New hosts are trusted on first use and recorded; a changed key is refused.
    #[default]
    AcceptNew,

    /// No checking at all.
    Disabled,
}

/// Connection parameters for one device transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Hostname or address literal, without brackets.
    pub host: String,
    pub port: u16,

    pub protocol: Protocol,

    /// Username, used for SSH authentication and telnet login prompts.
    pub username: String,

    pub password: SecretString,

    /// Connect (and SSH handshake) timeout.
    pub timeout: Duration,

    /// PTY size requested over SSH.
    pub terminal_width: u32,
    pub terminal_height: u32,

    /// Host key verification mode (SSH only).
    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file; `None` uses the user's default.
    pub known_hosts_path: Option<PathBuf>,
}

impl TransportConfig {
    /// `host:port`, bracketing IPv6 literals.
    pub fn socket_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}
