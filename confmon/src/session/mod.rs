//! Interactive sessions with network devices.
//!
//! A session is one authenticated connection that can run a command and
//! return its full response. [`DeviceSession`] is the real implementation,
//! driven by a [`DialectDefinition`](crate::dialect::DialectDefinition) and
//! running over SSH or Telnet. The orchestrator only sees the [`Session`]
//! and [`SessionFactory`] traits, so tests can substitute scripted devices.

mod driver;
mod factory;
mod response;

pub use driver::DeviceSession;
pub use factory::DialectSessionFactory;
pub use response::Response;

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use crate::device::Device;
use crate::error::Result;
use crate::transport::HostKeyVerification;

/// Connection state of a session.
///
/// ```text
/// Disconnected ─connect─► TransportOpen ─settle, wake─► AwaitingPrompt
///      ▲                                                     │ login
///      └──────────── close ◄── Ready ◄─terminal setup── Authenticated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    TransportOpen,
    AwaitingPrompt,
    Authenticated,
    Ready,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::TransportOpen => "transport open",
            SessionState::AwaitingPrompt => "awaiting login prompt",
            SessionState::Authenticated => "initializing terminal",
            SessionState::Ready => "ready",
        };
        f.write_str(text)
    }
}

/// An interactive command session with one device.
pub trait Session: Send {
    /// Connect, log in and prepare the terminal.
    fn open(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Send a command and wait for the prompt.
    fn send_command(&mut self, command: &str) -> impl Future<Output = Result<Response>> + Send;

    /// Leave the device and close the transport.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Command that prints the running configuration on this device.
    fn capture_command(&self) -> &str;

    fn state(&self) -> SessionState;
}

/// Creates sessions for devices.
pub trait SessionFactory: Sync {
    type Session: Session;

    /// Build an unopened session for `device`.
    ///
    /// Fails with `SessionError::DriverMismatch` when no driver fits the
    /// device's protocol and type.
    fn create(&self, device: &Device) -> Result<Self::Session>;
}

/// Tuning shared by every session of a run.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Connect timeout and per-prompt timeout.
    pub timeout: Duration,

    /// Pause after the transport opens, before the wake byte.
    pub settle_delay: Duration,

    /// Bytes sent to wake up a console that waits for a keypress.
    pub wake_sequence: Vec<u8>,

    /// Bytes from the end of the output searched for prompts.
    pub search_depth: usize,

    pub terminal_width: u32,
    pub terminal_height: u32,

    pub host_key_verification: HostKeyVerification,
    pub known_hosts_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(5),
            wake_sequence: b"\r".to_vec(),
            search_depth: 1000,
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::AcceptNew,
            known_hosts_path: None,
        }
    }
}
