//! Error types for confmon.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::session::SessionState;

/// Main error type for confmon operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level errors (the device could not be reached).
    #[error("Connection error: {0}")]
    Transport(#[from] TransportError),

    /// Interactive session errors (prompts, login, commands).
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Inventory loading errors.
    #[error("Invalid inventory: {0}")]
    Inventory(#[from] InventoryError),

    /// Snapshot archive errors.
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Version-control errors.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// A session driver panicked; caught at the orchestrator boundary.
    #[error("Unexpected session fault: {0}")]
    Fault(String),
}

impl Error {
    /// Classify this error for run summaries.
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Transport(_) => FailureKind::Connection,
            Error::Session(SessionError::ProtocolTimeout { .. }) => FailureKind::ProtocolTimeout,
            Error::Session(SessionError::DriverMismatch { .. }) => FailureKind::DriverMismatch,
            // The transport went away before a prompt was ever seen.
            Error::Session(SessionError::Closed) => FailureKind::Connection,
            Error::Session(_) => FailureKind::Command,
            Error::Inventory(_) => FailureKind::Inventory,
            Error::Archive(_) => FailureKind::Snapshot,
            Error::Repository(_) => FailureKind::Repository,
            Error::Fault(_) => FailureKind::Fault,
        }
    }
}

/// Coarse failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Connection,
    ProtocolTimeout,
    DriverMismatch,
    Command,
    Snapshot,
    Fault,
    Inventory,
    Repository,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureKind::Connection => "connection",
            FailureKind::ProtocolTimeout => "protocol timeout",
            FailureKind::DriverMismatch => "driver mismatch",
            FailureKind::Command => "command",
            FailureKind::Snapshot => "snapshot",
            FailureKind::Fault => "fault",
            FailureKind::Inventory => "inventory",
            FailureKind::Repository => "repository",
        };
        f.write_str(name)
    }
}

/// Transport layer errors (TCP connect, SSH handshake and authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Connect did not complete in time
    #[error("Connect to {host}:{port} timed out after {timeout:?}")]
    ConnectTimeout {
        host: String,
        port: u16,
        timeout: Duration,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// SSH-level authentication rejected
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Server host key does not match known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// Server host key is not in known_hosts (strict mode)
    #[error("Host key for {host}:{port} is unknown")]
    HostKeyUnknown { host: String, port: u16 },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Session layer errors (prompt detection, login, command execution).
#[derive(Error, Debug)]
pub enum SessionError {
    /// Session not opened
    #[error("Session not connected - call open() first")]
    NotConnected,

    /// Session already opened
    #[error("Session already open")]
    AlreadyOpen,

    /// A prompt was not seen within the session timeout
    #[error("No usable prompt while {state} within {timeout:?}")]
    ProtocolTimeout {
        state: SessionState,
        timeout: Duration,
    },

    /// Unsupported protocol/device type combination
    #[error("No driver for protocol '{protocol}' with device type '{device_type}'")]
    DriverMismatch {
        protocol: String,
        device_type: String,
    },

    /// The device rejected the credentials at its login prompt
    #[error("Login rejected for user '{user}'")]
    LoginFailed { user: String },

    /// Command output matched a failure pattern
    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    /// Channel closed before a prompt was seen
    #[error("Channel closed")]
    Closed,

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Inventory errors; always fatal for the run.
#[derive(Error, Debug)]
pub enum InventoryError {
    /// Inventory file could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Inventory URL could not be fetched
    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Inventory is not valid YAML or not a mapping
    #[error("Malformed inventory: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The `main` section has the wrong shape
    #[error("Malformed main section: {message}")]
    MalformedMain { message: String },

    /// A device entry is missing a field or has a bad value
    #[error("Device '{name}': {message}")]
    InvalidDevice { name: String, message: String },

    /// A device host is not parseable as host:port
    #[error("Device '{name}': host '{host}' is not host:port")]
    InvalidHost { name: String, host: String },
}

/// Snapshot archive errors.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Previous snapshot could not be read
    #[error("Failed to read snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// New snapshot could not be written
    #[error("Failed to write snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Snapshot could not be deleted
    #[error("Failed to remove snapshot {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Version-control errors.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Archive root could not be created
    #[error("Failed to create archive directory {path}: {source}")]
    CreateArchive {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The git binary could not be started
    #[error("Failed to run `git {command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// git exited with a failure status
    #[error("`git {command}` failed ({status}): {stderr}")]
    Git {
        command: String,
        status: String,
        stderr: String,
    },
}

/// Result type alias using confmon's Error.
pub type Result<T> = std::result::Result<T, Error>;
