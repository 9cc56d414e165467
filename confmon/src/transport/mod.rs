//! Byte transports to a device: SSH (russh) and Telnet.
//!
//! This module owns connection setup and authentication at the protocol
//! level. Everything above it sees an ordered stream of output bytes and a
//! way to write input bytes.

pub mod config;
mod ssh;
mod telnet;

pub use config::{HostKeyVerification, Protocol, TransportConfig};
pub use ssh::SshTransport;
pub use telnet::TelnetTransport;

use crate::error::Result;

/// An open connection to a device, dispatched over the supported protocols.
pub enum Transport {
    Ssh(SshTransport),
    Telnet(TelnetTransport),
}

impl Transport {
    /// Open a transport for the configured protocol.
    pub async fn connect(config: &TransportConfig) -> Result<Self> {
        match config.protocol {
            Protocol::Ssh => Ok(Transport::Ssh(SshTransport::connect(config).await?)),
            Protocol::Telnet => Ok(Transport::Telnet(TelnetTransport::connect(config).await?)),
        }
    }

    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Transport::Ssh(t) => t.write(data).await,
            Transport::Telnet(t) => t.write(data).await,
        }
    }

    /// Next chunk of output; `None` once the peer closed.
    pub async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        match self {
            Transport::Ssh(t) => t.read_chunk().await,
            Transport::Telnet(t) => t.read_chunk().await,
        }
    }

    pub async fn close(self) -> Result<()> {
        match self {
            Transport::Ssh(t) => t.close().await,
            Transport::Telnet(t) => t.close().await,
        }
    }
}
