//! SSH access to a device's interactive shell.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::PublicKey;
use russh::{Channel, ChannelMsg};
use secrecy::ExposeSecret;

use super::config::{HostKeyVerification, TransportConfig};
use crate::error::{Result, TransportError};

/// SSH transport: one authenticated connection with one PTY shell channel.
pub struct SshTransport {
    session: Handle<SshHandler>,
    shell: Channel<Msg>,
}

impl SshTransport {
    /// Connect to the SSH server, authenticate and open a shell.
    pub async fn connect(config: &TransportConfig) -> Result<Self> {
        let client_config = Arc::new(client::Config {
            inactivity_timeout: Some(config.timeout),
            ..Default::default()
        });

        let rejected = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            host_key_verification: config.host_key_verification.clone(),
            known_hosts_path: config.known_hosts_path.clone(),
            host_key_error: Arc::clone(&rejected),
        };

        let mut session = tokio::time::timeout(
            config.timeout,
            client::connect(client_config, (config.host.as_str(), config.port), handler),
        )
        .await
        .map_err(|_| TransportError::ConnectTimeout {
            host: config.host.clone(),
            port: config.port,
            timeout: config.timeout,
        })?
        .map_err(|e| {
            // Prefer the detailed host-key error over russh's generic one
            let stored = rejected.lock().ok().and_then(|mut slot| slot.take());
            match (stored, e) {
                (Some(hk_err), _) => hk_err,
                (None, russh::Error::IO(source)) => TransportError::ConnectionFailed {
                    host: config.host.clone(),
                    port: config.port,
                    source,
                },
                (None, other) => TransportError::Ssh(other),
            }
        })?;

        Self::authenticate(&mut session, config).await?;

        let channel = Self::open_shell(&session, config).await?;
        debug!("ssh shell open on {}", config.socket_addr());

        Ok(Self {
            session,
            shell: channel,
        })
    }

    /// Open a PTY channel and request an interactive shell.
    async fn open_shell(
        session: &Handle<SshHandler>,
        config: &TransportConfig,
    ) -> Result<Channel<Msg>> {
        let channel = session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_pty(
                true,
                "xterm",
                config.terminal_width,
                config.terminal_height,
                0,
                0,
                &[],
            )
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_shell(true)
            .await
            .map_err(TransportError::Ssh)?;

        Ok(channel)
    }

    /// Authenticate with a password.
    async fn authenticate(session: &mut Handle<SshHandler>, config: &TransportConfig) -> Result<()> {
        let success = session
            .authenticate_password(&config.username, config.password.expose_secret())
            .await
            .map_err(TransportError::Ssh)?
            .success();

        if !success {
            return Err(TransportError::AuthenticationFailed {
                user: config.username.clone(),
            }
            .into());
        }

        Ok(())
    }

    /// Write raw bytes to the shell.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.shell
            .data(data)
            .await
            .map_err(|_| TransportError::Disconnected)?;
        Ok(())
    }

    /// Read the next chunk of shell output; `None` once the channel closed.
    pub async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            match self.shell.wait().await {
                Some(ChannelMsg::Data { data }) => return Ok(Some(data.to_vec())),
                // stderr is interleaved like a terminal would show it
                Some(ChannelMsg::ExtendedData { data, .. }) => return Ok(Some(data.to_vec())),
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => return Ok(None),
                Some(_) => continue,
            }
        }
    }

    /// Close the channel and the connection.
    pub async fn close(self) -> Result<()> {
        let _ = self.shell.eof().await;
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }
}

/// Host key policy for one connection attempt.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Detailed host-key error surfaced by connect().
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// Look the key up in known_hosts: `Ok(false)` when the host is not listed.
    fn is_known(&self, key: &PublicKey) -> std::result::Result<bool, TransportError> {
        let lookup = match &self.known_hosts_path {
            Some(path) => russh::keys::check_known_hosts_path(&self.host, self.port, key, path),
            None => russh::keys::check_known_hosts(&self.host, self.port, key),
        };
        lookup.map_err(|e| match e {
            russh::keys::Error::KeyChanged { line } => TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            },
            other => TransportError::KnownHosts(other.to_string()),
        })
    }

    fn remember(&self, key: &PublicKey) {
        let saved = match &self.known_hosts_path {
            Some(path) => {
                russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, key, path)
            }
            None => russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, key),
        };
        match saved {
            Ok(()) => debug!("{}:{}: host key added to known_hosts", self.host, self.port),
            Err(e) => warn!("{}:{}: could not save host key: {}", self.host, self.port, e),
        }
    }

    /// Apply the host key policy.
    fn verify(&self, key: &PublicKey) -> std::result::Result<(), TransportError> {
        match self.host_key_verification {
            HostKeyVerification::Disabled => Ok(()),
            HostKeyVerification::AcceptNew => {
                if !self.is_known(key)? {
                    self.remember(key);
                }
                Ok(())
            }
            HostKeyVerification::Strict if self.is_known(key)? => Ok(()),
            HostKeyVerification::Strict => Err(TransportError::HostKeyUnknown {
                host: self.host.clone(),
                port: self.port,
            }),
        }
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match self.verify(server_public_key) {
            Ok(()) => Ok(true),
            Err(e) => {
                // connect() reports this instead of russh's generic error
                if let Ok(mut slot) = self.host_key_error.lock() {
                    *slot = Some(e);
                }
                Ok(false)
            }
        }
    }
}
