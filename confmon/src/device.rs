//! Devices and their connect → capture → disconnect lifecycle.

use log::{debug, info, warn};
use secrecy::SecretString;

use crate::error::{Result, SessionError};
use crate::session::{Session, SessionFactory};

/// Identity and access descriptor for one endpoint.
///
/// Built once from inventory data; immutable for the run. The session only
/// exists inside a [`DeviceConnection`].
#[derive(Debug, Clone)]
pub struct Device {
    /// Unique within the inventory; also the snapshot file stem.
    pub name: String,

    pub host: String,

    /// Port from `host:port`; `None` means the protocol's default.
    pub port: Option<u16>,

    /// Protocol name as written in the inventory (e.g. "ssh", "telnet").
    pub protocol: String,

    pub login: String,

    pub password: SecretString,

    /// Dialect name as written in the inventory (e.g. "ios", "nxos").
    pub device_type: String,
}

impl Device {
    /// Connection URI for logs, e.g. `ssh://admin@10.0.0.1:22`. Never
    /// contains the password.
    pub fn uri(&self) -> String {
        let mut uri = format!("{}://{}@{}", self.protocol, self.login, self.host);
        if let Some(port) = self.port {
            uri.push_str(&format!(":{port}"));
        }
        uri
    }

    /// Open a session to this device.
    ///
    /// Fails with `DriverMismatch` if the factory has no driver for the
    /// device, with a transport error if the device cannot be reached, and
    /// with `ProtocolTimeout` if login or terminal setup stalls.
    pub async fn connect<F: SessionFactory>(
        &self,
        factory: &F,
    ) -> Result<DeviceConnection<'_, F::Session>> {
        info!("{}: connecting to {}", self.name, self.uri());
        let mut session = factory.create(self)?;
        session.open().await?;
        info!("{}: session ready", self.name);
        Ok(DeviceConnection {
            device: self,
            session,
        })
    }
}

/// An open session to a device.
///
/// Capturing is only possible through this type, so it cannot happen
/// before a successful [`Device::connect`].
pub struct DeviceConnection<'a, S: Session> {
    device: &'a Device,
    session: S,
}

impl<S: Session> DeviceConnection<'_, S> {
    pub fn device(&self) -> &Device {
        self.device
    }

    /// Fetch the running configuration.
    ///
    /// The returned text is trimmed and never starts with the command that
    /// produced it. A response matching a dialect failure pattern is a
    /// `CommandFailed` error.
    pub async fn capture_running_config(&mut self) -> Result<String> {
        let command = self.session.capture_command().to_string();
        debug!("{}: sending '{}'", self.device.name, command);

        let response = self.session.send_command(&command).await?;
        if let Some(message) = response.failure_message {
            return Err(SessionError::CommandFailed { command, message }.into());
        }

        let config = strip_command_echo(&response.result, &command);
        debug!(
            "{}: captured {} lines in {:?}",
            self.device.name,
            config.lines().count(),
            response.elapsed
        );
        Ok(config)
    }

    /// Leave the device. Best effort: failures are logged, never returned.
    pub async fn disconnect(mut self) {
        if let Err(e) = self.session.close().await {
            warn!("{}: disconnect failed: {}", self.device.name, e);
        }
    }
}

/// Trim `text` and remove a leading echo of `command`.
pub fn strip_command_echo(text: &str, command: &str) -> String {
    let mut text = text.trim();
    while let Some(rest) = text.strip_prefix(command) {
        text = rest.trim();
    }
    text.to_string()
}
