//! Session factory backed by an explicit dialect table.

use log::debug;

use super::driver::DeviceSession;
use super::{SessionConfig, SessionFactory};
use crate::device::Device;
use crate::dialect::DialectTable;
use crate::error::Result;
use crate::transport::TransportConfig;

/// Builds [`DeviceSession`]s from a dialect table and shared tuning.
#[derive(Debug, Clone)]
pub struct DialectSessionFactory {
    table: DialectTable,
    config: SessionConfig,
}

impl DialectSessionFactory {
    pub fn new(table: DialectTable, config: SessionConfig) -> Self {
        Self { table, config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl SessionFactory for DialectSessionFactory {
    type Session = DeviceSession;

    fn create(&self, device: &Device) -> Result<DeviceSession> {
        let (protocol, dialect) = self.table.resolve(&device.protocol, &device.device_type)?;
        debug!("{}: using {} dialect over {}", device.name, dialect.name, protocol);

        let transport = TransportConfig {
            host: device.host.clone(),
            port: device.port.unwrap_or_else(|| protocol.default_port()),
            protocol,
            username: device.login.clone(),
            password: device.password.clone(),
            timeout: self.config.timeout,
            terminal_width: self.config.terminal_width,
            terminal_height: self.config.terminal_height,
            host_key_verification: self.config.host_key_verification.clone(),
            known_hosts_path: self.config.known_hosts_path.clone(),
        };

        Ok(DeviceSession::new(transport, dialect.clone(), &self.config))
    }
}
