//! Device dialects: prompt patterns and command quirks per device family.
//!
//! The set of dialects is closed ({ios, ios_xr, nxos, generic}). A
//! [`DialectTable`] is built explicitly at startup and handed to the
//! session factory; there is no process-wide registry.

mod definition;
pub mod generic;
pub mod ios;
pub mod ios_xr;
pub mod nxos;

pub use definition::DialectDefinition;

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;

use crate::error::{Result, SessionError};
use crate::transport::Protocol;

/// Device family named by an inventory entry's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Ios,
    IosXr,
    Nxos,
    Generic,
}

impl FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "ios" | "ios_xe" | "cisco_ios" => Ok(DeviceType::Ios),
            "ios_xr" | "iosxr" | "cisco_iosxr" => Ok(DeviceType::IosXr),
            "nxos" | "nx_os" | "cisco_nxos" => Ok(DeviceType::Nxos),
            "generic" => Ok(DeviceType::Generic),
            other => Err(format!("unknown device type '{other}'")),
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceType::Ios => "ios",
            DeviceType::IosXr => "ios_xr",
            DeviceType::Nxos => "nxos",
            DeviceType::Generic => "generic",
        };
        f.write_str(name)
    }
}

/// Mapping from device type to dialect definition.
#[derive(Debug, Clone, Default)]
pub struct DialectTable {
    dialects: IndexMap<DeviceType, DialectDefinition>,
}

impl DialectTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with every built-in dialect.
    pub fn builtin() -> Result<Self> {
        let mut table = Self::new();
        table.insert(DeviceType::Ios, ios::dialect().map_err(SessionError::from)?);
        table.insert(DeviceType::IosXr, ios_xr::dialect().map_err(SessionError::from)?);
        table.insert(DeviceType::Nxos, nxos::dialect().map_err(SessionError::from)?);
        table.insert(DeviceType::Generic, generic::dialect().map_err(SessionError::from)?);
        Ok(table)
    }

    /// Add or replace a dialect.
    pub fn insert(&mut self, device_type: DeviceType, dialect: DialectDefinition) {
        self.dialects.insert(device_type, dialect);
    }

    pub fn get(&self, device_type: DeviceType) -> Option<&DialectDefinition> {
        self.dialects.get(&device_type)
    }

    /// Device types with a dialect, in insertion order.
    pub fn device_types(&self) -> impl Iterator<Item = &DeviceType> {
        self.dialects.keys()
    }

    /// Resolve inventory `protocol` and `type` strings to a protocol and dialect.
    ///
    /// Any unknown name or unsupported combination is a
    /// `SessionError::DriverMismatch`.
    pub fn resolve(
        &self,
        protocol: &str,
        device_type: &str,
    ) -> Result<(Protocol, &DialectDefinition)> {
        let mismatch = || SessionError::DriverMismatch {
            protocol: protocol.to_string(),
            device_type: device_type.to_string(),
        };

        let proto: Protocol = protocol.parse().map_err(|_| mismatch())?;
        let kind: DeviceType = device_type.parse().map_err(|_| mismatch())?;
        let dialect = self.get(kind).ok_or_else(mismatch)?;
        if !dialect.supports(proto) {
            return Err(mismatch().into());
        }
        Ok((proto, dialect))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_device_type_aliases() {
        assert_eq!("ios".parse::<DeviceType>(), Ok(DeviceType::Ios));
        assert_eq!("IOS-XR".parse::<DeviceType>(), Ok(DeviceType::IosXr));
        assert_eq!("nx-os".parse::<DeviceType>(), Ok(DeviceType::Nxos));
        assert!("junos".parse::<DeviceType>().is_err());
    }

    #[test]
    fn test_builtin_table() {
        let table = DialectTable::builtin().unwrap();
        let types: Vec<_> = table.device_types().copied().collect();
        assert_eq!(
            types,
            vec![DeviceType::Ios, DeviceType::IosXr, DeviceType::Nxos, DeviceType::Generic]
        );
        assert_eq!(table.get(DeviceType::IosXr).unwrap().name, "ios_xr");
    }

    #[test]
    fn test_resolve() {
        let table = DialectTable::builtin().unwrap();
        let (protocol, dialect) = table.resolve("telnet", "nxos").unwrap();
        assert_eq!(protocol, Protocol::Telnet);
        assert_eq!(dialect.name, "nxos");
    }

    #[test]
    fn test_resolve_mismatch() {
        let table = DialectTable::builtin().unwrap();
        for (protocol, device_type) in [("ssh", "junos"), ("rlogin", "ios")] {
            let err = table.resolve(protocol, device_type).unwrap_err();
            assert!(matches!(
                err,
                Error::Session(SessionError::DriverMismatch { .. })
            ));
        }

        let mut table = DialectTable::new();
        table.insert(
            DeviceType::Ios,
            ios::dialect().unwrap().with_protocols(&[Protocol::Ssh]),
        );
        assert!(table.resolve("telnet", "ios").is_err());
        assert!(table.resolve("ssh", "nxos").is_err());
    }
}
