//! Fleet inventory: YAML from a local file or an HTTP(S) URL.
//!
//! The top level is a mapping. The optional `main` key holds archive and
//! session settings; every other key names a device:
//!
//! ```yaml
//! main:
//!   data:
//!     path: ./archive
//!     git_remote: origin
//!     git_branch: master
//!   session:
//!     timeout: 30
//!     settle_delay: 5
//! R1:
//!   host: 10.0.0.1:22
//!   protocol: ssh
//!   login: admin
//!   password: secret
//!   type: ios
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use log::{debug, warn};
use secrecy::SecretString;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_yaml::{Mapping, Value};

use crate::device::Device;
use crate::error::{InventoryError, Result};
use crate::repository::DEFAULT_BRANCH;

/// Key of the settings section.
const MAIN_KEY: &str = "main";

/// Timeout for fetching a remote inventory.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the inventory comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventorySource {
    Path(PathBuf),
    Url(String),
}

impl FromStr for InventorySource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Ok(InventorySource::Url(s.to_string()))
        } else {
            Ok(InventorySource::Path(PathBuf::from(s)))
        }
    }
}

impl fmt::Display for InventorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InventorySource::Path(path) => write!(f, "{}", path.display()),
            InventorySource::Url(url) => f.write_str(url),
        }
    }
}

/// Session tuning from the `main.session` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOverrides {
    pub timeout: Option<Duration>,
    pub settle_delay: Option<Duration>,
}

/// A parsed, validated inventory.
#[derive(Debug, Clone)]
pub struct Inventory {
    /// Devices in inventory order.
    pub devices: Vec<Device>,

    /// Archive directory and git work tree.
    pub archive_root: PathBuf,

    pub git_remote: Option<String>,
    pub git_branch: String,

    pub session: SessionOverrides,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MainSection {
    data: DataSection,
    session: SessionSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DataSection {
    path: Option<PathBuf>,
    git_remote: Option<String>,
    git_branch: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SessionSection {
    timeout: Option<u64>,
    settle_delay: Option<u64>,
}

#[derive(Deserialize)]
struct DeviceEntry {
    #[serde(deserialize_with = "scalar")]
    host: String,
    #[serde(deserialize_with = "scalar")]
    protocol: String,
    #[serde(deserialize_with = "scalar")]
    login: String,
    #[serde(deserialize_with = "scalar")]
    password: String,
    #[serde(rename = "type", deserialize_with = "scalar")]
    device_type: String,
}

/// Accept numbers and booleans where a string is expected
/// (`password: 1234`).
fn scalar<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(D::Error::custom("expected a string")),
    }
}

/// Fetch and parse the inventory.
pub async fn load(source: &InventorySource) -> Result<Inventory> {
    debug!("loading inventory from {}", source);
    let text = match source {
        InventorySource::Path(path) => {
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| InventoryError::Read {
                    path: path.clone(),
                    source,
                })?
        }
        InventorySource::Url(url) => fetch(url).await?,
    };
    parse(&text)
}

async fn fetch(url: &str) -> Result<String> {
    let fetch_err = |source| InventoryError::Fetch {
        url: url.to_string(),
        source,
    };

    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(fetch_err)?;
    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(fetch_err)?;
    Ok(response.text().await.map_err(fetch_err)?)
}

/// Parse inventory YAML.
pub fn parse(text: &str) -> Result<Inventory> {
    let mut root: Mapping = serde_yaml::from_str(text).map_err(InventoryError::from)?;

    let main = match root.shift_remove(MAIN_KEY) {
        None | Some(Value::Null) => MainSection::default(),
        Some(value) => serde_yaml::from_value::<MainSection>(value).map_err(|e| {
            InventoryError::MalformedMain {
                message: e.to_string(),
            }
        })?,
    };

    let mut devices = Vec::with_capacity(root.len());
    for (key, value) in root {
        let name = match key {
            Value::String(name) => name,
            Value::Number(n) => n.to_string(),
            other => {
                return Err(InventoryError::InvalidDevice {
                    name: format!("{other:?}"),
                    message: "device names must be strings".to_string(),
                }
                .into());
            }
        };
        devices.push(parse_device(name, value)?);
    }
    if devices.is_empty() {
        warn!("inventory lists no devices");
    }

    Ok(Inventory {
        devices,
        archive_root: main.data.path.unwrap_or_else(|| PathBuf::from(".")),
        git_remote: main.data.git_remote.filter(|r| !r.trim().is_empty()),
        git_branch: main
            .data
            .git_branch
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
        session: SessionOverrides {
            timeout: main.session.timeout.map(Duration::from_secs),
            settle_delay: main.session.settle_delay.map(Duration::from_secs),
        },
    })
}

fn parse_device(name: String, value: Value) -> Result<Device> {
    let invalid = |message: String| InventoryError::InvalidDevice {
        name: name.clone(),
        message,
    };

    validate_name(&name).map_err(|m| invalid(m.to_string()))?;
    if !value.is_mapping() {
        return Err(invalid("entry is not a mapping".to_string()).into());
    }
    let entry: DeviceEntry = serde_yaml::from_value(value).map_err(|e| invalid(e.to_string()))?;
    let (host, port) = split_host_port(&entry.host).ok_or_else(|| InventoryError::InvalidHost {
        name: name.clone(),
        host: entry.host.clone(),
    })?;

    Ok(Device {
        name,
        host,
        port: Some(port),
        protocol: entry.protocol.trim().to_string(),
        login: entry.login,
        password: SecretString::from(entry.password),
        device_type: entry.device_type.trim().to_string(),
    })
}

/// Device names become file names in the archive.
fn validate_name(name: &str) -> std::result::Result<(), &'static str> {
    if name.trim().is_empty() {
        return Err("device name is empty");
    }
    if name == "." || name == ".." {
        return Err("device name cannot be '.' or '..'");
    }
    if name.contains(['/', '\\', '\0']) {
        return Err("device name cannot contain path separators");
    }
    Ok(())
}

/// Split `host:port` or `[v6addr]:port`.
///
/// The port is mandatory. Returns `None` for an empty host, a missing or
/// unparseable port, and an IPv6 address without brackets.
fn split_host_port(text: &str) -> Option<(String, u16)> {
    let text = text.trim();

    let (host, port) = match text.strip_prefix('[') {
        Some(rest) => {
            let (addr, tail) = rest.split_once(']')?;
            (addr, tail.strip_prefix(':')?)
        }
        None => {
            let (host, port) = text.split_once(':')?;
            if port.contains(':') {
                return None;
            }
            (host, port)
        }
    };
    if host.is_empty() {
        return None;
    }
    Some((host.to_string(), parse_port(port)?))
}

fn parse_port(text: &str) -> Option<u16> {
    text.parse::<u16>().ok().filter(|p| *p != 0)
}
