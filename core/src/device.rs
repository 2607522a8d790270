//! Device identity sent with login and token refresh requests.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const SOURCE_TYPE: &str = "WEB";
/// The API rejects longer device ids.
pub const MAX_DEVICE_ID_LEN: usize = 21;

const MACHINE_ID_PATHS: [&str; 2] = ["/etc/machine-id", "/var/lib/dbus/machine-id"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub source_type: String,
    pub source_device_id: String,
    pub app_version: String,
    pub meta_details: MetaDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaDetails {
    pub user_agent: String,
}

impl DeviceInfo {
    pub fn new(device_id: &str, app_version: &str, user_agent: &str) -> Self {
        Self {
            source_type: SOURCE_TYPE.to_string(),
            source_device_id: truncate_id(device_id),
            app_version: app_version.to_string(),
            meta_details: MetaDetails {
                user_agent: user_agent.to_string(),
            },
        }
    }
}

/// Stable identifier for this machine.
///
/// `NALOG_DEVICE_ID` wins when set. Otherwise the OS machine id (or the host
/// name when there is none) is hashed so the raw value never leaves the host.
pub fn device_id() -> String {
    if let Ok(id) = std::env::var("NALOG_DEVICE_ID") {
        if !id.trim().is_empty() {
            return truncate_id(id.trim());
        }
    }
    hashed_id(&machine_seed())
}

fn machine_seed() -> String {
    MACHINE_ID_PATHS
        .iter()
        .filter_map(|path| std::fs::read_to_string(path).ok())
        .map(|raw| raw.trim().to_string())
        .find(|id| !id.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty()))
        .or_else(|| std::env::var("COMPUTERNAME").ok().filter(|h| !h.is_empty()))
        .unwrap_or_else(|| "moy-nalog".to_string())
}

fn hashed_id(seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    truncate_id(&hex::encode(hasher.finalize()))
}

fn truncate_id(id: &str) -> String {
    id.chars().take(MAX_DEVICE_ID_LEN).collect()
}
