//! Snapshots of instance and version state returned by the instance API.
//!
//! These are plain values. They are decoded once per call and never
//! refreshed; query again for current state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::version::ApiVersion;

/// State of a LocalDB instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    /// Instance name.
    pub name: String,
    /// Whether the instance exists.
    pub exists: bool,
    /// Whether the instance configuration is corrupt.
    pub configuration_corrupt: bool,
    /// Whether the instance is running.
    pub is_running: bool,
    /// Whether the instance is shared.
    pub is_shared: bool,
    /// Whether this is an automatic instance.
    pub is_automatic: bool,
    /// LocalDB version the instance was created with.
    pub version: ApiVersion,
    /// When the instance was last started, or `None` if it never was.
    pub last_start_utc: Option<DateTime<Utc>>,
    /// Named pipe of the running instance; empty when stopped.
    pub connection: String,
    /// String form of the owner's security identifier.
    pub owner_sid: String,
    /// Shared name of the instance; empty when not shared.
    pub shared_name: String,
}

impl InstanceInfo {
    /// A record for a name LocalDB does not know about.
    pub fn missing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exists: false,
            configuration_corrupt: false,
            is_running: false,
            is_shared: false,
            is_automatic: false,
            version: ApiVersion::from_parts(0, 0, 0, 0),
            last_start_utc: None,
            connection: String::new(),
            owner_sid: String::new(),
            shared_name: String::new(),
        }
    }
}

/// An installed LocalDB version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Version name as reported by `LocalDBGetVersions`.
    pub name: String,
    /// Whether the version is installed.
    pub exists: bool,
    /// Full version number.
    pub version: ApiVersion,
}
