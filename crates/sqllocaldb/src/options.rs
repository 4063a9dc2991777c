//! Configuration for [`SqlLocalDbApi`](crate::SqlLocalDbApi).

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// How `LocalDBStopInstance` shuts an instance down.
    ///
    /// The bit values are passed to the native API unchanged.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct StopInstanceOptions: u32 {
        /// Shut down cleanly using `SHUTDOWN`.
        const NONE = 0;
        /// Kill the `sqlservr` process instead of shutting it down.
        const KILL_PROCESS = 1;
        /// Shut down using `SHUTDOWN WITH NOWAIT`.
        const NO_WAIT = 2;
    }
}

/// Default stop timeout in seconds.
pub const DEFAULT_STOP_TIMEOUT_SECONDS: i64 = 60;

/// Options controlling how the LocalDB API is used.
///
/// # Examples
///
/// ```
/// use sqllocaldb::{SqlLocalDbOptions, StopInstanceOptions};
///
/// let options = SqlLocalDbOptions::from_json(
///     r#"{ "language_id": 1033, "stop_options": "KILL_PROCESS" }"#,
/// )?;
/// assert_eq!(options.language_id, 1033);
/// assert_eq!(options.stop_options, StopInstanceOptions::KILL_PROCESS);
/// assert_eq!(options.stop_timeout_seconds, 60);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlLocalDbOptions {
    /// Delete an instance's files from disk when the instance is deleted.
    pub automatically_delete_instance_files: bool,
    /// Windows language identifier for error messages; `0` uses the
    /// operating system default.
    pub language_id: u32,
    /// Load this LocalDB version instead of the latest one; empty for the
    /// latest.
    pub native_api_override_version: String,
    /// Options used when stopping instances.
    pub stop_options: StopInstanceOptions,
    /// Seconds to wait for an instance to stop; `0` returns immediately.
    pub stop_timeout_seconds: i64,
}

impl Default for SqlLocalDbOptions {
    fn default() -> Self {
        Self {
            automatically_delete_instance_files: false,
            language_id: 0,
            native_api_override_version: String::new(),
            stop_options: StopInstanceOptions::NONE,
            stop_timeout_seconds: DEFAULT_STOP_TIMEOUT_SECONDS,
        }
    }
}

impl SqlLocalDbOptions {
    /// Parse options from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
