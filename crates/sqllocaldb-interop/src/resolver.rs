//! Locates the LocalDB instance API module through the registry.
//!
//! Every installed LocalDB version registers a subkey under
//! `Installed Versions` whose `InstanceAPIPath` value names the
//! `SqlUserInstance.dll` for that version. The highest version wins unless
//! the caller asked for a specific one.

use std::path::{Path, PathBuf};

use crate::registry::Registry;
use crate::version::ApiVersion;

/// Name of the value holding the module path under each version subkey.
pub const INSTANCE_API_PATH_VALUE: &str = "InstanceAPIPath";

/// The registry key listing installed LocalDB versions.
///
/// 32-bit processes on 64-bit Windows read the `Wow6432Node` view.
///
/// # Examples
///
/// ```
/// use sqllocaldb_interop::resolver::registry_key_path;
///
/// assert_eq!(
///     registry_key_path(false),
///     r"SOFTWARE\Microsoft\Microsoft SQL Server Local DB\Installed Versions"
/// );
/// assert!(registry_key_path(true).starts_with(r"SOFTWARE\Wow6432Node\Microsoft"));
/// ```
pub fn registry_key_path(wow64: bool) -> String {
    format!(
        r"SOFTWARE\{}Microsoft\Microsoft SQL Server Local DB\Installed Versions",
        if wow64 { r"Wow6432Node\" } else { "" }
    )
}

/// The version chosen from the registry and the module that implements it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion {
    /// The version whose instance API is used.
    pub version: ApiVersion,
    /// Absolute path of the instance API module.
    pub path: PathBuf,
}

/// Chooses which installed instance API to load.
pub struct NativeApiPathResolver {
    registry: Box<dyn Registry>,
    override_version: Option<String>,
    wow64: bool,
}

impl std::fmt::Debug for NativeApiPathResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeApiPathResolver")
            .field("override_version", &self.override_version)
            .field("wow64", &self.wow64)
            .finish_non_exhaustive()
    }
}

impl NativeApiPathResolver {
    /// Create a resolver over `registry`.
    ///
    /// An empty `override_version` means "use the latest installed version".
    pub fn new(registry: Box<dyn Registry>, override_version: impl Into<String>) -> Self {
        let override_version = override_version.into();
        Self {
            registry,
            override_version: (!override_version.is_empty()).then_some(override_version),
            wow64: is_wow64_process(),
        }
    }

    /// Create a resolver over the registry of the current machine.
    pub fn system(override_version: impl Into<String>) -> Self {
        Self::new(crate::registry::system_registry(), override_version)
    }

    /// Read the `Wow6432Node` view regardless of the process bitness.
    #[must_use]
    pub fn with_wow64(mut self, wow64: bool) -> Self {
        self.wow64 = wow64;
        self
    }

    /// The version requested by the caller, if any.
    pub fn override_version(&self) -> Option<&str> {
        self.override_version.as_deref()
    }

    /// Find the instance API module to load.
    ///
    /// Returns `None` when LocalDB is not installed, no version subkey
    /// parses, the chosen version has no `InstanceAPIPath`, or the file it
    /// names does not exist.
    pub fn resolve(&self) -> Option<ResolvedVersion> {
        let key_name = registry_key_path(self.wow64);
        let Some(key) = self.registry.open_subkey(&key_name) else {
            tracing::warn!(key = %key_name, "Registry key not found");
            return None;
        };

        let mut latest: Option<(ApiVersion, String)> = None;
        let mut overridden: Option<(ApiVersion, String)> = None;

        for name in key.subkey_names() {
            let Some(version) = ApiVersion::parse(&name) else {
                tracing::warn!(key = %name, "Invalid registry key for LocalDB version");
                continue;
            };

            if overridden.is_none()
                && self
                    .override_version
                    .as_deref()
                    .is_some_and(|wanted| wanted.eq_ignore_ascii_case(&name))
            {
                tracing::info!(version = %version, "Native API version overridden by user");
                overridden = Some((version, name.clone()));
            }

            if latest.as_ref().is_none_or(|(best, _)| *best < version) {
                latest = Some((version, name));
            }
        }

        if let (Some(wanted), None) = (self.override_version.as_deref(), &overridden) {
            tracing::warn!(
                version = %wanted,
                "Native API version override not found; using latest installed version"
            );
        }

        let (version, subkey) = overridden.or(latest)?;
        let path = key
            .open_subkey(&subkey)
            .and_then(|subkey| subkey.string_value(INSTANCE_API_PATH_VALUE))
            .unwrap_or_default();

        if path.is_empty() {
            tracing::warn!(version = %version, "No native API path found in the registry");
            return None;
        }

        let path = Path::new(&path);
        if !path.is_file() {
            tracing::warn!(path = %path.display(), "Native API library not found");
            return None;
        }

        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        tracing::debug!(version = %version, path = %path.display(), "Resolved native API path");

        Some(ResolvedVersion { version, path })
    }
}

fn is_wow64_process() -> bool {
    #[cfg(windows)]
    {
        crate::windows::is_wow64_process()
    }
    #[cfg(not(windows))]
    {
        false
    }
}
