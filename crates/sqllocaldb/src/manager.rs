//! Higher-level operations built from the instance API calls.

use sqllocaldb_errors::{ErrorCode, Result, SqlLocalDbError};
use sqllocaldb_interop::{ApiVersion, InstanceInfo, VersionInfo};

use crate::api::{DEFAULT_INSTANCE_NAME, DEFAULT_INSTANCE_NAME_V11, SqlLocalDbApi};

/// Whether `name` is the automatic instance of some LocalDB version.
///
/// Instance names compare case-insensitively.
///
/// # Examples
///
/// ```
/// use sqllocaldb::is_default_instance_name;
///
/// assert!(is_default_instance_name("mssqllocaldb"));
/// assert!(is_default_instance_name("V11.0"));
/// assert!(!is_default_instance_name("Scratch"));
/// ```
pub fn is_default_instance_name(name: &str) -> bool {
    name.eq_ignore_ascii_case(DEFAULT_INSTANCE_NAME) || name.eq_ignore_ascii_case(DEFAULT_INSTANCE_NAME_V11)
}

impl SqlLocalDbApi {
    /// The highest installed LocalDB version.
    ///
    /// Version names that do not parse are ignored.
    pub fn latest_version(&self) -> Result<String> {
        self.get_versions()?
            .into_iter()
            .filter_map(|name| ApiVersion::parse(&name).map(|version| (version, name)))
            .max_by_key(|(version, _)| *version)
            .map(|(_, name)| name)
            .ok_or(SqlLocalDbError::NoVersionsInstalled)
    }

    /// Name of the automatic instance for the loaded instance API.
    ///
    /// SQL Server 2012 (11.x) names it `v11.0`; later versions use
    /// `MSSQLLocalDB`.
    pub fn default_instance_name(&self) -> &'static str {
        match self.native_api_version() {
            Some(version) if version.major() == 11 => DEFAULT_INSTANCE_NAME_V11,
            _ => DEFAULT_INSTANCE_NAME,
        }
    }

    /// Whether `instance_name` exists.
    pub fn instance_exists(&self, instance_name: &str) -> Result<bool> {
        match self.get_instance_info(instance_name) {
            Ok(info) => Ok(info.exists),
            Err(e) if e.is(ErrorCode::UnknownInstance) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// State of every instance owned by the current user.
    pub fn get_instances(&self) -> Result<Vec<InstanceInfo>> {
        self.get_instance_names()?
            .iter()
            .map(|name| self.get_instance_info(name))
            .collect()
    }

    /// Details of every installed LocalDB version.
    pub fn get_versions_info(&self) -> Result<Vec<VersionInfo>> {
        self.get_versions()?
            .iter()
            .map(|version| self.get_version_info(version))
            .collect()
    }

    /// State of `instance_name`, creating it with the latest version if it
    /// does not exist.
    ///
    /// Automatic instances are never created here; LocalDB creates them on
    /// first start.
    pub fn get_or_create_instance(&self, instance_name: &str) -> Result<InstanceInfo> {
        if instance_name.eq_ignore_ascii_case(self.default_instance_name())
            || is_default_instance_name(instance_name)
        {
            // Listed even before it exists, so ask for it directly.
            let info = self.get_instance_info(instance_name)?;
            if info.exists || info.is_automatic {
                return Ok(info);
            }
        }

        if self.instance_exists(instance_name)? {
            return self.get_instance_info(instance_name);
        }

        let version = self.latest_version()?;
        self.create_instance(instance_name, &version)?;
        self.get_instance_info(instance_name)
    }

    /// The automatic instance for the loaded instance API, created if needed.
    pub fn get_default_instance(&self) -> Result<InstanceInfo> {
        self.get_or_create_instance(self.default_instance_name())
    }

    /// Delete every instance except automatic ones.
    ///
    /// Instances that are in use are skipped and logged. Returns how many
    /// instances were deleted.
    pub fn delete_user_instances(&self, delete_files: bool) -> Result<usize> {
        let mut deleted = 0;

        for name in self.get_instance_names()? {
            let info = self.get_instance_info(&name)?;
            if !info.exists || info.is_automatic || info.name == DEFAULT_INSTANCE_NAME {
                continue;
            }

            // LocalDB can list instances that no longer exist, so a missing
            // instance is not an error here.
            match self.delete_instance_internal(&name, false, delete_files) {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(e) if e.is(ErrorCode::InstanceBusy) => {
                    tracing::warn!(instance = %name, "Instance not deleted as it is in use");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(deleted)
    }
}
