//! The LocalDB instance API with Rust types and errors.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use sqllocaldb_errors::{ErrorCode, Result, SqlLocalDbError, ValidationError};
use sqllocaldb_errors::validation::MAX_VERSION_LENGTH;
use sqllocaldb_interop::marshal::{
    INSTANCE_INFO_SIZE, INSTANCE_NAME_STRIDE, VERSION_INFO_SIZE, VERSION_NAME_STRIDE,
    decode_instance_info, decode_string_array, decode_units_until_nul, decode_version_info,
};
use sqllocaldb_interop::sizing::call_with_sized_buffer;
use sqllocaldb_interop::{ApiVersion, InstanceInfo, LocalDbInstanceApi, NativeInstanceApi, VersionInfo};

use crate::options::{SqlLocalDbOptions, StopInstanceOptions};
use crate::translate::ErrorTranslator;

/// Reserved flags argument; LocalDB requires zero.
const RESERVED: u32 = 0;

/// Name of the automatic instance created by SQL Server 2012 LocalDB.
pub const DEFAULT_INSTANCE_NAME_V11: &str = "v11.0";

/// Name of the automatic instance created by SQL Server 2014 LocalDB and later.
pub const DEFAULT_INSTANCE_NAME: &str = "MSSQLLocalDB";

/// Manages SQL Server LocalDB instances.
///
/// Every query goes to LocalDB; nothing about instance state is cached.
///
/// # Examples
///
/// ```no_run
/// use sqllocaldb::SqlLocalDbApi;
///
/// let api = SqlLocalDbApi::default();
/// if api.is_installed() {
///     let version = api.latest_version()?;
///     api.create_instance("Scratch", &version)?;
///     let pipe = api.start_instance("Scratch")?;
///     println!("listening on {pipe}");
///     api.stop_instance_default("Scratch")?;
///     api.delete_instance("Scratch")?;
/// }
/// # Ok::<(), sqllocaldb::SqlLocalDbError>(())
/// ```
#[derive(Clone)]
pub struct SqlLocalDbApi {
    api: Arc<dyn LocalDbInstanceApi>,
    translator: ErrorTranslator,
    options: SqlLocalDbOptions,
    instances_folder: Option<PathBuf>,
}

impl std::fmt::Debug for SqlLocalDbApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlLocalDbApi")
            .field("options", &self.options)
            .field("instances_folder", &self.instances_folder)
            .finish_non_exhaustive()
    }
}

impl Default for SqlLocalDbApi {
    fn default() -> Self {
        Self::new(SqlLocalDbOptions::default())
    }
}

impl SqlLocalDbApi {
    /// Use the instance API registered on this machine.
    ///
    /// Nothing is loaded until the first call.
    pub fn new(options: SqlLocalDbOptions) -> Self {
        let native = NativeInstanceApi::system(options.native_api_override_version.clone());
        Self::with_api(Arc::new(native), options)
    }

    /// Use `api` for every native call.
    pub fn with_api(api: Arc<dyn LocalDbInstanceApi>, options: SqlLocalDbOptions) -> Self {
        Self {
            translator: ErrorTranslator::new(Arc::clone(&api), options.language_id),
            api,
            options,
            instances_folder: None,
        }
    }

    /// Look for instance files under `folder` instead of the user's
    /// local application data folder.
    #[must_use]
    pub fn with_instances_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.instances_folder = Some(folder.into());
        self
    }

    /// The options this API was created with.
    pub fn options(&self) -> &SqlLocalDbOptions {
        &self.options
    }

    /// The translator used for native failures.
    pub fn translator(&self) -> &ErrorTranslator {
        &self.translator
    }

    /// Version of the loaded instance API, loading it if needed.
    pub fn native_api_version(&self) -> Option<ApiVersion> {
        self.api.native_api_version()
    }

    /// Folder LocalDB keeps instance files in, normally
    /// `%LOCALAPPDATA%\Microsoft\Microsoft SQL Server Local DB\Instances`.
    pub fn instances_folder_path(&self) -> Option<PathBuf> {
        if let Some(folder) = &self.instances_folder {
            return Some(folder.clone());
        }
        dirs::data_local_dir().map(|local| {
            local
                .join("Microsoft")
                .join("Microsoft SQL Server Local DB")
                .join("Instances")
        })
    }

    fn check(&self, code: i32, instance_name: Option<&str>) -> Result<()> {
        if code == 0 {
            Ok(())
        } else {
            Err(self.translator.translate(code, instance_name))
        }
    }

    /// Whether the LocalDB instance API is installed.
    ///
    /// Calls `LocalDBGetVersions` with an empty buffer; only
    /// `LOCALDB_ERROR_NOT_INSTALLED` means it is not.
    pub fn is_installed(&self) -> bool {
        let mut count = 0;
        let code = self.api.get_versions(None, &mut count);
        !ErrorCode::NotInstalled.matches(code)
    }

    /// Create an instance of `version` named `instance_name`.
    pub fn create_instance(&self, instance_name: &str, version: &str) -> Result<()> {
        ValidationError::check_instance_name(instance_name)?;
        check_version(version)?;

        tracing::debug!(instance = %instance_name, version = %version, "Creating instance");
        let code = self.api.create_instance(version, instance_name, RESERVED);
        self.check(code, Some(instance_name))?;
        tracing::debug!(instance = %instance_name, version = %version, "Created instance");
        Ok(())
    }

    /// Delete `instance_name`, and its files if the options say so.
    pub fn delete_instance(&self, instance_name: &str) -> Result<()> {
        self.delete_instance_with_files(
            instance_name,
            self.options.automatically_delete_instance_files,
        )
    }

    /// Delete `instance_name`, and its files if `delete_files` is set.
    pub fn delete_instance_with_files(&self, instance_name: &str, delete_files: bool) -> Result<()> {
        self.delete_instance_internal(instance_name, true, delete_files)
            .map(|_| ())
    }

    /// Delete `instance_name` if it exists.
    ///
    /// Returns `false` when LocalDB reports the instance as unknown.
    pub fn delete_instance_if_exists(&self, instance_name: &str) -> Result<bool> {
        self.delete_instance_internal(
            instance_name,
            false,
            self.options.automatically_delete_instance_files,
        )
    }

    pub(crate) fn delete_instance_internal(
        &self,
        instance_name: &str,
        fail_if_missing: bool,
        delete_files: bool,
    ) -> Result<bool> {
        ValidationError::check_instance_name(instance_name)?;

        tracing::debug!(instance = %instance_name, "Deleting instance");
        let code = self.api.delete_instance(instance_name, RESERVED);

        if !fail_if_missing && ErrorCode::UnknownInstance.matches(code) {
            tracing::debug!(instance = %instance_name, "Instance does not exist");
            return Ok(false);
        }
        self.check(code, Some(instance_name))?;

        if delete_files {
            self.delete_instance_files(instance_name);
        }

        tracing::debug!(instance = %instance_name, "Deleted instance");
        Ok(true)
    }

    /// Remove the on-disk folder of a deleted instance. Failures are logged.
    fn delete_instance_files(&self, instance_name: &str) {
        let Some(folder) = self.instances_folder_path() else {
            tracing::error!(instance = %instance_name, "Local application data folder not found");
            return;
        };
        let path = folder.join(instance_name);
        if !path.is_dir() {
            return;
        }

        tracing::debug!(instance = %instance_name, path = %path.display(), "Deleting instance files");
        match std::fs::remove_dir_all(&path) {
            Ok(()) => {
                tracing::debug!(instance = %instance_name, path = %path.display(), "Deleted instance files");
            }
            Err(e) => {
                tracing::error!(
                    instance = %instance_name,
                    path = %path.display(),
                    error = %e,
                    "Failed to delete instance files"
                );
            }
        }
    }

    /// Current state of `instance_name`.
    pub fn get_instance_info(&self, instance_name: &str) -> Result<InstanceInfo> {
        ValidationError::check_instance_name(instance_name)?;

        tracing::debug!(instance = %instance_name, "Getting instance information");
        let mut buffer = [0u8; INSTANCE_INFO_SIZE];
        let code = self.api.get_instance_info(instance_name, &mut buffer);
        self.check(code, Some(instance_name))?;

        let info = decode_instance_info(&buffer);
        tracing::debug!(instance = %instance_name, "Got instance information");
        Ok(info)
    }

    /// Names of every instance owned by the current user.
    pub fn get_instance_names(&self) -> Result<Vec<String>> {
        tracing::debug!("Getting instance names");
        let filled = call_with_sized_buffer(INSTANCE_NAME_STRIDE, |buffer, count| {
            self.api.get_instances(buffer, count)
        })
        .map_err(|code| self.translator.translate(code, None))?;

        let names = decode_string_array(&filled.data, INSTANCE_NAME_STRIDE, filled.count);
        tracing::debug!(count = names.len(), "Got instance names");
        Ok(names)
    }

    /// Details of an installed LocalDB version.
    pub fn get_version_info(&self, version: &str) -> Result<VersionInfo> {
        check_version(version)?;

        tracing::debug!(version = %version, "Getting version information");
        let mut buffer = [0u8; VERSION_INFO_SIZE];
        let code = self.api.get_version_info(version, &mut buffer);
        self.check(code, None)?;

        let info = decode_version_info(&buffer);
        tracing::debug!(version = %version, "Got version information");
        Ok(info)
    }

    /// Names of every installed LocalDB version.
    pub fn get_versions(&self) -> Result<Vec<String>> {
        tracing::debug!("Getting versions");
        let filled = call_with_sized_buffer(VERSION_NAME_STRIDE, |buffer, count| {
            self.api.get_versions(buffer, count)
        })
        .map_err(|code| match self.translator.translate(code, None) {
            SqlLocalDbError::Native(mut e) => {
                e.message = format!("failed to enumerate LocalDB versions: {}", e.message);
                SqlLocalDbError::Native(e)
            }
            other => other,
        })?;

        let versions = decode_string_array(&filled.data, VERSION_NAME_STRIDE, filled.count);
        tracing::debug!(count = versions.len(), "Got versions");
        Ok(versions)
    }

    /// Start `instance_name` and return its named pipe.
    ///
    /// The pipe name is only valid until the instance is next stopped.
    pub fn start_instance(&self, instance_name: &str) -> Result<String> {
        ValidationError::check_instance_name(instance_name)?;

        tracing::debug!(instance = %instance_name, "Starting instance");
        let filled = call_with_sized_buffer::<u16>(1, |buffer, count| {
            self.api.start_instance(instance_name, RESERVED, buffer, count)
        })
        .map_err(|code| self.translator.translate(code, Some(instance_name)))?;

        let pipe = decode_units_until_nul(&filled.data);
        tracing::debug!(instance = %instance_name, pipe = %pipe, "Started instance");
        Ok(pipe)
    }

    /// Stop `instance_name`, waiting up to `timeout_seconds`.
    ///
    /// A timeout of zero signals the instance to stop and returns
    /// immediately. A negative timeout is rejected.
    pub fn stop_instance(
        &self,
        instance_name: &str,
        options: StopInstanceOptions,
        timeout_seconds: i64,
    ) -> Result<()> {
        ValidationError::check_instance_name(instance_name)?;
        let timeout = ValidationError::check_timeout(timeout_seconds)?;

        tracing::debug!(
            instance = %instance_name,
            timeout_seconds = timeout,
            options = ?options,
            "Stopping instance"
        );
        let started = Instant::now();
        let code = self.api.stop_instance(instance_name, options.bits(), timeout);
        self.check(code, Some(instance_name))?;
        tracing::debug!(
            instance = %instance_name,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Stopped instance"
        );
        Ok(())
    }

    /// Stop `instance_name` using the configured options and timeout.
    pub fn stop_instance_default(&self, instance_name: &str) -> Result<()> {
        self.stop_instance(
            instance_name,
            self.options.stop_options,
            self.options.stop_timeout_seconds,
        )
    }

    /// Share `private_name` with other users as `shared_name`.
    ///
    /// `owner_sid` is the binary security identifier of the instance owner.
    /// An empty private name is rejected: LocalDB would accept it and leave
    /// an instance that cannot be recovered.
    pub fn share_instance(&self, owner_sid: &[u8], private_name: &str, shared_name: &str) -> Result<()> {
        if owner_sid.is_empty() {
            return Err(ValidationError::Empty("owner_sid").into());
        }
        if private_name.is_empty() {
            return Err(ValidationError::EmptyPrivateName.into());
        }
        ValidationError::check_instance_name(private_name)?;
        ValidationError::check_length(
            "shared_name",
            shared_name,
            sqllocaldb_errors::validation::MAX_INSTANCE_NAME_LENGTH,
        )?;

        tracing::debug!(instance = %private_name, shared_name = %shared_name, "Sharing instance");
        let code = self
            .api
            .share_instance(owner_sid, private_name, shared_name, RESERVED);
        self.check(code, Some(private_name))?;
        tracing::debug!(instance = %private_name, shared_name = %shared_name, "Shared instance");
        Ok(())
    }

    /// Share `private_name` as `shared_name`, owned by the current user.
    #[cfg(windows)]
    #[cfg_attr(docsrs, doc(cfg(windows)))]
    pub fn share_instance_for_current_user(&self, private_name: &str, shared_name: &str) -> Result<()> {
        let sid = sqllocaldb_interop::windows::current_user_sid().map_err(|e| {
            tracing::error!(error = %e, "Failed to read the current user's SID");
            SqlLocalDbError::from(sqllocaldb_errors::NativeError::new(
                ErrorCode::InternalError.code(),
                e.to_string(),
            ))
        })?;
        self.share_instance(&sid, private_name, shared_name)
    }

    /// Stop sharing `instance_name`.
    pub fn unshare_instance(&self, instance_name: &str) -> Result<()> {
        ValidationError::check_instance_name(instance_name)?;

        tracing::debug!(instance = %instance_name, "Stopping sharing instance");
        let code = self.api.unshare_instance(instance_name, RESERVED);
        self.check(code, Some(instance_name))?;
        tracing::debug!(instance = %instance_name, "Stopped sharing instance");
        Ok(())
    }

    /// Enable LocalDB API tracing.
    pub fn start_tracing(&self) -> Result<()> {
        tracing::debug!("Starting tracing");
        self.check(self.api.start_tracing(), None)?;
        tracing::debug!("Started tracing");
        Ok(())
    }

    /// Disable LocalDB API tracing.
    pub fn stop_tracing(&self) -> Result<()> {
        tracing::debug!("Stopping tracing");
        self.check(self.api.stop_tracing(), None)?;
        tracing::debug!("Stopped tracing");
        Ok(())
    }
}

fn check_version(version: &str) -> std::result::Result<(), ValidationError> {
    if version.is_empty() {
        return Err(ValidationError::Empty("version"));
    }
    ValidationError::check_length("version", version, MAX_VERSION_LENGTH)
}
