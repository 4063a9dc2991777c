//! Instances that live only as long as a guard value.

use sqllocaldb_errors::Result;
use uuid::Uuid;

use crate::api::SqlLocalDbApi;
use crate::options::StopInstanceOptions;

/// A started LocalDB instance that is stopped and deleted on drop.
///
/// Failures while cleaning up are logged, not raised.
///
/// # Examples
///
/// ```no_run
/// use sqllocaldb::{SqlLocalDbApi, TemporaryInstance};
///
/// let api = SqlLocalDbApi::default();
/// let instance = TemporaryInstance::create(&api, true)?;
/// println!("{} is listening on {}", instance.name(), instance.named_pipe());
/// # Ok::<(), sqllocaldb::SqlLocalDbError>(())
/// ```
#[derive(Debug)]
pub struct TemporaryInstance<'a> {
    api: &'a SqlLocalDbApi,
    name: String,
    named_pipe: String,
    delete_files: bool,
}

impl<'a> TemporaryInstance<'a> {
    /// Create and start an instance with a random name and the latest
    /// installed version.
    pub fn create(api: &'a SqlLocalDbApi, delete_files: bool) -> Result<Self> {
        Self::create_named(api, &Uuid::new_v4().to_string(), delete_files)
    }

    /// Create and start `name` with the latest installed version.
    ///
    /// If the instance cannot be started it is deleted again.
    pub fn create_named(api: &'a SqlLocalDbApi, name: &str, delete_files: bool) -> Result<Self> {
        let version = api.latest_version()?;
        api.create_instance(name, &version)?;

        let named_pipe = match api.start_instance(name) {
            Ok(pipe) => pipe,
            Err(e) => {
                if let Err(cleanup) = api.delete_instance_with_files(name, delete_files) {
                    tracing::warn!(instance = %name, error = %cleanup, "Failed to delete temporary instance");
                }
                return Err(e);
            }
        };

        tracing::debug!(instance = %name, "Temporary instance started");
        Ok(Self {
            api,
            name: name.to_string(),
            named_pipe,
            delete_files,
        })
    }

    /// Name of the instance.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Named pipe the instance was listening on when it started.
    pub fn named_pipe(&self) -> &str {
        &self.named_pipe
    }
}

impl Drop for TemporaryInstance<'_> {
    fn drop(&mut self) {
        let timeout = self.api.options().stop_timeout_seconds;
        if let Err(e) = self
            .api
            .stop_instance(&self.name, StopInstanceOptions::NONE, timeout)
        {
            tracing::warn!(instance = %self.name, error = %e, "Failed to stop temporary instance");
        }
        if let Err(e) = self
            .api
            .delete_instance_with_files(&self.name, self.delete_files)
        {
            tracing::warn!(instance = %self.name, error = %e, "Failed to delete temporary instance");
        }
    }
}
