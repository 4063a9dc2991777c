//! Convenience re-exports for common types.

pub use crate::api::{DEFAULT_INSTANCE_NAME, DEFAULT_INSTANCE_NAME_V11, SqlLocalDbApi};
pub use crate::manager::is_default_instance_name;
pub use crate::options::{SqlLocalDbOptions, StopInstanceOptions};
pub use crate::temporary::TemporaryInstance;
pub use crate::translate::ErrorTranslator;
pub use sqllocaldb_errors::prelude::*;
pub use sqllocaldb_interop::{ApiVersion, InstanceInfo, LocalDbInstanceApi, VersionInfo};
