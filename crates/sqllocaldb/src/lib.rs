//! Manage SQL Server LocalDB instances from Rust.
//!
//! [`SqlLocalDbApi`] wraps the LocalDB instance API: creating, starting,
//! stopping, sharing and deleting instances, and enumerating instances and
//! installed versions. Failures are [`SqlLocalDbError`] values that carry
//! LocalDB's numeric result code, its message and the instance involved.
//!
//! LocalDB only exists on Windows. Elsewhere [`SqlLocalDbApi::is_installed`]
//! returns `false` and every operation fails with
//! [`SqlLocalDbError::NotInstalled`].
//!
//! # Example
//!
//! ```no_run
//! use sqllocaldb::prelude::*;
//!
//! let api = SqlLocalDbApi::new(SqlLocalDbOptions {
//!     automatically_delete_instance_files: true,
//!     ..SqlLocalDbOptions::default()
//! });
//!
//! let info = api.get_or_create_instance("Scratch")?;
//! if !info.is_running {
//!     api.start_instance(&info.name)?;
//! }
//! # Ok::<(), SqlLocalDbError>(())
//! ```
//!
//! # Logging
//!
//! Operations emit `tracing` events; install a subscriber to see them.

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod api;
pub mod manager;
pub mod options;
pub mod prelude;
pub mod temporary;
pub mod translate;

pub use api::{DEFAULT_INSTANCE_NAME, DEFAULT_INSTANCE_NAME_V11, SqlLocalDbApi};
pub use manager::is_default_instance_name;
pub use options::{SqlLocalDbOptions, StopInstanceOptions};
pub use temporary::TemporaryInstance;
pub use translate::ErrorTranslator;

pub use sqllocaldb_errors::{ErrorCode, ErrorKind, NativeError, Result, SqlLocalDbError, ValidationError};
pub use sqllocaldb_interop::{ApiVersion, InstanceInfo, LocalDbInstanceApi, VersionInfo};
