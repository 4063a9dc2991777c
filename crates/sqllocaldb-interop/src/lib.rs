//! Native interop for the SQL Server LocalDB instance API.
//!
//! LocalDB ships its management API as `SqlUserInstance.dll`, one copy per
//! installed version. This crate finds and loads it, and converts between
//! its fixed-layout buffers and Rust values:
//!
//! - [`resolver`]: picks the module to load from the `Installed Versions`
//!   registry key, honouring an optional version override
//! - [`loader`]: loads that module once and releases it on request
//! - [`function`] and [`exports`]: lazily resolved, cached function pointers
//! - [`marshal`] and [`sizing`]: buffer layouts and the two-call sizing
//!   convention
//! - [`api`]: the [`LocalDbInstanceApi`] trait and its native implementation
//!
//! # Platform support
//!
//! LocalDB only exists on Windows. Elsewhere the registry is empty, so every
//! call reports `LOCALDB_ERROR_NOT_INSTALLED`.
//!
//! # Example
//!
//! ```no_run
//! use sqllocaldb_interop::prelude::*;
//!
//! let api = NativeInstanceApi::system("");
//! let versions = call_with_sized_buffer(VERSION_NAME_STRIDE, |buffer, count| {
//!     api.get_versions(buffer, count)
//! });
//! if let Ok(filled) = versions {
//!     for name in decode_string_array(&filled.data, VERSION_NAME_STRIDE, filled.count) {
//!         println!("{name}");
//!     }
//! }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod api;
pub mod exports;
pub mod function;
pub mod info;
pub mod loader;
pub mod marshal;
pub mod prelude;
pub mod registry;
pub mod resolver;
pub mod sizing;
pub mod version;

#[cfg(windows)]
#[cfg_attr(docsrs, doc(cfg(windows)))]
pub mod windows;

pub use api::{LocalDbInstanceApi, NativeInstanceApi};
pub use info::{InstanceInfo, VersionInfo};
pub use loader::{LoadFailure, ModuleLoader, NativeModule};
pub use resolver::{NativeApiPathResolver, ResolvedVersion};
pub use sizing::{SizedBuffer, call_with_sized_buffer};
pub use version::ApiVersion;
