//! Result codes and typed errors for the SQL Server LocalDB instance API.
//!
//! The LocalDB native API reports every outcome as an `HRESULT`-style `i32`.
//! This crate provides:
//!
//! - [`codes`]: the closed catalog of documented result codes
//! - [`error`]: the error taxonomy surfaced to callers
//! - [`validation`]: argument checks performed before any native call
//!
//! # Example
//!
//! ```
//! use sqllocaldb_errors::prelude::*;
//!
//! let err = SqlLocalDbError::from(NativeError::new(ErrorCode::UnknownInstance.code(), "gone"));
//! assert_eq!(err.kind(), ErrorKind::NotFound);
//! assert!(err.is(ErrorCode::UnknownInstance));
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod codes;
pub mod error;
pub mod prelude;
pub mod validation;

pub use codes::ErrorCode;
pub use error::{ErrorKind, NativeError, SqlLocalDbError};
pub use validation::ValidationError;

/// A specialized `Result` type for LocalDB operations.
pub type Result<T> = std::result::Result<T, SqlLocalDbError>;
