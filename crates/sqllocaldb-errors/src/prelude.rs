//! Prelude module for convenient error handling imports.
//!
//! # Example
//!
//! ```
//! use sqllocaldb_errors::prelude::*;
//!
//! fn stop_timeout(seconds: i64) -> Result<u32> {
//!     Ok(ValidationError::check_timeout(seconds)?)
//! }
//!
//! assert!(stop_timeout(-5).is_err());
//! ```

pub use crate::{
    Result,
    codes::ErrorCode,
    error::{ErrorKind, NativeError, SqlLocalDbError},
    validation::ValidationError,
};
