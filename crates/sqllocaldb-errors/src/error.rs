//! Typed errors surfaced by the LocalDB bindings.
//!
//! Every failure carries the original numeric result code so callers can
//! branch on it without matching message text.

use core::fmt;

use crate::{ErrorCode, ValidationError};

/// Classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorKind {
    /// LocalDB is not installed, or its instance API could not be loaded.
    Unavailable = 0,
    /// The named instance or version does not exist.
    NotFound = 1,
    /// The instance is in a state that conflicts with the request.
    Conflict = 2,
    /// The arguments were rejected before calling into LocalDB.
    InvalidArgument = 3,
    /// The operation is not permitted for this instance (automatic instances).
    InvalidOperation = 4,
    /// Any other nonzero native result.
    NativeFailure = 5,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Unavailable => write!(f, "unavailable"),
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::InvalidArgument => write!(f, "invalid argument"),
            ErrorKind::InvalidOperation => write!(f, "invalid operation"),
            ErrorKind::NativeFailure => write!(f, "native failure"),
        }
    }
}

/// A nonzero result returned by a native export, after translation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct NativeError {
    /// The raw result code returned by the failing export.
    pub code: i32,
    /// Human-readable description, localized when LocalDB could format it.
    pub message: String,
    /// The instance the operation targeted, if any.
    pub instance_name: Option<String>,
    /// The result code of `LocalDBFormatMessage` when it failed to describe `code`.
    pub formatter_code: Option<i32>,
}

impl NativeError {
    /// Create a native error with a message and no instance context.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            instance_name: None,
            formatter_code: None,
        }
    }

    /// Attach the name of the instance the failing call targeted.
    #[must_use]
    pub fn with_instance(mut self, name: impl Into<String>) -> Self {
        self.instance_name = Some(name.into());
        self
    }

    /// Record the code returned by the message formatter.
    #[must_use]
    pub fn with_formatter_code(mut self, code: i32) -> Self {
        self.formatter_code = Some(code);
        self
    }

    /// The catalog entry for this code, if LocalDB documents it.
    pub fn error_code(&self) -> Option<ErrorCode> {
        ErrorCode::from_code(self.code)
    }

    /// Classification of this failure.
    pub fn kind(&self) -> ErrorKind {
        self.error_code()
            .map_or(ErrorKind::NativeFailure, ErrorCode::kind)
    }
}

/// Top-level error type for LocalDB operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SqlLocalDbError {
    /// LocalDB is not installed or no usable instance API was found.
    #[error("SQL Server LocalDB is not installed")]
    NotInstalled,

    /// LocalDB reported no installed versions.
    #[error("no versions of SQL Server LocalDB are installed")]
    NoVersionsInstalled,

    /// Arguments rejected before any native call was made.
    #[error("invalid argument: {0}")]
    Validation(#[from] ValidationError),

    /// A native export returned a failure code.
    #[error("{0}")]
    Native(#[from] NativeError),
}

impl SqlLocalDbError {
    /// The numeric result code for this error.
    ///
    /// Caller-side validation failures report
    /// [`ErrorCode::InvalidParameter`]; the remaining variants report the code
    /// LocalDB returned.
    pub fn code(&self) -> i32 {
        match self {
            SqlLocalDbError::NotInstalled => ErrorCode::NotInstalled.code(),
            SqlLocalDbError::NoVersionsInstalled => ErrorCode::VersionNotInstalled.code(),
            SqlLocalDbError::Validation(_) => ErrorCode::InvalidParameter.code(),
            SqlLocalDbError::Native(e) => e.code,
        }
    }

    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SqlLocalDbError::NotInstalled => ErrorKind::Unavailable,
            SqlLocalDbError::NoVersionsInstalled => ErrorKind::NotFound,
            SqlLocalDbError::Validation(_) => ErrorKind::InvalidArgument,
            SqlLocalDbError::Native(e) => e.kind(),
        }
    }

    /// The instance the failing operation targeted, if known.
    pub fn instance_name(&self) -> Option<&str> {
        match self {
            SqlLocalDbError::Native(e) => e.instance_name.as_deref(),
            _ => None,
        }
    }

    /// Whether this error carries the given catalog code.
    pub fn is(&self, code: ErrorCode) -> bool {
        self.code() == code.code()
    }
}
