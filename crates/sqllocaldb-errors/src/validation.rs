//! Caller-side argument validation.
//!
//! These checks run before any native call. LocalDB would reject most of
//! them itself, but an empty private name passed to `LocalDBShareInstance`
//! is accepted and leaves an instance that cannot be recovered.

/// Maximum number of UTF-16 units in an instance name.
pub const MAX_INSTANCE_NAME_LENGTH: usize = 128;

/// Maximum number of UTF-16 units in a version string.
pub const MAX_VERSION_LENGTH: usize = 43;

/// Validation error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The value contains an interior NUL and cannot cross the native boundary.
    #[error("Field '{0}' contains an embedded NUL character")]
    EmbeddedNul(&'static str),

    /// A required value was empty.
    #[error("Required field '{0}' is empty")]
    Empty(&'static str),

    /// Sharing an instance requires a non-empty private name.
    #[error("The private name of the instance to share cannot be empty")]
    EmptyPrivateName,

    /// Stop timeouts cannot be negative.
    #[error("Timeout must be zero or positive, got {0} seconds")]
    NegativeTimeout(i64),

    /// The timeout does not fit the native `ULONG` seconds parameter.
    #[error("Timeout of {0} seconds is too large")]
    TimeoutTooLarge(i64),

    /// Value too long for its fixed-width native buffer.
    #[error("Field '{field}' value is too long: {actual} characters (max: {max})")]
    TooLong {
        /// Field name
        field: &'static str,
        /// Actual length in UTF-16 units
        actual: usize,
        /// Maximum allowed length
        max: usize,
    },
}

impl ValidationError {
    /// Check that `value` can be passed as a NUL-terminated wide string.
    pub fn check_wide(field: &'static str, value: &str) -> Result<(), ValidationError> {
        if value.contains('\0') {
            return Err(ValidationError::EmbeddedNul(field));
        }
        Ok(())
    }

    /// Check a value against the fixed capacity of its native buffer.
    pub fn check_length(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
        Self::check_wide(field, value)?;
        let actual = value.encode_utf16().count();
        if actual > max {
            return Err(ValidationError::TooLong { field, actual, max });
        }
        Ok(())
    }

    /// Check a non-empty instance name.
    pub fn check_instance_name(value: &str) -> Result<(), ValidationError> {
        if value.is_empty() {
            return Err(ValidationError::Empty("instance_name"));
        }
        Self::check_length("instance_name", value, MAX_INSTANCE_NAME_LENGTH)
    }

    /// Check a stop timeout expressed in whole seconds.
    pub fn check_timeout(seconds: i64) -> Result<u32, ValidationError> {
        if seconds < 0 {
            return Err(ValidationError::NegativeTimeout(seconds));
        }
        u32::try_from(seconds).map_err(|_| ValidationError::TimeoutTooLarge(seconds))
    }
}
