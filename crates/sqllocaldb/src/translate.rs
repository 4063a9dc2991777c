//! Turns native result codes into typed errors.

use std::sync::Arc;

use sqllocaldb_errors::{ErrorCode, NativeError, SqlLocalDbError};
use sqllocaldb_interop::LocalDbInstanceApi;
use sqllocaldb_interop::marshal::decode_units_until_nul;
use sqllocaldb_interop::sizing::call_with_sized_buffer;

/// Builds [`SqlLocalDbError`] values, asking LocalDB to describe each code.
#[derive(Clone)]
pub struct ErrorTranslator {
    api: Arc<dyn LocalDbInstanceApi>,
    language_id: u32,
}

impl std::fmt::Debug for ErrorTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorTranslator")
            .field("language_id", &self.language_id)
            .finish_non_exhaustive()
    }
}

/// `LocalDBFormatMessage` flags that report the required length when the
/// buffer is too small.
const FULL_MESSAGE: u32 = 0;

/// Message used when LocalDB cannot describe a result code.
pub fn generic_message(code: i32) -> String {
    format!("The LocalDB operation failed with error code {code:#010X}.")
}

impl ErrorTranslator {
    /// Translate through `api`, formatting messages in `language_id`.
    ///
    /// A `language_id` of `0` lets LocalDB pick the language.
    pub fn new(api: Arc<dyn LocalDbInstanceApi>, language_id: u32) -> Self {
        Self { api, language_id }
    }

    /// Language used for formatted messages.
    pub fn language_id(&self) -> u32 {
        self.language_id
    }

    /// Translate a nonzero result code.
    ///
    /// `LOCALDB_ERROR_NOT_INSTALLED` becomes [`SqlLocalDbError::NotInstalled`]
    /// without consulting LocalDB. Any other code is described by
    /// `LocalDBFormatMessage`; when that fails a generic message is used. The
    /// returned error always carries `code`.
    ///
    /// The message is sized with a zero-length first call, so truncation is
    /// never requested: with `TRUNCATE_ERROR_MESSAGE` set LocalDB answers that
    /// call with an empty message instead of the required length.
    pub fn translate(&self, code: i32, instance_name: Option<&str>) -> SqlLocalDbError {
        tracing::error!(code = format_args!("{code:#010X}"), instance = ?instance_name, "Native API returned an error");

        if ErrorCode::NotInstalled.matches(code) {
            tracing::error!("SQL Server LocalDB is not installed");
            return SqlLocalDbError::NotInstalled;
        }

        let formatted = call_with_sized_buffer::<u16>(1, |buffer, count| {
            self.api
                .format_message(code, FULL_MESSAGE, self.language_id, buffer, count)
        });

        let mut error = match formatted {
            Ok(buffer) => {
                let message = decode_units_until_nul(&buffer.data).trim_end().to_string();
                if message.is_empty() {
                    NativeError::new(code, generic_message(code))
                } else {
                    NativeError::new(code, message)
                }
            }
            Err(formatter_code) if ErrorCode::UnknownLanguageId.matches(formatter_code) => {
                tracing::warn!(language_id = self.language_id, "Invalid language id configured");
                NativeError::new(code, generic_message(code)).with_formatter_code(formatter_code)
            }
            Err(formatter_code) => {
                tracing::warn!(
                    code = format_args!("{code:#010X}"),
                    formatter_code = format_args!("{formatter_code:#010X}"),
                    "Failed to format error message"
                );
                NativeError::new(code, generic_message(formatter_code))
                    .with_formatter_code(formatter_code)
            }
        };

        if let Some(name) = instance_name {
            error = error.with_instance(name);
        }

        tracing::error!(code = format_args!("{code:#010X}"), message = %error.message, "LocalDB error");
        error.into()
    }
}
