//! The closed catalog of result codes reported by the LocalDB instance API.
//!
//! Every native export returns an `HRESULT`-style `i32`. Zero means success;
//! the values below are the failures LocalDB documents. Any other nonzero
//! value is treated as an unknown native failure.

use core::fmt;

use crate::ErrorKind;

macro_rules! error_codes {
    ($(
        $(#[$meta:meta])*
        $variant:ident = $value:literal => $native:literal, $kind:ident;
    )+) => {
        /// A known LocalDB result code.
        ///
        /// The discriminant of each variant is the exact value returned by the
        /// native API, so `ErrorCode::NotInstalled as i32` can be compared with
        /// a raw result directly.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(i32)]
        pub enum ErrorCode {
            $(
                $(#[$meta])*
                $variant = $value as i32,
            )+
        }

        impl ErrorCode {
            /// Every code in the catalog, in ascending numeric order.
            pub const ALL: &'static [ErrorCode] = &[$(ErrorCode::$variant),+];

            /// Look up a raw result code in the catalog.
            ///
            /// Returns `None` for success (`0`) and for codes LocalDB does not
            /// document.
            ///
            /// # Examples
            ///
            /// ```
            /// use sqllocaldb_errors::ErrorCode;
            ///
            /// assert_eq!(ErrorCode::from_code(0x89C5_0116_u32 as i32), Some(ErrorCode::NotInstalled));
            /// assert_eq!(ErrorCode::from_code(0), None);
            /// ```
            pub fn from_code(code: i32) -> Option<Self> {
                match code {
                    $(c if c == ($value as i32) => Some(ErrorCode::$variant),)+
                    _ => None,
                }
            }

            /// The name of the constant in the native `sqlncli.h` header.
            pub fn native_name(self) -> &'static str {
                match self {
                    $(ErrorCode::$variant => $native,)+
                }
            }

            /// The classification used when surfacing this code to callers.
            pub fn kind(self) -> ErrorKind {
                match self {
                    $(ErrorCode::$variant => ErrorKind::$kind,)+
                }
            }
        }
    };
}

error_codes! {
    /// The instance folder could not be created.
    CannotCreateInstanceFolder = 0x89C5_0100_u32 => "LOCALDB_ERROR_CANNOT_CREATE_INSTANCE_FOLDER", NativeFailure;
    /// A parameter passed to the API was invalid.
    InvalidParameter = 0x89C5_0101_u32 => "LOCALDB_ERROR_INVALID_PARAMETER", NativeFailure;
    /// An instance with the same name exists with a lower version.
    InstanceExistsWithLowerVersion = 0x89C5_0102_u32 => "LOCALDB_ERROR_INSTANCE_EXISTS_WITH_LOWER_VERSION", Conflict;
    /// The user profile folder could not be determined.
    CannotGetUserProfileFolder = 0x89C5_0103_u32 => "LOCALDB_ERROR_CANNOT_GET_USER_PROFILE_FOLDER", NativeFailure;
    /// The instance folder path is too long.
    InstanceFolderPathTooLong = 0x89C5_0104_u32 => "LOCALDB_ERROR_INSTANCE_FOLDER_PATH_TOO_LONG", NativeFailure;
    /// The instance folder could not be accessed.
    CannotAccessInstanceFolder = 0x89C5_0105_u32 => "LOCALDB_ERROR_CANNOT_ACCESS_INSTANCE_FOLDER", NativeFailure;
    /// The instance registry could not be accessed.
    CannotAccessInstanceRegistry = 0x89C5_0106_u32 => "LOCALDB_ERROR_CANNOT_ACCESS_INSTANCE_REGISTRY", NativeFailure;
    /// The instance does not exist.
    UnknownInstance = 0x89C5_0107_u32 => "LOCALDB_ERROR_UNKNOWN_INSTANCE", NotFound;
    /// LocalDB reported an internal error.
    InternalError = 0x89C5_0108_u32 => "LOCALDB_ERROR_INTERNAL_ERROR", NativeFailure;
    /// The instance registry could not be modified.
    CannotModifyInstanceRegistry = 0x89C5_0109_u32 => "LOCALDB_ERROR_CANNOT_MODIFY_INSTANCE_REGISTRY", NativeFailure;
    /// The SQL Server process failed to start.
    ServerStartupFailed = 0x89C5_010A_u32 => "LOCALDB_ERROR_SQL_SERVER_STARTUP_FAILED", NativeFailure;
    /// The instance configuration is corrupt.
    InstanceConfigurationCorrupt = 0x89C5_010B_u32 => "LOCALDB_ERROR_INSTANCE_CONFIGURATION_CORRUPT", NativeFailure;
    /// The SQL Server process could not be created.
    CannotCreateSqlProcess = 0x89C5_010C_u32 => "LOCALDB_ERROR_CANNOT_CREATE_SQL_PROCESS", NativeFailure;
    /// The requested version is unknown.
    UnknownVersion = 0x89C5_010D_u32 => "LOCALDB_ERROR_UNKNOWN_VERSION", NotFound;
    /// The language identifier passed to the message formatter is unknown.
    UnknownLanguageId = 0x89C5_010E_u32 => "LOCALDB_ERROR_UNKNOWN_LANGUAGE_ID", NativeFailure;
    /// The instance did not stop.
    InstanceStopFailed = 0x89C5_010F_u32 => "LOCALDB_ERROR_INSTANCE_STOP_FAILED", NativeFailure;
    /// The error code passed to the message formatter is unknown.
    UnknownErrorCode = 0x89C5_0110_u32 => "LOCALDB_ERROR_UNKNOWN_ERROR_CODE", NativeFailure;
    /// The requested version is not installed.
    VersionNotInstalled = 0x89C5_0111_u32 => "LOCALDB_ERROR_VERSION_REQUESTED_NOT_INSTALLED", NotFound;
    /// The instance is in use.
    InstanceBusy = 0x89C5_0112_u32 => "LOCALDB_ERROR_INSTANCE_BUSY", Conflict;
    /// The operation is not valid for this instance, for example deleting an automatic instance.
    InvalidOperation = 0x89C5_0113_u32 => "LOCALDB_ERROR_INVALID_OPERATION", InvalidOperation;
    /// The supplied buffer is too small.
    InsufficientBuffer = 0x89C5_0114_u32 => "LOCALDB_ERROR_INSUFFICIENT_BUFFER", NativeFailure;
    /// The wait for the operation timed out.
    WaitTimeout = 0x89C5_0115_u32 => "LOCALDB_ERROR_WAIT_TIMEOUT", NativeFailure;
    /// LocalDB is not installed.
    NotInstalled = 0x89C5_0116_u32 => "LOCALDB_ERROR_NOT_INSTALLED", Unavailable;
    /// Extended events failed to initialize.
    XEventFailed = 0x89C5_0117_u32 => "LOCALDB_ERROR_XEVENT_FAILED", NativeFailure;
    /// The automatic instance could not be created.
    AutoInstanceCreateFailed = 0x89C5_0118_u32 => "LOCALDB_ERROR_AUTO_INSTANCE_CREATE_FAILED", NativeFailure;
    /// The shared name is already in use.
    SharedNameTaken = 0x89C5_0119_u32 => "LOCALDB_ERROR_SHARED_NAME_TAKEN", Conflict;
    /// The caller does not own the instance.
    CallerIsNotOwner = 0x89C5_011A_u32 => "LOCALDB_ERROR_CALLER_IS_NOT_OWNER", Conflict;
    /// The instance name is invalid.
    InvalidInstanceName = 0x89C5_011B_u32 => "LOCALDB_ERROR_INVALID_INSTANCE_NAME", NativeFailure;
    /// The instance is already shared.
    InstanceAlreadyShared = 0x89C5_011C_u32 => "LOCALDB_ERROR_INSTANCE_ALREADY_SHARED", Conflict;
    /// The instance is not shared.
    InstanceNotShared = 0x89C5_011D_u32 => "LOCALDB_ERROR_INSTANCE_NOT_SHARED", Conflict;
    /// Administrator rights are required.
    AdminRightsRequired = 0x89C5_011E_u32 => "LOCALDB_ERROR_ADMIN_RIGHTS_REQUIRED", NativeFailure;
    /// Too many instances are shared.
    TooManySharedInstances = 0x89C5_011F_u32 => "LOCALDB_ERROR_TOO_MANY_SHARED_INSTANCES", Conflict;
    /// The local application data path could not be determined.
    CannotGetLocalAppDataPath = 0x89C5_0120_u32 => "LOCALDB_ERROR_CANNOT_GET_LOCAL_APP_DATA_PATH", NativeFailure;
    /// Resources could not be loaded.
    CannotLoadResources = 0x89C5_0121_u32 => "LOCALDB_ERROR_CANNOT_LOAD_RESOURCES", NativeFailure;
    /// The data directory is missing.
    DataDirectoryMissing = 0x89C5_0200_u32 => "LOCALDB_EDETAIL_DATADIRECTORY_IS_MISSING", NativeFailure;
    /// The instance folder could not be accessed.
    CannotAccessInstanceFolderDetail = 0x89C5_0201_u32 => "LOCALDB_EDETAIL_CANNOT_ACCESS_INSTANCE_FOLDER", NativeFailure;
    /// The data directory path is too long.
    DataDirectoryIsTooLong = 0x89C5_0202_u32 => "LOCALDB_EDETAIL_DATADIRECTORY_IS_TOO_LONG", NativeFailure;
    /// The parent instance is missing.
    ParentInstanceIsMissing = 0x89C5_0203_u32 => "LOCALDB_EDETAIL_PARENT_INSTANCE_IS_MISSING", NativeFailure;
    /// The parent instance name is too long.
    ParentInstanceIsTooLong = 0x89C5_0204_u32 => "LOCALDB_EDETAIL_PARENT_INSTANCE_IS_TOO_LONG", NativeFailure;
    /// The data directory is invalid.
    DataDirectoryInvalid = 0x89C5_0205_u32 => "LOCALDB_EDETAIL_DATA_DIRECTORY_INVALID", NativeFailure;
    /// An extended events assertion failed.
    XEventAssert = 0x89C5_0206_u32 => "LOCALDB_EDETAIL_XEVENT_ASSERT", NativeFailure;
    /// An extended events error occurred.
    XEventError = 0x89C5_0207_u32 => "LOCALDB_EDETAIL_XEVENT_ERROR", NativeFailure;
    /// The installation is corrupted.
    InstallationCorrupted = 0x89C5_0208_u32 => "LOCALDB_EDETAIL_INSTALLATION_CORRUPTED", NativeFailure;
    /// The program files location could not be determined.
    CannotGetProgramFilesLocation = 0x89C5_0209_u32 => "LOCALDB_EDETAIL_CANNOT_GET_PROGRAM_FILES_LOCATION", NativeFailure;
    /// Extended events could not be initialized.
    CannotInitializeXEvent = 0x89C5_020A_u32 => "LOCALDB_EDETAIL_XEVENT_CANNOT_INITIALIZE", NativeFailure;
    /// The extended events configuration file could not be found.
    CannotFindXEventConfigFile = 0x89C5_020B_u32 => "LOCALDB_EDETAIL_XEVENT_CANNOT_FIND_CONF", NativeFailure;
    /// Extended events could not be configured.
    CannotConfigureXEvent = 0x89C5_020C_u32 => "LOCALDB_EDETAIL_XEVENT_CONFIGURATION_ERROR", NativeFailure;
    /// The extended events configuration file path is too long.
    XEventConfigFileTooLong = 0x89C5_020D_u32 => "LOCALDB_EDETAIL_XEVENT_CONF_FILE_NAME_TOO_LONG", NativeFailure;
    /// `CoInitializeEx` failed.
    CoInitializeExFailed = 0x89C5_020E_u32 => "LOCALDB_EDETAIL_COINITIALIZEEX_FAILED", NativeFailure;
    /// The parent instance version is invalid.
    ParentInstanceVersionInvalid = 0x89C5_020F_u32 => "LOCALDB_EDETAIL_PARENT_INSTANCE_VERSION_INVALID", NativeFailure;
    /// A Windows API call failed.
    WindowsApiError = 0x89C5_0210_u32 => "LOCALDB_EDETAIL_WINAPI_ERROR", NativeFailure;
    /// A Windows API call returned an unexpected result.
    UnexpectedResult = 0x89C5_0211_u32 => "LOCALDB_EDETAIL_UNEXPECTED_RESULT", NativeFailure;
}

impl ErrorCode {
    /// The raw numeric result code.
    ///
    /// # Examples
    ///
    /// ```
    /// use sqllocaldb_errors::ErrorCode;
    ///
    /// assert_eq!(ErrorCode::UnknownInstance.code() as u32, 0x89C5_0107);
    /// ```
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Whether `code` is this catalog entry.
    pub fn matches(self, code: i32) -> bool {
        self.code() == code
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:08X})", self.native_name(), self.code() as u32)
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_is_sorted_and_unique() {
        for pair in ErrorCode::ALL.windows(2) {
            if let [a, b] = pair {
                assert!((a.code() as u32) < (b.code() as u32), "{a} >= {b}");
            }
        }
    }

    #[test]
    fn test_catalog_size() {
        assert_eq!(ErrorCode::ALL.len(), 52);
    }

    #[test]
    fn test_from_code_round_trips_catalog() {
        for &code in ErrorCode::ALL {
            assert_eq!(ErrorCode::from_code(code.code()), Some(code));
        }
    }

    #[test]
    fn test_success_is_not_in_catalog() {
        assert_eq!(ErrorCode::from_code(0), None);
        assert_eq!(ErrorCode::from_code(-1), None);
    }

    #[test]
    fn test_display_includes_native_name_and_hex() {
        let text = ErrorCode::InsufficientBuffer.to_string();
        assert_eq!(text, "LOCALDB_ERROR_INSUFFICIENT_BUFFER (0x89C50114)");
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(ErrorCode::NotInstalled.kind(), ErrorKind::Unavailable);
        assert_eq!(ErrorCode::UnknownInstance.kind(), ErrorKind::NotFound);
        assert_eq!(ErrorCode::UnknownVersion.kind(), ErrorKind::NotFound);
        assert_eq!(ErrorCode::InstanceBusy.kind(), ErrorKind::Conflict);
        assert_eq!(ErrorCode::InstanceAlreadyShared.kind(), ErrorKind::Conflict);
        assert_eq!(ErrorCode::InstanceNotShared.kind(), ErrorKind::Conflict);
        assert_eq!(
            ErrorCode::InstanceExistsWithLowerVersion.kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            ErrorCode::InvalidOperation.kind(),
            ErrorKind::InvalidOperation
        );
        assert_eq!(ErrorCode::WaitTimeout.kind(), ErrorKind::NativeFailure);
    }
}
