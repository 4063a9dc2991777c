//! Signatures of the functions exported by `SqlUserInstance.dll`.
//!
//! All exports use the C calling convention and return an `HRESULT`.
//! Strings are NUL-terminated UTF-16; sizes are `DWORD` counts.

#![allow(unsafe_code)]

use std::ffi::c_void;

use crate::function::ResolvedFunction;

/// `LocalDBCreateInstance(wszVersion, pInstanceName, dwFlags)`
pub type CreateInstanceFn =
    unsafe extern "C" fn(version: *const u16, instance_name: *const u16, flags: u32) -> i32;

/// `LocalDBDeleteInstance(pInstanceName, dwFlags)`
pub type DeleteInstanceFn = unsafe extern "C" fn(instance_name: *const u16, flags: u32) -> i32;

/// `LocalDBFormatMessage(hrLocalDB, dwFlags, dwLanguageId, wszMessage, lpcchMessage)`
pub type FormatMessageFn = unsafe extern "C" fn(
    code: i32,
    flags: u32,
    language_id: u32,
    message: *mut u16,
    message_length: *mut u32,
) -> i32;

/// `LocalDBGetInstanceInfo(wszInstanceName, pInfo, dwInfoSize)`
pub type GetInstanceInfoFn =
    unsafe extern "C" fn(instance_name: *const u16, info: *mut u8, info_size: u32) -> i32;

/// `LocalDBGetInstances(pInstanceNames, lpdwNumberOfInstances)`
pub type GetInstancesFn = unsafe extern "C" fn(names: *mut u8, count: *mut u32) -> i32;

/// `LocalDBGetVersionInfo(wszVersion, pVersionInfo, dwVersionInfoSize)`
pub type GetVersionInfoFn =
    unsafe extern "C" fn(version: *const u16, info: *mut u8, info_size: u32) -> i32;

/// `LocalDBGetVersions(pVersion, lpdwNumberOfVersions)`
pub type GetVersionsFn = unsafe extern "C" fn(versions: *mut u8, count: *mut u32) -> i32;

/// `LocalDBShareInstance(pOwnerSID, pInstancePrivateName, pInstanceSharedName, dwFlags)`
pub type ShareInstanceFn = unsafe extern "C" fn(
    owner_sid: *const c_void,
    private_name: *const u16,
    shared_name: *const u16,
    flags: u32,
) -> i32;

/// `LocalDBStartInstance(pInstanceName, dwFlags, wszSqlConnection, lpcchSqlConnection)`
pub type StartInstanceFn = unsafe extern "C" fn(
    instance_name: *const u16,
    flags: u32,
    connection: *mut u16,
    connection_length: *mut u32,
) -> i32;

/// `LocalDBStartTracing()`
pub type StartTracingFn = unsafe extern "C" fn() -> i32;

/// `LocalDBStopInstance(pInstanceName, dwFlags, ulTimeout)`
pub type StopInstanceFn =
    unsafe extern "C" fn(instance_name: *const u16, flags: u32, timeout_seconds: u32) -> i32;

/// `LocalDBStopTracing()`
pub type StopTracingFn = unsafe extern "C" fn() -> i32;

/// `LocalDBUnshareInstance(pInstanceName, dwFlags)`
pub type UnshareInstanceFn = unsafe extern "C" fn(instance_name: *const u16, flags: u32) -> i32;

macro_rules! export_table {
    ($($field:ident: $ty:ty = $name:literal,)+) => {
        /// One lazily resolved cell per instance API export.
        #[derive(Debug)]
        pub struct ExportTable {
            $(
                #[doc = concat!("`", $name, "`")]
                pub $field: ResolvedFunction<$ty>,
            )+
        }

        impl ExportTable {
            /// Names of every export, in alphabetical order.
            pub const NAMES: &'static [&'static str] = &[$($name),+];

            /// Create a table with nothing resolved.
            pub fn new() -> Self {
                Self {
                    $(
                        // SAFETY: the alias declared above matches the
                        // documented signature of this export.
                        $field: unsafe { ResolvedFunction::new($name) },
                    )+
                }
            }

            /// Number of exports resolved so far.
            pub fn resolved_count(&self) -> usize {
                [$(self.$field.get().is_some()),+]
                    .into_iter()
                    .filter(|resolved| *resolved)
                    .count()
            }
        }
    };
}

export_table! {
    create_instance: CreateInstanceFn = "LocalDBCreateInstance",
    delete_instance: DeleteInstanceFn = "LocalDBDeleteInstance",
    format_message: FormatMessageFn = "LocalDBFormatMessage",
    get_instance_info: GetInstanceInfoFn = "LocalDBGetInstanceInfo",
    get_instances: GetInstancesFn = "LocalDBGetInstances",
    get_version_info: GetVersionInfoFn = "LocalDBGetVersionInfo",
    get_versions: GetVersionsFn = "LocalDBGetVersions",
    share_instance: ShareInstanceFn = "LocalDBShareInstance",
    start_instance: StartInstanceFn = "LocalDBStartInstance",
    start_tracing: StartTracingFn = "LocalDBStartTracing",
    stop_instance: StopInstanceFn = "LocalDBStopInstance",
    stop_tracing: StopTracingFn = "LocalDBStopTracing",
    unshare_instance: UnshareInstanceFn = "LocalDBUnshareInstance",
}

impl Default for ExportTable {
    fn default() -> Self {
        Self::new()
    }
}
