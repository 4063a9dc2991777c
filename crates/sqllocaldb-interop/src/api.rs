//! The raw instance API as a Rust trait.
//!
//! [`LocalDbInstanceApi`] has one method per export of `SqlUserInstance.dll`.
//! Methods take slices and string slices instead of raw pointers and return
//! the raw result code, so callers decide how to interpret failures.
//! [`NativeInstanceApi`] forwards to the real module; tests substitute their
//! own implementation.

#![allow(unsafe_code)]

use std::ffi::c_void;
use std::ptr;

use libloading::Library;
use sqllocaldb_errors::ErrorCode;

use crate::exports::ExportTable;
use crate::function::ResolvedFunction;
use crate::loader::{ModuleLoader, NativeModule};
use crate::marshal::{INSTANCE_NAME_STRIDE, VERSION_NAME_STRIDE, to_wide_nul};
use crate::resolver::NativeApiPathResolver;
use crate::version::ApiVersion;

/// The LocalDB instance API.
///
/// Every method returns `0` on success or a LocalDB result code. Buffer
/// arguments follow the native contract: `count` is the capacity of the
/// buffer on input and the required or written element count on output.
pub trait LocalDbInstanceApi: Send + Sync {
    /// Version of the loaded instance API, or `None` if it is unavailable.
    fn native_api_version(&self) -> Option<ApiVersion>;

    /// `LocalDBCreateInstance`
    fn create_instance(&self, version: &str, instance_name: &str, flags: u32) -> i32;

    /// `LocalDBDeleteInstance`
    fn delete_instance(&self, instance_name: &str, flags: u32) -> i32;

    /// `LocalDBFormatMessage`; `count` is in UTF-16 units.
    fn format_message(
        &self,
        code: i32,
        flags: u32,
        language_id: u32,
        message: Option<&mut [u16]>,
        count: &mut u32,
    ) -> i32;

    /// `LocalDBGetInstanceInfo` into a `LOCALDB_INSTANCE_INFO` buffer.
    fn get_instance_info(&self, instance_name: &str, info: &mut [u8]) -> i32;

    /// `LocalDBGetInstances`; `count` is in 258-byte name slots.
    fn get_instances(&self, names: Option<&mut [u8]>, count: &mut u32) -> i32;

    /// `LocalDBGetVersionInfo` into a `LOCALDB_VERSION_INFO` buffer.
    fn get_version_info(&self, version: &str, info: &mut [u8]) -> i32;

    /// `LocalDBGetVersions`; `count` is in 88-byte version slots.
    fn get_versions(&self, versions: Option<&mut [u8]>, count: &mut u32) -> i32;

    /// `LocalDBShareInstance`; `owner_sid` is a binary security identifier.
    fn share_instance(
        &self,
        owner_sid: &[u8],
        private_name: &str,
        shared_name: &str,
        flags: u32,
    ) -> i32;

    /// `LocalDBStartInstance`; `count` is in UTF-16 units.
    fn start_instance(
        &self,
        instance_name: &str,
        flags: u32,
        connection: Option<&mut [u16]>,
        count: &mut u32,
    ) -> i32;

    /// `LocalDBStartTracing`
    fn start_tracing(&self) -> i32;

    /// `LocalDBStopInstance`
    fn stop_instance(&self, instance_name: &str, flags: u32, timeout_seconds: u32) -> i32;

    /// `LocalDBStopTracing`
    fn stop_tracing(&self) -> i32;

    /// `LocalDBUnshareInstance`
    fn unshare_instance(&self, instance_name: &str, flags: u32) -> i32;
}

/// [`LocalDbInstanceApi`] backed by a dynamically loaded module.
///
/// Nothing is loaded until the first call. If the module or an export is
/// unavailable the call returns `LOCALDB_ERROR_NOT_INSTALLED`.
pub struct NativeInstanceApi<M = Library> {
    loader: ModuleLoader<M>,
    exports: ExportTable,
}

impl<M> std::fmt::Debug for NativeInstanceApi<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeInstanceApi")
            .field("loader", &self.loader)
            .field("resolved", &self.exports.resolved_count())
            .finish()
    }
}

impl NativeInstanceApi<Library> {
    /// The instance API registered on this machine.
    ///
    /// An empty `override_version` selects the latest installed version.
    pub fn system(override_version: impl Into<String>) -> Self {
        Self::new(ModuleLoader::from_resolver(NativeApiPathResolver::system(
            override_version,
        )))
    }
}

impl<M: NativeModule> NativeInstanceApi<M> {
    /// Forward calls to the module produced by `loader`.
    pub fn new(loader: ModuleLoader<M>) -> Self {
        Self {
            loader,
            exports: ExportTable::new(),
        }
    }

    /// The module loader.
    pub fn loader(&self) -> &ModuleLoader<M> {
        &self.loader
    }

    /// Release the module. Later calls report "not installed".
    pub fn unload(&self) {
        self.loader.unload();
    }

    fn invoke<F: Copy>(&self, function: &ResolvedFunction<F>, call: impl FnOnce(F) -> i32) -> i32 {
        // Held for the duration of the call so the module cannot be released
        // underneath it.
        let Some(_module) = self.loader.ensure_loaded() else {
            return ErrorCode::NotInstalled.code();
        };
        match function.resolve(&self.loader) {
            Some(function) => call(function),
            None => ErrorCode::NotInstalled.code(),
        }
    }
}

fn capacity(length: usize, stride: usize) -> u32 {
    u32::try_from(length / stride.max(1)).unwrap_or(u32::MAX)
}

fn out_buffer<T>(buffer: Option<&mut [T]>, stride: usize, count: &mut u32) -> *mut T {
    match buffer {
        Some(buffer) => {
            *count = (*count).min(capacity(buffer.len(), stride));
            buffer.as_mut_ptr()
        }
        None => {
            *count = 0;
            ptr::null_mut()
        }
    }
}

impl<M: NativeModule> LocalDbInstanceApi for NativeInstanceApi<M> {
    fn native_api_version(&self) -> Option<ApiVersion> {
        self.loader.ensure_loaded()?;
        self.loader.native_api_version()
    }

    fn create_instance(&self, version: &str, instance_name: &str, flags: u32) -> i32 {
        let version = to_wide_nul(version);
        let instance_name = to_wide_nul(instance_name);
        self.invoke(&self.exports.create_instance, |f| {
            // SAFETY: both strings are NUL-terminated and outlive the call.
            unsafe { f(version.as_ptr(), instance_name.as_ptr(), flags) }
        })
    }

    fn delete_instance(&self, instance_name: &str, flags: u32) -> i32 {
        let instance_name = to_wide_nul(instance_name);
        self.invoke(&self.exports.delete_instance, |f| {
            // SAFETY: the name is NUL-terminated and outlives the call.
            unsafe { f(instance_name.as_ptr(), flags) }
        })
    }

    fn format_message(
        &self,
        code: i32,
        flags: u32,
        language_id: u32,
        message: Option<&mut [u16]>,
        count: &mut u32,
    ) -> i32 {
        let message = out_buffer(message, 1, count);
        self.invoke(&self.exports.format_message, |f| {
            // SAFETY: `message` is null with a zero count, or valid for
            // `count` units.
            unsafe { f(code, flags, language_id, message, count) }
        })
    }

    fn get_instance_info(&self, instance_name: &str, info: &mut [u8]) -> i32 {
        let instance_name = to_wide_nul(instance_name);
        let size = capacity(info.len(), 1);
        self.invoke(&self.exports.get_instance_info, |f| {
            // SAFETY: `info` is valid for `size` bytes.
            unsafe { f(instance_name.as_ptr(), info.as_mut_ptr(), size) }
        })
    }

    fn get_instances(&self, names: Option<&mut [u8]>, count: &mut u32) -> i32 {
        let names = out_buffer(names, INSTANCE_NAME_STRIDE, count);
        self.invoke(&self.exports.get_instances, |f| {
            // SAFETY: `names` is null with a zero count, or valid for
            // `count` name slots.
            unsafe { f(names, count) }
        })
    }

    fn get_version_info(&self, version: &str, info: &mut [u8]) -> i32 {
        let version = to_wide_nul(version);
        let size = capacity(info.len(), 1);
        self.invoke(&self.exports.get_version_info, |f| {
            // SAFETY: `info` is valid for `size` bytes.
            unsafe { f(version.as_ptr(), info.as_mut_ptr(), size) }
        })
    }

    fn get_versions(&self, versions: Option<&mut [u8]>, count: &mut u32) -> i32 {
        let versions = out_buffer(versions, VERSION_NAME_STRIDE, count);
        self.invoke(&self.exports.get_versions, |f| {
            // SAFETY: `versions` is null with a zero count, or valid for
            // `count` version slots.
            unsafe { f(versions, count) }
        })
    }

    fn share_instance(
        &self,
        owner_sid: &[u8],
        private_name: &str,
        shared_name: &str,
        flags: u32,
    ) -> i32 {
        let private_name = to_wide_nul(private_name);
        let shared_name = to_wide_nul(shared_name);
        self.invoke(&self.exports.share_instance, |f| {
            // SAFETY: the SID bytes and both strings outlive the call; the
            // strings are NUL-terminated.
            unsafe {
                f(
                    owner_sid.as_ptr().cast::<c_void>(),
                    private_name.as_ptr(),
                    shared_name.as_ptr(),
                    flags,
                )
            }
        })
    }

    fn start_instance(
        &self,
        instance_name: &str,
        flags: u32,
        connection: Option<&mut [u16]>,
        count: &mut u32,
    ) -> i32 {
        let instance_name = to_wide_nul(instance_name);
        let connection = out_buffer(connection, 1, count);
        self.invoke(&self.exports.start_instance, |f| {
            // SAFETY: the name is NUL-terminated; `connection` is null with a
            // zero count, or valid for `count` units.
            unsafe { f(instance_name.as_ptr(), flags, connection, count) }
        })
    }

    fn start_tracing(&self) -> i32 {
        // SAFETY: takes no arguments.
        self.invoke(&self.exports.start_tracing, |f| unsafe { f() })
    }

    fn stop_instance(&self, instance_name: &str, flags: u32, timeout_seconds: u32) -> i32 {
        let instance_name = to_wide_nul(instance_name);
        self.invoke(&self.exports.stop_instance, |f| {
            // SAFETY: the name is NUL-terminated and outlives the call.
            unsafe { f(instance_name.as_ptr(), flags, timeout_seconds) }
        })
    }

    fn stop_tracing(&self) -> i32 {
        // SAFETY: takes no arguments.
        self.invoke(&self.exports.stop_tracing, |f| unsafe { f() })
    }

    fn unshare_instance(&self, instance_name: &str, flags: u32) -> i32 {
        let instance_name = to_wide_nul(instance_name);
        self.invoke(&self.exports.unshare_instance, |f| {
            // SAFETY: the name is NUL-terminated and outlives the call.
            unsafe { f(instance_name.as_ptr(), flags) }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::LoadFailure;
    use crate::marshal::{decode_string_array, encode_string_array};
    use crate::resolver::ResolvedVersion;
    use crate::sizing::call_with_sized_buffer;
    use std::path::PathBuf;
    use std::ptr::NonNull;

    const VERSIONS: [&str; 2] = ["11.0", "13.0"];

    unsafe extern "C" fn get_versions(versions: *mut u8, count: *mut u32) -> i32 {
        // SAFETY: the caller passes a valid count pointer.
        let available = unsafe { *count };
        // SAFETY: as above.
        unsafe { *count = VERSIONS.len() as u32 };
        if versions.is_null() || (available as usize) < VERSIONS.len() {
            return ErrorCode::InsufficientBuffer.code();
        }
        let encoded = encode_string_array(&VERSIONS, VERSION_NAME_STRIDE);
        // SAFETY: the buffer holds at least `VERSIONS.len()` slots.
        unsafe { ptr::copy_nonoverlapping(encoded.as_ptr(), versions, encoded.len()) };
        0
    }

    unsafe extern "C" fn stop_instance(name: *const u16, _flags: u32, timeout: u32) -> i32 {
        // SAFETY: the caller passes a NUL-terminated string.
        let first = unsafe { *name };
        if first == 0 {
            ErrorCode::UnknownInstance.code()
        } else {
            i32::try_from(timeout).unwrap_or(i32::MAX)
        }
    }

    struct FakeModule;

    impl NativeModule for FakeModule {
        fn symbol_address(&self, name: &str) -> Option<NonNull<c_void>> {
            let address = match name {
                "LocalDBGetVersions" => get_versions as crate::exports::GetVersionsFn as *mut c_void,
                "LocalDBStopInstance" => {
                    stop_instance as crate::exports::StopInstanceFn as *mut c_void
                }
                _ => return None,
            };
            NonNull::new(address)
        }
    }

    fn fake_api() -> NativeInstanceApi<FakeModule> {
        NativeInstanceApi::new(ModuleLoader::new(
            || {
                Some(ResolvedVersion {
                    version: ApiVersion::new(13, 0),
                    path: PathBuf::from("SqlUserInstance.dll"),
                })
            },
            |_| Ok(FakeModule),
        ))
    }

    #[test]
    fn test_sized_enumeration_through_module() -> Result<(), Box<dyn std::error::Error>> {
        let api = fake_api();
        let filled = call_with_sized_buffer(VERSION_NAME_STRIDE, |buffer, count| {
            api.get_versions(buffer, count)
        })
        .map_err(|code| format!("failed with {code:#x}"))?;

        assert_eq!(
            decode_string_array(&filled.data, VERSION_NAME_STRIDE, filled.count),
            VERSIONS
        );
        assert_eq!(api.native_api_version(), Some(ApiVersion::new(13, 0)));
        Ok(())
    }

    #[test]
    fn test_arguments_reach_the_export() {
        let api = fake_api();
        assert_eq!(api.stop_instance("v11.0", 0, 60), 60);
        assert_eq!(api.stop_instance("", 0, 60), ErrorCode::UnknownInstance.code());
    }

    #[test]
    fn test_missing_export_is_not_installed() {
        let api = fake_api();
        assert_eq!(api.start_tracing(), ErrorCode::NotInstalled.code());
        assert_eq!(api.create_instance("13.0", "x", 0), ErrorCode::NotInstalled.code());
    }

    #[test]
    fn test_missing_module_is_not_installed() {
        let api: NativeInstanceApi<FakeModule> =
            NativeInstanceApi::new(ModuleLoader::new(|| None, |_| Ok(FakeModule)));
        let mut count = 0;
        assert_eq!(api.get_versions(None, &mut count), ErrorCode::NotInstalled.code());
        assert_eq!(api.native_api_version(), None);
        assert_eq!(api.loader().failure(), Some(LoadFailure::NotFound));
    }

    #[test]
    fn test_unloaded_api_is_not_installed() {
        let api = fake_api();
        assert_eq!(api.stop_instance("a", 0, 1), 1);
        api.unload();
        assert_eq!(api.stop_instance("a", 0, 1), ErrorCode::NotInstalled.code());
    }

    #[test]
    fn test_count_is_clamped_to_buffer() {
        let mut buffer = vec![0u8; VERSION_NAME_STRIDE];
        let mut count = 10;
        let ptr = out_buffer(Some(&mut buffer), VERSION_NAME_STRIDE, &mut count);
        assert!(!ptr.is_null());
        assert_eq!(count, 1);

        let mut count = 10;
        assert!(out_buffer::<u8>(None, 1, &mut count).is_null());
        assert_eq!(count, 0);
    }
}
