//! Windows-specific registry access, WOW64 detection and token queries.

#![allow(unsafe_code)]

use std::ffi::c_void;

use windows::Win32::Foundation::{CloseHandle, ERROR_SUCCESS, HANDLE, WIN32_ERROR};
use windows::Win32::Security::{
    GetLengthSid, GetTokenInformation, IsValidSid, TOKEN_QUERY, TOKEN_USER, TokenUser,
};
use windows::Win32::System::Registry::{
    HKEY, HKEY_LOCAL_MACHINE, KEY_READ, RRF_RT_REG_SZ, RegCloseKey, RegEnumKeyExW, RegGetValueW,
    RegOpenKeyExW,
};
use windows::Win32::System::Threading::{GetCurrentProcess, IsWow64Process, OpenProcessToken};
use windows::core::{BOOL, PCWSTR, PWSTR};

use crate::registry::{Registry, RegistryKey};

/// Longest registry key name, in UTF-16 units, plus the terminator.
const MAX_KEY_NAME_LENGTH: usize = 256;

fn to_wide(value: &str) -> Vec<u16> {
    value.encode_utf16().chain(std::iter::once(0)).collect()
}

/// The Windows registry, rooted at `HKEY_LOCAL_MACHINE`.
#[derive(Debug, Clone, Copy)]
pub struct WindowsRegistry {
    root: HKEY,
}

// SAFETY: predefined root keys are process-wide constants, not owned handles.
unsafe impl Send for WindowsRegistry {}
// SAFETY: as above; the root handle is never closed or mutated.
unsafe impl Sync for WindowsRegistry {}

impl WindowsRegistry {
    /// The `HKEY_LOCAL_MACHINE` hive.
    pub fn local_machine() -> Self {
        Self {
            root: HKEY_LOCAL_MACHINE,
        }
    }
}

impl Registry for WindowsRegistry {
    fn open_subkey(&self, path: &str) -> Option<Box<dyn RegistryKey>> {
        open_key(self.root, path).map(|key| Box::new(key) as Box<dyn RegistryKey>)
    }
}

/// An open registry key, closed on drop.
#[derive(Debug)]
pub struct WindowsRegistryKey {
    handle: HKEY,
}

fn open_key(parent: HKEY, path: &str) -> Option<WindowsRegistryKey> {
    let path_wide = to_wide(path);
    let mut handle = HKEY::default();

    // SAFETY: `path_wide` is NUL-terminated and outlives the call; `handle`
    // is a valid out pointer.
    let status = unsafe {
        RegOpenKeyExW(
            parent,
            PCWSTR(path_wide.as_ptr()),
            Some(0),
            KEY_READ,
            &mut handle,
        )
    };

    if status != ERROR_SUCCESS {
        tracing::trace!(key = %path, status = status.0, "Registry key could not be opened");
        return None;
    }

    Some(WindowsRegistryKey { handle })
}

impl RegistryKey for WindowsRegistryKey {
    fn subkey_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut buffer = [0u16; MAX_KEY_NAME_LENGTH];

        for index in 0u32.. {
            let mut length = MAX_KEY_NAME_LENGTH as u32;

            // SAFETY: `buffer` holds `length` UTF-16 units and outlives the call.
            let status: WIN32_ERROR = unsafe {
                RegEnumKeyExW(
                    self.handle,
                    index,
                    Some(PWSTR(buffer.as_mut_ptr())),
                    &mut length,
                    None,
                    None,
                    None,
                    None,
                )
            };

            if status != ERROR_SUCCESS {
                break;
            }

            let written = buffer.get(..length as usize).unwrap_or(&buffer);
            names.push(String::from_utf16_lossy(written));
        }

        names
    }

    fn open_subkey(&self, path: &str) -> Option<Box<dyn RegistryKey>> {
        open_key(self.handle, path).map(|key| Box::new(key) as Box<dyn RegistryKey>)
    }

    fn string_value(&self, name: &str) -> Option<String> {
        let name_wide = to_wide(name);
        let mut size = 0u32;

        // SAFETY: probing with no data buffer only writes the required size.
        let status = unsafe {
            RegGetValueW(
                self.handle,
                PCWSTR::null(),
                PCWSTR(name_wide.as_ptr()),
                RRF_RT_REG_SZ,
                None,
                None,
                Some(&mut size),
            )
        };
        if status != ERROR_SUCCESS {
            return None;
        }

        let mut data = vec![0u16; (size as usize).div_ceil(2)];
        // SAFETY: `data` is at least `size` bytes long and outlives the call.
        let status = unsafe {
            RegGetValueW(
                self.handle,
                PCWSTR::null(),
                PCWSTR(name_wide.as_ptr()),
                RRF_RT_REG_SZ,
                None,
                Some(data.as_mut_ptr().cast::<c_void>()),
                Some(&mut size),
            )
        };
        if status != ERROR_SUCCESS {
            return None;
        }

        let text = data.split(|&unit| unit == 0).next().unwrap_or(&[]);
        Some(String::from_utf16_lossy(text))
    }
}

impl Drop for WindowsRegistryKey {
    fn drop(&mut self) {
        if !self.handle.is_invalid() {
            close_key(self.handle);
        }
    }
}

/// Whether this is a 32-bit process running on 64-bit Windows.
///
/// Such processes read the `Wow6432Node` view of the registry.
pub fn is_wow64_process() -> bool {
    if cfg!(target_pointer_width = "64") {
        return false;
    }

    let mut wow64 = BOOL::default();
    // SAFETY: the pseudo handle of the current process is always valid.
    let result = unsafe { IsWow64Process(GetCurrentProcess(), &mut wow64) };
    result.is_ok() && wow64.as_bool()
}

/// The binary security identifier of the user running this process.
pub fn current_user_sid() -> std::io::Result<Vec<u8>> {
    let mut token = HANDLE::default();
    // SAFETY: `token` is a valid out pointer for the opened token handle.
    unsafe { OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token) }
        .map_err(std::io::Error::other)?;

    let sid = token_user_sid(token);

    close_handle(token);

    sid
}

/// Close a registry key, logging failure. Returns whether it closed.
fn close_key(key: HKEY) -> bool {
    // SAFETY: callers pass a key they own and never use it again.
    let status = unsafe { RegCloseKey(key) };
    if status != ERROR_SUCCESS {
        tracing::warn!(status = status.0, "Failed to close registry key");
        return false;
    }
    true
}

/// Close a kernel handle, logging failure. Returns whether it closed.
fn close_handle(handle: HANDLE) -> bool {
    // SAFETY: callers pass a handle they own and never use it again.
    match unsafe { CloseHandle(handle) } {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to close handle");
            false
        }
    }
}

fn token_user_sid(token: HANDLE) -> std::io::Result<Vec<u8>> {
    let mut length = 0u32;
    // SAFETY: a sizing call with no buffer only writes `length`.
    let sizing = unsafe { GetTokenInformation(token, TokenUser, None, 0, &mut length) };
    if length == 0 {
        // The sizing call is expected to fail with ERROR_INSUFFICIENT_BUFFER; only
        // a missing size is an error.
        return Err(match sizing {
            Err(e) => std::io::Error::other(e),
            Ok(()) => std::io::Error::other("token reported an empty user"),
        });
    }

    // u64 storage keeps TOKEN_USER correctly aligned.
    let mut buffer = vec![0u64; (length as usize).div_ceil(8)];
    // SAFETY: `buffer` holds at least `length` bytes and outlives the call.
    unsafe {
        GetTokenInformation(
            token,
            TokenUser,
            Some(buffer.as_mut_ptr().cast::<c_void>()),
            length,
            &mut length,
        )
    }
    .map_err(std::io::Error::other)?;

    // SAFETY: on success the buffer starts with an initialized TOKEN_USER.
    let user = unsafe { buffer.as_ptr().cast::<TOKEN_USER>().read() };
    let sid = user.User.Sid;

    // SAFETY: `sid` points into `buffer`, which is still alive.
    if !unsafe { IsValidSid(sid) }.as_bool() {
        return Err(std::io::Error::other("token returned an invalid SID"));
    }

    // SAFETY: `sid` was validated above.
    let sid_length = unsafe { GetLengthSid(sid) } as usize;
    // SAFETY: a valid SID is `sid_length` readable bytes inside `buffer`.
    let bytes = unsafe { std::slice::from_raw_parts(sid.0.cast::<u8>(), sid_length) };
    Ok(bytes.to_vec())
}
