//! Lazily resolved, cached function pointers.

#![allow(unsafe_code)]

use std::ffi::c_void;
use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::loader::{ModuleLoader, NativeModule};

/// A function pointer looked up by name on first use and cached thereafter.
///
/// Reads after the first successful lookup do not take a lock. A failed
/// lookup is not cached, so the next call tries again.
pub struct ResolvedFunction<F> {
    name: &'static str,
    cell: OnceLock<F>,
    lock: Mutex<()>,
}

impl<F> std::fmt::Debug for ResolvedFunction<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedFunction")
            .field("name", &self.name)
            .field("resolved", &self.cell.get().is_some())
            .finish()
    }
}

impl<F: Copy> ResolvedFunction<F> {
    /// Create an unresolved cell for the export `name`.
    ///
    /// # Safety
    ///
    /// `F` must be an `extern "C"` function pointer type whose signature
    /// matches the export named `name` in every module this cell is resolved
    /// against.
    pub unsafe fn new(name: &'static str) -> Self {
        Self {
            name,
            cell: OnceLock::new(),
            lock: Mutex::new(()),
        }
    }

    /// Name of the export.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The cached pointer, if it has been resolved.
    pub fn get(&self) -> Option<F> {
        self.cell.get().copied()
    }

    /// Resolve the export through `loader`, loading the module if needed.
    ///
    /// Returns `None` when the module is unavailable or does not export
    /// this function, which usually means the installed LocalDB version is
    /// incompatible.
    pub fn resolve<M: NativeModule>(&self, loader: &ModuleLoader<M>) -> Option<F> {
        if let Some(function) = self.get() {
            return Some(function);
        }

        let _guard = self.lock.lock();
        if let Some(function) = self.get() {
            return Some(function);
        }

        let Some(module) = loader.ensure_loaded() else {
            tracing::warn!(function = self.name, "Native API not loaded");
            return None;
        };

        let Some(address) = module.symbol_address(self.name) else {
            tracing::warn!(function = self.name, "Native function not found");
            return None;
        };

        if size_of::<F>() != size_of::<*mut c_void>() {
            tracing::error!(function = self.name, "Function type is not pointer-sized");
            return None;
        }

        // SAFETY: `F` is a function pointer type matching this export, as
        // promised by the caller of `new`, and has the size of an address.
        let function = unsafe { std::mem::transmute_copy::<*mut c_void, F>(&address.as_ptr()) };
        tracing::trace!(function = self.name, "Native function resolved");

        Some(*self.cell.get_or_init(|| function))
    }
}
