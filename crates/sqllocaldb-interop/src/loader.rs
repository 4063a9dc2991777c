//! Loads the LocalDB instance API module once per owner.
//!
//! The loader pairs a locate step (normally registry discovery) with an open
//! step (normally `libloading`). Whatever the first caller observes is cached:
//! a module that failed to load is not retried, and a module that loaded is
//! never swapped for another.

#![allow(unsafe_code)]

use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::Arc;

use libloading::Library;
use parking_lot::Mutex;

use crate::resolver::{NativeApiPathResolver, ResolvedVersion};
use crate::version::ApiVersion;

/// Error returned by a module open function.
pub type OpenError = Box<dyn std::error::Error + Send + Sync>;

type LocateFn = Box<dyn Fn() -> Option<ResolvedVersion> + Send + Sync>;
type OpenFn<M> = Box<dyn Fn(&Path) -> Result<M, OpenError> + Send + Sync>;

/// A loaded module that exported symbols can be looked up in.
pub trait NativeModule: Send + Sync + 'static {
    /// Address of the exported symbol `name`, or `None` if it is not exported.
    fn symbol_address(&self, name: &str) -> Option<NonNull<c_void>>;
}

impl NativeModule for Library {
    fn symbol_address(&self, name: &str) -> Option<NonNull<c_void>> {
        // SAFETY: the symbol is read as an untyped address and never
        // dereferenced here; callers give it a type before calling it.
        let symbol = unsafe { self.get::<*mut c_void>(name.as_bytes()) }.ok()?;
        NonNull::new(*symbol)
    }
}

/// Why the instance API is unavailable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadFailure {
    /// No installed instance API was found.
    #[error("the LocalDB instance API could not be located")]
    NotFound,

    /// The module was found but the operating system refused to load it.
    #[error("failed to load '{}': {message}", .path.display())]
    LoadFailed {
        /// Path that was loaded.
        path: PathBuf,
        /// Version the module was registered as.
        version: ApiVersion,
        /// Platform error code, when the loader reported one.
        platform_error: Option<i32>,
        /// Loader error text.
        message: String,
    },

    /// The module was released by its owner.
    #[error("the LocalDB instance API has been unloaded")]
    Released,
}

enum LoadState<M> {
    Pending,
    Loaded { module: Arc<M>, version: ApiVersion },
    Unavailable(LoadFailure),
}

/// Lazily loads and caches a native module.
pub struct ModuleLoader<M> {
    state: Mutex<LoadState<M>>,
    locate: LocateFn,
    open: OpenFn<M>,
}

impl<M> std::fmt::Debug for ModuleLoader<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.state.lock() {
            LoadState::Pending => "pending",
            LoadState::Loaded { .. } => "loaded",
            LoadState::Unavailable(_) => "unavailable",
        };
        f.debug_struct("ModuleLoader").field("state", &state).finish_non_exhaustive()
    }
}

impl<M: NativeModule> ModuleLoader<M> {
    /// Create a loader from a locate step and an open step.
    ///
    /// Neither step runs until the module is first needed.
    pub fn new(
        locate: impl Fn() -> Option<ResolvedVersion> + Send + Sync + 'static,
        open: impl Fn(&Path) -> Result<M, OpenError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            state: Mutex::new(LoadState::Pending),
            locate: Box::new(locate),
            open: Box::new(open),
        }
    }

    /// Load the module if no load has been attempted yet.
    ///
    /// Returns the module, or `None` if it is unavailable. The outcome of
    /// the first attempt is cached for the lifetime of the loader.
    pub fn ensure_loaded(&self) -> Option<Arc<M>> {
        let mut state = self.state.lock();

        if matches!(*state, LoadState::Pending) {
            *state = self.load();
        }

        match &*state {
            LoadState::Loaded { module, .. } => Some(Arc::clone(module)),
            _ => None,
        }
    }

    fn load(&self) -> LoadState<M> {
        let Some(ResolvedVersion { version, path }) = (self.locate)() else {
            tracing::warn!("No SQL LocalDB native API found");
            return LoadState::Unavailable(LoadFailure::NotFound);
        };

        match (self.open)(&path) {
            Ok(module) => {
                tracing::info!(path = %path.display(), version = %version, "Native API loaded");
                LoadState::Loaded {
                    module: Arc::new(module),
                    version,
                }
            }
            Err(e) => {
                let platform_error = platform_error(e.as_ref());
                tracing::error!(
                    path = %path.display(),
                    error = %e,
                    platform_error = ?platform_error,
                    "Native API load failed"
                );
                LoadState::Unavailable(LoadFailure::LoadFailed {
                    path,
                    version,
                    platform_error,
                    message: e.to_string(),
                })
            }
        }
    }

    /// Version of the loaded module, or of the module that failed to load.
    pub fn native_api_version(&self) -> Option<ApiVersion> {
        match &*self.state.lock() {
            LoadState::Loaded { version, .. } => Some(*version),
            LoadState::Unavailable(LoadFailure::LoadFailed { version, .. }) => Some(*version),
            _ => None,
        }
    }
}

impl<M> ModuleLoader<M> {
    /// Why the module is unavailable, if a load was attempted and failed.
    pub fn failure(&self) -> Option<LoadFailure> {
        match &*self.state.lock() {
            LoadState::Unavailable(failure) => Some(failure.clone()),
            _ => None,
        }
    }

    /// Whether the module is currently loaded.
    pub fn is_loaded(&self) -> bool {
        matches!(&*self.state.lock(), LoadState::Loaded { .. })
    }

    /// Release the module.
    ///
    /// Calls already in progress keep the module alive until they return.
    /// Later calls to [`ModuleLoader::ensure_loaded`] return `None`.
    /// Releasing twice is a no-op.
    pub fn unload(&self) {
        let previous = std::mem::replace(
            &mut *self.state.lock(),
            LoadState::Unavailable(LoadFailure::Released),
        );
        if let LoadState::Loaded { version, .. } = previous {
            tracing::info!(version = %version, "Native API unloaded");
        }
    }
}

impl<M> Drop for ModuleLoader<M> {
    fn drop(&mut self) {
        self.unload();
    }
}

impl ModuleLoader<Library> {
    /// A loader that discovers the module with `resolver` and opens it with
    /// the operating system loader.
    pub fn from_resolver(resolver: NativeApiPathResolver) -> Self {
        Self::new(move || resolver.resolve(), open_library)
    }
}

/// Open a dynamic library from an absolute path.
pub fn open_library(path: &Path) -> Result<Library, OpenError> {
    #[cfg(windows)]
    {
        use libloading::os::windows::{LOAD_LIBRARY_SEARCH_DEFAULT_DIRS, Library as WindowsLibrary};

        // SAFETY: the instance API module has no initialization routine with
        // preconditions on the loading thread.
        let library = unsafe { WindowsLibrary::load_with_flags(path, LOAD_LIBRARY_SEARCH_DEFAULT_DIRS) }?;
        Ok(library.into())
    }
    #[cfg(not(windows))]
    {
        // SAFETY: as above.
        let library = unsafe { Library::new(path) }?;
        Ok(library)
    }
}

fn platform_error(error: &(dyn std::error::Error + 'static)) -> Option<i32> {
    let mut current = Some(error);
    while let Some(e) = current {
        if let Some(code) = e.downcast_ref::<std::io::Error>().and_then(std::io::Error::raw_os_error) {
            return Some(code);
        }
        current = e.source();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EmptyModule;

    impl NativeModule for EmptyModule {
        fn symbol_address(&self, _name: &str) -> Option<NonNull<c_void>> {
            None
        }
    }

    fn located() -> Option<ResolvedVersion> {
        Some(ResolvedVersion {
            version: ApiVersion::new(13, 0),
            path: PathBuf::from("SqlUserInstance.dll"),
        })
    }

    #[test]
    fn test_load_runs_once() {
        let opens = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&opens);
        let loader = ModuleLoader::new(located, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(EmptyModule)
        });

        assert!(loader.ensure_loaded().is_some());
        assert!(loader.ensure_loaded().is_some());
        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert_eq!(loader.native_api_version(), Some(ApiVersion::new(13, 0)));
    }

    #[test]
    fn test_not_found_is_cached() {
        let locates = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&locates);
        let loader: ModuleLoader<EmptyModule> = ModuleLoader::new(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                None
            },
            |_| Ok(EmptyModule),
        );

        assert!(loader.ensure_loaded().is_none());
        assert!(loader.ensure_loaded().is_none());
        assert_eq!(locates.load(Ordering::SeqCst), 1);
        assert_eq!(loader.failure(), Some(LoadFailure::NotFound));
        assert_eq!(loader.native_api_version(), None);
    }

    #[test]
    fn test_open_failure_is_cached_with_platform_code() {
        let loader: ModuleLoader<EmptyModule> = ModuleLoader::new(located, |_| {
            Err(Box::new(std::io::Error::from_raw_os_error(126)) as OpenError)
        });

        assert!(loader.ensure_loaded().is_none());
        match loader.failure() {
            Some(LoadFailure::LoadFailed {
                platform_error,
                version,
                ..
            }) => {
                assert_eq!(platform_error, Some(126));
                assert_eq!(version, ApiVersion::new(13, 0));
            }
            other => panic!("unexpected failure {other:?}"),
        }
    }

    #[test]
    fn test_unload_is_idempotent() {
        let loader = ModuleLoader::new(located, |_| Ok(EmptyModule));
        assert!(loader.ensure_loaded().is_some());

        loader.unload();
        loader.unload();

        assert!(!loader.is_loaded());
        assert!(loader.ensure_loaded().is_none());
        assert_eq!(loader.failure(), Some(LoadFailure::Released));
    }

    #[test]
    fn test_in_flight_module_outlives_unload() {
        struct Tracked(Arc<AtomicUsize>);
        impl NativeModule for Tracked {
            fn symbol_address(&self, _name: &str) -> Option<NonNull<c_void>> {
                None
            }
        }
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&drops);
        let loader = ModuleLoader::new(located, move |_| Ok(Tracked(Arc::clone(&counter))));

        let in_flight = loader.ensure_loaded();
        loader.unload();
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        drop(in_flight);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_first_use_loads_once() {
        let opens = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&opens);
        let loader = Arc::new(ModuleLoader::new(located, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(EmptyModule)
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let loader = Arc::clone(&loader);
                std::thread::spawn(move || loader.ensure_loaded().is_some())
            })
            .collect();

        let mut results = HashMap::new();
        for handle in handles {
            let loaded = handle.join().unwrap_or(false);
            *results.entry(loaded).or_insert(0) += 1;
        }

        assert_eq!(results.get(&true), Some(&8));
        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_open_library_missing_file_fails() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let result = open_library(&dir.path().join("missing-library"));
        assert!(matches!(result, Err(_)));
        Ok(())
    }
}
