//! Read-only access to the registry keys that record installed LocalDB versions.
//!
//! [`Registry`] is the seam between version discovery and the operating
//! system. [`InMemoryRegistry`] backs tests and non-Windows targets, where no
//! LocalDB installation can exist.

use std::collections::BTreeMap;

/// A root of the registry that subkeys can be opened from.
pub trait Registry: Send + Sync {
    /// Open the subkey at `path`, a backslash-separated key path.
    ///
    /// Returns `None` if the key does not exist or cannot be read.
    fn open_subkey(&self, path: &str) -> Option<Box<dyn RegistryKey>>;
}

/// An open registry key.
pub trait RegistryKey {
    /// Names of the immediate subkeys of this key.
    fn subkey_names(&self) -> Vec<String>;

    /// Open an immediate or nested subkey of this key.
    fn open_subkey(&self, path: &str) -> Option<Box<dyn RegistryKey>>;

    /// Read a string value of this key.
    fn string_value(&self, name: &str) -> Option<String>;
}

/// A registry held in memory.
///
/// Key and value names compare case-insensitively, as they do in the
/// Windows registry.
///
/// # Examples
///
/// ```
/// use sqllocaldb_interop::registry::{InMemoryRegistry, Registry};
///
/// let registry = InMemoryRegistry::new()
///     .with_value(r"SOFTWARE\Vendor\12.0", "InstanceAPIPath", r"C:\api.dll");
///
/// let key = registry.open_subkey(r"software\vendor");
/// assert_eq!(key.map(|k| k.subkey_names()), Some(vec!["12.0".to_string()]));
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    root: InMemoryKey,
}

/// A key within an [`InMemoryRegistry`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryKey {
    name: String,
    values: BTreeMap<String, String>,
    children: Vec<InMemoryKey>,
}

impl InMemoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the key at `path`, creating any missing parents.
    #[must_use]
    pub fn with_key(mut self, path: &str) -> Self {
        let _created = self.root.create(path);
        self
    }

    /// Set a string value on the key at `path`, creating the key if needed.
    #[must_use]
    pub fn with_value(mut self, path: &str, name: &str, value: impl Into<String>) -> Self {
        if let Some(key) = self.root.create(path) {
            key.values.insert(name.to_ascii_lowercase(), value.into());
        }
        self
    }
}

impl Registry for InMemoryRegistry {
    fn open_subkey(&self, path: &str) -> Option<Box<dyn RegistryKey>> {
        self.root.open_subkey(path)
    }
}

impl InMemoryKey {
    fn child(&self, name: &str) -> Option<&InMemoryKey> {
        self.children
            .iter()
            .find(|child| child.name.eq_ignore_ascii_case(name))
    }

    fn find(&self, path: &str) -> Option<&InMemoryKey> {
        segments(path).try_fold(self, |key, segment| key.child(segment))
    }

    fn create(&mut self, path: &str) -> Option<&mut InMemoryKey> {
        segments(path).try_fold(self, |key, segment| key.child_or_insert(segment))
    }

    fn child_or_insert(&mut self, name: &str) -> Option<&mut InMemoryKey> {
        if self.child(name).is_none() {
            self.children.push(InMemoryKey {
                name: name.to_string(),
                ..InMemoryKey::default()
            });
        }
        self.children
            .iter_mut()
            .find(|child| child.name.eq_ignore_ascii_case(name))
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('\\').filter(|segment| !segment.is_empty())
}

impl RegistryKey for InMemoryKey {
    fn subkey_names(&self) -> Vec<String> {
        self.children.iter().map(|child| child.name.clone()).collect()
    }

    fn open_subkey(&self, path: &str) -> Option<Box<dyn RegistryKey>> {
        self.find(path)
            .map(|key| Box::new(key.clone()) as Box<dyn RegistryKey>)
    }

    fn string_value(&self, name: &str) -> Option<String> {
        self.values.get(&name.to_ascii_lowercase()).cloned()
    }
}

/// The registry of the current machine.
///
/// On Windows this is `HKEY_LOCAL_MACHINE`. Elsewhere it is an empty
/// in-memory registry, so discovery reports that LocalDB is not installed.
pub fn system_registry() -> Box<dyn Registry> {
    #[cfg(windows)]
    {
        Box::new(crate::windows::WindowsRegistry::local_machine())
    }
    #[cfg(not(windows))]
    {
        Box::new(InMemoryRegistry::new())
    }
}
