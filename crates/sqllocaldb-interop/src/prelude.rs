//! Convenience re-exports for common types.

pub use crate::api::{LocalDbInstanceApi, NativeInstanceApi};
pub use crate::info::{InstanceInfo, VersionInfo};
pub use crate::loader::{LoadFailure, ModuleLoader, NativeModule};
pub use crate::marshal::{
    INSTANCE_INFO_SIZE, INSTANCE_NAME_STRIDE, VERSION_INFO_SIZE, VERSION_NAME_STRIDE,
    decode_instance_info, decode_string_array, decode_units_until_nul, decode_version_info,
    decode_wide_until_nul,
};
pub use crate::registry::{InMemoryRegistry, Registry, RegistryKey};
pub use crate::resolver::{NativeApiPathResolver, ResolvedVersion};
pub use crate::sizing::{SizedBuffer, call_with_sized_buffer};
pub use crate::version::ApiVersion;
