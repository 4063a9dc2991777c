//! Fixed-layout buffers exchanged with the instance API.
//!
//! Structures are decoded from byte buffers at explicit offsets rather than
//! through `#[repr(C)]` types, because the padding of the native header is
//! part of the contract.
//!
//! # `LOCALDB_INSTANCE_INFO` (1460 bytes)
//!
//! | Offset | Size | Field |
//! |-------:|-----:|-------|
//! | 0 | 4 | `cbLocalDBInstanceInfoSize` |
//! | 4 | 258 | `wszInstanceName` |
//! | 264 | 4 | `bExists` |
//! | 268 | 4 | `bConfigurationCorrupted` |
//! | 272 | 4 | `bIsRunning` |
//! | 276 | 16 | `dwMajor`, `dwMinor`, `dwBuild`, `dwRevision` |
//! | 292 | 8 | `ftLastStartDateUTC` |
//! | 300 | 520 | `wszConnection` |
//! | 820 | 4 | `bIsShared` |
//! | 824 | 258 | `wszSharedInstanceName` |
//! | 1082 | 374 | `wszOwnerSID` |
//! | 1456 | 4 | `bIsAutomatic` |
//!
//! # `LOCALDB_VERSION_INFO` (112 bytes)
//!
//! | Offset | Size | Field |
//! |-------:|-----:|-------|
//! | 0 | 4 | `cbLocalDBVersionInfoSize` |
//! | 4 | 88 | `wszVersion` |
//! | 92 | 4 | `bExists` |
//! | 96 | 16 | `dwMajor`, `dwMinor`, `dwBuild`, `dwRevision` |

use chrono::{DateTime, Utc};

use crate::info::{InstanceInfo, VersionInfo};
use crate::version::ApiVersion;

/// Maximum instance name length, excluding the terminator.
pub const MAX_INSTANCE_NAME_LENGTH: usize = 128;
/// Maximum version string length, excluding the terminator.
pub const MAX_VERSION_LENGTH: usize = 43;
/// Maximum owner SID string length, excluding the terminator.
pub const MAX_SID_STRING_LENGTH: usize = 186;
/// Capacity of the connection string buffer, including the terminator.
pub const MAX_CONNECTION_STRING_LENGTH: usize = 260;

/// `LOCALDB_TRUNCATE_ERR_MESSAGE`: truncate rather than fail when the
/// message buffer is too small.
pub const TRUNCATE_ERROR_MESSAGE: u32 = 1;

/// Size of `LOCALDB_INSTANCE_INFO` in bytes.
pub const INSTANCE_INFO_SIZE: usize = 1460;
/// Size of `LOCALDB_VERSION_INFO` in bytes.
pub const VERSION_INFO_SIZE: usize = 112;
/// Stride of one element returned by `LocalDBGetInstances`.
pub const INSTANCE_NAME_STRIDE: usize = (MAX_INSTANCE_NAME_LENGTH + 1) * 2;
/// Stride of one element returned by `LocalDBGetVersions`.
pub const VERSION_NAME_STRIDE: usize = (MAX_VERSION_LENGTH + 1) * 2;

/// Difference between the Windows and Unix epochs in 100 ns ticks.
const FILETIME_UNIX_EPOCH: i64 = 116_444_736_000_000_000;
const TICKS_PER_SECOND: i64 = 10_000_000;

#[derive(Clone, Copy)]
struct Field {
    offset: usize,
    len: usize,
}

const fn field(offset: usize, len: usize) -> Field {
    Field { offset, len }
}

mod instance {
    use super::{Field, field};

    pub(super) const SIZE: Field = field(0, 4);
    pub(super) const NAME: Field = field(4, 258);
    pub(super) const EXISTS: Field = field(264, 4);
    pub(super) const CONFIGURATION_CORRUPT: Field = field(268, 4);
    pub(super) const IS_RUNNING: Field = field(272, 4);
    pub(super) const VERSION: Field = field(276, 16);
    pub(super) const LAST_START: Field = field(292, 8);
    pub(super) const CONNECTION: Field = field(300, 520);
    pub(super) const IS_SHARED: Field = field(820, 4);
    pub(super) const SHARED_NAME: Field = field(824, 258);
    pub(super) const OWNER_SID: Field = field(1082, 374);
    pub(super) const IS_AUTOMATIC: Field = field(1456, 4);
}

mod version {
    use super::{Field, field};

    pub(super) const SIZE: Field = field(0, 4);
    pub(super) const NAME: Field = field(4, 88);
    pub(super) const EXISTS: Field = field(92, 4);
    pub(super) const VERSION: Field = field(96, 16);
}

fn bytes(buffer: &[u8], field: Field) -> &[u8] {
    buffer
        .get(field.offset..field.offset.saturating_add(field.len))
        .unwrap_or(&[])
}

fn bytes_mut(buffer: &mut [u8], field: Field) -> &mut [u8] {
    buffer
        .get_mut(field.offset..field.offset.saturating_add(field.len))
        .unwrap_or(&mut [])
}

fn read_u32(buffer: &[u8], offset: usize) -> u32 {
    buffer
        .get(offset..offset.saturating_add(4))
        .and_then(|b| <[u8; 4]>::try_from(b).ok())
        .map_or(0, u32::from_le_bytes)
}

fn write_u32(buffer: &mut [u8], offset: usize, value: u32) {
    if let Some(target) = buffer.get_mut(offset..offset.saturating_add(4)) {
        target.copy_from_slice(&value.to_le_bytes());
    }
}

fn read_bool(buffer: &[u8], field: Field) -> bool {
    read_u32(buffer, field.offset) != 0
}

fn read_version(buffer: &[u8], field: Field) -> ApiVersion {
    let part = |index: usize| read_u32(buffer, field.offset + index * 4);
    ApiVersion::from_parts(part(0), part(1), part(2), part(3))
}

fn write_version(buffer: &mut [u8], field: Field, version: &ApiVersion) {
    let parts = [
        version.major(),
        version.minor(),
        version.build().unwrap_or(0),
        version.revision().unwrap_or(0),
    ];
    for (index, value) in parts.into_iter().enumerate() {
        write_u32(buffer, field.offset + index * 4, value);
    }
}

fn units(bytes: &[u8]) -> impl Iterator<Item = u16> + '_ {
    bytes
        .chunks_exact(2)
        .filter_map(|pair| <[u8; 2]>::try_from(pair).ok())
        .map(u16::from_le_bytes)
}

/// Decode a padded UTF-16LE character array, trimming trailing NULs.
///
/// Unpaired surrogates are replaced with U+FFFD.
///
/// # Examples
///
/// ```
/// use sqllocaldb_interop::marshal::{decode_wide_string, encode_wide_into};
///
/// let mut field = [0u8; 32];
/// encode_wide_into(&mut field, "MSSQLLocalDB");
/// assert_eq!(decode_wide_string(&field), "MSSQLLocalDB");
/// ```
pub fn decode_wide_string(bytes: &[u8]) -> String {
    let decoded: Vec<u16> = units(bytes).collect();
    let mut text = String::from_utf16_lossy(&decoded);
    let trimmed = text.trim_end_matches('\0').len();
    text.truncate(trimmed);
    text
}

/// Decode a UTF-16LE string up to its first NUL.
pub fn decode_wide_until_nul(bytes: &[u8]) -> String {
    let decoded: Vec<u16> = units(bytes).take_while(|&unit| unit != 0).collect();
    String::from_utf16_lossy(&decoded)
}

/// Decode a buffer of UTF-16 units up to its first NUL.
///
/// Used for the string buffers filled by `LocalDBStartInstance` and
/// `LocalDBFormatMessage`.
pub fn decode_units_until_nul(units: &[u16]) -> String {
    let end = units.iter().position(|&unit| unit == 0).unwrap_or(units.len());
    String::from_utf16_lossy(units.get(..end).unwrap_or(units))
}

/// Decode `count` fixed-width strings laid out `stride` bytes apart.
///
/// Slots beyond the end of `buffer` are not read.
pub fn decode_string_array(buffer: &[u8], stride: usize, count: usize) -> Vec<String> {
    if stride == 0 {
        return Vec::new();
    }
    buffer
        .chunks_exact(stride)
        .take(count)
        .map(decode_wide_until_nul)
        .collect()
}

/// Write `text` into a fixed-width UTF-16LE field, NUL-padded.
///
/// Text longer than the field, less one terminating unit, is truncated.
pub fn encode_wide_into(field: &mut [u8], text: &str) {
    field.fill(0);
    let capacity = (field.len() / 2).saturating_sub(1);
    for (slot, unit) in field.chunks_exact_mut(2).zip(text.encode_utf16().take(capacity)) {
        slot.copy_from_slice(&unit.to_le_bytes());
    }
}

/// Encode strings into `stride`-byte slots, as `LocalDBGetInstances` does.
pub fn encode_string_array<S: AsRef<str>>(names: &[S], stride: usize) -> Vec<u8> {
    let mut buffer = vec![0u8; names.len().saturating_mul(stride)];
    if stride > 0 {
        for (slot, name) in buffer.chunks_exact_mut(stride).zip(names) {
            encode_wide_into(slot, name.as_ref());
        }
    }
    buffer
}

/// Encode `text` as a NUL-terminated UTF-16 string.
pub fn to_wide_nul(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Convert a `FILETIME` to a UTC instant.
///
/// An all-zero `FILETIME` means the event never happened and yields `None`,
/// as does a value outside the range `chrono` can represent.
///
/// # Examples
///
/// ```
/// use sqllocaldb_interop::marshal::filetime_to_utc;
///
/// assert_eq!(filetime_to_utc(0, 0), None);
///
/// // 2001-01-01T00:00:00Z
/// let ticks: u64 = 126_227_808_000_000_000;
/// let instant = filetime_to_utc(ticks as u32, (ticks >> 32) as u32);
/// assert_eq!(instant.map(|t| t.to_rfc3339()).as_deref(), Some("2001-01-01T00:00:00+00:00"));
/// ```
pub fn filetime_to_utc(low: u32, high: u32) -> Option<DateTime<Utc>> {
    let ticks = (u64::from(high) << 32) | u64::from(low);
    if ticks == 0 {
        return None;
    }
    let unix_ticks = i64::try_from(ticks).ok()?.checked_sub(FILETIME_UNIX_EPOCH)?;
    let seconds = unix_ticks.div_euclid(TICKS_PER_SECOND);
    let nanos = u32::try_from(unix_ticks.rem_euclid(TICKS_PER_SECOND) * 100).ok()?;
    DateTime::from_timestamp(seconds, nanos)
}

/// Convert a UTC instant to `FILETIME` `(low, high)` words.
///
/// `None` maps to the all-zero value. Instants before 1601 clamp to it too.
pub fn utc_to_filetime(instant: Option<DateTime<Utc>>) -> (u32, u32) {
    let Some(instant) = instant else {
        return (0, 0);
    };
    let ticks = instant
        .timestamp()
        .checked_mul(TICKS_PER_SECOND)
        .and_then(|t| t.checked_add(i64::from(instant.timestamp_subsec_nanos() / 100)))
        .and_then(|t| t.checked_add(FILETIME_UNIX_EPOCH))
        .and_then(|t| u64::try_from(t).ok())
        .unwrap_or(0);
    ((ticks & 0xFFFF_FFFF) as u32, (ticks >> 32) as u32)
}

/// Decode a `LOCALDB_INSTANCE_INFO` buffer.
pub fn decode_instance_info(buffer: &[u8; INSTANCE_INFO_SIZE]) -> InstanceInfo {
    let last_start = instance::LAST_START.offset;
    InstanceInfo {
        name: decode_wide_string(bytes(buffer, instance::NAME)),
        exists: read_bool(buffer, instance::EXISTS),
        configuration_corrupt: read_bool(buffer, instance::CONFIGURATION_CORRUPT),
        is_running: read_bool(buffer, instance::IS_RUNNING),
        is_shared: read_bool(buffer, instance::IS_SHARED),
        is_automatic: read_bool(buffer, instance::IS_AUTOMATIC),
        version: read_version(buffer, instance::VERSION),
        last_start_utc: filetime_to_utc(
            read_u32(buffer, last_start),
            read_u32(buffer, last_start + 4),
        ),
        connection: decode_wide_string(bytes(buffer, instance::CONNECTION)),
        owner_sid: decode_wide_string(bytes(buffer, instance::OWNER_SID)),
        shared_name: decode_wide_string(bytes(buffer, instance::SHARED_NAME)),
    }
}

/// Encode an [`InstanceInfo`] as the instance API would return it.
pub fn encode_instance_info(info: &InstanceInfo) -> [u8; INSTANCE_INFO_SIZE] {
    let mut buffer = [0u8; INSTANCE_INFO_SIZE];
    write_u32(&mut buffer, instance::SIZE.offset, INSTANCE_INFO_SIZE as u32);
    encode_wide_into(bytes_mut(&mut buffer, instance::NAME), &info.name);
    write_u32(&mut buffer, instance::EXISTS.offset, u32::from(info.exists));
    write_u32(
        &mut buffer,
        instance::CONFIGURATION_CORRUPT.offset,
        u32::from(info.configuration_corrupt),
    );
    write_u32(&mut buffer, instance::IS_RUNNING.offset, u32::from(info.is_running));
    write_version(&mut buffer, instance::VERSION, &info.version);
    let (low, high) = utc_to_filetime(info.last_start_utc);
    write_u32(&mut buffer, instance::LAST_START.offset, low);
    write_u32(&mut buffer, instance::LAST_START.offset + 4, high);
    encode_wide_into(bytes_mut(&mut buffer, instance::CONNECTION), &info.connection);
    write_u32(&mut buffer, instance::IS_SHARED.offset, u32::from(info.is_shared));
    encode_wide_into(bytes_mut(&mut buffer, instance::SHARED_NAME), &info.shared_name);
    encode_wide_into(bytes_mut(&mut buffer, instance::OWNER_SID), &info.owner_sid);
    write_u32(&mut buffer, instance::IS_AUTOMATIC.offset, u32::from(info.is_automatic));
    buffer
}

/// Decode a `LOCALDB_VERSION_INFO` buffer.
pub fn decode_version_info(buffer: &[u8; VERSION_INFO_SIZE]) -> VersionInfo {
    VersionInfo {
        name: decode_wide_string(bytes(buffer, version::NAME)),
        exists: read_bool(buffer, version::EXISTS),
        version: read_version(buffer, version::VERSION),
    }
}

/// Encode a [`VersionInfo`] as the instance API would return it.
pub fn encode_version_info(info: &VersionInfo) -> [u8; VERSION_INFO_SIZE] {
    let mut buffer = [0u8; VERSION_INFO_SIZE];
    write_u32(&mut buffer, version::SIZE.offset, VERSION_INFO_SIZE as u32);
    encode_wide_into(bytes_mut(&mut buffer, version::NAME), &info.name);
    write_u32(&mut buffer, version::EXISTS.offset, u32::from(info.exists));
    write_version(&mut buffer, version::VERSION, &info.version);
    buffer
}

/// The declared size field of a structure buffer.
pub fn declared_size(buffer: &[u8]) -> u32 {
    read_u32(buffer, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_constants() {
        assert_eq!(INSTANCE_NAME_STRIDE, 258);
        assert_eq!(VERSION_NAME_STRIDE, 88);
        assert_eq!(instance::NAME.len, INSTANCE_NAME_STRIDE);
        assert_eq!(instance::CONNECTION.len, MAX_CONNECTION_STRING_LENGTH * 2);
        assert_eq!(instance::OWNER_SID.len, (MAX_SID_STRING_LENGTH + 1) * 2);
        assert_eq!(
            instance::IS_AUTOMATIC.offset + instance::IS_AUTOMATIC.len,
            INSTANCE_INFO_SIZE
        );
        assert_eq!(
            version::VERSION.offset + version::VERSION.len,
            VERSION_INFO_SIZE
        );
    }

    #[test]
    fn test_fields_do_not_overlap() {
        let fields = [
            instance::SIZE,
            instance::NAME,
            instance::EXISTS,
            instance::CONFIGURATION_CORRUPT,
            instance::IS_RUNNING,
            instance::VERSION,
            instance::LAST_START,
            instance::CONNECTION,
            instance::IS_SHARED,
            instance::SHARED_NAME,
            instance::OWNER_SID,
            instance::IS_AUTOMATIC,
        ];
        for pair in fields.windows(2) {
            if let [a, b] = pair {
                assert!(a.offset + a.len <= b.offset);
            }
        }
    }

    #[test]
    fn test_trailing_nuls_are_trimmed() {
        let mut field = [0u8; INSTANCE_NAME_STRIDE];
        encode_wide_into(&mut field, "MSSQLLocalDB");
        assert_eq!(decode_wide_string(&field), "MSSQLLocalDB");
    }

    #[test]
    fn test_zero_filetime_is_never_started() {
        assert_eq!(filetime_to_utc(0, 0), None);
        assert_eq!(utc_to_filetime(None), (0, 0));
    }

    #[test]
    fn test_filetime_at_unix_epoch() {
        let ticks = FILETIME_UNIX_EPOCH as u64;
        let instant = filetime_to_utc(ticks as u32, (ticks >> 32) as u32);
        assert_eq!(instant, DateTime::from_timestamp(0, 0));
    }

    #[test]
    fn test_string_array_reads_only_count_slots() {
        let buffer = encode_string_array(&["a", "b", "c"], VERSION_NAME_STRIDE);
        assert_eq!(buffer.len(), 3 * VERSION_NAME_STRIDE);
        assert_eq!(
            decode_string_array(&buffer, VERSION_NAME_STRIDE, 2),
            vec!["a".to_string(), "b".to_string()]
        );
        assert_eq!(decode_string_array(&buffer, VERSION_NAME_STRIDE, 10).len(), 3);
    }

    #[test]
    fn test_unit_buffer_stops_at_nul() {
        let mut units = to_wide_nul(r"np:\\.\pipe\LOCALDB#1\tsql\query");
        units.extend([0x41, 0x42]);
        assert_eq!(decode_units_until_nul(&units), r"np:\\.\pipe\LOCALDB#1\tsql\query");
        assert_eq!(decode_units_until_nul(&[0x61, 0x62]), "ab");
    }

    #[test]
    fn test_long_text_is_truncated_with_terminator() {
        let mut field = [0xFFu8; 8];
        encode_wide_into(&mut field, "abcdef");
        assert_eq!(decode_wide_string(&field), "abc");
        assert_eq!(field.get(6..8), Some(&[0u8, 0u8][..]));
    }
}
