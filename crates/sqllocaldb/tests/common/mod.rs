//! A scripted, in-memory stand-in for the LocalDB instance API.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use sqllocaldb::{ApiVersion, ErrorCode, InstanceInfo, LocalDbInstanceApi, VersionInfo};
use sqllocaldb_interop::marshal::{
    INSTANCE_NAME_STRIDE, TRUNCATE_ERROR_MESSAGE, VERSION_NAME_STRIDE, encode_instance_info,
    encode_string_array, encode_version_info,
};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

const INSUFFICIENT_BUFFER: i32 = ErrorCode::InsufficientBuffer as i32;

#[derive(Debug, Clone)]
pub struct FakeInstance {
    pub name: String,
    pub version: ApiVersion,
    pub is_running: bool,
    pub is_automatic: bool,
    pub shared_name: Option<String>,
    pub owner_sid: Vec<u8>,
}

#[derive(Debug, Default)]
struct State {
    installed: bool,
    versions: Vec<String>,
    instances: BTreeMap<String, FakeInstance>,
    failures: HashMap<&'static str, i32>,
    calls: Vec<&'static str>,
    tracing: bool,
    last_stop: Option<(u32, u32)>,
    message: Option<String>,
    pipes_issued: u32,
}

/// Behaves like LocalDB for the operations the tests exercise.
///
/// Instance names are case-insensitive. `fail` forces an export to return a
/// code; every call is recorded by export name.
#[derive(Debug)]
pub struct FakeLocalDb {
    state: Mutex<State>,
}

impl FakeLocalDb {
    /// LocalDB with `versions` installed and no instances.
    pub fn installed(versions: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                installed: true,
                versions: versions.iter().map(|v| v.to_string()).collect(),
                ..State::default()
            }),
        })
    }

    /// A machine without LocalDB.
    pub fn not_installed() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::default()),
        })
    }

    pub fn with_instance(self: Arc<Self>, name: &str, version: &str, automatic: bool) -> Arc<Self> {
        self.state.lock().instances.insert(
            name.to_lowercase(),
            FakeInstance {
                name: name.to_string(),
                version: ApiVersion::parse(version).unwrap_or(ApiVersion::new(0, 0)),
                is_running: false,
                is_automatic: automatic,
                shared_name: None,
                owner_sid: Vec::new(),
            },
        );
        self
    }

    pub fn fail(&self, export: &'static str, code: ErrorCode) {
        self.state.lock().failures.insert(export, code.code());
    }

    pub fn set_message(&self, message: &str) {
        self.state.lock().message = Some(message.to_string());
    }

    pub fn set_running(&self, name: &str, running: bool) {
        if let Some(instance) = self.state.lock().instances.get_mut(&name.to_lowercase()) {
            instance.is_running = running;
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, export: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| **c == export).count()
    }

    pub fn instance(&self, name: &str) -> Option<FakeInstance> {
        self.state.lock().instances.get(&name.to_lowercase()).cloned()
    }

    pub fn is_tracing(&self) -> bool {
        self.state.lock().tracing
    }

    pub fn last_stop(&self) -> Option<(u32, u32)> {
        self.state.lock().last_stop
    }

    /// Record the call and return its forced outcome, if any.
    fn enter(&self, export: &'static str) -> Option<i32> {
        let mut state = self.state.lock();
        state.calls.push(export);
        if !state.installed {
            return Some(ErrorCode::NotInstalled.code());
        }
        state.failures.get(export).copied()
    }
}

fn fill_bytes(data: &[u8], stride: usize, items: usize, buffer: Option<&mut [u8]>, count: &mut u32) -> i32 {
    let available = *count as usize;
    *count = items as u32;
    match buffer {
        Some(buffer) if available >= items && buffer.len() >= items * stride => {
            for (slot, byte) in buffer.iter_mut().zip(data) {
                *slot = *byte;
            }
            0
        }
        _ => INSUFFICIENT_BUFFER,
    }
}

fn fill_units(text: &str, buffer: Option<&mut [u16]>, count: &mut u32) -> i32 {
    let units: Vec<u16> = text.encode_utf16().chain(std::iter::once(0)).collect();
    let available = *count as usize;
    *count = units.len() as u32;
    match buffer {
        Some(buffer) if available >= units.len() => {
            for (slot, unit) in buffer.iter_mut().zip(&units) {
                *slot = *unit;
            }
            0
        }
        _ => INSUFFICIENT_BUFFER,
    }
}

/// Write as much of `text` as fits, always NUL-terminated, and succeed.
fn truncate_units(text: &str, buffer: Option<&mut [u16]>, count: &mut u32) -> i32 {
    let capacity = (*count as usize).min(buffer.as_ref().map_or(0, |b| b.len()));
    let kept: Vec<u16> = text.encode_utf16().take(capacity.saturating_sub(1)).collect();
    if let Some(buffer) = buffer {
        for (slot, unit) in buffer.iter_mut().zip(kept.iter().chain(std::iter::once(&0))) {
            *slot = *unit;
        }
    }
    *count = kept.len() as u32;
    0
}

fn copy_into(target: &mut [u8], source: &[u8]) -> i32 {
    if target.len() < source.len() {
        return ErrorCode::InvalidParameter.code();
    }
    for (slot, byte) in target.iter_mut().zip(source) {
        *slot = *byte;
    }
    0
}

impl LocalDbInstanceApi for FakeLocalDb {
    fn native_api_version(&self) -> Option<ApiVersion> {
        let state = self.state.lock();
        if !state.installed {
            return None;
        }
        state
            .versions
            .iter()
            .filter_map(|v| ApiVersion::parse(v))
            .max()
    }

    fn create_instance(&self, version: &str, instance_name: &str, _flags: u32) -> i32 {
        if let Some(code) = self.enter("create_instance") {
            return code;
        }
        let mut state = self.state.lock();
        if !state.versions.iter().any(|v| v == version) {
            return ErrorCode::VersionNotInstalled.code();
        }
        let key = instance_name.to_lowercase();
        if state.instances.contains_key(&key) {
            return 0;
        }
        state.instances.insert(
            key,
            FakeInstance {
                name: instance_name.to_string(),
                version: ApiVersion::parse(version).unwrap_or(ApiVersion::new(0, 0)),
                is_running: false,
                is_automatic: false,
                shared_name: None,
                owner_sid: Vec::new(),
            },
        );
        0
    }

    fn delete_instance(&self, instance_name: &str, _flags: u32) -> i32 {
        if let Some(code) = self.enter("delete_instance") {
            return code;
        }
        let mut state = self.state.lock();
        let key = instance_name.to_lowercase();
        match state.instances.get(&key) {
            None => ErrorCode::UnknownInstance.code(),
            Some(instance) if instance.is_automatic => ErrorCode::InvalidOperation.code(),
            Some(instance) if instance.is_running => ErrorCode::InstanceBusy.code(),
            Some(_) => {
                state.instances.remove(&key);
                0
            }
        }
    }

    fn format_message(
        &self,
        code: i32,
        flags: u32,
        _language_id: u32,
        message: Option<&mut [u16]>,
        count: &mut u32,
    ) -> i32 {
        if let Some(code) = self.enter("format_message") {
            return code;
        }
        let text = self
            .state
            .lock()
            .message
            .clone()
            .unwrap_or_else(|| format!("LocalDB error {code:#010X}.\r\n"));
        if flags & TRUNCATE_ERROR_MESSAGE != 0 {
            return truncate_units(&text, message, count);
        }
        fill_units(&text, message, count)
    }

    fn get_instance_info(&self, instance_name: &str, info: &mut [u8]) -> i32 {
        if let Some(code) = self.enter("get_instance_info") {
            return code;
        }
        let state = self.state.lock();
        let record = match state.instances.get(&instance_name.to_lowercase()) {
            Some(instance) => InstanceInfo {
                name: instance.name.clone(),
                exists: true,
                configuration_corrupt: false,
                is_running: instance.is_running,
                is_shared: instance.shared_name.is_some(),
                is_automatic: instance.is_automatic,
                version: instance.version,
                last_start_utc: None,
                connection: if instance.is_running {
                    format!(r"np:\\.\pipe\LOCALDB#{}\tsql\query", instance.name)
                } else {
                    String::new()
                },
                owner_sid: String::new(),
                shared_name: instance.shared_name.clone().unwrap_or_default(),
            },
            None => InstanceInfo::missing(instance_name),
        };
        copy_into(info, &encode_instance_info(&record))
    }

    fn get_instances(&self, names: Option<&mut [u8]>, count: &mut u32) -> i32 {
        if let Some(code) = self.enter("get_instances") {
            return code;
        }
        let state = self.state.lock();
        let listed: Vec<&str> = state.instances.values().map(|i| i.name.as_str()).collect();
        let data = encode_string_array(&listed, INSTANCE_NAME_STRIDE);
        fill_bytes(&data, INSTANCE_NAME_STRIDE, listed.len(), names, count)
    }

    fn get_version_info(&self, version: &str, info: &mut [u8]) -> i32 {
        if let Some(code) = self.enter("get_version_info") {
            return code;
        }
        let state = self.state.lock();
        if !state.versions.iter().any(|v| v == version) {
            return ErrorCode::UnknownVersion.code();
        }
        let record = VersionInfo {
            name: format!("SQL Server {version}"),
            exists: true,
            version: ApiVersion::parse(version).unwrap_or(ApiVersion::new(0, 0)),
        };
        copy_into(info, &encode_version_info(&record))
    }

    fn get_versions(&self, versions: Option<&mut [u8]>, count: &mut u32) -> i32 {
        if let Some(code) = self.enter("get_versions") {
            return code;
        }
        let state = self.state.lock();
        let data = encode_string_array(&state.versions, VERSION_NAME_STRIDE);
        fill_bytes(&data, VERSION_NAME_STRIDE, state.versions.len(), versions, count)
    }

    fn share_instance(
        &self,
        owner_sid: &[u8],
        private_name: &str,
        shared_name: &str,
        _flags: u32,
    ) -> i32 {
        if let Some(code) = self.enter("share_instance") {
            return code;
        }
        let mut state = self.state.lock();
        match state.instances.get_mut(&private_name.to_lowercase()) {
            None => ErrorCode::UnknownInstance.code(),
            Some(instance) if instance.shared_name.is_some() => {
                ErrorCode::InstanceAlreadyShared.code()
            }
            Some(instance) => {
                instance.shared_name = Some(shared_name.to_string());
                instance.owner_sid = owner_sid.to_vec();
                0
            }
        }
    }

    fn start_instance(
        &self,
        instance_name: &str,
        _flags: u32,
        connection: Option<&mut [u16]>,
        count: &mut u32,
    ) -> i32 {
        if let Some(code) = self.enter("start_instance") {
            return code;
        }
        let mut state = self.state.lock();
        state.pipes_issued += 1;
        let Some(instance) = state.instances.get_mut(&instance_name.to_lowercase()) else {
            return ErrorCode::UnknownInstance.code();
        };
        instance.is_running = true;
        let pipe = format!(r"np:\\.\pipe\LOCALDB#{}\tsql\query", instance.name);
        fill_units(&pipe, connection, count)
    }

    fn start_tracing(&self) -> i32 {
        if let Some(code) = self.enter("start_tracing") {
            return code;
        }
        self.state.lock().tracing = true;
        0
    }

    fn stop_instance(&self, instance_name: &str, flags: u32, timeout_seconds: u32) -> i32 {
        if let Some(code) = self.enter("stop_instance") {
            return code;
        }
        let mut state = self.state.lock();
        state.last_stop = Some((flags, timeout_seconds));
        match state.instances.get_mut(&instance_name.to_lowercase()) {
            None => ErrorCode::UnknownInstance.code(),
            Some(instance) => {
                instance.is_running = false;
                0
            }
        }
    }

    fn stop_tracing(&self) -> i32 {
        if let Some(code) = self.enter("stop_tracing") {
            return code;
        }
        self.state.lock().tracing = false;
        0
    }

    fn unshare_instance(&self, instance_name: &str, _flags: u32) -> i32 {
        if let Some(code) = self.enter("unshare_instance") {
            return code;
        }
        let mut state = self.state.lock();
        match state.instances.get_mut(&instance_name.to_lowercase()) {
            None => ErrorCode::UnknownInstance.code(),
            Some(instance) if instance.shared_name.is_none() => ErrorCode::InstanceNotShared.code(),
            Some(instance) => {
                instance.shared_name = None;
                0
            }
        }
    }
}
