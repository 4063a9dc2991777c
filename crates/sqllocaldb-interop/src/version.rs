//! Dotted version numbers as used by registry subkeys and the instance API.

use core::cmp::Ordering;
use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// A `major.minor[.build[.revision]]` version number.
///
/// Missing components sort before any present component, so `11.0` is
/// lower than `11.0.0` which is lower than `11.0.0.0`.
///
/// # Examples
///
/// ```
/// use sqllocaldb_interop::ApiVersion;
///
/// let a: ApiVersion = "11.0".parse()?;
/// let b: ApiVersion = "13.0.4001.0".parse()?;
/// assert!(a < b);
/// assert_eq!(b.to_string(), "13.0.4001.0");
/// # Ok::<(), sqllocaldb_interop::version::ParseVersionError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApiVersion {
    major: u32,
    minor: u32,
    build: Option<u32>,
    revision: Option<u32>,
}

/// Error returned when a string is not a dotted version number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{input}' is not a valid version number")]
pub struct ParseVersionError {
    input: String,
}

impl ApiVersion {
    /// Create a two-component version.
    pub const fn new(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            build: None,
            revision: None,
        }
    }

    /// Create a fully specified four-component version.
    pub const fn from_parts(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build: Some(build),
            revision: Some(revision),
        }
    }

    /// Parse a version, returning `None` when `input` is malformed.
    pub fn parse(input: &str) -> Option<Self> {
        let mut parts = input.split('.');
        let major = parse_component(parts.next()?)?;
        let minor = parse_component(parts.next()?)?;
        let build = parts.next().map(parse_component);
        let revision = parts.next().map(parse_component);
        if parts.next().is_some() {
            return None;
        }

        let build = match build {
            Some(value) => Some(value?),
            None => None,
        };
        let revision = match revision {
            Some(value) => Some(value?),
            None => None,
        };

        Some(Self {
            major,
            minor,
            build,
            revision,
        })
    }

    /// The major component.
    pub fn major(&self) -> u32 {
        self.major
    }

    /// The minor component.
    pub fn minor(&self) -> u32 {
        self.minor
    }

    /// The build component, if present.
    pub fn build(&self) -> Option<u32> {
        self.build
    }

    /// The revision component, if present.
    pub fn revision(&self) -> Option<u32> {
        self.revision
    }
}

fn parse_component(text: &str) -> Option<u32> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

impl Ord for ApiVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.build.cmp(&other.build))
            .then(self.revision.cmp(&other.revision))
    }
}

impl PartialOrd for ApiVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for ApiVersion {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ParseVersionError {
            input: s.to_string(),
        })
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if let Some(build) = self.build {
            write!(f, ".{build}")?;
            if let Some(revision) = self.revision {
                write!(f, ".{revision}")?;
            }
        }
        Ok(())
    }
}
