//! Remote server version

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// First remote version that accepts v2 permission targets
pub const PERMISSION_V2_SINCE: Version = Version::new(6, 6, 0);

/// First remote version that exports group membership lists
pub const GROUP_MEMBERS_SINCE: Version = Version::new(6, 13, 0);

/// Body of the version endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    #[serde(default)]
    pub revision: String,
    #[serde(default)]
    pub addons: Vec<String>,
    #[serde(default)]
    pub license: String,
}

/// Dotted numeric version: major.minor.patch
///
/// Anything after the numeric triple (`-rc1`, `+build`) is ignored and missing
/// components are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self { major, minor, patch }
    }

    pub fn supports_permission_v2(&self) -> bool {
        *self >= PERMISSION_V2_SINCE
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid version: '{0}'")]
pub struct ParseVersionError(pub String);

impl FromStr for Version {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('v');
        let core = trimmed.split(['-', '+']).next().unwrap_or_default();
        if core.is_empty() {
            return Err(ParseVersionError(s.to_string()));
        }

        let mut parts = [0u64; 3];
        for (i, piece) in core.split('.').enumerate() {
            if i >= parts.len() {
                break;
            }
            parts[i] = piece.parse().map_err(|_| ParseVersionError(s.to_string()))?;
        }
        Ok(Version::new(parts[0], parts[1], parts[2]))
    }
}
