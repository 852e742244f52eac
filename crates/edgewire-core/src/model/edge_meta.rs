// ── Edge metadata ──
//
// What the backend tells us about an Edge at login: identity, product,
// firmware version, the user's role on it, and whether it is online.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The user's role on an Edge. Ordered `Guest < Owner < Installer < Admin`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    #[default]
    Guest,
    Owner,
    Installer,
    Admin,
}

impl Role {
    pub fn is_at_least(self, required: Role) -> bool {
        self >= required
    }
}

// ── EdgeVersion ─────────────────────────────────────────────────────

/// `major.minor.patch[-suffix]`, e.g. `2024.2.1-SNAPSHOT`.
///
/// Ordering ignores the suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub suffix: Option<String>,
}

impl EdgeVersion {
    pub fn is_snapshot(&self) -> bool {
        self.suffix.is_some()
    }

    fn triple(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }
}

impl PartialOrd for EdgeVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.triple().cmp(&other.triple()))
    }
}

impl fmt::Display for EdgeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(suffix) = &self.suffix {
            write!(f, "-{suffix}")?;
        }
        Ok(())
    }
}

impl FromStr for EdgeVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (numbers, suffix) = match s.split_once('-') {
            Some((n, suffix)) => (n, Some(suffix.to_owned())),
            None => (s, None),
        };
        let mut parts = numbers.split('.').map(|p| p.parse::<u64>());
        let mut next = || -> Result<u64, String> {
            match parts.next() {
                Some(Ok(n)) => Ok(n),
                Some(Err(e)) => Err(format!("invalid version '{s}': {e}")),
                None => Ok(0),
            }
        };
        Ok(Self {
            major: next()?,
            minor: next()?,
            patch: next()?,
            suffix,
        })
    }
}

// ── EdgeMetadata ────────────────────────────────────────────────────

/// Descriptive data about one Edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EdgeMetadata {
    pub id: String,
    pub comment: String,
    #[serde(rename = "producttype")]
    pub product_type: String,
    pub version: String,
    pub role: Role,
    pub is_online: bool,
}

impl EdgeMetadata {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn parsed_version(&self) -> Option<EdgeVersion> {
        self.version.parse().ok()
    }

    /// Firmware version is at least `version`. Unparseable versions never are.
    pub fn is_version_at_least(&self, version: &str) -> bool {
        match (self.parsed_version(), version.parse::<EdgeVersion>()) {
            (Some(have), Ok(want)) => have >= want,
            _ => false,
        }
    }

    /// Development builds carry a `-SUFFIX`.
    pub fn is_snapshot(&self) -> bool {
        self.version.contains('-')
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_ordering() {
        assert!(Role::Admin.is_at_least(Role::Installer));
        assert!(Role::Owner.is_at_least(Role::Owner));
        assert!(!Role::Guest.is_at_least(Role::Owner));
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
    }

    #[test]
    fn version_comparison_ignores_suffix() {
        let meta = EdgeMetadata {
            version: "2024.2.1-SNAPSHOT".into(),
            ..EdgeMetadata::new("edge0")
        };
        assert!(meta.is_snapshot());
        assert!(meta.is_version_at_least("2024.2.1"));
        assert!(meta.is_version_at_least("2023.12.0"));
        assert!(!meta.is_version_at_least("2024.3.0"));
    }

    #[test]
    fn unparseable_version_is_never_new_enough() {
        let meta = EdgeMetadata {
            version: "unknown".into(),
            ..EdgeMetadata::new("edge0")
        };
        assert!(!meta.is_version_at_least("1.0.0"));
    }

    #[test]
    fn deserializes_backend_shape() {
        let meta: EdgeMetadata = serde_json::from_value(json!({
            "id": "edge0",
            "comment": "Home",
            "producttype": "home",
            "version": "2024.1.0",
            "role": "owner",
            "isOnline": true,
            "lastmessage": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(meta.role, Role::Owner);
        assert!(meta.is_online);
        assert_eq!(meta.product_type, "home");
        assert_eq!(meta.parsed_version().unwrap().to_string(), "2024.1.0");
    }
}
