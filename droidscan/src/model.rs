use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identity snapshot of the scanned device. The values are passed through
/// from the device as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub model: String,
    pub serial: String,
    pub android_version: String,
    pub battery_info: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Safe,
    Suspicious,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "Safe",
            Self::Suspicious => "Suspicious",
        }
    }

    #[inline]
    pub fn is_suspicious(&self) -> bool {
        *self == Self::Suspicious
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Safe" => Ok(Self::Safe),
            "Suspicious" => Ok(Self::Suspicious),
            _ => Err(crate::Error::Generic(format!("invalid status {:?}", s))),
        }
    }
}

/// One installed application as parsed from `pm list packages -i`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    pub package: String,
    pub installer: String,
}

/// A classified application in a [ScanReport]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub package: String,
    pub installer: String,
    pub status: Status,
    #[serde(default)]
    pub dangerous_permissions: BTreeSet<String>,
}

impl PackageRecord {
    #[inline]
    pub fn is_suspicious(&self) -> bool {
        self.status.is_suspicious()
    }

    /// Permissions joined the way the tabular export shows them
    pub fn permissions_display(&self) -> String {
        if self.dangerous_permissions.is_empty() {
            crate::export::NO_PERMISSIONS.into()
        } else {
            self.dangerous_permissions
                .iter()
                .map(String::as_str)
                .collect::<Vec<&str>>()
                .join(",")
        }
    }
}

impl fmt::Display for PackageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) {}", self.package, self.installer, self.status)
    }
}

/// The complete result of one scan. Apps are kept in the order the device
/// listed them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub device: Device,
    pub apps: Vec<PackageRecord>,
}

impl ScanReport {
    pub fn suspicious(&self) -> impl Iterator<Item = &PackageRecord> {
        self.apps.iter().filter(|it| it.is_suspicious())
    }

    pub fn suspicious_packages(&self) -> Vec<&str> {
        self.suspicious().map(|it| it.package.as_str()).collect()
    }

    pub fn suspicious_count(&self) -> usize {
        self.suspicious().count()
    }

    pub fn has_suspicious(&self) -> bool {
        self.suspicious().next().is_some()
    }

    /// Package ids that show up more than once, in first seen order
    pub fn duplicate_packages(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut dupes = Vec::new();
        for app in &self.apps {
            if !seen.insert(app.package.as_str()) && !dupes.contains(&app.package.as_str()) {
                dupes.push(app.package.as_str());
            }
        }
        dupes
    }
}
