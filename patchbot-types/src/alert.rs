use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// One open vulnerability alert: a package flagged in a single manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Feed-assigned alert number, when the feed provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    pub package_name: String,

    /// Package ecosystem as reported by the feed, e.g. "pip" or "npm".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ecosystem: Option<String>,

    /// Manifest path relative to the repository root.
    pub manifest_path: Utf8PathBuf,

    pub advisory: Advisory,
}

/// A vulnerability description as found in the feed.
///
/// The feed is inconsistent about which of the version signals it fills in,
/// so every signal is optional and several may be present at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ghsa_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cve_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_url: Option<String>,

    /// Direct "first patched version" identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_patched_version: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vulnerabilities: Vec<VulnerabilityEntry>,

    /// Free-text list of vulnerable versions, e.g. "< 2.4.1".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vulnerable_versions: Option<String>,

    /// Free-text vulnerable range, e.g. ">= 2.0.0, < 2.4.1".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vulnerable_version_range: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vulnerable_version_range: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_patched_version: Option<String>,
}

impl Advisory {
    /// Human-facing identifier: GHSA id, then CVE id.
    pub fn display_id(&self) -> Option<&str> {
        self.ghsa_id.as_deref().or(self.cve_id.as_deref())
    }
}
