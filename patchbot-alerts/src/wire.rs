//! Serde mirror of the Dependabot alerts REST payload.

use patchbot_types::alert::{Advisory, Alert, VulnerabilityEntry};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct AlertWire {
    #[serde(default)]
    pub number: Option<u64>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub dependency: Option<DependencyWire>,

    #[serde(default)]
    pub security_advisory: Option<AdvisoryWire>,

    #[serde(default)]
    pub security_vulnerability: Option<VulnerabilityWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DependencyWire {
    #[serde(default)]
    pub package: Option<PackageWire>,

    #[serde(default)]
    pub manifest_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PackageWire {
    #[serde(default)]
    pub ecosystem: Option<String>,

    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AdvisoryWire {
    #[serde(default)]
    pub ghsa_id: Option<String>,

    #[serde(default)]
    pub cve_id: Option<String>,

    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub severity: Option<String>,

    #[serde(default)]
    pub html_url: Option<String>,

    #[serde(default)]
    pub first_patched_version: Option<PatchedVersionWire>,

    #[serde(default)]
    pub vulnerabilities: Option<Vec<VulnerabilityWire>>,

    #[serde(default)]
    pub vulnerable_versions: Option<String>,

    #[serde(default)]
    pub vulnerable_version_range: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VulnerabilityWire {
    #[serde(default)]
    pub package: Option<PackageWire>,

    #[serde(default)]
    pub vulnerable_version_range: Option<String>,

    #[serde(default)]
    pub first_patched_version: Option<PatchedVersionWire>,
}

/// `first_patched_version` is usually `{ "identifier": "1.2.3" }`, sometimes `null`,
/// and in hand-written exports occasionally a bare string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum PatchedVersionWire {
    Object {
        #[serde(default)]
        identifier: Option<String>,
    },
    Plain(String),
}

impl PatchedVersionWire {
    fn identifier(self) -> Option<String> {
        match self {
            PatchedVersionWire::Object { identifier } => identifier,
            PatchedVersionWire::Plain(s) => Some(s),
        }
    }
}

impl VulnerabilityWire {
    /// Fill the advisory's direct patched version and range from the alert-level
    /// vulnerability, which describes the alerted package only. Values the advisory
    /// already carries are kept.
    pub(crate) fn fill_gaps(self, advisory: &mut Advisory) {
        let has_direct = advisory
            .first_patched_version
            .as_deref()
            .is_some_and(|v| !v.trim().is_empty());
        if !has_direct
            && let Some(version) = self
                .first_patched_version
                .and_then(PatchedVersionWire::identifier)
        {
            advisory.first_patched_version = Some(version);
        }
        if advisory.vulnerable_version_range.is_none() {
            advisory.vulnerable_version_range = self.vulnerable_version_range;
        }
    }
}

impl From<VulnerabilityWire> for VulnerabilityEntry {
    fn from(w: VulnerabilityWire) -> Self {
        VulnerabilityEntry {
            package_name: w.package.and_then(|p| p.name),
            vulnerable_version_range: w.vulnerable_version_range,
            first_patched_version: w.first_patched_version.and_then(PatchedVersionWire::identifier),
        }
    }
}

impl From<AdvisoryWire> for Advisory {
    fn from(w: AdvisoryWire) -> Self {
        Advisory {
            ghsa_id: w.ghsa_id,
            cve_id: w.cve_id,
            summary: w.summary,
            severity: w.severity,
            html_url: w.html_url,
            first_patched_version: w
                .first_patched_version
                .and_then(PatchedVersionWire::identifier),
            vulnerabilities: w
                .vulnerabilities
                .unwrap_or_default()
                .into_iter()
                .map(VulnerabilityEntry::from)
                .collect(),
            vulnerable_versions: w.vulnerable_versions,
            vulnerable_version_range: w.vulnerable_version_range,
        }
    }
}

/// Why a wire record could not become an [`Alert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rejected {
    NotOpen,
    MissingPackage,
    MissingManifest,
}

impl AlertWire {
    pub(crate) fn into_alert(self) -> Result<Alert, Rejected> {
        if let Some(state) = &self.state
            && state != "open"
        {
            return Err(Rejected::NotOpen);
        }

        let dependency = self.dependency.ok_or(Rejected::MissingPackage)?;
        let package = dependency.package.ok_or(Rejected::MissingPackage)?;
        let package_name = package
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or(Rejected::MissingPackage)?;
        let manifest_path = dependency
            .manifest_path
            .filter(|p| !p.trim().is_empty())
            .ok_or(Rejected::MissingManifest)?;

        let mut advisory = Advisory::from(self.security_advisory.unwrap_or_default());
        if let Some(vulnerability) = self.security_vulnerability {
            vulnerability.fill_gaps(&mut advisory);
        }

        Ok(Alert {
            number: self.number,
            state: self.state,
            package_name,
            ecosystem: package.ecosystem,
            manifest_path: manifest_path.into(),
            advisory,
        })
    }
}
