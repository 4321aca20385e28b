use crate::range;
use patchbot_types::alert::Advisory;
use serde::Serialize;
use tracing::debug;

/// Which advisory signal produced the safe version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionSource {
    /// The advisory's own first patched version.
    Direct,
    /// A nested vulnerability entry's first patched version.
    Vulnerabilities,
    /// The upper bound of a free-text vulnerable range.
    Range,
}

impl VersionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            VersionSource::Direct => "direct",
            VersionSource::Vulnerabilities => "vulnerabilities",
            VersionSource::Range => "range",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedVersion {
    pub version: String,
    pub source: VersionSource,
}

/// Minimum safe version for an advisory, or `None` when no signal yields one.
pub fn resolve(advisory: &Advisory) -> Option<String> {
    resolve_with_source(advisory).map(|r| r.version)
}

/// Like [`resolve`], but also reports which signal won.
///
/// Precedence, first match wins:
/// 1. `first_patched_version`
/// 2. the first non-empty `first_patched_version` in `vulnerabilities`, in list order
/// 3. the upper bound of `vulnerable_versions`, else of `vulnerable_version_range`
pub fn resolve_with_source(advisory: &Advisory) -> Option<ResolvedVersion> {
    if let Some(v) = non_empty(advisory.first_patched_version.as_deref()) {
        return Some(found(v, VersionSource::Direct));
    }

    if let Some(v) = advisory
        .vulnerabilities
        .iter()
        .find_map(|entry| non_empty(entry.first_patched_version.as_deref()))
    {
        return Some(found(v, VersionSource::Vulnerabilities));
    }

    let text = non_empty(advisory.vulnerable_versions.as_deref())
        .or_else(|| non_empty(advisory.vulnerable_version_range.as_deref()))?;
    match range::upper_bound(text) {
        Some(v) => Some(found(v, VersionSource::Range)),
        None => {
            debug!(range = text, "range has no less-than bound");
            None
        }
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn found(version: &str, source: VersionSource) -> ResolvedVersion {
    debug!(version, source = source.as_str(), "resolved safe version");
    ResolvedVersion {
        version: version.to_string(),
        source,
    }
}
