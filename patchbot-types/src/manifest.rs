use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// File-format convention of a dependency manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// Pinned requirements text (`package==version` lines).
    Pip,
    /// `package.json` with `dependencies` / `devDependencies` objects.
    Npm,
}

impl Dialect {
    /// Classify a manifest by its file name only; contents are never inspected.
    ///
    /// Pip: names ending in `requirements.txt`, or `requirements*.txt`.
    /// Npm: exactly `package.json`.
    pub fn from_path(path: &Utf8Path) -> Option<Self> {
        let name = path.file_name()?;
        if name == "package.json" {
            return Some(Dialect::Npm);
        }
        if name.ends_with("requirements.txt")
            || (name.starts_with("requirements") && path.extension() == Some("txt"))
        {
            return Some(Dialect::Pip);
        }
        None
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::Pip => "pip",
            Dialect::Npm => "npm",
        }
    }
}

/// Description of a computed manifest change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEdit {
    pub manifest_path: Utf8PathBuf,
    pub package_name: String,

    /// What was matched: the pin regex for pip, the JSON key path for npm.
    pub old_version_pattern: String,

    /// Pins or constraints that were replaced, in document order.
    #[serde(default)]
    pub previous: Vec<String>,

    pub new_version: String,
    pub dialect: Dialect,

    /// Where each replacement happened (`line 3`, `devDependencies`, ...).
    #[serde(default)]
    pub locations: Vec<String>,
}

impl ManifestEdit {
    /// One-line summary used in commit messages and logs.
    pub fn describe(&self) -> String {
        let from = if self.previous.is_empty() {
            "-".to_string()
        } else {
            self.previous.join(", ")
        };
        format!(
            "{}: {} {} -> {} ({})",
            self.manifest_path,
            self.package_name,
            from,
            self.new_version,
            self.locations.join(", ")
        )
    }
}
