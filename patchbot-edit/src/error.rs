//! Error types for patchbot-edit.
//!
//! Every variant except [`PatchError::Runtime`] describes a manifest the patcher cannot act on;
//! callers skip the alert and move on. `Runtime` covers I/O and other tool failures.

use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("manifest not found: {path}")]
    ManifestNotFound { path: Utf8PathBuf },

    /// The file name matches no supported manifest dialect.
    #[error("unknown manifest dialect: {path}")]
    UnknownDialect { path: Utf8PathBuf },

    #[error("package {package} not found in {path}")]
    PackageNotInManifest { package: String, path: Utf8PathBuf },

    #[error("invalid manifest {path}: {message}")]
    InvalidManifest { path: Utf8PathBuf, message: String },

    #[error("runtime error: {0}")]
    Runtime(#[from] anyhow::Error),
}

impl PatchError {
    /// Stable snake_case token for reports and log fields.
    pub fn token(&self) -> &'static str {
        match self {
            PatchError::ManifestNotFound { .. } => "manifest_not_found",
            PatchError::UnknownDialect { .. } => "unknown_dialect",
            PatchError::PackageNotInManifest { .. } => "package_not_in_manifest",
            PatchError::InvalidManifest { .. } => "invalid_manifest",
            PatchError::Runtime(_) => "runtime_error",
        }
    }

    /// True when the manifest itself rules out the edit, as opposed to a tool failure.
    pub fn is_manifest_problem(&self) -> bool {
        !matches!(self, PatchError::Runtime(_))
    }
}
