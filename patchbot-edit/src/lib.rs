//! Manifest patcher for patchbot.
//!
//! Responsibilities:
//! - Classify a manifest by file name and dispatch to the matching dialect editor.
//! - Detect manifests that already carry the safe pin, so no empty commit is made.
//! - Write the new contents in place and render a unified diff preview.

mod error;
mod npm;
mod pip;

pub use error::PatchError;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use diffy::PatchFormatter;
use fs_err as fs;
use patchbot_types::manifest::{Dialect, ManifestEdit};
use patchbot_types::report::FileChange;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Result of patching one manifest.
#[derive(Debug, Clone)]
pub enum PatchOutcome {
    Patched(ManifestPatch),
    /// The manifest already pins the safe version; nothing to write or commit.
    AlreadySafe { dialect: Dialect },
}

/// A computed, not yet written, manifest change.
#[derive(Debug, Clone)]
pub struct ManifestPatch {
    pub edit: ManifestEdit,
    pub before: String,
    pub after: String,
}

#[derive(Debug)]
pub(crate) enum DialectPatch {
    Edited {
        after: String,
        previous: Vec<String>,
        locations: Vec<String>,
    },
    AlreadySafe,
    NotFound,
}

/// Compute the edit that pins `package` to `safe_version` in the manifest at
/// `manifest_path` (relative to `repo_root`). Nothing is written.
pub fn patch_manifest(
    repo_root: &Utf8Path,
    manifest_path: &Utf8Path,
    package: &str,
    safe_version: &str,
) -> Result<PatchOutcome, PatchError> {
    let abs = abs_path(repo_root, manifest_path);
    if !abs.is_file() {
        return Err(PatchError::ManifestNotFound {
            path: manifest_path.to_path_buf(),
        });
    }

    let dialect = Dialect::from_path(manifest_path).ok_or_else(|| PatchError::UnknownDialect {
        path: manifest_path.to_path_buf(),
    })?;

    let contents = fs::read_to_string(&abs).with_context(|| format!("read {}", abs))?;
    patch_contents(dialect, manifest_path, &contents, package, safe_version)
}

/// Pure variant of [`patch_manifest`] over in-memory contents.
pub fn patch_contents(
    dialect: Dialect,
    manifest_path: &Utf8Path,
    contents: &str,
    package: &str,
    safe_version: &str,
) -> Result<PatchOutcome, PatchError> {
    let (result, old_version_pattern) = match dialect {
        Dialect::Pip => (
            pip::patch(contents, package, safe_version)?,
            pip::pin_pattern(package),
        ),
        Dialect::Npm => (
            npm::patch(contents, package, safe_version).map_err(|e| {
                PatchError::InvalidManifest {
                    path: manifest_path.to_path_buf(),
                    message: e.to_string(),
                }
            })?,
            format!("{{{}}}.{}", npm::SECTIONS.join(","), package),
        ),
    };

    match result {
        DialectPatch::AlreadySafe => {
            debug!(manifest = %manifest_path, package, safe_version, "already pinned");
            Ok(PatchOutcome::AlreadySafe { dialect })
        }
        DialectPatch::NotFound => Err(PatchError::PackageNotInManifest {
            package: package.to_string(),
            path: manifest_path.to_path_buf(),
        }),
        DialectPatch::Edited {
            after,
            previous,
            locations,
        } => {
            let edit = ManifestEdit {
                manifest_path: manifest_path.to_path_buf(),
                package_name: package.to_string(),
                old_version_pattern,
                previous,
                new_version: safe_version.to_string(),
                dialect,
                locations,
            };
            debug!(edit = %edit.describe(), "computed manifest edit");
            Ok(PatchOutcome::Patched(ManifestPatch {
                edit,
                before: contents.to_string(),
                after,
            }))
        }
    }
}

/// Write the patched contents in place. Unchanged contents are not rewritten.
pub fn write_patch(repo_root: &Utf8Path, patch: &ManifestPatch) -> anyhow::Result<()> {
    if patch.before == patch.after {
        return Ok(());
    }
    let abs = abs_path(repo_root, &patch.edit.manifest_path);
    fs::write(&abs, &patch.after).with_context(|| format!("write {}", abs))
}

/// Put the original contents back, e.g. after a failed commit.
pub fn revert_patch(repo_root: &Utf8Path, patch: &ManifestPatch) -> anyhow::Result<()> {
    let abs = abs_path(repo_root, &patch.edit.manifest_path);
    fs::write(&abs, &patch.before).with_context(|| format!("restore {}", abs))
}

/// Unified diff of the change, in `git diff` layout.
pub fn render_diff(patch: &ManifestPatch) -> String {
    if patch.before == patch.after {
        return String::new();
    }

    let path = &patch.edit.manifest_path;
    let mut out = String::new();
    out.push_str(&format!("diff --git a/{0} b/{0}\n", path));
    out.push_str(&format!("--- a/{0}\n+++ b/{0}\n", path));

    let formatter = PatchFormatter::new();
    let diff = diffy::create_patch(&patch.before, &patch.after);
    let body = formatter.fmt_patch(&diff).to_string();
    // diffy repeats the ---/+++ header; keep only the hunks.
    let hunks = body
        .find("@@")
        .map(|idx| &body[idx..])
        .unwrap_or(body.as_str());
    out.push_str(hunks);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Hash and size of the manifest before and after the change.
pub fn file_change(patch: &ManifestPatch) -> FileChange {
    FileChange {
        path: patch.edit.manifest_path.to_string(),
        sha256_before: sha256_hex(patch.before.as_bytes()),
        sha256_after: sha256_hex(patch.after.as_bytes()),
        bytes_before: patch.before.len() as u64,
        bytes_after: patch.after.len() as u64,
    }
}

fn abs_path(repo_root: &Utf8Path, rel: &Utf8Path) -> Utf8PathBuf {
    if rel.is_absolute() {
        rel.to_path_buf()
    } else {
        repo_root.join(rel)
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
