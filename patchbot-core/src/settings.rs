//! Clap-free settings for the batch pipeline.

use crate::ports::CommitterIdentity;
use camino::Utf8PathBuf;

/// Settings for one batch run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Working checkout; manifest paths from alerts are relative to it.
    pub repo_root: Utf8PathBuf,
    pub out_dir: Utf8PathBuf,

    /// `owner/repo`, recorded in the report.
    pub repo_slug: Option<String>,

    // Publication
    pub base_branch: String,
    pub branch_prefix: String,
    pub committer: CommitterIdentity,

    /// Compute edits only: no writes, no git, no pull requests.
    pub dry_run: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            repo_root: Utf8PathBuf::from("."),
            out_dir: Utf8PathBuf::from("artifacts/patchbot"),
            repo_slug: None,
            base_branch: "main".to_string(),
            branch_prefix: "patchbot/".to_string(),
            committer: CommitterIdentity::default(),
            dry_run: false,
        }
    }
}
