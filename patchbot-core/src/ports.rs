//! Port traits abstracting all external collaborators away from the pipeline.

use camino::Utf8Path;
use patchbot_types::alert::Alert;
use serde::{Deserialize, Serialize};

/// Source of open vulnerability alerts, in feed order.
pub trait AlertFeed {
    fn fetch_open_alerts(&self) -> anyhow::Result<Vec<Alert>>;
}

/// Git operations on the working checkout.
///
/// Every call blocks until the operation finishes. Paths are relative to the checkout root.
pub trait VersionControl {
    fn configure_identity(&self, identity: &CommitterIdentity) -> anyhow::Result<()>;
    /// Create or reset `name` at `base` and switch to it.
    fn create_branch(&self, name: &str, base: &str) -> anyhow::Result<()>;
    /// Switch to an existing branch.
    fn checkout(&self, name: &str) -> anyhow::Result<()>;
    fn stage(&self, path: &Utf8Path) -> anyhow::Result<()>;
    fn commit(&self, message: &str) -> anyhow::Result<()>;
    fn push(&self, branch: &str) -> anyhow::Result<()>;
    /// Discard staged and unstaged changes to `path`.
    fn restore(&self, path: &Utf8Path) -> anyhow::Result<()>;
}

/// Pull request creation.
pub trait PullRequests {
    fn open_pull_request(&self, request: &PullRequestRequest) -> anyhow::Result<PullRequestHandle>;
}

/// File-system write operations for run artifacts.
pub trait WritePort {
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()>;
    fn create_dir_all(&self, path: &Utf8Path) -> anyhow::Result<()>;
}

/// Name and contact recorded on every bot commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitterIdentity {
    pub name: String,
    pub email: String,
}

impl Default for CommitterIdentity {
    fn default() -> Self {
        Self {
            name: "patchbot".to_string(),
            email: "patchbot@users.noreply.github.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestRequest {
    pub title: String,
    pub body: String,
    /// Branch carrying the change.
    pub head: String,
    /// Branch the change should merge into.
    pub base: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequestHandle {
    #[serde(default)]
    pub number: Option<u64>,

    #[serde(default, rename = "html_url")]
    pub url: Option<String>,
}

impl PullRequestHandle {
    /// URL when known, else `#<number>`.
    pub fn display(&self) -> String {
        match (&self.url, self.number) {
            (Some(url), _) => url.clone(),
            (None, Some(n)) => format!("#{n}"),
            (None, None) => "-".to_string(),
        }
    }
}
