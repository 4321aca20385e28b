//! Default port implementations: GitHub REST, the `git` binary, and the local filesystem.

use crate::ports::{
    AlertFeed, CommitterIdentity, PullRequestHandle, PullRequestRequest, PullRequests,
    VersionControl, WritePort,
};
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use patchbot_types::alert::Alert;
use reqwest::blocking::{Client, RequestBuilder};
use std::process::Command;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Repository coordinates on a GitHub-compatible API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubRepo {
    pub api_url: String,
    pub owner: String,
    pub repo: String,
}

impl GitHubRepo {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    fn repo_url(&self) -> String {
        format!(
            "{}/repos/{}/{}",
            self.api_url.trim_end_matches('/'),
            self.owner,
            self.repo
        )
    }

    /// Open alerts, first page only.
    pub fn alerts_url(&self) -> String {
        format!("{}/dependabot/alerts?state=open&per_page=100", self.repo_url())
    }

    pub fn pulls_url(&self) -> String {
        format!("{}/pulls", self.repo_url())
    }

    /// Open pull requests whose head is `branch` in this repository.
    pub fn open_pulls_for_head_url(&self, branch: &str) -> String {
        format!(
            "{}/pulls?state=open&head={}:{}",
            self.repo_url(),
            self.owner,
            branch
        )
    }
}

fn github_client() -> anyhow::Result<Client> {
    Client::builder()
        .user_agent(concat!("patchbot/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("build http client")
}

fn authorized(req: RequestBuilder, token: &str) -> RequestBuilder {
    req.bearer_auth(token)
        .header(reqwest::header::ACCEPT, "application/vnd.github+json")
        .header("X-GitHub-Api-Version", "2022-11-28")
}

/// Reads open Dependabot alerts from the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubAlertFeed {
    repo: GitHubRepo,
    token: String,
    client: Client,
}

impl GitHubAlertFeed {
    pub fn new(repo: GitHubRepo, token: String) -> anyhow::Result<Self> {
        Ok(Self {
            repo,
            token,
            client: github_client()?,
        })
    }
}

impl AlertFeed for GitHubAlertFeed {
    fn fetch_open_alerts(&self) -> anyhow::Result<Vec<Alert>> {
        let url = self.repo.alerts_url();
        debug!(url = %url, "fetching alerts");

        let response = authorized(self.client.get(&url), &self.token)
            .send()
            .with_context(|| format!("GET {}", url))?;
        let status = response.status();
        let body = response
            .text()
            .with_context(|| format!("read response body from {}", url))?;

        if !status.is_success() {
            anyhow::bail!("GET {} failed with HTTP {}: {}", url, status, snippet(&body));
        }

        patchbot_alerts::parse_alerts(&body).with_context(|| format!("parse alerts from {}", url))
    }
}

/// Opens pull requests through the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubPullRequests {
    repo: GitHubRepo,
    token: String,
    client: Client,
}

impl GitHubPullRequests {
    pub fn new(repo: GitHubRepo, token: String) -> anyhow::Result<Self> {
        Ok(Self {
            repo,
            token,
            client: github_client()?,
        })
    }
}

impl PullRequests for GitHubPullRequests {
    fn open_pull_request(&self, request: &PullRequestRequest) -> anyhow::Result<PullRequestHandle> {
        let url = self.repo.pulls_url();
        debug!(url = %url, head = %request.head, base = %request.base, "opening pull request");

        let response = authorized(self.client.post(&url), &self.token)
            .json(request)
            .send()
            .with_context(|| format!("POST {}", url))?;
        let status = response.status();
        let body = response
            .text()
            .with_context(|| format!("read response body from {}", url))?;

        if status == reqwest::StatusCode::UNPROCESSABLE_ENTITY && is_existing_pull_error(&body) {
            debug!(head = %request.head, "pull request already open for head");
            return self.find_open_pull(&request.head);
        }
        if !status.is_success() {
            anyhow::bail!("POST {} failed with HTTP {}: {}", url, status, snippet(&body));
        }

        parse_pull_response(&body)
    }
}

impl GitHubPullRequests {
    fn find_open_pull(&self, head: &str) -> anyhow::Result<PullRequestHandle> {
        let url = self.repo.open_pulls_for_head_url(head);
        let response = authorized(self.client.get(&url), &self.token)
            .send()
            .with_context(|| format!("GET {}", url))?;
        let status = response.status();
        let body = response
            .text()
            .with_context(|| format!("read response body from {}", url))?;

        if !status.is_success() {
            anyhow::bail!("GET {} failed with HTTP {}: {}", url, status, snippet(&body));
        }

        let open: Vec<PullRequestHandle> =
            serde_json::from_str(&body).context("parse pull request list")?;
        open.into_iter()
            .next()
            .with_context(|| format!("no open pull request found for head {}", head))
    }
}

pub(crate) fn parse_pull_response(body: &str) -> anyhow::Result<PullRequestHandle> {
    serde_json::from_str(body).context("parse pull request response")
}

/// GitHub answers 422 with "A pull request already exists for owner:branch." when the
/// head already has an open pull request.
fn is_existing_pull_error(body: &str) -> bool {
    body.contains("A pull request already exists")
}

fn snippet(body: &str) -> &str {
    let body = body.trim();
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// Loads alerts from a saved feed payload.
#[derive(Debug, Clone)]
pub struct FsAlertFeed {
    pub path: Utf8PathBuf,
}

impl FsAlertFeed {
    pub fn new(path: Utf8PathBuf) -> Self {
        Self { path }
    }
}

impl AlertFeed for FsAlertFeed {
    fn fetch_open_alerts(&self) -> anyhow::Result<Vec<Alert>> {
        patchbot_alerts::load_alerts(&self.path)
    }
}

/// In-memory alert feed for embedding and testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAlertFeed {
    alerts: Vec<Alert>,
}

impl InMemoryAlertFeed {
    pub fn new(alerts: Vec<Alert>) -> Self {
        Self { alerts }
    }
}

impl AlertFeed for InMemoryAlertFeed {
    fn fetch_open_alerts(&self) -> anyhow::Result<Vec<Alert>> {
        Ok(self.alerts.clone())
    }
}

/// Git operations by shelling out to the `git` binary in `repo_root`.
#[derive(Debug, Clone)]
pub struct ShellGit {
    pub repo_root: Utf8PathBuf,
    pub remote: String,
}

impl ShellGit {
    pub fn new(repo_root: Utf8PathBuf, remote: impl Into<String>) -> Self {
        Self {
            repo_root,
            remote: remote.into(),
        }
    }

    fn git(&self, args: &[&str]) -> anyhow::Result<String> {
        debug!(args = ?args, "git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .output()
            .with_context(|| format!("failed to execute `git {}`", args.join(" ")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            anyhow::bail!(
                "`git {}` failed: {}",
                args.join(" "),
                if stderr.is_empty() {
                    "unknown error"
                } else {
                    stderr.as_str()
                }
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Name of the checked-out branch.
    pub fn current_branch(&self) -> anyhow::Result<String> {
        self.git(&["rev-parse", "--abbrev-ref", "HEAD"])
    }
}

impl VersionControl for ShellGit {
    fn configure_identity(&self, identity: &CommitterIdentity) -> anyhow::Result<()> {
        self.git(&["config", "user.name", &identity.name])?;
        self.git(&["config", "user.email", &identity.email])?;
        Ok(())
    }

    fn create_branch(&self, name: &str, base: &str) -> anyhow::Result<()> {
        self.git(&["checkout", "-B", name, base]).map(drop)
    }

    fn checkout(&self, name: &str) -> anyhow::Result<()> {
        self.git(&["checkout", name]).map(drop)
    }

    fn stage(&self, path: &Utf8Path) -> anyhow::Result<()> {
        self.git(&["add", "--", path.as_str()]).map(drop)
    }

    fn commit(&self, message: &str) -> anyhow::Result<()> {
        self.git(&["commit", "-m", message]).map(drop)
    }

    fn push(&self, branch: &str) -> anyhow::Result<()> {
        self.git(&["push", "-u", &self.remote, branch]).map(drop)
    }

    fn restore(&self, path: &Utf8Path) -> anyhow::Result<()> {
        self.git(&["checkout", "HEAD", "--", path.as_str()]).map(drop)
    }
}

/// Filesystem write operations.
#[derive(Debug, Clone, Default)]
pub struct FsWritePort;

impl WritePort for FsWritePort {
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create parent dir for {}", path))?;
        }
        std::fs::write(path, contents).with_context(|| format!("write {}", path))
    }

    fn create_dir_all(&self, path: &Utf8Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(path).with_context(|| format!("create_dir_all {}", path))
    }
}
