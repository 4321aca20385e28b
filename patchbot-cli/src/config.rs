//! Configuration file loading for patchbot.
//!
//! Discovers and loads `patchbot.toml` from the repository root.
//! Merges config file settings with CLI arguments (CLI takes precedence).

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use patchbot_core::adapters::DEFAULT_API_URL;
use patchbot_core::ports::CommitterIdentity;
use serde::Deserialize;
use tracing::debug;

/// The config file name to search for.
pub const CONFIG_FILE_NAME: &str = "patchbot.toml";

/// Top-level configuration from patchbot.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PatchbotConfig {
    pub github: GitHubConfig,
    pub git: GitConfig,
    pub committer: CommitterConfig,
    pub run: RunConfig,
}

/// Where alerts come from and pull requests go.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub api_url: String,

    /// Environment variable holding the API token.
    pub token_env: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            owner: None,
            repo: None,
            api_url: DEFAULT_API_URL.to_string(),
            token_env: "GH_TOKEN".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    pub remote: String,
    /// Pull request target.
    pub base_branch: String,
    pub branch_prefix: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            base_branch: "main".to_string(),
            branch_prefix: "patchbot/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommitterConfig {
    pub name: String,
    pub email: String,
}

impl Default for CommitterConfig {
    fn default() -> Self {
        let identity = CommitterIdentity::default();
        Self {
            name: identity.name,
            email: identity.email,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub dry_run: bool,
    /// Artifact directory, relative to the repository root.
    pub out_dir: Option<Utf8PathBuf>,
}

/// Discover the patchbot.toml config file.
///
/// Returns `None` if no config file is found in `repo_root`.
pub fn discover_config(repo_root: &Utf8Path) -> Option<Utf8PathBuf> {
    let config_path = repo_root.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        debug!("found config file at {}", config_path);
        Some(config_path)
    } else {
        debug!("no config file found at {}", config_path);
        None
    }
}

/// Load and parse a patchbot.toml config file.
pub fn load_config(path: &Utf8Path) -> anyhow::Result<PatchbotConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
    parse_config(&contents).with_context(|| format!("parse config file {}", path))
}

pub fn parse_config(contents: &str) -> anyhow::Result<PatchbotConfig> {
    let config: PatchbotConfig = toml::from_str(contents).context("invalid TOML")?;
    Ok(config)
}

/// Load config from repo root, or return default if not found.
pub fn load_or_default(repo_root: &Utf8Path) -> anyhow::Result<PatchbotConfig> {
    match discover_config(repo_root) {
        Some(path) => load_config(&path),
        None => Ok(PatchbotConfig::default()),
    }
}

/// `run` command flags that can override the config file.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub api_url: Option<String>,
    pub remote: Option<String>,
    pub base_branch: Option<String>,
    pub out_dir: Option<Utf8PathBuf>,
    pub dry_run: bool,
}

/// Merged configuration for one `run`.
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub api_url: String,
    pub token_env: String,
    pub remote: String,
    pub base_branch: String,
    pub branch_prefix: String,
    pub committer: CommitterIdentity,
    pub out_dir: Option<Utf8PathBuf>,
    pub dry_run: bool,
}

impl MergedConfig {
    /// `owner/repo` when both halves are known.
    pub fn repo_slug(&self) -> Option<String> {
        match (&self.owner, &self.repo) {
            (Some(owner), Some(repo)) => Some(format!("{owner}/{repo}")),
            _ => None,
        }
    }
}

/// Builder for merging config file with CLI arguments.
pub struct ConfigMerger {
    config: PatchbotConfig,
}

impl ConfigMerger {
    pub fn new(config: PatchbotConfig) -> Self {
        Self { config }
    }

    /// Merge with `run` command arguments.
    ///
    /// Values given on the command line replace file values; `dry_run` is on when
    /// either side asks for it.
    pub fn merge_run_args(self, cli: RunOverrides) -> MergedConfig {
        let PatchbotConfig {
            github,
            git,
            committer,
            run,
        } = self.config;

        MergedConfig {
            owner: cli.owner.or(github.owner),
            repo: cli.repo.or(github.repo),
            api_url: cli.api_url.unwrap_or(github.api_url),
            token_env: github.token_env,
            remote: cli.remote.unwrap_or(git.remote),
            base_branch: cli.base_branch.unwrap_or(git.base_branch),
            branch_prefix: git.branch_prefix,
            committer: CommitterIdentity {
                name: committer.name,
                email: committer.email,
            },
            out_dir: cli.out_dir.or(run.out_dir),
            dry_run: cli.dry_run || run.dry_run,
        }
    }
}
