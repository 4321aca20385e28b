mod config;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use config::{ConfigMerger, MergedConfig, RunOverrides};
use fs_err as fs;
use patchbot_core::adapters::{
    FsAlertFeed, FsWritePort, GitHubAlertFeed, GitHubPullRequests, GitHubRepo, ShellGit,
};
use patchbot_core::pipeline::{run_batch, write_run_artifacts};
use patchbot_core::ports::{AlertFeed, PullRequestHandle, PullRequestRequest, PullRequests};
use patchbot_core::settings::RunSettings;
use patchbot_edit::{PatchOutcome, patch_manifest, render_diff, write_patch};
use patchbot_types::report::ToolInfo;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "patchbot",
    version,
    about = "Turn open Dependabot alerts into dependency bump pull requests."
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Process every open alert: resolve, patch, commit, push, open a pull request.
    Run(RunArgs),
    /// Print the safe version an advisory points to.
    Resolve(ResolveArgs),
    /// Pin one package in one manifest, without git.
    Patch(PatchArgs),
}

#[derive(Debug, Parser)]
struct RunArgs {
    /// Repository root (default: current directory).
    #[arg(long, default_value = ".")]
    repo_root: Utf8PathBuf,

    /// Repository owner on GitHub.
    #[arg(long, env = "PATCHBOT_OWNER")]
    owner: Option<String>,

    /// Repository name on GitHub.
    #[arg(long, env = "PATCHBOT_REPO")]
    repo: Option<String>,

    /// GitHub API base URL.
    #[arg(long)]
    api_url: Option<String>,

    /// Git remote to push branches to.
    #[arg(long)]
    remote: Option<String>,

    /// Branch pull requests target.
    #[arg(long)]
    base_branch: Option<String>,

    /// Output directory for run artifacts (default: <repo_root>/artifacts/patchbot).
    #[arg(long)]
    out_dir: Option<Utf8PathBuf>,

    /// Read alerts from a saved API payload instead of GitHub.
    #[arg(long)]
    alerts_file: Option<Utf8PathBuf>,

    /// Compute edits and write artifacts only: no manifest writes, git, or pull requests.
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Exit with code 2 when any alert failed.
    #[arg(long, default_value_t = false)]
    fail_on_error: bool,
}

#[derive(Debug, Parser)]
struct ResolveArgs {
    /// Advisory JSON: a `security_advisory` object or a whole alert record.
    advisory: Utf8PathBuf,
}

#[derive(Debug, Parser)]
struct PatchArgs {
    /// Manifest path, relative to the repository root.
    manifest: Utf8PathBuf,
    package: String,
    version: String,

    /// Repository root (default: current directory).
    #[arg(long, default_value = ".")]
    repo_root: Utf8PathBuf,

    /// Print the diff instead of writing the manifest.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

fn main() -> ExitCode {
    match real_main() {
        Ok(code) => code,
        Err(e) => {
            error!("{:?}", e);
            ExitCode::from(1)
        }
    }
}

fn real_main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Run(args) => cmd_run(args),
        Command::Resolve(args) => cmd_resolve(args),
        Command::Patch(args) => cmd_patch(args),
    }
}

fn cmd_run(args: RunArgs) -> anyhow::Result<ExitCode> {
    let repo_root = args.repo_root;

    // Load config file and merge with CLI arguments
    let file_config = config::load_or_default(&repo_root).context("load patchbot.toml config")?;
    let merged = ConfigMerger::new(file_config).merge_run_args(RunOverrides {
        owner: args.owner,
        repo: args.repo,
        api_url: args.api_url,
        remote: args.remote,
        base_branch: args.base_branch,
        out_dir: args.out_dir,
        dry_run: args.dry_run,
    });
    debug!(
        "merged config: repo={:?}, remote={}, base={}, dry_run={}",
        merged.repo_slug(),
        merged.remote,
        merged.base_branch,
        merged.dry_run
    );

    let feed: Box<dyn AlertFeed> = match &args.alerts_file {
        Some(path) => Box::new(FsAlertFeed::new(repo_root.join(path))),
        None => {
            let (repo, token) = github_access(&merged, "fetch alerts")?;
            Box::new(GitHubAlertFeed::new(repo, token)?)
        }
    };
    let prs: Box<dyn PullRequests> = if merged.dry_run {
        Box::new(NoPullRequests)
    } else {
        let (repo, token) = github_access(&merged, "open pull requests")?;
        Box::new(GitHubPullRequests::new(repo, token)?)
    };
    let vcs = ShellGit::new(repo_root.clone(), merged.remote.clone());

    let defaults = RunSettings::default();
    let settings = RunSettings {
        out_dir: repo_root.join(merged.out_dir.clone().unwrap_or(defaults.out_dir)),
        repo_root,
        repo_slug: merged.repo_slug(),
        base_branch: merged.base_branch,
        branch_prefix: merged.branch_prefix,
        committer: merged.committer,
        dry_run: merged.dry_run,
    };

    let outcome = run_batch(&settings, feed.as_ref(), &vcs, prs.as_ref(), tool_info())?;
    write_run_artifacts(&outcome, &settings.out_dir, &FsWritePort)
        .context("write run artifacts")?;

    if outcome.feed_empty {
        info!("no open Dependabot alerts found");
    }
    info!("wrote run report to {}", settings.out_dir);

    if args.fail_on_error && outcome.has_failures() {
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}

/// Repository coordinates and token, or a configuration error naming what is missing.
fn github_access(merged: &MergedConfig, purpose: &str) -> anyhow::Result<(GitHubRepo, String)> {
    let (Some(owner), Some(repo)) = (&merged.owner, &merged.repo) else {
        anyhow::bail!(
            "GitHub owner and repo are required to {} (set [github] in patchbot.toml or pass --owner/--repo)",
            purpose
        );
    };
    let token = std::env::var(&merged.token_env)
        .ok()
        .filter(|t| !t.trim().is_empty())
        .with_context(|| format!("{} must hold a GitHub token to {}", merged.token_env, purpose))?;

    let repo = GitHubRepo {
        api_url: merged.api_url.clone(),
        ..GitHubRepo::new(owner.as_str(), repo.as_str())
    };
    Ok((repo, token))
}

/// Pull request port for dry runs; the pipeline never calls it there.
struct NoPullRequests;

impl PullRequests for NoPullRequests {
    fn open_pull_request(&self, _request: &PullRequestRequest) -> anyhow::Result<PullRequestHandle> {
        anyhow::bail!("pull requests are disabled in dry-run mode")
    }
}

fn cmd_resolve(args: ResolveArgs) -> anyhow::Result<ExitCode> {
    let contents = fs::read_to_string(&args.advisory)
        .with_context(|| format!("read {}", args.advisory))?;
    let advisory = patchbot_alerts::parse_advisory(&contents)
        .with_context(|| format!("parse {}", args.advisory))?;

    let resolved = patchbot_domain::resolve_with_source(&advisory)
        .context("no safe version could be resolved from the advisory")?;
    info!(source = resolved.source.as_str(), "resolved safe version");
    println!("{}", resolved.version);
    Ok(ExitCode::SUCCESS)
}

fn cmd_patch(args: PatchArgs) -> anyhow::Result<ExitCode> {
    let outcome = patch_manifest(&args.repo_root, &args.manifest, &args.package, &args.version)?;
    let patch = match outcome {
        PatchOutcome::AlreadySafe { .. } => {
            info!(
                "{} already pins {} to {}",
                args.manifest, args.package, args.version
            );
            return Ok(ExitCode::SUCCESS);
        }
        PatchOutcome::Patched(patch) => patch,
    };

    if args.dry_run {
        print!("{}", render_diff(&patch));
    } else {
        write_patch(&args.repo_root, &patch)?;
        info!("{}", patch.edit.describe());
    }
    Ok(ExitCode::SUCCESS)
}

fn tool_info() -> ToolInfo {
    ToolInfo {
        name: "patchbot".to_string(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    }
}
