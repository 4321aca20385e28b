//! The batch pipeline: walk the alert feed in order and turn each alert into a pull request.
//!
//! All collaborators are reached through the port traits. Per-alert problems are logged,
//! recorded in the report, and never stop the batch.

use crate::ports::{
    AlertFeed, PullRequestHandle, PullRequestRequest, PullRequests, VersionControl, WritePort,
};
use crate::settings::RunSettings;
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use patchbot_domain::{ResolvedVersion, resolve_with_source};
use patchbot_edit::{
    ManifestPatch, PatchError, PatchOutcome, file_change, patch_contents, patch_manifest,
    render_diff, revert_patch, write_patch,
};
use patchbot_render::{branch_name, commit_message, pr_body, pr_title, render_run_md};
use patchbot_types::alert::Alert;
use patchbot_types::manifest::Dialect;
use patchbot_types::report::{AlertResult, AlertStatus, RunReport, ToolInfo};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, info, warn};

/// Errors that stop the whole batch. Exit code 1.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("alert feed unavailable: {0:#}")]
    Feed(anyhow::Error),
    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

/// Why a single alert did not end in a pull request.
#[derive(Debug, thiserror::Error)]
pub enum AlertFailure {
    #[error("no safe version could be resolved from the advisory")]
    VersionNotResolvable,

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("version control failed: {0:#}")]
    VersionControl(anyhow::Error),

    #[error("pull request creation failed: {0:#}")]
    PullRequest(anyhow::Error),
}

impl AlertFailure {
    pub fn token(&self) -> &'static str {
        match self {
            AlertFailure::VersionNotResolvable => "version_not_resolvable",
            AlertFailure::Patch(err) => err.token(),
            AlertFailure::VersionControl(_) => "version_control_failure",
            AlertFailure::PullRequest(_) => "pull_request_failure",
        }
    }

    /// `Skipped` when the alert or manifest rules the bump out, `Failed` otherwise.
    pub fn status(&self) -> AlertStatus {
        match self {
            AlertFailure::VersionNotResolvable => AlertStatus::Skipped,
            AlertFailure::Patch(err) if err.is_manifest_problem() => AlertStatus::Skipped,
            _ => AlertStatus::Failed,
        }
    }
}

/// Outcome of [`run_batch`].
pub struct BatchOutcome {
    pub report: RunReport,
    /// Concatenated diffs of every computed edit.
    pub patch: String,
    /// The feed returned no open alerts.
    pub feed_empty: bool,
}

impl BatchOutcome {
    pub fn has_failures(&self) -> bool {
        self.report.summary.failed > 0
    }
}

/// Run one batch over the open alerts.
pub fn run_batch(
    settings: &RunSettings,
    feed: &dyn AlertFeed,
    vcs: &dyn VersionControl,
    prs: &dyn PullRequests,
    tool: ToolInfo,
) -> Result<BatchOutcome, ToolError> {
    let alerts = feed.fetch_open_alerts().map_err(ToolError::Feed)?;
    let mut report = RunReport::new(tool, settings.repo_slug.clone(), settings.dry_run);

    if alerts.is_empty() {
        info!("no open alerts");
        report.finish();
        return Ok(BatchOutcome {
            report,
            patch: String::new(),
            feed_empty: true,
        });
    }

    info!(count = alerts.len(), dry_run = settings.dry_run, "processing alerts");

    if !settings.dry_run {
        vcs.configure_identity(&settings.committer)
            .context("configure committer identity")?;
    }

    let mut batch = Batch::new(settings, vcs, prs);

    for alert in &alerts {
        let mut result = AlertResult::new(
            &alert.package_name,
            alert.manifest_path.as_str(),
            AlertStatus::Skipped,
        );
        result.alert_number = alert.number;

        match batch.process(alert, &mut result) {
            Ok(status) => result.status = status,
            Err(failure) => {
                warn!(
                    package = %alert.package_name,
                    manifest = %alert.manifest_path,
                    reason = failure.token(),
                    "{failure}"
                );
                result.status = failure.status();
                result.reason_token = Some(failure.token().to_string());
                result.message = Some(failure.to_string());
            }
        }
        report.record(result);
    }

    report.finish();
    let s = &report.summary;
    info!(
        patched = s.patched,
        dry_run = s.dry_run,
        already_safe = s.already_safe,
        skipped = s.skipped,
        failed = s.failed,
        "batch finished"
    );

    Ok(BatchOutcome {
        report,
        patch: batch.patch,
        feed_empty: false,
    })
}

struct Batch<'a> {
    settings: &'a RunSettings,
    vcs: &'a dyn VersionControl,
    prs: &'a dyn PullRequests,
    /// Branches created so far in this run.
    branches: BTreeSet<String>,
    /// Pull requests opened so far in this run, by head branch.
    pulls: BTreeMap<String, PullRequestHandle>,
    /// Dry-run view of manifests edited earlier in the batch, per branch.
    overlay: BTreeMap<(String, Utf8PathBuf), String>,
    patch: String,
}

impl<'a> Batch<'a> {
    fn new(
        settings: &'a RunSettings,
        vcs: &'a dyn VersionControl,
        prs: &'a dyn PullRequests,
    ) -> Self {
        Self {
            settings,
            vcs,
            prs,
            branches: BTreeSet::new(),
            pulls: BTreeMap::new(),
            overlay: BTreeMap::new(),
            patch: String::new(),
        }
    }

    /// Drive one alert through resolve, patch, and publish, filling `result` as it goes.
    ///
    /// Every alert works on its own branch: a branch first seen in this run starts from
    /// the base branch, a repeated one continues where the earlier alert left it.
    fn process(
        &mut self,
        alert: &Alert,
        result: &mut AlertResult,
    ) -> Result<AlertStatus, AlertFailure> {
        let ResolvedVersion { version, source } =
            resolve_with_source(&alert.advisory).ok_or(AlertFailure::VersionNotResolvable)?;
        debug!(package = %alert.package_name, version = %version, source = source.as_str(), "resolved");
        result.safe_version = Some(version.clone());

        let branch = branch_name(&self.settings.branch_prefix, &alert.package_name, &version);
        if !self.settings.dry_run {
            self.switch_to(&branch)?;
        }

        let computed = self.compute(&branch, &alert.manifest_path, &alert.package_name, &version)?;
        let patch = match computed {
            PatchOutcome::AlreadySafe { .. } => {
                info!(
                    package = %alert.package_name,
                    manifest = %alert.manifest_path,
                    version = %version,
                    "already pinned to safe version"
                );
                result.reason_token = Some("already_safe".to_string());
                return Ok(AlertStatus::AlreadySafe);
            }
            PatchOutcome::Patched(patch) => patch,
        };

        let diff = render_diff(&patch);
        self.patch.push_str(&diff);
        result.file = Some(file_change(&patch));

        if self.settings.dry_run {
            info!(edit = %patch.edit.describe(), "dry-run: edit computed");
            self.overlay.insert(
                (branch, patch.edit.manifest_path.clone()),
                patch.after.clone(),
            );
            return Ok(AlertStatus::DryRun);
        }

        result.branch = Some(branch.clone());
        if !self.branches.contains(&branch) {
            self.vcs
                .create_branch(&branch, &self.settings.base_branch)
                .map_err(AlertFailure::VersionControl)?;
            self.branches.insert(branch.clone());
        }
        self.commit(&patch)?;

        self.vcs
            .push(&branch)
            .map_err(AlertFailure::VersionControl)?;

        if let Some(handle) = self.pulls.get(&branch) {
            info!(
                package = %alert.package_name,
                branch = %branch,
                pull_request = %handle.display(),
                "pushed to open pull request"
            );
            result.pull_request = Some(handle.display());
            return Ok(AlertStatus::Patched);
        }

        let request = PullRequestRequest {
            title: pr_title(&alert.package_name, &version),
            body: pr_body(&patch.edit, &alert.advisory, source.as_str(), &diff),
            head: branch.clone(),
            base: self.settings.base_branch.clone(),
        };
        let handle = self
            .prs
            .open_pull_request(&request)
            .map_err(AlertFailure::PullRequest)?;

        info!(
            package = %alert.package_name,
            branch = %branch,
            pull_request = %handle.display(),
            "opened pull request"
        );
        result.pull_request = Some(handle.display());
        self.pulls.insert(branch, handle);
        Ok(AlertStatus::Patched)
    }

    /// Check out `branch` when this run already created it, the base branch otherwise.
    fn switch_to(&self, branch: &str) -> Result<(), AlertFailure> {
        let target = if self.branches.contains(branch) {
            branch
        } else {
            self.settings.base_branch.as_str()
        };
        self.vcs
            .checkout(target)
            .map_err(AlertFailure::VersionControl)
    }

    fn compute(
        &self,
        branch: &str,
        manifest: &Utf8Path,
        package: &str,
        version: &str,
    ) -> Result<PatchOutcome, PatchError> {
        let key = (branch.to_string(), manifest.to_path_buf());
        match self.overlay.get(&key) {
            Some(contents) => {
                let dialect =
                    Dialect::from_path(manifest).ok_or_else(|| PatchError::UnknownDialect {
                        path: manifest.to_path_buf(),
                    })?;
                patch_contents(dialect, manifest, contents, package, version)
            }
            None => patch_manifest(&self.settings.repo_root, manifest, package, version),
        }
    }

    /// Write the edit and commit it on the checked-out branch. A failed commit leaves
    /// the manifest as it was.
    fn commit(&self, patch: &ManifestPatch) -> Result<(), AlertFailure> {
        let path = patch.edit.manifest_path.as_path();
        write_patch(&self.settings.repo_root, patch).map_err(PatchError::Runtime)?;

        let committed = self
            .vcs
            .stage(path)
            .and_then(|()| self.vcs.commit(&commit_message(&patch.edit)));

        if let Err(err) = committed {
            if let Err(restore_err) = self.vcs.restore(path) {
                debug!(error = %restore_err, "git restore failed; rewriting original contents");
                if let Err(revert_err) = revert_patch(&self.settings.repo_root, patch) {
                    error!(
                        manifest = %path,
                        error = %format!("{revert_err:#}"),
                        "could not restore manifest after failed commit"
                    );
                }
            }
            return Err(AlertFailure::VersionControl(err));
        }
        Ok(())
    }
}

/// Write `report.json`, `report.md`, and `patch.diff` into `out_dir`.
pub fn write_run_artifacts(
    outcome: &BatchOutcome,
    out_dir: &Utf8Path,
    writer: &dyn WritePort,
) -> anyhow::Result<()> {
    writer.create_dir_all(out_dir)?;

    let report_json =
        serde_json::to_string_pretty(&outcome.report).context("serialize report")?;
    writer.write_file(&out_dir.join("report.json"), report_json.as_bytes())?;

    let report_md = render_run_md(&outcome.report);
    writer.write_file(&out_dir.join("report.md"), report_md.as_bytes())?;

    writer.write_file(&out_dir.join("patch.diff"), outcome.patch.as_bytes())?;
    Ok(())
}
