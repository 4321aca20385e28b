use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Record of one batch run over the alert feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub schema: String,
    pub tool: ToolInfo,
    pub run: RunInfo,
    pub summary: RunSummary,

    #[serde(default)]
    pub results: Vec<AlertResult>,
}

impl RunReport {
    pub fn new(tool: ToolInfo, repo: Option<String>, dry_run: bool) -> Self {
        Self {
            schema: crate::schema::PATCHBOT_RUN_V1.to_string(),
            tool,
            run: RunInfo {
                run_id: Uuid::new_v4().to_string(),
                started_at: Some(Utc::now()),
                ended_at: None,
                repo,
                dry_run,
            },
            summary: RunSummary::default(),
            results: vec![],
        }
    }

    /// Append a result and bump the matching summary counter.
    pub fn record(&mut self, result: AlertResult) {
        self.summary.alerts += 1;
        match result.status {
            AlertStatus::Patched => self.summary.patched += 1,
            AlertStatus::DryRun => self.summary.dry_run += 1,
            AlertStatus::AlreadySafe => self.summary.already_safe += 1,
            AlertStatus::Skipped => self.summary.skipped += 1,
            AlertStatus::Failed => self.summary.failed += 1,
        }
        self.results.push(result);
    }

    pub fn finish(&mut self) {
        self.run.ended_at = Some(Utc::now());
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInfo {
    pub run_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    /// `owner/repo` when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,

    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub alerts: u64,
    pub patched: u64,
    pub dry_run: u64,
    pub already_safe: u64,
    pub skipped: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertResult {
    pub package: String,
    pub manifest_path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_number: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_version: Option<String>,

    pub status: AlertStatus,

    /// Stable snake_case token naming why the alert was skipped or failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileChange>,
}

impl AlertResult {
    pub fn new(package: &str, manifest_path: &str, status: AlertStatus) -> Self {
        Self {
            package: package.to_string(),
            manifest_path: manifest_path.to_string(),
            alert_number: None,
            safe_version: None,
            status,
            reason_token: None,
            message: None,
            branch: None,
            pull_request: None,
            file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    /// Committed, pushed, and a pull request was opened.
    Patched,
    /// The edit was computed but nothing was written.
    DryRun,
    AlreadySafe,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub sha256_before: String,
    pub sha256_after: String,
    pub bytes_before: u64,
    pub bytes_after: u64,
}
