//! Batch pipeline tests with recording fakes for git and the pull request client.

use camino::{Utf8Path, Utf8PathBuf};
use patchbot_core::adapters::{FsWritePort, InMemoryAlertFeed, ShellGit};
use patchbot_core::pipeline::{BatchOutcome, ToolError, run_batch, write_run_artifacts};
use patchbot_core::ports::{
    AlertFeed, CommitterIdentity, PullRequestHandle, PullRequestRequest, PullRequests,
    VersionControl,
};
use patchbot_core::settings::RunSettings;
use patchbot_types::alert::{Advisory, Alert, VulnerabilityEntry};
use patchbot_types::report::{AlertStatus, ToolInfo};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::process::Command;
use tempfile::TempDir;

#[derive(Default)]
struct RecordingGit {
    calls: RefCell<Vec<String>>,
    fail_commit_on: Option<String>,
    /// Directory removed when a commit fails, so the manifest cannot be written back.
    remove_on_failure: Option<Utf8PathBuf>,
}

impl RecordingGit {
    fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }
}

impl VersionControl for RecordingGit {
    fn configure_identity(&self, identity: &CommitterIdentity) -> anyhow::Result<()> {
        self.record(format!("identity {} <{}>", identity.name, identity.email));
        Ok(())
    }

    fn create_branch(&self, name: &str, base: &str) -> anyhow::Result<()> {
        self.record(format!("branch {name} from {base}"));
        Ok(())
    }

    fn checkout(&self, name: &str) -> anyhow::Result<()> {
        self.record(format!("checkout {name}"));
        Ok(())
    }

    fn stage(&self, path: &Utf8Path) -> anyhow::Result<()> {
        self.record(format!("stage {path}"));
        Ok(())
    }

    fn commit(&self, message: &str) -> anyhow::Result<()> {
        let subject = message.lines().next().unwrap_or_default().to_string();
        self.record(format!("commit {subject}"));
        if self.fail_commit_on.as_deref() == Some(subject.as_str()) {
            if let Some(dir) = &self.remove_on_failure {
                std::fs::remove_dir_all(dir)?;
            }
            anyhow::bail!("pre-commit hook rejected the change");
        }
        Ok(())
    }

    fn push(&self, branch: &str) -> anyhow::Result<()> {
        self.record(format!("push {branch}"));
        Ok(())
    }

    fn restore(&self, path: &Utf8Path) -> anyhow::Result<()> {
        self.record(format!("restore {path}"));
        anyhow::bail!("restore unavailable in fake")
    }
}

#[derive(Default)]
struct RecordingPulls {
    opened: RefCell<Vec<PullRequestRequest>>,
    fail: bool,
}

impl PullRequests for RecordingPulls {
    fn open_pull_request(&self, request: &PullRequestRequest) -> anyhow::Result<PullRequestHandle> {
        if self.fail {
            anyhow::bail!("HTTP 422: A pull request already exists");
        }
        self.opened.borrow_mut().push(request.clone());
        let number = self.opened.borrow().len() as u64;
        Ok(PullRequestHandle {
            number: Some(number),
            url: Some(format!("https://github.com/octo/demo/pull/{number}")),
        })
    }
}

struct BrokenFeed;

impl AlertFeed for BrokenFeed {
    fn fetch_open_alerts(&self) -> anyhow::Result<Vec<Alert>> {
        anyhow::bail!("HTTP 401 Bad credentials")
    }
}

fn sandbox(files: &[(&str, &str)]) -> (TempDir, Utf8PathBuf) {
    let temp = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
    for (path, contents) in files {
        std::fs::write(root.join(path), contents).expect("write fixture");
    }
    (temp, root)
}

fn settings(root: &Utf8Path, dry_run: bool) -> RunSettings {
    RunSettings {
        repo_root: root.to_path_buf(),
        out_dir: root.join("artifacts"),
        repo_slug: Some("octo/demo".to_string()),
        dry_run,
        ..RunSettings::default()
    }
}

fn tool() -> ToolInfo {
    ToolInfo {
        name: "patchbot".to_string(),
        version: Some("0.1.0".to_string()),
    }
}

fn alert(package: &str, manifest: &str, advisory: Advisory) -> Alert {
    Alert {
        number: None,
        state: Some("open".to_string()),
        package_name: package.to_string(),
        ecosystem: None,
        manifest_path: Utf8PathBuf::from(manifest),
        advisory,
    }
}

fn patched_in(version: &str) -> Advisory {
    Advisory {
        vulnerabilities: vec![VulnerabilityEntry {
            first_patched_version: Some(version.to_string()),
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn run(
    settings: &RunSettings,
    alerts: Vec<Alert>,
    git: &dyn VersionControl,
    pulls: &RecordingPulls,
) -> BatchOutcome {
    run_batch(settings, &InMemoryAlertFeed::new(alerts), git, pulls, tool()).expect("batch")
}

fn statuses(outcome: &BatchOutcome) -> Vec<(String, AlertStatus)> {
    outcome
        .report
        .results
        .iter()
        .map(|r| (r.package.clone(), r.status))
        .collect()
}

#[test]
fn unresolvable_alert_is_skipped_and_the_rest_are_processed() {
    let (_temp, root) = sandbox(&[
        ("requirements.txt", "requests==2.0.0\nflask==1.0.0\n"),
        (
            "package.json",
            "{\n  \"dependencies\": {\n    \"lodash\": \"^4.17.0\"\n  }\n}\n",
        ),
    ]);
    let alerts = vec![
        alert("flask", "requirements.txt", patched_in("2.1.3")),
        alert("requests", "requirements.txt", Advisory::default()),
        alert(
            "lodash",
            "package.json",
            Advisory {
                vulnerable_versions: Some("< 4.17.21".to_string()),
                ..Default::default()
            },
        ),
    ];
    let git = RecordingGit::default();
    let pulls = RecordingPulls::default();

    let outcome = run(&settings(&root, false), alerts, &git, &pulls);

    assert_eq!(
        statuses(&outcome),
        vec![
            ("flask".to_string(), AlertStatus::Patched),
            ("requests".to_string(), AlertStatus::Skipped),
            ("lodash".to_string(), AlertStatus::Patched),
        ]
    );
    assert_eq!(
        outcome.report.results[1].reason_token.as_deref(),
        Some("version_not_resolvable")
    );
    assert_eq!(
        std::fs::read_to_string(root.join("requirements.txt")).unwrap(),
        "requests==2.0.0\nflask==2.1.3\n"
    );
    assert_eq!(
        std::fs::read_to_string(root.join("package.json")).unwrap(),
        "{\n  \"dependencies\": {\n    \"lodash\": \"4.17.21\"\n  }\n}\n"
    );

    assert_eq!(
        git.calls(),
        vec![
            "identity patchbot <patchbot@users.noreply.github.com>",
            "checkout main",
            "branch patchbot/flask-2.1.3 from main",
            "stage requirements.txt",
            "commit chore: bump flask to 2.1.3",
            "push patchbot/flask-2.1.3",
            "checkout main",
            "branch patchbot/lodash-4.17.21 from main",
            "stage package.json",
            "commit chore: bump lodash to 4.17.21",
            "push patchbot/lodash-4.17.21",
        ]
    );

    let opened = pulls.opened.borrow();
    assert_eq!(opened.len(), 2);
    assert_eq!(opened[0].title, "chore: bump flask to 2.1.3");
    assert_eq!(opened[0].head, "patchbot/flask-2.1.3");
    assert_eq!(opened[0].base, "main");
    assert!(opened[0].body.contains("+flask==2.1.3"));
    assert_eq!(
        outcome.report.results[2].pull_request.as_deref(),
        Some("https://github.com/octo/demo/pull/2")
    );
    assert_eq!(outcome.report.summary.patched, 2);
    assert_eq!(outcome.report.summary.skipped, 1);
    assert!(!outcome.has_failures());
}

#[test]
fn second_alert_on_same_manifest_is_already_safe() {
    let (_temp, root) = sandbox(&[("requirements.txt", "flask==1.0.0\n")]);
    let alerts = vec![
        alert("flask", "requirements.txt", patched_in("2.1.3")),
        alert(
            "flask",
            "requirements.txt",
            Advisory {
                first_patched_version: Some("2.1.3".to_string()),
                ..Default::default()
            },
        ),
    ];
    let git = RecordingGit::default();
    let pulls = RecordingPulls::default();

    let outcome = run(&settings(&root, false), alerts, &git, &pulls);

    assert_eq!(
        statuses(&outcome),
        vec![
            ("flask".to_string(), AlertStatus::Patched),
            ("flask".to_string(), AlertStatus::AlreadySafe),
        ]
    );
    assert_eq!(pulls.opened.borrow().len(), 1);
    assert_eq!(
        git.calls().iter().filter(|c| c.starts_with("commit")).count(),
        1
    );
    assert!(git.calls().contains(&"checkout patchbot/flask-2.1.3".to_string()));
}

#[test]
fn same_branch_in_another_manifest_reuses_branch_and_pull_request() {
    let (_temp, root) = sandbox(&[
        ("requirements.txt", "flask==1.0.0\n"),
        ("requirements-dev.txt", "flask==1.0.0\n"),
    ]);
    let alerts = vec![
        alert("flask", "requirements.txt", patched_in("2.1.3")),
        alert("flask", "requirements-dev.txt", patched_in("2.1.3")),
    ];
    let git = RecordingGit::default();
    let pulls = RecordingPulls::default();

    let outcome = run(&settings(&root, false), alerts, &git, &pulls);

    assert_eq!(
        statuses(&outcome),
        vec![
            ("flask".to_string(), AlertStatus::Patched),
            ("flask".to_string(), AlertStatus::Patched),
        ]
    );
    assert_eq!(
        git.calls(),
        vec![
            "identity patchbot <patchbot@users.noreply.github.com>",
            "checkout main",
            "branch patchbot/flask-2.1.3 from main",
            "stage requirements.txt",
            "commit chore: bump flask to 2.1.3",
            "push patchbot/flask-2.1.3",
            "checkout patchbot/flask-2.1.3",
            "stage requirements-dev.txt",
            "commit chore: bump flask to 2.1.3",
            "push patchbot/flask-2.1.3",
        ]
    );
    assert_eq!(pulls.opened.borrow().len(), 1);
    assert_eq!(
        outcome.report.results[1].pull_request,
        outcome.report.results[0].pull_request
    );
}

#[test]
fn commit_failure_restores_manifest_and_batch_continues() {
    let (_temp, root) = sandbox(&[("requirements.txt", "flask==1.0.0\njinja2==2.10\n")]);
    let alerts = vec![
        alert("flask", "requirements.txt", patched_in("2.1.3")),
        alert("jinja2", "requirements.txt", patched_in("2.11.3")),
    ];
    let git = RecordingGit {
        fail_commit_on: Some("chore: bump flask to 2.1.3".to_string()),
        ..Default::default()
    };
    let pulls = RecordingPulls::default();

    let outcome = run(&settings(&root, false), alerts, &git, &pulls);

    assert_eq!(
        statuses(&outcome),
        vec![
            ("flask".to_string(), AlertStatus::Failed),
            ("jinja2".to_string(), AlertStatus::Patched),
        ]
    );
    let failed = &outcome.report.results[0];
    assert_eq!(failed.reason_token.as_deref(), Some("version_control_failure"));
    assert_eq!(failed.branch.as_deref(), Some("patchbot/flask-2.1.3"));
    assert!(
        failed
            .message
            .as_deref()
            .unwrap()
            .contains("pre-commit hook rejected")
    );

    // flask reverted, jinja2 bumped on top of the original contents.
    assert_eq!(
        std::fs::read_to_string(root.join("requirements.txt")).unwrap(),
        "flask==1.0.0\njinja2==2.11.3\n"
    );
    assert!(git.calls().contains(&"restore requirements.txt".to_string()));
    assert!(!git.calls().contains(&"push patchbot/flask-2.1.3".to_string()));
    assert!(outcome.has_failures());
}

#[test]
fn unrestorable_manifest_still_reports_version_control_failure() {
    let (_temp, root) = sandbox(&[]);
    std::fs::create_dir_all(root.join("services/api")).unwrap();
    std::fs::write(root.join("services/api/requirements.txt"), "flask==1.0.0\n").unwrap();
    std::fs::write(root.join("requirements.txt"), "jinja2==2.10\n").unwrap();
    let alerts = vec![
        alert("flask", "services/api/requirements.txt", patched_in("2.1.3")),
        alert("jinja2", "requirements.txt", patched_in("2.11.3")),
    ];
    let git = RecordingGit {
        fail_commit_on: Some("chore: bump flask to 2.1.3".to_string()),
        remove_on_failure: Some(root.join("services")),
        ..Default::default()
    };
    let pulls = RecordingPulls::default();

    let outcome = run(&settings(&root, false), alerts, &git, &pulls);

    assert_eq!(
        statuses(&outcome),
        vec![
            ("flask".to_string(), AlertStatus::Failed),
            ("jinja2".to_string(), AlertStatus::Patched),
        ]
    );
    let failed = &outcome.report.results[0];
    assert_eq!(failed.reason_token.as_deref(), Some("version_control_failure"));
    assert!(
        failed
            .message
            .as_deref()
            .unwrap()
            .contains("pre-commit hook rejected")
    );
    assert!(!root.join("services").exists());
}

#[test]
fn pull_request_failure_is_recorded() {
    let (_temp, root) = sandbox(&[("requirements.txt", "flask==1.0.0\n")]);
    let git = RecordingGit::default();
    let pulls = RecordingPulls {
        fail: true,
        ..Default::default()
    };

    let outcome = run(
        &settings(&root, false),
        vec![alert("flask", "requirements.txt", patched_in("2.1.3"))],
        &git,
        &pulls,
    );

    let result = &outcome.report.results[0];
    assert_eq!(result.status, AlertStatus::Failed);
    assert_eq!(result.reason_token.as_deref(), Some("pull_request_failure"));
    assert!(git.calls().contains(&"push patchbot/flask-2.1.3".to_string()));
}

#[test]
fn manifest_problems_are_skipped_with_tokens() {
    let (_temp, root) = sandbox(&[
        ("requirements.txt", "django==3.2\n"),
        ("Pipfile", "[packages]\nflask = \"*\"\n"),
    ]);
    let alerts = vec![
        alert("flask", "services/api/requirements.txt", patched_in("2.1.3")),
        alert("flask", "Pipfile", patched_in("2.1.3")),
        alert("flask", "requirements.txt", patched_in("2.1.3")),
    ];
    let git = RecordingGit::default();
    let pulls = RecordingPulls::default();

    let outcome = run(&settings(&root, false), alerts, &git, &pulls);

    let tokens: Vec<_> = outcome
        .report
        .results
        .iter()
        .map(|r| (r.status, r.reason_token.clone().unwrap_or_default()))
        .collect();
    assert_eq!(
        tokens,
        vec![
            (AlertStatus::Skipped, "manifest_not_found".to_string()),
            (AlertStatus::Skipped, "unknown_dialect".to_string()),
            (AlertStatus::Skipped, "package_not_in_manifest".to_string()),
        ]
    );
    assert!(pulls.opened.borrow().is_empty());
    assert_eq!(
        git.calls(),
        vec![
            "identity patchbot <patchbot@users.noreply.github.com>",
            "checkout main",
            "checkout main",
            "checkout main",
        ]
    );
}

#[test]
fn dry_run_writes_nothing_and_calls_no_collaborator() {
    let original = "flask==1.0.0\n";
    let (_temp, root) = sandbox(&[("requirements.txt", original)]);
    let alerts = vec![
        alert("flask", "requirements.txt", patched_in("2.1.3")),
        alert("flask", "requirements.txt", patched_in("2.1.3")),
    ];
    let git = RecordingGit::default();
    let pulls = RecordingPulls::default();

    let outcome = run(&settings(&root, true), alerts, &git, &pulls);

    assert_eq!(
        statuses(&outcome),
        vec![
            ("flask".to_string(), AlertStatus::DryRun),
            ("flask".to_string(), AlertStatus::AlreadySafe),
        ]
    );
    assert_eq!(
        std::fs::read_to_string(root.join("requirements.txt")).unwrap(),
        original
    );
    assert!(git.calls().is_empty());
    assert!(pulls.opened.borrow().is_empty());
    assert!(outcome.patch.contains("-flask==1.0.0\n+flask==2.1.3"));
    assert!(outcome.report.results[0].file.is_some());
}

#[test]
fn empty_feed_is_a_successful_no_op() {
    let (_temp, root) = sandbox(&[]);
    let git = RecordingGit::default();
    let pulls = RecordingPulls::default();

    let outcome = run(&settings(&root, false), vec![], &git, &pulls);

    assert!(outcome.feed_empty);
    assert_eq!(outcome.report.summary.alerts, 0);
    assert!(outcome.report.run.ended_at.is_some());
    assert!(git.calls().is_empty());
}

#[test]
fn feed_failure_stops_the_batch() {
    let (_temp, root) = sandbox(&[]);
    let err = run_batch(
        &settings(&root, false),
        &BrokenFeed,
        &RecordingGit::default(),
        &RecordingPulls::default(),
        tool(),
    )
    .err()
    .expect("feed failure");
    assert!(matches!(err, ToolError::Feed(_)));
    assert!(err.to_string().contains("Bad credentials"));
}

#[test]
fn run_artifacts_are_written() {
    let (_temp, root) = sandbox(&[("requirements.txt", "flask==1.0.0\n")]);
    let settings = settings(&root, true);
    let outcome = run(
        &settings,
        vec![alert("flask", "requirements.txt", patched_in("2.1.3"))],
        &RecordingGit::default(),
        &RecordingPulls::default(),
    );

    write_run_artifacts(&outcome, &settings.out_dir, &FsWritePort).expect("write artifacts");

    let json = std::fs::read_to_string(settings.out_dir.join("report.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["schema"], "patchbot.run.v1");
    assert_eq!(value["run"]["repo"], "octo/demo");
    assert_eq!(value["summary"]["dry_run"], 1);
    assert_eq!(value["results"][0]["status"], "dry_run");
    assert_eq!(value["results"][0]["safe_version"], "2.1.3");

    let md = std::fs::read_to_string(settings.out_dir.join("report.md")).unwrap();
    assert!(md.contains("### 1. flask (`requirements.txt`)"));
    assert!(settings.out_dir.join("patch.diff").is_file());
}

fn git(root: &Utf8Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .expect("run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A work tree on `main` with a bare `origin` next to it.
fn git_sandbox(files: &[(&str, &str)]) -> (TempDir, Utf8PathBuf, Utf8PathBuf) {
    let temp = TempDir::new().expect("temp dir");
    let base = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
    let remote = base.join("origin.git");
    let root = base.join("work");
    std::fs::create_dir_all(&remote).expect("mkdir remote");
    std::fs::create_dir_all(&root).expect("mkdir work");
    git(&remote, &["init", "--bare", "-q"]);

    for (path, contents) in files {
        std::fs::write(root.join(path), contents).expect("write fixture");
    }
    git(&root, &["init", "-q"]);
    git(&root, &["config", "user.email", "test@example.com"]);
    git(&root, &["config", "user.name", "Test User"]);
    git(&root, &["add", "."]);
    git(&root, &["commit", "-q", "-m", "init"]);
    git(&root, &["branch", "-M", "main"]);
    git(&root, &["remote", "add", "origin", remote.as_str()]);
    (temp, root, remote)
}

#[test]
fn each_branch_carries_only_its_own_bump() {
    let (_temp, root, remote) = git_sandbox(&[
        ("requirements.txt", "click==8.0.0\nflask==1.0.0\n"),
        ("requirements-dev.txt", "flask==1.0.0\n"),
    ]);
    let alerts = vec![
        alert("flask", "requirements.txt", patched_in("2.1.3")),
        alert("click", "requirements.txt", patched_in("8.1.0")),
        alert("flask", "requirements-dev.txt", patched_in("2.1.3")),
    ];
    let vcs = ShellGit::new(root.clone(), "origin");
    let pulls = RecordingPulls::default();

    let outcome = run(&settings(&root, false), alerts, &vcs, &pulls);

    assert_eq!(
        statuses(&outcome),
        vec![
            ("flask".to_string(), AlertStatus::Patched),
            ("click".to_string(), AlertStatus::Patched),
            ("flask".to_string(), AlertStatus::Patched),
        ]
    );

    assert_eq!(
        git(&root, &["log", "--format=%s", "main..patchbot/click-8.1.0"]),
        "chore: bump click to 8.1.0"
    );
    assert_eq!(
        git(&root, &["show", "patchbot/click-8.1.0:requirements.txt"]),
        "click==8.1.0\nflask==1.0.0"
    );
    assert_eq!(
        git(&root, &["show", "patchbot/flask-2.1.3:requirements.txt"]),
        "click==8.0.0\nflask==2.1.3"
    );
    assert_eq!(
        git(&root, &["show", "patchbot/flask-2.1.3:requirements-dev.txt"]),
        "flask==2.1.3"
    );
    assert_eq!(
        git(&root, &["show", "main:requirements.txt"]),
        "click==8.0.0\nflask==1.0.0"
    );

    let opened = pulls.opened.borrow();
    assert_eq!(opened.len(), 2);
    assert_eq!(opened[0].head, "patchbot/flask-2.1.3");
    assert_eq!(opened[1].head, "patchbot/click-8.1.0");
    assert_eq!(
        outcome.report.results[2].pull_request,
        outcome.report.results[0].pull_request
    );

    let pushed = git(&remote, &["branch", "--format=%(refname:short)"]);
    assert!(pushed.lines().any(|b| b == "patchbot/flask-2.1.3"));
    assert!(pushed.lines().any(|b| b == "patchbot/click-8.1.0"));
    assert_eq!(
        git(&remote, &["rev-parse", "patchbot/flask-2.1.3"]),
        git(&root, &["rev-parse", "patchbot/flask-2.1.3"])
    );
}
