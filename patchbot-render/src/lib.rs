//! Rendering helpers for everything patchbot hands to git, the PR client, and humans.
//!
//! All output is a pure function of its inputs so the same alert always produces the
//! same branch, commit, and pull request text.

use patchbot_types::alert::Advisory;
use patchbot_types::manifest::ManifestEdit;
use patchbot_types::report::{AlertStatus, RunReport};

/// Branch for one bump: `<prefix><package>-<version>`, reduced to ref-safe characters.
pub fn branch_name(prefix: &str, package: &str, version: &str) -> String {
    format!("{}{}-{}", prefix, ref_safe(package), ref_safe(version))
}

fn ref_safe(s: &str) -> String {
    let mapped: String = s
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = mapped.trim_matches(|c| c == '-' || c == '.');
    let mut out = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        // git rejects ".." anywhere in a ref name.
        if c == '.' && out.ends_with('.') {
            continue;
        }
        out.push(c);
    }
    if out.is_empty() { "_".to_string() } else { out }
}

pub fn commit_message(edit: &ManifestEdit) -> String {
    format!(
        "chore: bump {} to {}\n\n{}\n",
        edit.package_name,
        edit.new_version,
        edit.describe()
    )
}

pub fn pr_title(package: &str, version: &str) -> String {
    format!("chore: bump {} to {}", package, version)
}

/// Pull request body. `diff` is embedded verbatim when non-empty.
pub fn pr_body(edit: &ManifestEdit, advisory: &Advisory, version_source: &str, diff: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Bumps `{}` to `{}` in `{}` to remediate a security advisory.\n\n",
        edit.package_name, edit.new_version, edit.manifest_path
    ));

    out.push_str("## Advisory\n\n");
    match (advisory.display_id(), advisory.html_url.as_deref()) {
        (Some(id), Some(url)) => out.push_str(&format!("- Id: [{}]({})\n", id, url)),
        (Some(id), None) => out.push_str(&format!("- Id: {}\n", id)),
        (None, _) => out.push_str("- Id: -\n"),
    }
    if let Some(severity) = &advisory.severity {
        out.push_str(&format!("- Severity: {}\n", severity));
    }
    if let Some(summary) = &advisory.summary {
        out.push_str(&format!("- Summary: {}\n", summary));
    }
    out.push_str(&format!("- Safe version source: `{}`\n\n", version_source));

    out.push_str("## Change\n\n");
    for (prev, loc) in edit.previous.iter().zip(&edit.locations) {
        out.push_str(&format!(
            "- {}: `{}` → `{}`\n",
            loc, prev, edit.new_version
        ));
    }
    if !diff.is_empty() {
        out.push_str("\n```diff\n");
        out.push_str(diff);
        if !diff.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("```\n");
    }

    out.push_str(
        "\n_The safe version is taken from the advisory as-is; check it against your other constraints before merging._\n",
    );
    out
}

pub fn render_run_md(report: &RunReport) -> String {
    let mut out = String::new();
    out.push_str("# patchbot run\n\n");
    if let Some(repo) = &report.run.repo {
        out.push_str(&format!("- Repository: `{}`\n", repo));
    }
    out.push_str(&format!("- Run: `{}`\n", report.run.run_id));
    if report.run.dry_run {
        out.push_str("- Mode: dry-run\n");
    }
    let s = &report.summary;
    out.push_str(&format!(
        "- Alerts: {}\n- Patched: {}\n- Dry-run: {}\n- Already safe: {}\n- Skipped: {}\n- Failed: {}\n\n",
        s.alerts, s.patched, s.dry_run, s.already_safe, s.skipped, s.failed
    ));

    out.push_str("## Results\n\n");
    if report.results.is_empty() {
        out.push_str("_No open alerts._\n");
        return out;
    }

    for (i, r) in report.results.iter().enumerate() {
        out.push_str(&format!(
            "### {}. {} (`{}`)\n\n",
            i + 1,
            r.package,
            r.manifest_path
        ));
        out.push_str(&format!("- Status: `{}`\n", status_label(r.status)));
        if let Some(v) = &r.safe_version {
            out.push_str(&format!("- Safe version: `{}`\n", v));
        }
        if let Some(token) = &r.reason_token {
            out.push_str(&format!("- Reason: `{}`\n", token));
        }
        if let Some(msg) = &r.message {
            out.push_str(&format!("- Message: {}\n", msg));
        }
        if let Some(branch) = &r.branch {
            out.push_str(&format!("- Branch: `{}`\n", branch));
        }
        if let Some(pr) = &r.pull_request {
            out.push_str(&format!("- Pull request: {}\n", pr));
        }
        out.push('\n');
    }

    out
}

fn status_label(s: AlertStatus) -> &'static str {
    match s {
        AlertStatus::Patched => "patched",
        AlertStatus::DryRun => "dry_run",
        AlertStatus::AlreadySafe => "already_safe",
        AlertStatus::Skipped => "skipped",
        AlertStatus::Failed => "failed",
    }
}
