use crate::wire::{AdvisoryWire, AlertWire, Rejected, VulnerabilityWire};
use anyhow::Context;
use camino::Utf8Path;
use fs_err as fs;
use patchbot_types::alert::{Advisory, Alert};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AlertLoadError {
    #[error("json parse error: {message}")]
    Json { message: String },

    /// The feed answered with an object instead of a list, usually an API error body.
    #[error("feed returned an error object: {message}")]
    FeedError { message: String },

    #[error("expected a JSON array of alerts, got {found}")]
    NotAList { found: String },

    #[error("expected a JSON object, got {found}")]
    NotAnObject { found: String },
}

/// Parse a Dependabot alerts payload (a JSON array) into alerts, in feed order.
///
/// Records that are not open, or that lack a package name or manifest path, are dropped.
pub fn parse_alerts(json: &str) -> Result<Vec<Alert>, AlertLoadError> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| AlertLoadError::Json {
            message: e.to_string(),
        })?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(obj) => {
            let message = obj
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error")
                .to_string();
            return Err(AlertLoadError::FeedError { message });
        }
        other => {
            return Err(AlertLoadError::NotAList {
                found: json_kind(&other).to_string(),
            });
        }
    };

    let mut out = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        let wire: AlertWire = match serde_json::from_value(item) {
            Ok(w) => w,
            Err(e) => {
                warn!(index = idx, error = %e, "skipping malformed alert record");
                continue;
            }
        };
        let number = wire.number;
        match wire.into_alert() {
            Ok(alert) => out.push(alert),
            Err(Rejected::NotOpen) => {
                debug!(index = idx, ?number, "skipping alert that is not open");
            }
            Err(reason) => {
                warn!(index = idx, ?number, ?reason, "skipping incomplete alert record");
            }
        }
    }

    debug!(count = out.len(), "parsed alerts");
    Ok(out)
}

/// Parse a single advisory: either a bare `security_advisory` object or a whole alert
/// record carrying one.
pub fn parse_advisory(json: &str) -> Result<Advisory, AlertLoadError> {
    let value: serde_json::Value = serde_json::from_str(json).map_err(json_error)?;

    let mut obj = match value {
        serde_json::Value::Object(obj) => obj,
        other => {
            return Err(AlertLoadError::NotAnObject {
                found: json_kind(&other).to_string(),
            });
        }
    };

    // A whole alert record: the advisory is nested and the alert-level vulnerability
    // fills its gaps, as in `parse_alerts`.
    let (advisory, vulnerability) = match obj.remove("security_advisory") {
        Some(nested) => (nested, obj.remove("security_vulnerability")),
        None => (serde_json::Value::Object(obj), None),
    };

    let wire: AdvisoryWire = if advisory.is_null() {
        AdvisoryWire::default()
    } else {
        serde_json::from_value(advisory).map_err(json_error)?
    };
    let mut advisory = Advisory::from(wire);
    if let Some(vulnerability) = vulnerability.filter(|v| !v.is_null()) {
        let vulnerability: VulnerabilityWire =
            serde_json::from_value(vulnerability).map_err(json_error)?;
        vulnerability.fill_gaps(&mut advisory);
    }
    Ok(advisory)
}

fn json_error(e: serde_json::Error) -> AlertLoadError {
    AlertLoadError::Json {
        message: e.to_string(),
    }
}

/// Load alerts from a saved feed payload on disk.
pub fn load_alerts(path: &Utf8Path) -> anyhow::Result<Vec<Alert>> {
    let contents = fs::read_to_string(path).with_context(|| format!("read alerts {}", path))?;
    parse_alerts(&contents).with_context(|| format!("parse alerts {}", path))
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
