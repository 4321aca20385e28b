//! Shared DTOs (schemas-as-code) for the patchbot workspace.
//!
//! # Design constraints
//! - Alerts are read from an external feed; be tolerant when deserializing.
//! - Reports are written to disk; prefer adding optional fields over changing semantics.

pub mod alert;
pub mod manifest;
pub mod report;

/// Schema identifiers.
pub mod schema {
    pub const PATCHBOT_RUN_V1: &str = "patchbot.run.v1";
}
