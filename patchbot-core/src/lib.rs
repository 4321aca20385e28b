//! Embeddable core library for patchbot.
//!
//! Provides a clap-free, I/O-abstracted batch entry point that turns open
//! Dependabot alerts into one pull request each.
//!
//! # Port traits
//!
//! All I/O is abstracted behind port traits in [`ports`]:
//! - [`AlertFeed`](ports::AlertFeed): fetch open alerts
//! - [`VersionControl`](ports::VersionControl): branch, commit, push, restore
//! - [`PullRequests`](ports::PullRequests): open a pull request
//! - [`WritePort`](ports::WritePort): write run artifacts
//!
//! The [`adapters`] module provides GitHub, git, and filesystem implementations.
//!
//! # Entry points
//!
//! - [`run_batch`](pipeline::run_batch): process every open alert in order
//! - [`write_run_artifacts`](pipeline::write_run_artifacts): persist the run report

pub mod adapters;
pub mod pipeline;
pub mod ports;
pub mod settings;

// Re-exported so embedders don't need the leaf crates directly.
pub use patchbot_alerts::AlertLoadError;
pub use patchbot_edit::PatchError;
