//! Deterministic safe-version resolution for patchbot.
//!
//! Advisory feeds are inconsistent about which version signals they populate, so
//! [`resolve`] walks a fixed precedence chain and returns the first hit. The free-text
//! range heuristic is kept in [`range`] so it can be swapped for a real range evaluator.

pub mod range;
mod resolver;

pub use resolver::{ResolvedVersion, VersionSource, resolve, resolve_with_source};
