//! Alert ingestion utilities.
//!
//! patchbot consumes alerts produced by an external scanner feed. It intentionally does not enforce
//! strict schema validation here: unknown fields are ignored, optional fields may be absent, and
//! records that cannot name a package or manifest are dropped with a log line instead of failing
//! the whole feed.

mod load;
mod wire;

pub use load::{AlertLoadError, load_alerts, parse_advisory, parse_alerts};
