//! crashsim data model
//!
//! Types shared by every stage of a crash simulation run:
//!
//! - [`ScenarioDefinition`]: immutable catalog entry (templates + crash metadata)
//! - [`LogEntry`] / [`CrashArtifact`]: the synthesized log stream and its bytes
//! - [`ArtifactLocation`]: where the artifact ended up (remote or local disk)
//! - [`CrashRecord`]: the structured record written to the crash table
//!
//! # Example
//!
//! ```rust,ignore
//! use crashsim_model::{ArtifactKey, CrashId};
//!
//! let crash_id = CrashId::new();
//! let key = ArtifactKey::for_run(&crash_id);
//! assert!(key.as_str().ends_with(".log"));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod artifact;
mod ids;
mod location;
mod record;
mod scenario;

pub use artifact::{ArtifactDigest, CrashArtifact, LogEntry, LogFormat, TIMESTAMP_FORMAT};
pub use ids::{ArtifactKey, CrashId};
pub use location::{ArtifactLocation, StorageBackend};
pub use record::{CrashRecord, CrashStatus, ErrorDetails, NotificationResult};
pub use scenario::{
    LineTemplate, LogLevel, ParseEnumError, ScenarioContext, ScenarioDefinition, ScenarioKind,
    Severity,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
