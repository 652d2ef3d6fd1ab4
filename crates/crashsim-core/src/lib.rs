//! crashsim core
//!
//! Ties the pipeline together:
//!
//! ```text
//! ScenarioCatalog → LogSynthesizer → ArtifactStore → CrashRecorder → NotificationDispatcher
//! ```
//!
//! [`SimulatorConfig`] is read once at startup and builds the components;
//! [`SimulationOrchestrator`] runs each simulation through the
//! [`RunState`] machine and returns a [`SimulationResult`].
//!
//! # Example
//!
//! ```rust,ignore
//! use crashsim_core::{RunOptions, SimulationOrchestrator, SimulatorConfig};
//!
//! let config = SimulatorConfig::from_env();
//! let orchestrator = SimulationOrchestrator::from_config(&config)?;
//! let result = orchestrator
//!     .run("paystack_timeout", &RunOptions::default().with_min_logs(5))
//!     .await?;
//! println!("{}", result.summary());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod config;
mod error;
mod orchestrator;
mod result;
mod shutdown;
pub mod state;

pub use config::{
    BackendStatus, SimulatorConfig, DEFAULT_BUCKET, DEFAULT_DATA_DIR, DEFAULT_LOCAL_DIR,
    DEFAULT_REGION, DEFAULT_TABLE, PARTITION_KEY,
};
pub use error::{ConfigError, RunError, SimulationError};
pub use orchestrator::{Console, RunOptions, SimulationOrchestrator, DEFAULT_USERS_IMPACTED};
pub use result::{RunSummary, SimulationResult};
pub use shutdown::Shutdown;
pub use state::{RunState, RunTracker};
