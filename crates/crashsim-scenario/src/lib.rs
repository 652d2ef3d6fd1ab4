//! Scenario catalog and log synthesis
//!
//! - [`ScenarioCatalog`]: validated, read-only registry of failure scenarios
//! - [`LogSynthesizer`]: renders a scenario into a timestamped crash log
//!
//! Randomness is always injected. Pass a seeded `StdRng` to get the same
//! bytes for the same inputs.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod builtin;
mod catalog;
mod error;
mod filler;
mod synth;
pub mod template;

pub use builtin::DEFAULT_MIN_LOGS;
pub use catalog::ScenarioCatalog;
pub use error::{CatalogError, TemplateError};
pub use filler::{Filler, FillerLine};
pub use synth::{LogSynthesizer, SynthesisConfig, DEFAULT_JITTER_MS, DEFAULT_STEP_MS};
