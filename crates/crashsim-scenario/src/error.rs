//! Error types for the scenario catalog
//!
//! Template errors are programming errors in a scenario table. They are
//! reported when the catalog is constructed, never while a run is generating.

use crashsim_model::ScenarioKind;

/// Catalog lookup and construction errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Name is not in the registry
    #[error("unknown scenario: '{0}'")]
    UnknownScenario(String),

    /// The same scenario was registered twice
    #[error("duplicate scenario definition: {0}")]
    DuplicateScenario(ScenarioKind),

    /// A scenario failed template validation
    #[error("invalid scenario template: {0}")]
    Template(#[from] TemplateError),
}

/// Malformed scenario template
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("{scenario}: log template is empty")]
    EmptyLogTemplate { scenario: ScenarioKind },

    #[error("{scenario}: stack trace template is empty")]
    EmptyStackTrace { scenario: ScenarioKind },

    #[error("{scenario}: line {line} uses unbound placeholder '{{{name}}}'")]
    UnboundPlaceholder {
        scenario: ScenarioKind,
        line: usize,
        name: String,
    },

    #[error("{scenario}: line {line} has an invalid service name '{service}'")]
    InvalidService {
        scenario: ScenarioKind,
        line: usize,
        service: String,
    },

    #[error("{scenario}: stack trace never raises '{error_type}'")]
    ErrorTypeMismatch {
        scenario: ScenarioKind,
        error_type: String,
    },
}
