//! Scenario registry

use crate::builtin;
use crate::error::CatalogError;
use crate::template;
use crashsim_model::{ScenarioDefinition, ScenarioKind};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::sync::Arc;

static BUILTIN: Lazy<ScenarioCatalog> = Lazy::new(|| {
    ScenarioCatalog::from_definitions(builtin::definitions())
        .unwrap_or_else(|e| panic!("built-in scenario table is malformed: {e}"))
});

/// Read-only registry of scenario definitions
///
/// Every definition is validated on insertion, so anything reachable through
/// the catalog can be rendered without further checks. Cloning is cheap;
/// definitions are shared.
#[derive(Debug, Clone)]
pub struct ScenarioCatalog {
    scenarios: BTreeMap<ScenarioKind, Arc<ScenarioDefinition>>,
}

impl ScenarioCatalog {
    /// The built-in catalog
    ///
    /// # Panics
    /// On first access, if a built-in template is malformed.
    #[must_use]
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    /// Build a catalog from explicit definitions
    ///
    /// # Errors
    /// [`CatalogError::Template`] for a malformed definition,
    /// [`CatalogError::DuplicateScenario`] if a kind appears twice.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = ScenarioDefinition>,
    ) -> Result<Self, CatalogError> {
        let mut scenarios = BTreeMap::new();
        for def in definitions {
            template::validate(&def)?;
            let kind = def.name;
            if scenarios.insert(kind, Arc::new(def)).is_some() {
                return Err(CatalogError::DuplicateScenario(kind));
            }
        }
        tracing::debug!(count = scenarios.len(), "scenario catalog ready");
        Ok(Self { scenarios })
    }

    /// Look up a scenario by its external name
    ///
    /// # Errors
    /// [`CatalogError::UnknownScenario`] if the name is not registered.
    pub fn resolve(&self, name: &str) -> Result<Arc<ScenarioDefinition>, CatalogError> {
        name.parse::<ScenarioKind>()
            .ok()
            .and_then(|kind| self.get(kind))
            .ok_or_else(|| CatalogError::UnknownScenario(name.to_string()))
    }

    #[must_use]
    pub fn get(&self, kind: ScenarioKind) -> Option<Arc<ScenarioDefinition>> {
        self.scenarios.get(&kind).cloned()
    }

    /// Registered scenarios in catalog order
    pub fn iter(&self) -> impl Iterator<Item = &ScenarioDefinition> {
        self.scenarios.values().map(AsRef::as_ref)
    }

    pub fn kinds(&self) -> impl Iterator<Item = ScenarioKind> + '_ {
        self.scenarios.keys().copied()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TemplateError;
    use crashsim_model::{LineTemplate, LogLevel, Severity};

    #[test]
    fn builtin_has_six_scenarios() {
        let catalog = ScenarioCatalog::builtin();
        assert_eq!(catalog.len(), 6);
        assert_eq!(catalog.kinds().collect::<Vec<_>>(), ScenarioKind::ALL.to_vec());
    }

    #[test]
    fn resolve_returns_catalog_metadata() {
        let catalog = ScenarioCatalog::builtin();
        let def = catalog.resolve("paystack_timeout").unwrap();
        assert_eq!(def.severity, Severity::Critical);
        assert_eq!(def.component, "PAYMENT_SERVICE");
        assert_eq!(def.error_type, "httpx.ConnectTimeout");
    }

    #[test]
    fn unknown_name_is_rejected() {
        let catalog = ScenarioCatalog::builtin();
        let err = catalog.resolve("meteor_strike").unwrap_err();
        assert!(matches!(err, CatalogError::UnknownScenario(ref n) if n == "meteor_strike"));
        // names are exact
        assert!(catalog.resolve("PAYSTACK_TIMEOUT").is_err());
    }

    #[test]
    fn duplicates_are_rejected() {
        let def = ScenarioCatalog::builtin()
            .get(ScenarioKind::TaskqOversell)
            .unwrap();
        let err = ScenarioCatalog::from_definitions([(*def).clone(), (*def).clone()]).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateScenario(ScenarioKind::TaskqOversell)));
    }

    #[test]
    fn malformed_definition_never_enters_catalog() {
        let mut def = (*ScenarioCatalog::builtin()
            .get(ScenarioKind::StripeSignatureError)
            .unwrap())
        .clone();
        def.log_template
            .push(LineTemplate::new("PAYMENTS", LogLevel::Info, "webhook id={event_id}"));
        let err = ScenarioCatalog::from_definitions([def]).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Template(TemplateError::UnboundPlaceholder { ref name, .. }) if name == "event_id"
        ));
    }

    #[test]
    fn partial_catalog_only_resolves_its_own() {
        let def = ScenarioCatalog::builtin()
            .get(ScenarioKind::DbStartupFailure)
            .unwrap();
        let catalog = ScenarioCatalog::from_definitions([(*def).clone()]).unwrap();
        assert!(catalog.resolve("db_startup_failure").is_ok());
        assert!(catalog.resolve("paystack_timeout").is_err());
    }
}
