//! Scenario definitions
//!
//! A scenario is a named failure pattern with the log lines that lead up to
//! it, the stack trace it ends in, and the crash metadata reported for it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Failed to parse one of the enumerated names in this module
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// The fixed set of failure scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    PaystackTimeout,
    MigrationTypeMismatch,
    TaskqOversell,
    VerifyPaymentTimeout,
    DbStartupFailure,
    StripeSignatureError,
}

impl ScenarioKind {
    /// Every scenario, in catalog order
    pub const ALL: [ScenarioKind; 6] = [
        ScenarioKind::PaystackTimeout,
        ScenarioKind::MigrationTypeMismatch,
        ScenarioKind::TaskqOversell,
        ScenarioKind::VerifyPaymentTimeout,
        ScenarioKind::DbStartupFailure,
        ScenarioKind::StripeSignatureError,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PaystackTimeout => "paystack_timeout",
            Self::MigrationTypeMismatch => "migration_type_mismatch",
            Self::TaskqOversell => "taskq_oversell",
            Self::VerifyPaymentTimeout => "verify_payment_timeout",
            Self::DbStartupFailure => "db_startup_failure",
            Self::StripeSignatureError => "stripe_signature_error",
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("scenario", s))
    }
}

/// Crash severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(ParseEnumError::new("severity", s)),
        }
    }
}

/// Level of a synthesized log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One templated log line: `{service} {level} {message}`
///
/// `message` may contain `{name}` placeholders bound by the scenario's
/// [`ScenarioContext`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineTemplate {
    pub service: String,
    pub level: LogLevel,
    pub message: String,
}

impl LineTemplate {
    #[inline]
    pub fn new(service: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            level,
            message: message.into(),
        }
    }
}

/// Ordered key/value bindings attached to a scenario
///
/// Used both to fill template placeholders and as the base fields of
/// structured (JSON) log lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioContext {
    entries: Vec<(String, String)>,
}

impl ScenarioContext {
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add or replace a binding
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Immutable catalog entry for one scenario
///
/// Severity, component and error type live here and only here; every other
/// component copies them out of the definition rather than deriving them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    pub name: ScenarioKind,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub component: String,
    pub error_type: String,
    pub context: ScenarioContext,
    pub log_template: Vec<LineTemplate>,
    pub stack_trace_template: String,
    /// Floor used when the caller does not ask for a minimum line count
    pub default_min_logs: usize,
}

impl ScenarioDefinition {
    /// Number of lines the scenario itself contributes before filler
    #[inline]
    #[must_use]
    pub fn template_len(&self) -> usize {
        self.log_template.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_kind_parses_every_name() {
        for kind in ScenarioKind::ALL {
            assert_eq!(kind.as_str().parse::<ScenarioKind>().unwrap(), kind);
        }
        assert!("not_a_scenario".parse::<ScenarioKind>().is_err());
    }

    #[test]
    fn severity_is_case_insensitive() {
        assert_eq!("CRITICAL".parse::<Severity>().unwrap(), Severity::Critical);
        assert_eq!(Severity::High.to_string(), "high");
    }

    #[test]
    fn context_with_replaces_existing_binding() {
        let ctx = ScenarioContext::empty()
            .with("user_id", "42")
            .with("request_id", "req_001")
            .with("user_id", "7");
        assert_eq!(ctx.get("user_id"), Some("7"));
        assert_eq!(ctx.len(), 2);
        let keys: Vec<_> = ctx.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["user_id", "request_id"]);
    }

    #[test]
    fn severity_serializes_lowercase() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
    }
}
