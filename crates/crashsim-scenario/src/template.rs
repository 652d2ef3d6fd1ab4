//! Placeholder rendering and construction-time validation of templates

use crate::error::TemplateError;
use crashsim_model::{ScenarioContext, ScenarioDefinition};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([a-z_][a-z0-9_]*)\}").unwrap_or_else(|e| panic!("placeholder regex: {e}"))
});

/// Placeholder names referenced by `message`, in order of appearance
pub fn placeholders(message: &str) -> impl Iterator<Item = &str> {
    PLACEHOLDER
        .captures_iter(message)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
}

/// Substitute `{name}` placeholders from `context`
///
/// Unbound names are left as-is; validated definitions never contain any.
pub fn render<'a>(message: &'a str, context: &ScenarioContext) -> Cow<'a, str> {
    PLACEHOLDER.replace_all(message, |caps: &Captures<'_>| {
        context
            .get(&caps[1])
            .map(str::to_string)
            .unwrap_or_else(|| caps[0].to_string())
    })
}

/// Check a definition once, before it can be used for a run
///
/// # Errors
/// Returns the first [`TemplateError`] found.
pub fn validate(def: &ScenarioDefinition) -> Result<(), TemplateError> {
    let scenario = def.name;

    if def.log_template.is_empty() {
        return Err(TemplateError::EmptyLogTemplate { scenario });
    }
    if def.stack_trace_template.trim().is_empty() {
        return Err(TemplateError::EmptyStackTrace { scenario });
    }

    for (line, template) in def.log_template.iter().enumerate() {
        if template.service.is_empty() || template.service.chars().any(char::is_whitespace) {
            return Err(TemplateError::InvalidService {
                scenario,
                line,
                service: template.service.clone(),
            });
        }
        if let Some(name) = placeholders(&template.message).find(|name| def.context.get(name).is_none()) {
            return Err(TemplateError::UnboundPlaceholder {
                scenario,
                line,
                name: name.to_string(),
            });
        }
    }

    if !raises(&def.stack_trace_template, &def.error_type) {
        return Err(TemplateError::ErrorTypeMismatch {
            scenario,
            error_type: def.error_type.clone(),
        });
    }

    Ok(())
}

/// Whether some line of the traceback is the exception line for `error_type`
fn raises(stack_trace: &str, error_type: &str) -> bool {
    stack_trace.lines().map(str::trim_start).any(|line| {
        line == error_type
            || line
                .strip_prefix(error_type)
                .is_some_and(|rest| rest.starts_with(':'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crashsim_model::{LineTemplate, LogLevel, ScenarioKind, Severity};

    fn definition() -> ScenarioDefinition {
        ScenarioDefinition {
            name: ScenarioKind::VerifyPaymentTimeout,
            title: "t".into(),
            description: "d".into(),
            severity: Severity::High,
            component: "PAYMENT_SERVICE".into(),
            error_type: "httpx.ReadTimeout".into(),
            context: ScenarioContext::empty().with("payment_ref", "REF_ABC"),
            log_template: vec![LineTemplate::new(
                "PAYMENTS",
                LogLevel::Info,
                "verify_paystack payment_ref={payment_ref}",
            )],
            stack_trace_template: "Traceback (most recent call last):\nhttpx.ReadTimeout: Timed out".into(),
            default_min_logs: 10,
        }
    }

    #[test]
    fn render_substitutes_bound_names() {
        let ctx = ScenarioContext::empty().with("user_id", "42");
        assert_eq!(render("customer_id={user_id} items=2", &ctx), "customer_id=42 items=2");
        assert_eq!(render("no placeholders", &ctx), "no placeholders");
        assert_eq!(render("x={missing}", &ctx), "x={missing}");
    }

    #[test]
    fn placeholders_ignores_non_identifiers() {
        let names: Vec<_> = placeholders("a={one} b={Two} c={three_3} {}").collect();
        assert_eq!(names, vec!["one", "three_3"]);
    }

    #[test]
    fn valid_definition_passes() {
        assert_eq!(validate(&definition()), Ok(()));
    }

    #[test]
    fn unbound_placeholder_is_rejected() {
        let mut def = definition();
        def.log_template.push(LineTemplate::new("BACKEND", LogLevel::Info, "user={user_id}"));
        assert!(matches!(
            validate(&def),
            Err(TemplateError::UnboundPlaceholder { line: 1, .. })
        ));
    }

    #[test]
    fn error_type_must_appear_in_trace() {
        let mut def = definition();
        def.error_type = "httpx.ConnectTimeout".into();
        assert!(matches!(validate(&def), Err(TemplateError::ErrorTypeMismatch { .. })));
    }

    #[test]
    fn error_type_prefix_is_not_enough() {
        let mut def = definition();
        def.error_type = "httpx.Read".into();
        assert!(matches!(validate(&def), Err(TemplateError::ErrorTypeMismatch { .. })));
    }

    #[test]
    fn empty_templates_are_rejected() {
        let mut def = definition();
        def.log_template.clear();
        assert!(matches!(validate(&def), Err(TemplateError::EmptyLogTemplate { .. })));

        let mut def = definition();
        def.stack_trace_template = "   ".into();
        assert!(matches!(validate(&def), Err(TemplateError::EmptyStackTrace { .. })));
    }

    #[test]
    fn service_with_whitespace_is_rejected() {
        let mut def = definition();
        def.log_template[0].service = "PAY MENTS".into();
        assert!(matches!(validate(&def), Err(TemplateError::InvalidService { .. })));
    }
}
