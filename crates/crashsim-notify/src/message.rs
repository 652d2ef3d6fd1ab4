//! Crash summary and its Block Kit rendering

use chrono::{DateTime, Utc};
use crashsim_model::{CrashId, CrashRecord, Severity};
use serde_json::{json, Value};

/// Everything a notification says about one crash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashNotification {
    pub crash_id: CrashId,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub component: String,
    pub error_type: String,
    pub users_impacted: u32,
    /// Link to the persisted artifact
    pub log_url: String,
    /// File name shown for the link
    pub log_name: String,
    pub sample_link: String,
    pub sent_at: DateTime<Utc>,
}

impl CrashNotification {
    /// Summarize `record`; `dashboard_url` is the base of the sample link
    #[must_use]
    pub fn from_record(record: &CrashRecord, dashboard_url: &str, sent_at: DateTime<Utc>) -> Self {
        let details = &record.error_details;
        Self {
            crash_id: record.crash_id,
            title: details.title.clone(),
            description: details.description.clone(),
            severity: details.severity,
            component: details.component.clone(),
            error_type: details.error_type.clone(),
            users_impacted: record.users_impacted,
            log_url: record.s3_url.clone(),
            log_name: record
                .s3_key
                .rsplit('/')
                .next()
                .unwrap_or(&record.s3_key)
                .to_string(),
            sample_link: sample_link(dashboard_url, &record.scenario, record.timestamp),
            sent_at,
        }
    }

    /// Plain-text fallback shown by clients that cannot render blocks
    #[must_use]
    pub fn fallback_text(&self) -> String {
        format!("🚨 *{}*", self.title)
    }

    /// `chat.postMessage` body for `channel`
    #[must_use]
    pub fn to_slack_payload(&self, channel: &str) -> Value {
        let field = |label: &str, value: String| {
            json!({ "type": "mrkdwn", "text": format!("*{label}:*\n{value}") })
        };

        json!({
            "channel": channel,
            "text": self.fallback_text(),
            "blocks": [
                {
                    "type": "header",
                    "text": { "type": "plain_text", "text": format!("🚨 {}", self.title) },
                },
                {
                    "type": "section",
                    "fields": [
                        field("Severity", self.severity.to_string()),
                        field("Component", self.component.clone()),
                        field("Error Type", self.error_type.clone()),
                        field("Users Impacted", thousands(self.users_impacted)),
                    ],
                },
                {
                    "type": "section",
                    "text": { "type": "mrkdwn", "text": format!("*Description:*\n{}", self.description) },
                },
                {
                    "type": "section",
                    "fields": [
                        field("Log File", format!("<{}|{}>", self.log_url, self.log_name)),
                        field("Sample Link", format!("<{}|View Error Details>", self.sample_link)),
                        field("Crash ID", format!("`{}`", self.crash_id)),
                        field("Status", "`Simulated`".to_string()),
                    ],
                },
                { "type": "divider" },
                {
                    "type": "context",
                    "elements": [{
                        "type": "mrkdwn",
                        "text": format!(
                            "⏰ {} | 🔧 Auto-generated by crashsim",
                            self.sent_at.format("%Y-%m-%d %H:%M:%S UTC")
                        ),
                    }],
                },
            ],
        })
    }
}

/// `{dashboard}/{scenario}_{YYYYmmdd_HHMMSS}`
#[must_use]
pub fn sample_link(dashboard_url: &str, scenario: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}/{}_{}",
        dashboard_url.trim_end_matches('/'),
        scenario,
        at.format("%Y%m%d_%H%M%S")
    )
}

/// `1234567` → `1,234,567`
#[must_use]
pub fn thousands(n: u32) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crashsim_model::{ArtifactKey, CrashStatus, ErrorDetails, StorageBackend};
    use pretty_assertions::assert_eq;

    fn record() -> CrashRecord {
        let crash_id = CrashId::new();
        let key = ArtifactKey::for_run(&crash_id);
        let at = Utc.with_ymd_and_hms(2024, 9, 1, 8, 5, 9).unwrap();
        CrashRecord {
            crash_id,
            scenario: "paystack_timeout".into(),
            timestamp: at,
            s3_url: format!("https://bucket.s3.us-east-1.amazonaws.com/{key}"),
            s3_key: key.to_string(),
            artifact_backend: StorageBackend::RemoteObjectStore,
            error_details: ErrorDetails {
                title: "Payment Gateway Timeout - Checkout Process Failed".into(),
                description: "Paystack timed out".into(),
                severity: Severity::Critical,
                component: "PAYMENT_SERVICE".into(),
                error_type: "httpx.ConnectTimeout".into(),
            },
            users_impacted: 1234,
            status: CrashStatus::Active,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn thousands_separators() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(4_294_967_295), "4,294,967,295");
    }

    #[test]
    fn sample_link_uses_scenario_and_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 9, 1, 8, 5, 9).unwrap();
        assert_eq!(
            sample_link("https://monitoring.example.com/errors/", "taskq_oversell", at),
            "https://monitoring.example.com/errors/taskq_oversell_20240901_080509"
        );
    }

    #[test]
    fn payload_carries_required_fields() {
        let record = record();
        let note = CrashNotification::from_record(&record, "https://monitoring.example.com/errors", Utc::now());
        assert_eq!(note.log_name, format!("{}.log", record.crash_id));

        let payload = note.to_slack_payload("C123");
        assert_eq!(payload["channel"], "C123");
        assert_eq!(
            payload["blocks"][0]["text"]["text"],
            "🚨 Payment Gateway Timeout - Checkout Process Failed"
        );
        let summary: Vec<&str> = payload["blocks"][1]["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["text"].as_str().unwrap())
            .collect();
        assert_eq!(
            summary,
            vec![
                "*Severity:*\ncritical",
                "*Component:*\nPAYMENT_SERVICE",
                "*Error Type:*\nhttpx.ConnectTimeout",
                "*Users Impacted:*\n1,234",
            ]
        );
        let log_field = payload["blocks"][3]["fields"][0]["text"].as_str().unwrap();
        assert!(log_field.contains(&record.s3_url));
        assert_eq!(payload["blocks"][4]["type"], "divider");
    }
}
