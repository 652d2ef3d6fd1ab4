//! Log synthesis
//!
//! Turns a [`ScenarioDefinition`] into a [`CrashArtifact`]: filler traffic up
//! to the requested floor, then the scenario's own lines, then exactly one
//! stack-trace block. Each encoded line is written to the console and to the
//! artifact buffer in the same call, so both see the same bytes.
//!
//! Timestamps are simulated. The synthesizer never sleeps; jitter only
//! changes the spacing between consecutive timestamps.

use crate::filler::Filler;
use crate::template;
use chrono::{DateTime, Duration, Utc};
use crashsim_model::{
    CrashArtifact, CrashId, LogEntry, LogFormat, LogLevel, ScenarioDefinition, TIMESTAMP_FORMAT,
};
use rand::Rng;
use serde_json::{Map, Value};
use std::io::Write;

/// Fixed spacing between lines when jitter is off
pub const DEFAULT_STEP_MS: u64 = 100;
/// Jitter bounds, inclusive
pub const DEFAULT_JITTER_MS: (u64, u64) = (40, 140);

/// Per-run synthesis options
#[derive(Debug, Clone, Default)]
pub struct SynthesisConfig {
    /// Minimum number of non-stack-trace lines; `None` uses the scenario floor
    pub min_logs: Option<usize>,
    pub format: LogFormat,
    pub jitter: bool,
    /// Timestamp of the first line; `None` uses the current time
    pub start_at: Option<DateTime<Utc>>,
}

impl SynthesisConfig {
    #[inline]
    #[must_use]
    pub fn with_min_logs(mut self, min_logs: usize) -> Self {
        self.min_logs = Some(min_logs);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_start_at(mut self, start_at: DateTime<Utc>) -> Self {
        self.start_at = Some(start_at);
        self
    }

    /// Effective floor for `scenario`
    #[must_use]
    pub fn floor_for(&self, scenario: &ScenarioDefinition) -> usize {
        self.min_logs.unwrap_or(scenario.default_min_logs)
    }
}

/// Produces the ordered, timestamped log of one run
#[derive(Debug, Clone)]
pub struct LogSynthesizer {
    step_ms: u64,
    jitter_min_ms: u64,
    jitter_max_ms: u64,
}

impl Default for LogSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSynthesizer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            step_ms: DEFAULT_STEP_MS,
            jitter_min_ms: DEFAULT_JITTER_MS.0,
            jitter_max_ms: DEFAULT_JITTER_MS.1,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_step_ms(mut self, step_ms: u64) -> Self {
        self.step_ms = step_ms;
        self
    }

    /// Set the jitter range; reversed bounds are swapped
    #[inline]
    #[must_use]
    pub fn with_jitter_bounds(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.jitter_min_ms = min_ms.min(max_ms);
        self.jitter_max_ms = min_ms.max(max_ms);
        self
    }

    /// Synthesize the artifact for one run
    ///
    /// Lines are streamed to `console` as they are produced. A console write
    /// error is logged and stops console output; the artifact is unaffected.
    pub fn generate<R, W>(
        &self,
        scenario: &ScenarioDefinition,
        config: &SynthesisConfig,
        crash_id: CrashId,
        rng: &mut R,
        console: &mut W,
    ) -> CrashArtifact
    where
        R: Rng + ?Sized,
        W: Write + ?Sized,
    {
        let floor = config.floor_for(scenario);
        let filler_count = floor.saturating_sub(scenario.template_len());
        let filler = Filler::new(&scenario.context);

        let mut clock = Clock::new(config.start_at.unwrap_or_else(Utc::now));
        let mut sink = Tee::new(console);
        let mut entries = Vec::with_capacity(filler_count + scenario.template_len());

        for i in 0..filler_count {
            let line = filler.line(i, rng);
            let entry = LogEntry {
                timestamp: clock.tick(self.delta_ms(config.jitter, rng)),
                level: line.level,
                service: line.service.to_string(),
                message: line.message,
            };
            sink.write(&encode_entry(&entry, scenario, config.format));
            entries.push(entry);
        }

        for line in &scenario.log_template {
            let entry = LogEntry {
                timestamp: clock.tick(self.delta_ms(config.jitter, rng)),
                level: line.level,
                service: line.service.clone(),
                message: template::render(&line.message, &scenario.context).into_owned(),
            };
            sink.write(&encode_entry(&entry, scenario, config.format));
            entries.push(entry);
        }

        let stack_trace = scenario.stack_trace_template.trim().to_string();
        let trace_ts = clock.tick(self.delta_ms(config.jitter, rng));
        sink.write(&encode_stack_trace(&stack_trace, trace_ts, scenario, config.format));

        tracing::debug!(
            scenario = %scenario.name,
            %crash_id,
            lines = entries.len(),
            filler = filler_count,
            format = %config.format,
            "synthesized crash log"
        );

        CrashArtifact::new(
            crash_id,
            scenario.name,
            config.format,
            entries,
            stack_trace,
            sink.into_bytes(),
        )
    }

    fn delta_ms<R: Rng + ?Sized>(&self, jitter: bool, rng: &mut R) -> u64 {
        if jitter {
            rng.gen_range(self.jitter_min_ms..=self.jitter_max_ms)
        } else {
            self.step_ms
        }
    }
}

/// Simulated clock; the first tick returns the start time unchanged
struct Clock {
    now: DateTime<Utc>,
    started: bool,
}

impl Clock {
    fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: start,
            started: false,
        }
    }

    fn tick(&mut self, delta_ms: u64) -> DateTime<Utc> {
        if self.started {
            let delta = Duration::milliseconds(i64::from(u32::try_from(delta_ms).unwrap_or(u32::MAX)));
            self.now = self.now.checked_add_signed(delta).unwrap_or(self.now);
        }
        self.started = true;
        self.now
    }
}

/// Writes every line to the console and the artifact buffer
struct Tee<'w, W: Write + ?Sized> {
    console: Option<&'w mut W>,
    buffer: Vec<u8>,
}

impl<'w, W: Write + ?Sized> Tee<'w, W> {
    fn new(console: &'w mut W) -> Self {
        Self {
            console: Some(console),
            buffer: Vec::new(),
        }
    }

    fn write(&mut self, line: &str) {
        self.buffer.extend_from_slice(line.as_bytes());
        let failed = match self.console.as_mut() {
            Some(console) => console
                .write_all(line.as_bytes())
                .and_then(|()| console.flush())
                .err(),
            None => None,
        };
        if let Some(e) = failed {
            tracing::warn!(error = %e, "console write failed; continuing without console output");
            self.console = None;
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

fn encode_entry(entry: &LogEntry, scenario: &ScenarioDefinition, format: LogFormat) -> String {
    match format {
        LogFormat::Plain => format!(
            "{} {} {} {}\n",
            entry.formatted_timestamp(),
            entry.service,
            entry.level,
            entry.message
        ),
        LogFormat::Json => {
            let mut fields = base_fields(scenario);
            for (k, v) in message_tokens(&entry.message) {
                fields.insert(k.to_string(), Value::String(v.to_string()));
            }
            fields.insert("ts".into(), entry.formatted_timestamp().into());
            fields.insert("level".into(), entry.level.as_str().into());
            fields.insert("service".into(), entry.service.clone().into());
            fields.insert("message".into(), entry.message.clone().into());
            json_line(fields)
        }
    }
}

fn encode_stack_trace(
    stack_trace: &str,
    ts: DateTime<Utc>,
    scenario: &ScenarioDefinition,
    format: LogFormat,
) -> String {
    match format {
        LogFormat::Plain => format!("{stack_trace}\n"),
        LogFormat::Json => {
            let mut fields = base_fields(scenario);
            fields.insert("ts".into(), ts.format(TIMESTAMP_FORMAT).to_string().into());
            fields.insert("level".into(), LogLevel::Error.as_str().into());
            fields.insert("service".into(), scenario.component.clone().into());
            fields.insert("error_type".into(), scenario.error_type.clone().into());
            fields.insert("stack_trace".into(), stack_trace.into());
            json_line(fields)
        }
    }
}

fn base_fields(scenario: &ScenarioDefinition) -> Map<String, Value> {
    scenario
        .context
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
}

/// `key=value` tokens in a message, split on the first `=`
fn message_tokens(message: &str) -> impl Iterator<Item = (&str, &str)> {
    message
        .split_whitespace()
        .filter_map(|token| token.split_once('='))
        .filter(|(k, _)| !k.is_empty())
}

fn json_line(fields: Map<String, Value>) -> String {
    let mut line = Value::Object(fields).to_string();
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScenarioCatalog;
    use chrono::TimeZone;
    use crashsim_model::ScenarioKind;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn scenario(kind: ScenarioKind) -> ScenarioDefinition {
        (*ScenarioCatalog::builtin().get(kind).unwrap()).clone()
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap()
    }

    fn run(kind: ScenarioKind, config: &SynthesisConfig, seed: u64) -> (CrashArtifact, Vec<u8>) {
        let mut console = Vec::new();
        let artifact = LogSynthesizer::new().generate(
            &scenario(kind),
            config,
            CrashId::new(),
            &mut StdRng::seed_from_u64(seed),
            &mut console,
        );
        (artifact, console)
    }

    #[test]
    fn plain_run_with_small_floor() {
        let config = SynthesisConfig::default()
            .with_min_logs(5)
            .with_format(LogFormat::Plain)
            .with_start_at(start());
        let (artifact, _) = run(ScenarioKind::PaystackTimeout, &config, 1);

        // template is longer than the floor, so no filler
        assert_eq!(artifact.line_count(), 8);
        let text = String::from_utf8(artifact.bytes().to_vec()).unwrap();
        assert!(text.starts_with(
            "2024-09-01T12:00:00.000Z BACKEND INFO request_in method=POST path=/cart/checkout user_id=42 request_id=req_001\n"
        ));
        assert!(text.ends_with("httpx.ConnectTimeout: Timed out while connecting to Paystack\n"));
        assert_eq!(text.matches("Traceback (most recent call last):").count(), 1);
    }

    #[test]
    fn filler_precedes_scenario_lines() {
        let config = SynthesisConfig::default()
            .with_min_logs(30)
            .with_format(LogFormat::Plain);
        let (artifact, _) = run(ScenarioKind::StripeSignatureError, &config, 2);

        assert_eq!(artifact.line_count(), 30);
        let entries = artifact.entries();
        assert_eq!(entries[0].service, "FRONTEND");
        assert_eq!(entries[28].message, "stripe_checkout_session quantity=2");
        assert_eq!(entries[29].message, "stripe_checkout_session_failed");
    }

    #[test]
    fn default_floor_comes_from_scenario() {
        let config = SynthesisConfig::default();
        let (artifact, _) = run(ScenarioKind::TaskqOversell, &config, 3);
        assert_eq!(artifact.line_count(), 120);

        let (artifact, _) = run(ScenarioKind::DbStartupFailure, &config, 3);
        assert_eq!(artifact.line_count(), 60);
    }

    #[test]
    fn console_and_artifact_are_byte_identical() {
        let config = SynthesisConfig::default().with_min_logs(50).with_jitter(true);
        let (artifact, console) = run(ScenarioKind::VerifyPaymentTimeout, &config, 4);
        assert_eq!(artifact.bytes(), console.as_slice());
    }

    #[test]
    fn json_lines_carry_context_and_tokens() {
        let config = SynthesisConfig::default()
            .with_min_logs(0)
            .with_start_at(start());
        let (artifact, _) = run(ScenarioKind::MigrationTypeMismatch, &config, 5);
        let lines: Vec<Value> = artifact
            .bytes()
            .split(|b| *b == b'\n')
            .filter(|l| !l.is_empty())
            .map(|l| serde_json::from_slice(l).unwrap())
            .collect();

        assert_eq!(lines.len(), artifact.line_count() + 1);
        let first = &lines[0];
        assert_eq!(first["ts"], "2024-09-01T12:00:00.000Z");
        assert_eq!(first["service"], "BACKEND");
        assert_eq!(first["level"], "INFO");
        assert_eq!(first["request_id"], "req_003");
        assert_eq!(first["path"], "/order/vendor/");
        assert_eq!(first["session_id"], "sess_vendor_7");

        let trace = lines.last().unwrap();
        assert_eq!(trace["error_type"], "TypeError");
        assert_eq!(trace["service"], "DATABASE");
        assert!(trace["stack_trace"].as_str().unwrap().starts_with("Traceback"));
        assert!(lines[..lines.len() - 1].iter().all(|l| l.get("stack_trace").is_none()));
    }

    #[test]
    fn fixed_step_without_jitter() {
        let config = SynthesisConfig::default()
            .with_min_logs(10)
            .with_start_at(start());
        let (artifact, _) = run(ScenarioKind::VerifyPaymentTimeout, &config, 6);
        let deltas: Vec<i64> = artifact
            .entries()
            .windows(2)
            .map(|w| (w[1].timestamp - w[0].timestamp).num_milliseconds())
            .collect();
        assert!(deltas.iter().all(|d| *d == 100));
    }

    #[test]
    fn same_seed_same_bytes() {
        let config = SynthesisConfig::default()
            .with_min_logs(40)
            .with_jitter(true)
            .with_start_at(start());
        let a = LogSynthesizer::new().generate(
            &scenario(ScenarioKind::TaskqOversell),
            &config,
            CrashId::new(),
            &mut StdRng::seed_from_u64(42),
            &mut std::io::sink(),
        );
        let b = LogSynthesizer::new().generate(
            &scenario(ScenarioKind::TaskqOversell),
            &config,
            CrashId::new(),
            &mut StdRng::seed_from_u64(42),
            &mut std::io::sink(),
        );
        assert_eq!(a.bytes(), b.bytes());
    }

    struct BrokenConsole;

    impl Write for BrokenConsole {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn broken_console_does_not_lose_the_artifact() {
        let config = SynthesisConfig::default().with_min_logs(15);
        let artifact = LogSynthesizer::new().generate(
            &scenario(ScenarioKind::PaystackTimeout),
            &config,
            CrashId::new(),
            &mut StdRng::seed_from_u64(8),
            &mut BrokenConsole,
        );
        assert_eq!(artifact.line_count(), 15);
        assert!(!artifact.is_empty());
    }

    #[test]
    fn reversed_jitter_bounds_are_swapped() {
        let synth = LogSynthesizer::new().with_jitter_bounds(140, 40);
        assert_eq!((synth.jitter_min_ms, synth.jitter_max_ms), (40, 140));
    }

    proptest! {
        #[test]
        fn floor_and_single_trace_hold(
            idx in 0usize..6,
            min_logs in 0usize..300,
            plain in any::<bool>(),
            seed in any::<u64>(),
        ) {
            let kind = ScenarioKind::ALL[idx];
            let format = if plain { LogFormat::Plain } else { LogFormat::Json };
            let config = SynthesisConfig::default()
                .with_min_logs(min_logs)
                .with_format(format)
                .with_jitter(true);
            let (artifact, _) = run(kind, &config, seed);

            prop_assert!(artifact.line_count() >= min_logs);
            let text = String::from_utf8(artifact.bytes().to_vec()).unwrap();
            prop_assert_eq!(text.matches("Traceback (most recent call last):").count(),
                scenario(kind).stack_trace_template.matches("Traceback (most recent call last):").count());
            let trace = artifact.stack_trace();
            match format {
                LogFormat::Plain => {
                    let expected_tail = format!("{trace}\n");
                    prop_assert!(text.ends_with(&expected_tail));
                }
                LogFormat::Json => {
                    let last: Value = serde_json::from_str(text.lines().last().unwrap()).unwrap();
                    prop_assert_eq!(last["stack_trace"].as_str(), Some(trace));
                }
            }
        }

        #[test]
        fn timestamps_never_decrease(
            idx in 0usize..6,
            min_logs in 0usize..200,
            jitter in any::<bool>(),
            seed in any::<u64>(),
        ) {
            let config = SynthesisConfig::default().with_min_logs(min_logs).with_jitter(jitter);
            let (artifact, _) = run(ScenarioKind::ALL[idx], &config, seed);
            for w in artifact.entries().windows(2) {
                prop_assert!(w[0].timestamp <= w[1].timestamp);
            }
        }
    }
}
