//! Simulation orchestrator
//!
//! One run is one sequential pipeline:
//!
//! 1. resolve the scenario (unknown names are rejected before anything happens)
//! 2. synthesize the log, streaming it to the console
//! 3. persist the artifact (remote, or local fallback)
//! 4. record the crash under the run's `crashId`
//! 5. notify, best-effort
//!
//! A fatal stage failure ends the run as `Failed` with whatever it had
//! produced up to that point.

use crate::config::SimulatorConfig;
use crate::error::{ConfigError, RunError, SimulationError};
use crate::result::SimulationResult;
use crate::shutdown::Shutdown;
use crate::state::{RunState, RunTracker};
use chrono::{DateTime, Utc};
use crashsim_model::{ArtifactKey, CrashId, LogFormat, ScenarioDefinition};
use crashsim_notify::NotificationDispatcher;
use crashsim_scenario::{LogSynthesizer, ScenarioCatalog, SynthesisConfig};
use crashsim_store::{ArtifactStore, CrashRecorder};
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::{self, Write};
use std::ops::RangeInclusive;
use tracing::Instrument;

/// Impacted-user range when the caller does not choose a count
pub const DEFAULT_USERS_IMPACTED: RangeInclusive<u32> = 50..=5000;

/// Per-run options
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Minimum non-stack-trace lines; `None` uses the scenario floor
    pub min_logs: Option<usize>,
    pub format: LogFormat,
    pub jitter: bool,
    /// Simulated impacted users; `None` draws from [`DEFAULT_USERS_IMPACTED`]
    pub users_impacted: Option<u32>,
    /// Seed for every random choice in the run
    pub seed: Option<u64>,
    /// Timestamp of the first synthesized line
    pub start_at: Option<DateTime<Utc>>,
}

impl RunOptions {
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
    pub fn with_users_impacted(mut self, users: u32) -> Self {
        self.users_impacted = Some(users);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_start_at(mut self, start_at: DateTime<Utc>) -> Self {
        self.start_at = Some(start_at);
        self
    }

    fn synthesis(&self) -> SynthesisConfig {
        let mut config = SynthesisConfig::default()
            .with_format(self.format)
            .with_jitter(self.jitter);
        if let Some(min_logs) = self.min_logs {
            config = config.with_min_logs(min_logs);
        }
        if let Some(start_at) = self.start_at {
            config = config.with_start_at(start_at);
        }
        config
    }
}

/// Where synthesized lines are echoed while they are produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Console {
    #[default]
    Stdout,
    Silent,
}

/// Drives runs through the pipeline
#[derive(Debug, Clone)]
pub struct SimulationOrchestrator {
    catalog: ScenarioCatalog,
    synthesizer: LogSynthesizer,
    store: ArtifactStore,
    recorder: CrashRecorder,
    dispatcher: NotificationDispatcher,
    shutdown: Shutdown,
    console: Console,
}

impl SimulationOrchestrator {
    /// Orchestrator over the built-in catalog
    pub fn new(store: ArtifactStore, recorder: CrashRecorder, dispatcher: NotificationDispatcher) -> Self {
        Self {
            catalog: ScenarioCatalog::builtin(),
            synthesizer: LogSynthesizer::new(),
            store,
            recorder,
            dispatcher,
            shutdown: Shutdown::new(),
            console: Console::default(),
        }
    }

    /// Build every component from `config`
    ///
    /// # Errors
    /// [`ConfigError`] if a configured backend client cannot be built.
    pub fn from_config(config: &SimulatorConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.artifact_store()?,
            config.crash_recorder()?,
            config.dispatcher()?,
        ))
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: ScenarioCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    #[must_use]
    pub fn with_synthesizer(mut self, synthesizer: LogSynthesizer) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    #[must_use]
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    #[must_use]
    pub fn with_console(mut self, console: Console) -> Self {
        self.console = console;
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &ScenarioCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Run `scenario` under a fresh crash id
    ///
    /// # Errors
    /// [`SimulationError::UnknownScenario`] before any side effect. Stage
    /// failures are not errors here; they come back as a `Failed` result.
    pub async fn run(
        &self,
        scenario: &str,
        options: &RunOptions,
    ) -> Result<SimulationResult, SimulationError> {
        self.run_as(CrashId::new(), scenario, options).await
    }

    /// Run `scenario` under a caller-supplied crash id
    ///
    /// Repeating a run with the same id rewrites the same artifact key and
    /// overwrites the same crash record.
    ///
    /// # Errors
    /// See [`run`](Self::run).
    pub async fn run_as(
        &self,
        crash_id: CrashId,
        scenario: &str,
        options: &RunOptions,
    ) -> Result<SimulationResult, SimulationError> {
        let definition =
            self.catalog
                .resolve(scenario)
                .map_err(|_| SimulationError::UnknownScenario {
                    name: scenario.to_string(),
                    known: self
                        .catalog
                        .kinds()
                        .map(|k| k.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                })?;

        let span = tracing::info_span!("run", %crash_id, scenario = %definition.name);
        Ok(self
            .execute(crash_id, &definition, options)
            .instrument(span)
            .await)
    }

    async fn execute(
        &self,
        crash_id: CrashId,
        definition: &ScenarioDefinition,
        options: &RunOptions,
    ) -> SimulationResult {
        tracing::info!(
            min_logs = ?options.min_logs,
            format = %options.format,
            jitter = options.jitter,
            "starting simulation"
        );

        let mut tracker = RunTracker::new();
        let mut result = SimulationResult::new(crash_id, definition.name);

        match self
            .drive(definition, options, &mut tracker, &mut result)
            .await
        {
            Ok(()) => {
                tracing::info!(
                    lines = result.lines_generated,
                    notification_sent = result.notification_sent(),
                    "simulation completed"
                );
            }
            Err(e) => {
                if tracker.advance(RunState::Failed).is_err() {
                    tracing::error!(state = %tracker.current(), "run failed from a state with no failure exit");
                }
                tracing::error!(
                    error = %e,
                    kind = e.kind(),
                    artifact_persisted = result.artifact_persisted(),
                    crash_recorded = result.crash_recorded(),
                    "simulation failed"
                );
                result.error = Some(e);
            }
        }

        result.state = tracker.current();
        result.failed_at = tracker.failed_at();
        result
    }

    /// Run several scenarios concurrently
    ///
    /// Each run gets its own crash id. A fixed seed is offset per run so
    /// runs stay reproducible without sharing a random stream.
    pub async fn run_batch(
        &self,
        scenarios: &[String],
        options: &RunOptions,
    ) -> Vec<Result<SimulationResult, SimulationError>> {
        let runs = scenarios.iter().enumerate().map(|(i, name)| {
            let mut options = options.clone();
            options.seed = options
                .seed
                .map(|seed| seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX)));
            async move { self.run(name, &options).await }
        });
        join_all(runs).await
    }

    async fn drive(
        &self,
        definition: &ScenarioDefinition,
        options: &RunOptions,
        tracker: &mut RunTracker,
        result: &mut SimulationResult,
    ) -> Result<(), RunError> {
        let crash_id = result.crash_id;
        let mut rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let users_impacted = options
            .users_impacted
            .unwrap_or_else(|| rng.gen_range(DEFAULT_USERS_IMPACTED));

        self.enter(tracker, RunState::Generating)?;
        let artifact = {
            let config = options.synthesis();
            match self.console {
                Console::Stdout => {
                    let stdout = io::stdout();
                    let mut console = stdout.lock();
                    let artifact =
                        self.synthesizer
                            .generate(definition, &config, crash_id, &mut rng, &mut console);
                    if let Err(e) = console.flush() {
                        tracing::warn!(error = %e, "console flush failed");
                    }
                    artifact
                }
                Console::Silent => self.synthesizer.generate(
                    definition,
                    &config,
                    crash_id,
                    &mut rng,
                    &mut io::sink(),
                ),
            }
        };
        result.lines_generated = artifact.line_count();
        result.digest = Some(*artifact.digest());
        tracing::debug!(
            lines = artifact.line_count(),
            bytes = artifact.len(),
            digest = %artifact.digest().short(),
            "log synthesized"
        );

        self.enter(tracker, RunState::Persisting)?;
        let key = ArtifactKey::for_run(&crash_id);
        let location = self.store.persist(&artifact, &key).await?;
        result.artifact = Some(location.clone());

        self.enter(tracker, RunState::Recording)?;
        let record = self
            .recorder
            .record_as(crash_id, definition, &location, users_impacted)
            .await?;
        result.record = Some(record.clone());

        // Notification is non-fatal, so it runs even after a shutdown request.
        tracker.advance(RunState::Notifying)?;
        result.notification = Some(self.dispatcher.notify(&record).await);

        tracker.advance(RunState::Completed)?;
        Ok(())
    }

    fn enter(&self, tracker: &mut RunTracker, stage: RunState) -> Result<(), RunError> {
        if self.shutdown.is_triggered() {
            return Err(RunError::Interrupted { stage });
        }
        tracker.advance(stage)?;
        Ok(())
    }
}
