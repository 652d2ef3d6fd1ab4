use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use crashsim_core::{Console, RunOptions, SimulationOrchestrator, SimulatorConfig};
use crashsim_model::{LogFormat, ScenarioKind};
use crashsim_scenario::ScenarioCatalog;
use serde_json::json;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn cli() -> Command {
    Command::new("crashsim")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Simulate application crashes and run them through the ingestion pipeline")
        .subcommand_required(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit diagnostic logs (stderr) as JSON"),
        )
        .subcommand(
            Command::new("simulate")
                .about("Synthesize a crash log, persist it, record the crash and notify")
                .arg(
                    Arg::new("scenario")
                        .num_args(0..)
                        .action(ArgAction::Append)
                        .help("Scenario names to run (see `crashsim scenarios`)"),
                )
                .arg(
                    Arg::new("all")
                        .long("all")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("scenario")
                        .help("Run every scenario in the catalog"),
                )
                .arg(
                    Arg::new("min-logs")
                        .long("min-logs")
                        .value_parser(value_parser!(usize))
                        .help("Minimum number of log lines before the stack trace"),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .default_value("json")
                        .value_parser(["plain", "json"])
                        .help("Log line encoding"),
                )
                .arg(
                    Arg::new("no-jitter")
                        .long("no-jitter")
                        .action(ArgAction::SetTrue)
                        .help("Use a fixed step between line timestamps"),
                )
                .arg(
                    Arg::new("users")
                        .long("users")
                        .value_parser(value_parser!(u32))
                        .help("Simulated impacted-user count (random when omitted)"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducible runs"),
                )
                .arg(
                    Arg::new("quiet")
                        .long("quiet")
                        .short('q')
                        .action(ArgAction::SetTrue)
                        .help("Do not stream log lines to stdout; print run summaries there instead of stderr"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print run summaries as JSON"),
                ),
        )
        .subcommand(
            Command::new("scenarios")
                .about("List the built-in crash scenarios")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(Command::new("status").about("Show which backends are configured"))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("simulate", args)) => simulate(args).await,
        Some(("scenarios", args)) => {
            list_scenarios(args.get_flag("json"))?;
            Ok(ExitCode::SUCCESS)
        }
        Some(("status", _)) => {
            println!("{}", SimulatorConfig::from_env().backends());
            Ok(ExitCode::SUCCESS)
        }
        _ => Ok(ExitCode::FAILURE),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn run_options(args: &ArgMatches) -> anyhow::Result<RunOptions> {
    let format: LogFormat = args
        .get_one::<String>("format")
        .map_or(Ok(LogFormat::default()), |f| f.parse())
        .context("invalid --format")?;

    let mut options = RunOptions::default()
        .with_format(format)
        .with_jitter(!args.get_flag("no-jitter"));
    if let Some(min_logs) = args.get_one::<usize>("min-logs") {
        options = options.with_min_logs(*min_logs);
    }
    if let Some(users) = args.get_one::<u32>("users") {
        options = options.with_users_impacted(*users);
    }
    if let Some(seed) = args.get_one::<u64>("seed") {
        options = options.with_seed(*seed);
    }
    Ok(options)
}

async fn simulate(args: &ArgMatches) -> anyhow::Result<ExitCode> {
    let names: Vec<String> = if args.get_flag("all") {
        ScenarioKind::ALL.iter().map(|k| k.as_str().to_string()).collect()
    } else {
        args.get_many::<String>("scenario")
            .map(|names| names.cloned().collect())
            .unwrap_or_default()
    };
    if names.is_empty() {
        bail!("no scenario given; pass one or more names or --all");
    }

    let options = run_options(args)?;
    let config = SimulatorConfig::from_env();
    let console = if args.get_flag("quiet") {
        Console::Silent
    } else {
        Console::Stdout
    };
    let orchestrator = SimulationOrchestrator::from_config(&config)
        .context("failed to set up backends")?
        .with_console(console);
    let _ctrl_c = orchestrator.shutdown().listen_for_ctrl_c();

    let json = args.get_flag("json");
    let to_stdout = summaries_to_stdout(args);
    let mut failed = false;
    for (name, outcome) in names.iter().zip(orchestrator.run_batch(&names, &options).await) {
        match outcome {
            Ok(result) => {
                failed |= !result.is_completed();
                let summary = result.summary();
                let text = if json {
                    serde_json::to_string(&summary)?
                } else {
                    format!("\n{summary}")
                };
                emit(to_stdout, &text);
            }
            Err(e) => {
                failed = true;
                tracing::error!(scenario = %name, error = %e, "simulation rejected");
                if json {
                    emit(to_stdout, &json!({ "scenario": name, "error": e.to_string() }).to_string());
                }
            }
        }
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Summaries share stdout only when no log lines are streamed there
fn summaries_to_stdout(args: &ArgMatches) -> bool {
    args.get_flag("quiet")
}

fn emit(to_stdout: bool, text: &str) {
    if to_stdout {
        println!("{text}");
    } else {
        eprintln!("{text}");
    }
}

fn list_scenarios(json: bool) -> anyhow::Result<()> {
    let catalog = ScenarioCatalog::builtin();
    if json {
        let entries: Vec<_> = catalog
            .iter()
            .map(|s| {
                json!({
                    "name": s.name,
                    "title": s.title,
                    "severity": s.severity,
                    "component": s.component,
                    "errorType": s.error_type,
                    "defaultMinLogs": s.default_min_logs,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("{:<26} {:<9} {:<18} {}", "SCENARIO", "SEVERITY", "COMPONENT", "TITLE");
    for s in catalog.iter() {
        println!(
            "{:<26} {:<9} {:<18} {}",
            s.name.as_str(),
            s.severity.as_str(),
            s.component,
            s.title
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn simulate_flags_map_to_options() {
        let matches = cli()
            .try_get_matches_from([
                "crashsim",
                "simulate",
                "paystack_timeout",
                "--min-logs",
                "5",
                "--format",
                "plain",
                "--no-jitter",
                "--users",
                "12",
                "--seed",
                "3",
            ])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        let options = run_options(args).unwrap();
        assert_eq!(options.min_logs, Some(5));
        assert_eq!(options.format, LogFormat::Plain);
        assert!(!options.jitter);
        assert_eq!(options.users_impacted, Some(12));
        assert_eq!(options.seed, Some(3));
    }

    #[test]
    fn summaries_avoid_the_log_stream() {
        let streaming = cli()
            .try_get_matches_from(["crashsim", "simulate", "paystack_timeout", "--json"])
            .unwrap();
        let (_, args) = streaming.subcommand().unwrap();
        assert!(!summaries_to_stdout(args));

        let quiet = cli()
            .try_get_matches_from(["crashsim", "simulate", "paystack_timeout", "-q", "--json"])
            .unwrap();
        let (_, args) = quiet.subcommand().unwrap();
        assert!(summaries_to_stdout(args));
    }

    #[test]
    fn all_conflicts_with_names() {
        let err = cli()
            .try_get_matches_from(["crashsim", "simulate", "--all", "paystack_timeout"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }
}
