//! console-expect: run console test scenarios against a device or process
//!
//! Exit codes: 0 when the scenario passes, 1 when it fails, 2 for usage,
//! configuration and connection errors. A scenario whose patterns do not
//! compile is a configuration error.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use console_expect::config::env::EnvConfig;
use console_expect::util::parse_secs;
use console_expect::scenario::FailureKind;
use console_expect::{ChildConnection, HarnessConfig, Outcome, Scenario, ScenarioRunner};

/// Exit code for a failed scenario.
const EXIT_FAIL: u8 = 1;

/// Exit code for errors that prevent running a scenario.
const EXIT_ERROR: u8 = 2;

#[derive(Parser)]
#[command(name = "console-expect", about = "Run scripted console tests")]
#[command(version, long_about = None)]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario file against a device or process.
    Run {
        /// Scenario file (TOML).
        scenario: PathBuf,

        /// Connect to a console over TCP, e.g. an emulator's serial port.
        #[arg(long, value_name = "ADDR", conflicts_with = "command")]
        tcp: Option<String>,

        /// Spawn a process on a pseudo-terminal. Arguments follow `--`.
        #[arg(long, value_name = "CMD", required_unless_present = "tcp")]
        command: Option<String>,

        /// Arguments for `--command`.
        #[arg(last = true)]
        args: Vec<String>,

        /// Talk to `--command` over plain stdin/stdout pipes instead of a
        /// pseudo-terminal.
        #[arg(long, requires = "command")]
        pipes: bool,

        /// Turn off terminal echo of sent lines.
        #[arg(long, requires = "command", conflicts_with = "pipes")]
        no_echo: bool,

        /// Harness configuration file (TOML).
        #[arg(long, value_name = "FILE", env = "CONSOLE_EXPECT_CONFIG")]
        config: Option<PathBuf>,

        /// Default expectation timeout in seconds.
        #[arg(long, value_name = "SECS", value_parser = parse_secs)]
        timeout: Option<Duration>,

        /// Print the outcome as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Check that a scenario file is valid without running it.
    Check {
        /// Scenario file (TOML).
        scenario: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Where the scenario's connection comes from.
enum Target {
    Tcp(String),
    Command {
        program: String,
        args: Vec<String>,
        pty: bool,
        echo: bool,
    },
}

/// Exit code for a finished run.
fn exit_status(outcome: &Outcome) -> u8 {
    match outcome.failure() {
        None => 0,
        Some(failure) if matches!(failure.kind, FailureKind::InvalidPattern { .. }) => EXIT_ERROR,
        Some(_) => EXIT_FAIL,
    }
}

fn load_config(
    path: Option<&Path>,
    timeout: Option<Duration>,
) -> console_expect::Result<HarnessConfig> {
    let config = match path {
        Some(path) => HarnessConfig::load(path)?,
        None => HarnessConfig::default(),
    };
    let config = config.apply_env(&EnvConfig::from_env())?;
    Ok(match timeout {
        Some(timeout) => config.expect_timeout(timeout),
        None => config,
    })
}

async fn run(
    scenario: &Path,
    target: Target,
    config: Option<&Path>,
    timeout: Option<Duration>,
) -> console_expect::Result<Outcome> {
    let config = load_config(config, timeout)?;
    let scenario = Scenario::load(scenario)?;
    tracing::debug!(?config, "loaded configuration");
    let runner = ScenarioRunner::new(config);

    tracing::info!(scenario = %scenario.name, steps = scenario.len(), "running scenario");

    let outcome = match target {
        Target::Tcp(addr) => {
            let connection = console_expect::connect_tcp(addr.as_str()).await?;
            runner.run(&scenario, connection).await
        }
        #[cfg(unix)]
        Target::Command {
            program,
            args,
            pty: true,
            echo,
        } => {
            let options = console_expect::PtyOptions::default().echo(echo);
            let connection = console_expect::PtyConnection::spawn_with(&program, &args, options)?;
            runner.run(&scenario, connection).await
        }
        Target::Command { program, args, .. } => {
            let connection = ChildConnection::spawn(&program, &args)?;
            runner.run(&scenario, connection).await
        }
    };
    Ok(outcome)
}

fn check(path: &Path) -> ExitCode {
    let scenario = match Scenario::load(path) {
        Ok(scenario) => scenario,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(EXIT_ERROR);
        }
    };
    match scenario.validate() {
        Ok(()) => {
            println!("{}: {} steps, ok", scenario.name, scenario.len());
            ExitCode::SUCCESS
        }
        Err(invalid) => {
            eprintln!("Error: {}: {invalid}", path.display());
            ExitCode::from(EXIT_ERROR)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    match cli.command {
        Commands::Check { scenario } => check(&scenario),
        Commands::Run {
            scenario,
            tcp,
            command,
            args,
            pipes,
            no_echo,
            config,
            timeout,
            json,
        } => {
            let target = match (tcp, command) {
                (Some(addr), _) => Target::Tcp(addr),
                (None, Some(program)) => Target::Command {
                    program,
                    args,
                    pty: !pipes,
                    echo: !no_echo,
                },
                (None, None) => {
                    eprintln!("Error: one of --tcp or --command is required");
                    return ExitCode::from(EXIT_ERROR);
                }
            };

            match run(&scenario, target, config.as_deref(), timeout).await {
                Ok(outcome) => {
                    if json {
                        println!("{}", outcome.to_json());
                    } else {
                        println!("{outcome}");
                    }
                    ExitCode::from(exit_status(&outcome))
                }
                Err(e) => {
                    eprintln!("Error: {e}");
                    ExitCode::from(EXIT_ERROR)
                }
            }
        }
    }
}
