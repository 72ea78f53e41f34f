use anyhow::{Context, Result};
use cdnlog_config::{Platform, RuntimeConfig};
use cdnlog_core::{ExecutionMode, RunStatus, WorkItem};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

/// Archive CDN access-log files into an object-store bucket
#[derive(Parser, Debug)]
#[command(name = "cdnlog")]
#[command(version)]
#[command(about = "Archive CDN access-log files into an object-store bucket", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the dispatcher once and print the run summary
    Dispatch {
        /// Evaluate the window as if the clock read this instant (RFC 3339)
        #[arg(long, value_name = "TIME")]
        now: Option<DateTime<Utc>>,

        /// Override execution.mode (inline or fanout)
        #[arg(long, value_name = "MODE")]
        mode: Option<ExecutionMode>,

        /// Harvest only these hosts (repeatable; replaces the configured list)
        #[arg(long = "host", value_name = "HOST")]
        hosts: Vec<String>,
    },
    /// Land a single archive URL and print the worker result
    Worker {
        /// Signed log archive URL
        url: String,
    },
    /// Print the log window a dispatcher run would harvest
    Window {
        #[arg(long, value_name = "TIME")]
        now: Option<DateTime<Utc>>,
    },
    /// Print the destination key for an archive URL
    Key {
        url: String,
    },
    /// Print the resolved configuration (secrets redacted)
    Config,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Dispatch { now, mode, hosts } => {
            if let Some(mode) = mode {
                config.execution.mode = mode;
            }
            if !hosts.is_empty() {
                config.hosts = hosts;
            }
            config.validate()?;
            cdnlog_pipeline::init_tracing(&config);
            block_on(run_dispatch(config, now))
        }
        Commands::Worker { url } => {
            config.validate()?;
            cdnlog_pipeline::init_tracing(&config);
            block_on(run_worker(config, url))
        }
        Commands::Window { now } => {
            let window = config.window.spec().window_at(now.unwrap_or_else(Utc::now));
            print_json(&window)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Key { url } => {
            let deriver = config.destination.key_deriver()?;
            println!("{}", deriver.derive(&url)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Defaults, file (explicit or discovered), environment, then CLI flags.
/// Validation is left to the commands that touch upstream services.
fn load_config(cli: &Cli) -> Result<RuntimeConfig> {
    let mut config = cdnlog_config::load_layered(Platform::detect(), cli.config.as_deref())
        .with_context(|| match &cli.config {
            Some(path) => format!("Failed to load config from {}", path.display()),
            None => "Failed to load configuration".to_string(),
        })?;

    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }
    Ok(config)
}

fn block_on<F>(future: F) -> Result<ExitCode>
where
    F: std::future::Future<Output = Result<ExitCode>>,
{
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(future)
}

async fn run_dispatch(config: RuntimeConfig, now: Option<DateTime<Utc>>) -> Result<ExitCode> {
    let dispatcher = cdnlog_pipeline::build_dispatcher(&config).await?;
    let summary = dispatcher.run_at(now.unwrap_or_else(Utc::now)).await;
    print_json(&summary)?;
    Ok(ExitCode::from(dispatch_exit_status(summary.status)))
}

async fn run_worker(config: RuntimeConfig, url: String) -> Result<ExitCode> {
    let worker = cdnlog_pipeline::build_worker(&config).await?;
    let outcome = worker.process_item(&WorkItem::new(url, "")).await;
    print_json(&outcome)?;
    Ok(if outcome.is_failure() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// 0 on success, 2 on partial failure, 1 when the run was a no-op
fn dispatch_exit_status(status: RunStatus) -> u8 {
    match status {
        RunStatus::Success => 0,
        RunStatus::PartialFailure => 2,
        RunStatus::Failure => 1,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render JSON")?;
    println!("{}", rendered);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_dispatch_overrides() {
        let cli = Cli::try_parse_from([
            "cdnlog",
            "--log-level",
            "debug",
            "dispatch",
            "--now",
            "2024-03-15T15:00:00Z",
            "--mode",
            "fanout",
            "--host",
            "a.example",
            "--host",
            "b.example",
        ])
        .unwrap();

        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Commands::Dispatch { now, mode, hosts } => {
                assert_eq!(now.unwrap().to_rfc3339(), "2024-03-15T15:00:00+00:00");
                assert_eq!(mode, Some(ExecutionMode::Fanout));
                assert_eq!(hosts, vec!["a.example", "b.example"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["cdnlog", "dispatch", "--mode", "parallel"]).is_err());
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::try_parse_from(["cdnlog", "key", "https://cdn/x", "--config", "cdnlog.toml"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("cdnlog.toml")));
    }

    #[test]
    fn dispatch_exit_codes() {
        assert_eq!(dispatch_exit_status(RunStatus::Success), 0);
        assert_eq!(dispatch_exit_status(RunStatus::PartialFailure), 2);
        assert_eq!(dispatch_exit_status(RunStatus::Failure), 1);
    }
}
