use anyhow::Result;
use catql_streaming::{ExecutionState, StreamConfig};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::{print_stats, report_errors, run_query, statement_text, InputSource};
use config::Config;

#[derive(Parser, Debug)]
#[command(name = "catql")]
#[command(author, version, about = "Filter whitespace-delimited rows from stdin with SQL", long_about = None)]
struct Cli {
    /// SQL statement to execute
    #[arg(short = 'e', long = "sql", conflicts_with = "predicate")]
    sql: Option<String>,

    /// Predicate shorthand for `select * from <ds> where <predicate>`
    #[arg(short = 'w', long = "where")]
    predicate: Option<String>,

    /// Name the input is registered under
    #[arg(long = "ds")]
    datasource: Option<String>,

    /// Input url: stdin:// (default), file://<path> or a path
    #[arg(short, long, default_value = "stdin://")]
    input: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Accept the single-dash `-ds name` / `-ds=name` spelling.
fn normalize_args<I: IntoIterator<Item = String>>(args: I) -> Vec<String> {
    args.into_iter()
        .map(|arg| {
            if arg == "-ds" {
                "--ds".to_string()
            } else if let Some(value) = arg.strip_prefix("-ds=") {
                format!("--ds={}", value)
            } else {
                arg
            }
        })
        .collect()
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse_from(normalize_args(std::env::args()));

    init_logging(cli.verbose)?;

    let config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(cli, config));
    // A stdin read parked on a blocking thread cannot be interrupted once
    // LIMIT is reached; exit without waiting for the next input line.
    runtime.shutdown_background();
    result
}

async fn run(cli: Cli, config: Config) -> Result<ExitCode> {
    let datasource = cli
        .datasource
        .clone()
        .unwrap_or_else(|| config.default_datasource.clone());
    let sql = statement_text(cli.sql.as_deref(), cli.predicate.as_deref(), &datasource)?;
    let input = InputSource::parse(&cli.input)?;

    let stream_config = StreamConfig::new().with_channel_capacity(config.channel_capacity);
    let summary = run_query(&sql, &datasource, input, stream_config).await?;

    if config.show_stats {
        print_stats(&summary.stats);
    }

    if summary.state == ExecutionState::Failed {
        report_errors(&summary.errors);
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        "catql=debug,catql_core=debug,catql_parser=debug,catql_executor=debug,catql_streaming=debug"
    } else {
        "catql=warn,catql_streaming=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(normalize_args(args.iter().map(|a| a.to_string()))).unwrap()
    }

    #[test]
    fn test_single_dash_ds() {
        let cli = parse(&["catql", "-w", "c1 > 1", "-ds", "logs"]);
        assert_eq!(cli.datasource.as_deref(), Some("logs"));
        assert_eq!(cli.predicate.as_deref(), Some("c1 > 1"));

        let cli = parse(&["catql", "-e", "select * from t", "-ds=t"]);
        assert_eq!(cli.datasource.as_deref(), Some("t"));
        assert_eq!(cli.input, "stdin://");
    }

    #[test]
    fn test_sql_and_where_conflict() {
        let args = normalize_args(
            ["catql", "-e", "select * from t", "-w", "c1 > 1"]
                .iter()
                .map(|a| a.to_string()),
        );
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
