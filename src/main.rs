//! randwalk CLI entry point

use anyhow::{Context, Result};
use randwalk::comm::World;
use randwalk::config::cli::{Cli, ExecutionMode};
use randwalk::config::{toml, validator, DEFAULT_CONNECT_TIMEOUT_MS};
use randwalk::launcher::Launcher;
use randwalk::runner::{run_rank, RunStatus};
use randwalk::walker::step::clock_seed;
use std::process::ExitCode;
use std::time::Duration;
use tracing::Instrument;

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    randwalk::logging::init(cli.debug);

    match dispatch(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> Result<ExitCode> {
    cli.validate()?;

    match cli.mode {
        ExecutionMode::Launch => run_launch(cli),
        ExecutionMode::Rank => run_single_rank(cli),
    }
}

/// Launch every rank of the run as a child process
fn run_launch(cli: Cli) -> Result<ExitCode> {
    let file = match cli.config {
        Some(ref path) => Some(toml::parse_toml_file(path)?),
        None => None,
    };
    let config = toml::merge_cli_with_config(&cli, file);

    validator::validate_launch(&config).context("Configuration validation failed")?;

    let report = Launcher::new(config, cli.debug).run(&cli.args)?;

    Ok(if report.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Run one rank (spawned by the launcher)
fn run_single_rank(cli: Cli) -> Result<ExitCode> {
    let identity = cli.identity()?;
    let root_addr = cli
        .root_addr
        .context("rank mode requires --root-addr")?;
    let connect_timeout =
        Duration::from_millis(cli.connect_timeout_ms.unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS));
    let base_seed = cli.seed.unwrap_or_else(clock_seed);

    let runtime = tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?;

    let span = tracing::info_span!("rank", rank = identity.rank);
    let status = runtime.block_on(
        async {
            let world = World::init(identity, root_addr, connect_timeout)
                .await
                .context("Failed to initialize world")?;

            run_rank(world, cli.args.as_slice(), base_seed).await
        }
        .instrument(span),
    )?;

    Ok(match status {
        RunStatus::Completed => ExitCode::SUCCESS,
        RunStatus::UsageError => ExitCode::from(1),
    })
}
