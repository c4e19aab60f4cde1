use crate::infra::build_service;
use crate::seed;
use crate::server;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use jobboard::config::AppConfig;
use jobboard::error::AppError;
use jobboard::telemetry;
use std::fs::File;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "jobboard-api",
    about = "Run the job board API and its maintenance tasks",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Validate a seed CSV by loading it into a fresh in-memory board
    Seed(SeedArgs),
    /// Expire every active listing whose duration has elapsed
    ExpireSweep(SweepArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Preload companies and listings from a seed CSV
    #[arg(long)]
    pub(crate) seed: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct SeedArgs {
    /// CSV file with one listing per row
    pub(crate) csv: PathBuf,
}

#[derive(Args, Debug, Default)]
pub(crate) struct SweepArgs {
    /// Seed CSV to load before sweeping
    #[arg(long)]
    pub(crate) seed: Option<PathBuf>,
    /// Evaluate expiry at this RFC 3339 instant instead of now
    #[arg(long)]
    pub(crate) at: Option<DateTime<Utc>>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Seed(args) => run_seed(args),
        Command::ExpireSweep(args) => run_sweep(args),
    }
}

fn run_seed(args: SeedArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let service = build_service(&config);
    let summary = seed::load(&service, File::open(&args.csv)?)?;
    println!(
        "Loaded {} companies and {} active listings from {}",
        summary.companies,
        summary.jobs,
        args.csv.display()
    );
    Ok(())
}

fn run_sweep(args: SweepArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let service = build_service(&config);
    if let Some(path) = &args.seed {
        seed::load(&service, File::open(path)?)?;
    }
    let at = args.at.unwrap_or_else(Utc::now);
    let expired = service.expire_due(at)?;
    info!(expired, %at, "expiration sweep finished");
    println!("Expired {expired} listings as of {at}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["jobboard-api"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn sweep_accepts_an_instant() {
        let cli = Cli::try_parse_from([
            "jobboard-api",
            "expire-sweep",
            "--at",
            "2026-01-31T00:00:00Z",
        ])
        .expect("parses");
        match cli.command {
            Some(Command::ExpireSweep(args)) => {
                assert_eq!(
                    args.at.map(|at| at.to_rfc3339()),
                    Some("2026-01-31T00:00:00+00:00".to_string())
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn seed_requires_a_path() {
        assert!(Cli::try_parse_from(["jobboard-api", "seed"]).is_err());
    }
}
