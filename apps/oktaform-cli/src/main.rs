//! oktaform - declarative Okta policy rules and users
//!
//! Reads a YAML desired-state document and a JSON state file, then plans,
//! applies, imports or destroys the declared entities.

use clap::{Parser, Subcommand};
use tracing::Instrument;
use uuid::Uuid;

use oktaform_cli::commands;
use oktaform_cli::error::CliResult;
use oktaform_cli::logging::{self, LogFormat};
use oktaform_core::CancellationToken;

/// oktaform - Okta infrastructure as code
#[derive(Parser)]
#[command(name = "oktaform")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn", env = "OKTAFORM_LOG_LEVEL")]
    log_level: String,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the changes an apply would make
    Plan(commands::plan::PlanArgs),

    /// Bring Okta to the desired state and record the result
    Apply(commands::apply::ApplyArgs),

    /// Add existing Okta entities to the state file
    Import(commands::import::ImportArgs),

    /// Delete every entity the document manages
    Destroy(commands::destroy::DestroyArgs),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Plan(_) => "plan",
            Commands::Apply(_) => "apply",
            Commands::Import(_) => "import",
            Commands::Destroy(_) => "destroy",
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging(&cli.log_level, cli.log_format) {
        e.print();
        std::process::exit(e.exit_code());
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling in-flight operations");
            on_interrupt.cancel();
        }
    });

    let span = tracing::info_span!("run", run_id = %Uuid::new_v4(), command = cli.command.name());
    let result = run(cli, cancel).instrument(span).await;

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli, cancel: CancellationToken) -> CliResult<()> {
    match cli.command {
        Commands::Plan(args) => commands::plan::execute(args, cancel).await,
        Commands::Apply(args) => commands::apply::execute(args, cancel).await,
        Commands::Import(args) => commands::import::execute(args, cancel).await,
        Commands::Destroy(args) => commands::destroy::execute(args, cancel).await,
    }
}
