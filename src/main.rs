use anyhow::{Context, Result};
use clap::Parser;
use firestore_clear::{ConsoleReporter, ProgressListener, StoreConfig, facade};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "firestore-clear")]
#[command(about = "Delete every document from every top-level Firestore collection")]
struct Cli {
    /// Project to clear instead of the configured default
    #[arg(long)]
    project_id: Option<String>,

    /// Database id inside the project
    #[arg(long)]
    database: Option<String>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing()?;

    let mut config = StoreConfig::from_env();
    if let Some(project_id) = cli.project_id.as_deref() {
        config = config.project_id(project_id);
    }
    if let Some(database) = cli.database.as_deref() {
        config = config.database(database);
    }

    // every remote call is awaited in sequence on this one thread
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let reporter: Arc<dyn ProgressListener> = Arc::new(ConsoleReporter::stdout());
    let result = runtime.block_on(facade::clear_database(config, Arc::clone(&reporter)));
    let outcome = facade::conclude(result, reporter.as_ref());

    Ok(outcome.into())
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("firestore_clear=warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("failed to install tracing subscriber")
}
