//! Process entry point. Grounded on `original_source/indexer.py::main` for
//! the overall shape (parse args, load config, optionally install schema,
//! else run the worker loop) and on `zjj`'s `commands::queue_worker` for
//! expressing that shape with `clap` + `tokio::main` + structured logging
//! instead of argparse + print statements.

mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use indexer_core::config::SharedConfig;
use indexer_core::handlers::{
    ArchiveClient, HandlerRegistry, MusicBrainzHandler, PostgresArtworkCatalog, CAA_PROJECT,
    EAA_PROJECT,
};
use indexer_core::queue::{EventQueueRepository, PostgresEventQueue};
use indexer_core::worker::{install_signal_handlers, LoopOutcome, Worker, WorkerOptions};

use cli::Cli;

const EXIT_SUCCESS: u8 = 0;
const EXIT_ERROR: u8 = 1;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match run(cli).await {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            tracing::error!(error = %e, "fatal error");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn init_logging(debug: bool) {
    let default_directive = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let shared_config = SharedConfig::load(&cli.config)?;
    let config = shared_config.get();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database.connection_string())
        .await?;

    if cli.setup_schema {
        sqlx::migrate!("../indexer-core/migrations").run(&pool).await?;
        tracing::info!("schema and trigger protocol installed");
        return Ok(());
    }

    let repo: Arc<dyn EventQueueRepository> = Arc::new(PostgresEventQueue::new(pool.clone()));

    let mut handlers = HandlerRegistry::new();
    handlers.register(
        CAA_PROJECT.entity_type,
        Box::new(MusicBrainzHandler::new(
            CAA_PROJECT,
            ArchiveClient::new(&config.s3)?,
            Box::new(PostgresArtworkCatalog::new(pool.clone())),
            reqwest::Client::new(),
            config.musicbrainz.clone(),
        )),
    );
    handlers.register(
        EAA_PROJECT.entity_type,
        Box::new(MusicBrainzHandler::new(
            EAA_PROJECT,
            ArchiveClient::new(&config.s3)?,
            Box::new(PostgresArtworkCatalog::new(pool.clone())),
            reqwest::Client::new(),
            config.musicbrainz.clone(),
        )),
    );

    let options = WorkerOptions {
        max_wait: std::time::Duration::from_secs(cli.max_wait),
        max_idle_loops: cli.max_idle_loops,
    };

    let mut worker = Worker::new(repo, handlers, shared_config, options);
    let shutdown = install_signal_handlers();

    match worker.run(shutdown).await {
        LoopOutcome::ShutdownRequested => tracing::info!("worker exited cleanly on shutdown signal"),
        LoopOutcome::IdleLimitReached => tracing::info!("worker exited after idle-loop budget"),
    }

    Ok(())
}
