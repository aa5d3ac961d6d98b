//! registro server binary.
//!
//! Reads `registro.toml` (or the path given with `--config`) and the
//! environment, connects to SQLite or PostgreSQL, brings the schema up to
//! date, seeds the administrator and serves the health surface.
//!
//! # Subcommands
//!
//! ```text
//! registro serve          # default
//! registro migrate        # run migrations and seeding, print the report
//! registro status         # print the ledger and any schema drift
//! registro hash-password  # print the argon2 hash of a password read from stdin
//! ```

use std::{future::IntoFuture, path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use registro_core::Store;
use registro_schema::{Argon2Hasher, CredentialHasher};
use registro_server::{
  AppState, Backend, LegacyEnv, Phase, Readiness, ServerConfig, bring_up, router, schema_status,
};
use registro_store_postgres::PostgresStore;
use registro_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Registro records store")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "registro.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
  /// Bootstrap the store and serve HTTP.
  Serve,
  /// Run migrations and seeding once, print the report and exit.
  Migrate,
  /// Print the migration ledger and schema drift without changing anything.
  Status,
  /// Print the argon2 hash for a password entered on stdin and exit.
  HashPassword,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let command = cli.command.unwrap_or(Command::Serve);

  if let Command::HashPassword = command {
    let password = read_password()?;
    println!("{}", Argon2Hasher.hash(&password)?);
    return Ok(());
  }

  let config = ServerConfig::load(&cli.config, LegacyEnv::from_process())
    .context("failed to read configuration")?;

  match config.backend() {
    Backend::Postgres { url } => {
      tracing::info!(backend = "postgres", "connecting");
      let store = PostgresStore::connect(url, config.postgres_settings())
        .await
        .context("failed to connect to PostgreSQL")?;
      run(command, store, &config).await
    }
    Backend::Sqlite { path } => {
      tracing::info!(backend = "sqlite", path = %path.display(), "opening");
      let store = SqliteStore::open(path, config.sqlite_settings())
        .await
        .with_context(|| format!("failed to open store at {path:?}"))?;
      run(command, store, &config).await
    }
  }
}

async fn run<S>(command: Command, store: S, config: &ServerConfig) -> anyhow::Result<()>
where
  S: Store + 'static,
{
  match command {
    Command::Serve => serve(store, config).await,
    Command::Migrate => {
      let report = bring_up(&store, config, &Readiness::new())
        .await
        .context("bootstrap failed")?;
      println!("{}", serde_json::to_string_pretty(&report)?);
      if !report.migration.is_clean() {
        anyhow::bail!("migration finished with failed, skipped or drifted steps");
      }
      Ok(())
    }
    Command::Status => {
      let status = schema_status(&store).await.context("failed to read schema status")?;
      println!("{}", serde_json::to_string_pretty(&status)?);
      Ok(())
    }
    Command::HashPassword => Ok(()),
  }
}

/// Serve HTTP right away and bootstrap in the background; everything but
/// liveness answers 503 until bootstrap settles. A bootstrap that cannot
/// reach the ledger stops the process.
async fn serve<S>(store: S, config: &ServerConfig) -> anyhow::Result<()>
where
  S: Store + 'static,
{
  let state = AppState { store: Arc::new(store), readiness: Readiness::new() };

  let address = config.address();
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;
  tracing::info!("Listening on http://{address}");

  let boot = {
    let state = state.clone();
    let config = config.clone();
    tokio::spawn(async move {
      bring_up(state.store.as_ref(), &config, &state.readiness)
        .await
        .map(|report| {
          tracing::info!(
            clean = report.migration.is_clean(),
            seed = ?report.seed,
            "bootstrap finished"
          );
        })
    })
  };

  let readiness = state.readiness.clone();
  tokio::spawn(async move {
    match readiness.settled().await {
      Phase::Ready => tracing::info!("accepting requests"),
      Phase::Failed { reason } => tracing::warn!(%reason, "holding requests behind the readiness gate"),
      Phase::Starting => {}
    }
  });

  let server = axum::serve(listener, router(state)).into_future();
  tokio::pin!(server);

  tokio::select! {
    served = &mut server => return served.context("server error"),
    booted = boot => booted.context("bootstrap task panicked")?.context("bootstrap failed")?,
  }

  server.await.context("server error")
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}
