//! resonance-booking server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the
//! SQLite store and the on-disk blob store, connects the scheduling
//! provider client, and serves the webhook + admin API over HTTP. A
//! background task sweeps for missing bookings on a configurable
//! interval.

use std::{sync::Arc, time::Duration};

use anyhow::Context as _;
use chrono::Utc;
use clap::Parser;
use resonance_booking::{AppState, ServerConfig, storage::FsBlobStore};
use resonance_core::{provider::SchedulingProvider, store::StudioStore};
use resonance_scheduling::RestSchedulingClient;
use resonance_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Resonance booking server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: std::path::PathBuf,
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

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("RESONANCE"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store = SqliteStore::open(&server_cfg.store_path)
    .await
    .with_context(|| {
      format!("failed to open store at {:?}", server_cfg.store_path)
    })?;

  let blobs = FsBlobStore::new(&server_cfg.blob_dir);

  let provider = RestSchedulingClient::connect(
    &server_cfg.provider_base_url,
    &server_cfg.provider_token,
  )
  .await
  .context("failed to reach the scheduling provider")?;

  let state = AppState {
    store:    Arc::new(store),
    blobs:    Arc::new(blobs),
    provider: Arc::new(provider),
    config:   Arc::new(server_cfg.clone()),
  };

  spawn_reconciler(state.clone());

  let app = resonance_booking::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Periodic missing-booking sweep, replacing an external beat scheduler.
fn spawn_reconciler<S, B, P>(state: AppState<S, B, P>)
where
  S: StudioStore + 'static,
  B: resonance_core::blob::BlobStore + 'static,
  P: SchedulingProvider + 'static,
{
  let period = Duration::from_secs(state.config.reconcile_interval_secs);
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
      ticker.tick().await;
      match resonance_jobs::check_missing_bookings(
        state.store.as_ref(),
        state.provider.as_ref(),
        Utc::now(),
      )
      .await
      {
        Ok(missing) => {
          for booking in &missing {
            tracing::warn!(
              start = %booking.start_time,
              name = %booking.name,
              email = %booking.email,
              "booking exists upstream but not locally"
            );
          }
        }
        Err(e) => tracing::warn!(error = %e, "reconciliation sweep failed"),
      }
    }
  });
}
