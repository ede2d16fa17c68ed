mod ai;
mod app;
mod cache;
mod commands;
mod config;
mod event;
mod merge;
mod remote;
mod screens;
mod task;
mod ui;

#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::ai::AiClient;
use crate::cache::SwrCache;
use crate::remote::{AuthSession, RestClient};
use crate::screens::Context;

#[derive(Parser, Debug)]
#[command(name = "maynsta")]
#[command(about = "A terminal client for the Maynsta music service")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/maynsta/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Screen to open first: library, search, account or password
  #[arg(short, long, default_value = "library")]
  screen: String,
}

/// Log to a file; the terminal belongs to the UI.
fn init_logging() -> Result<WorkerGuard> {
  let dir = dirs::data_dir()
    .map(|d| d.join("maynsta"))
    .unwrap_or_else(|| PathBuf::from("."));
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
    &dir,
    "maynsta.log",
  ));
  let filter =
    EnvFilter::try_from_env("MAYNSTA_LOG").unwrap_or_else(|_| EnvFilter::new("maynsta=info"));

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_writer(writer).with_ansi(false))
    .init();
  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let _guard = init_logging()?;

  let store = Arc::new(RestClient::new(
    &config.store.url,
    config.anon_key()?,
    config::Config::access_token(),
  )?);
  let assistant = Arc::new(AiClient::new(&config.ai.endpoint)?);

  let session = store.get_session().await?.ok_or_else(|| {
    eyre!("Not signed in. Set MAYNSTA_ACCESS_TOKEN to a valid access token.")
  })?;
  info!(user = %session.user_id, "Signed in");

  let ctx = Context {
    user_id: session.user_id.clone(),
    store: store.clone(),
    blobs: store.clone(),
    auth: store,
    assistant,
    cache: SwrCache::new().with_stale_time(config.stale_time()),
  };
  let account = session.email.unwrap_or(session.user_id);

  // Initialize and run the app
  let mut app = app::App::new(ctx, config.display_title(), account, &args.screen)?;
  app.run().await?;

  Ok(())
}
