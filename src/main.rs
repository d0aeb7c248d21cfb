//! Giveaway completion service
//!
//! Architecture:
//! - SeaORM for storage (SQLite), migrations in the `migration` crate
//! - Engine drawing winners for elapsed giveaways, guarded by per-giveaway
//!   database locks
//! - Teloxide for requirement checks and winner notifications
//! - Axum operator API with rate limiting

mod engine;
mod entity;
mod error;
mod plugins;
mod prelude;
mod state;
mod sv;
mod telegram;
#[cfg(test)]
mod testing;
mod utils;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{
  EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{
  plugins::App,
  prelude::*,
  state::{AppState, Config},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
      "giveaways=debug,tower_http=debug,sea_orm=warn".into()
    }))
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config = Config::from_env()?;
  info!("Starting giveaway service v{}", env!("CARGO_PKG_VERSION"));

  let shutdown = CancellationToken::new();
  let (app, postman) = AppState::new(config, shutdown.clone()).await?;
  let app = Arc::new(app);

  // Outlives the engine so notices of draining completions still go out.
  let mail_stop = CancellationToken::new();
  let mail = tokio::spawn(postman.run(mail_stop.clone()));

  let services = App::new()
    .register(plugins::scheduler::Plugin)
    .register(plugins::server::Plugin)
    .run(app.clone());

  tokio::signal::ctrl_c().await.context("Failed to listen for ctrl-c")?;
  info!("Shutting down...");
  shutdown.cancel();

  services.wait().await;
  app.engine.drain().await;
  info!("Completions drained");

  mail_stop.cancel();
  if let Err(err) = mail.await {
    error!("Outbox worker failed: {err}");
  }

  Ok(())
}
