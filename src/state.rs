use std::{env, fmt::Display, str::FromStr};

use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use teloxide::Bot;
use tokio_util::sync::CancellationToken;

use crate::{
  engine::{Engine, EngineConfig, Outbox, Postman, SystemClock},
  prelude::*,
  sv,
  telegram::Telegram,
};

#[derive(Debug, Clone)]
pub struct Config {
  pub database_url: String,
  pub token: String,
  /// Operator API key, sent as `x-api-key`.
  pub secret: String,
  pub port: u16,
  pub poll_interval: Duration,
  pub sweep_interval: Duration,
  pub outbox_capacity: usize,
  pub outbox_workers: usize,
  pub engine: EngineConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      database_url: String::from("sqlite:giveaways.db?mode=rwc"),
      token: String::new(),
      secret: String::new(),
      port: 3000,
      poll_interval: Duration::from_secs(5),
      sweep_interval: Duration::from_secs(600),
      outbox_capacity: 1024,
      outbox_workers: 4,
      engine: EngineConfig::default(),
    }
  }
}

impl Config {
  pub fn from_env() -> anyhow::Result<Self> {
    Self::from_lookup(|key| env::var(key).ok())
  }

  fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
    let default = Config::default();
    let engine = default.engine.clone();

    let required = |key: &str| {
      var(key)
        .filter(|value| !value.trim().is_empty())
        .with_context(|| format!("{key} not set"))
    };

    Ok(Self {
      database_url: var("DATABASE_URL").unwrap_or(default.database_url),
      token: required("TELOXIDE_TOKEN")?,
      secret: required("SERVER_SECRET")?,
      port: parse(&var, "PORT", default.port)?,
      poll_interval: duration(&var, "POLL_INTERVAL", default.poll_interval)?,
      sweep_interval: duration(&var, "SWEEP_INTERVAL", default.sweep_interval)?,
      outbox_capacity: parse(&var, "OUTBOX_CAPACITY", default.outbox_capacity)?,
      outbox_workers: parse(&var, "OUTBOX_WORKERS", default.outbox_workers)?,
      engine: EngineConfig {
        max_concurrent: parse(&var, "MAX_CONCURRENT", engine.max_concurrent)?,
        max_attempts: parse(&var, "MAX_ATTEMPTS", engine.max_attempts)?,
        retry_delay: duration(&var, "RETRY_DELAY", engine.retry_delay)?,
        lock_ttl: duration(&var, "LOCK_TTL", engine.lock_ttl)?,
        custom_deadline: duration(
          &var,
          "CUSTOM_DEADLINE",
          engine.custom_deadline,
        )?,
        pre_winners_ttl: duration(
          &var,
          "PRE_WINNERS_TTL",
          engine.pre_winners_ttl,
        )?,
        discovery_batch: parse(&var, "DISCOVERY_BATCH", engine.discovery_batch)?,
        empty_policy: parse(&var, "EMPTY_POLICY", engine.empty_policy)?,
        archive_on_complete: parse(
          &var,
          "ARCHIVE_ON_COMPLETE",
          engine.archive_on_complete,
        )?,
        seed: var("DRAW_SEED")
          .map(|seed| seed.trim().parse())
          .transpose()
          .context("Invalid DRAW_SEED")?,
      },
    })
  }
}

fn parse<T>(
  var: &impl Fn(&str) -> Option<String>,
  key: &str,
  default: T,
) -> anyhow::Result<T>
where
  T: FromStr,
  T::Err: Display,
{
  match var(key) {
    Some(value) => value
      .trim()
      .parse()
      .map_err(|err| anyhow::anyhow!("Invalid {key} `{value}`: {err}")),
    None => Ok(default),
  }
}

fn duration(
  var: &impl Fn(&str) -> Option<String>,
  key: &str,
  default: Duration,
) -> anyhow::Result<Duration> {
  match var(key) {
    Some(value) => humantime::parse_duration(value.trim())
      .with_context(|| format!("Invalid {key} `{value}`")),
    None => Ok(default),
  }
}

pub struct Services<'a> {
  pub user: sv::User<'a, DatabaseConnection>,
  pub giveaway: sv::Giveaway<'a, DatabaseConnection>,
  pub entry: sv::Entry<'a, DatabaseConnection>,
  pub win: sv::Win<'a, DatabaseConnection>,
}

pub struct AppState {
  pub db: DatabaseConnection,
  pub config: Config,
  pub engine: Arc<Engine>,
  pub shutdown: CancellationToken,
}

impl AppState {
  /// Connects, migrates and wires the engine to Telegram. The returned
  /// postman delivers the engine's notices and must be run by the caller.
  pub async fn new(
    config: Config,
    shutdown: CancellationToken,
  ) -> anyhow::Result<(Self, Postman)> {
    info!("Connecting to database...");
    let db = Database::connect(&config.database_url)
      .await
      .context("Failed to connect to database")?;

    info!("Running migrations...");
    Migrator::up(&db, None).await.context("Failed to run migrations")?;

    let telegram = Arc::new(Telegram::new(Bot::new(&config.token)));
    let (outbox, rx) = Outbox::new(config.outbox_capacity);
    let postman = Postman::new(rx, telegram.clone(), config.outbox_workers);

    let engine = Engine::new(
      db.clone(),
      telegram,
      outbox,
      Arc::new(SystemClock),
      config.engine.clone(),
      shutdown.clone(),
    );

    let app = Self { db, config, engine: Arc::new(engine), shutdown };
    Ok((app, postman))
  }

  pub fn sv(&self) -> Services<'_> {
    Services {
      user: sv::User::new(&self.db),
      giveaway: sv::Giveaway::new(&self.db),
      entry: sv::Entry::new(&self.db),
      win: sv::Win::new(&self.db),
    }
  }
}
