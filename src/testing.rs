//! Shared fixtures for unit tests: in-memory database, fake ports and a
//! clock that only moves when told to.

use std::sync::{
  Mutex,
  atomic::{AtomicUsize, Ordering},
};

use chrono::NaiveDate;
use dashmap::DashMap;
use sea_orm::{Database, DbBackend, Schema, sea_query::Index};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
  engine::{
    Clock, CustomWin, Engine, EngineConfig, GiveawayRef, Notice, Notifier,
    Outbox, PrizeInfo, Verifier, VerifyError,
  },
  entity::*,
  prelude::*,
  sv,
};

pub async fn setup_db() -> DatabaseConnection {
  let db = Database::connect("sqlite::memory:").await.unwrap();
  let schema = Schema::new(DbBackend::Sqlite);
  let backend = db.get_database_backend();

  let tables = [
    schema.create_table_from_entity(user::Entity),
    schema.create_table_from_entity(giveaway::Entity),
    schema.create_table_from_entity(giveaway_prize::Entity),
    schema.create_table_from_entity(requirement::Entity),
    schema.create_table_from_entity(participant::Entity),
    schema.create_table_from_entity(ticket::Entity),
    schema.create_table_from_entity(prize::Entity),
    schema.create_table_from_entity(win::Entity),
    schema.create_table_from_entity(transfer::Entity),
    schema.create_table_from_entity(pre_winner::Entity),
    schema.create_table_from_entity(lock::Entity),
  ];
  for stmt in &tables {
    db.execute(backend.build(stmt)).await.unwrap();
  }

  // Composite unique keys live in migrations only.
  let indexes = [
    Index::create()
      .name("idx_tickets_giveaway_user")
      .table(ticket::Entity)
      .col(ticket::Column::GiveawayId)
      .col(ticket::Column::UserId)
      .unique()
      .to_owned(),
    Index::create()
      .name("idx_wins_giveaway_place")
      .table(win::Entity)
      .col(win::Column::GiveawayId)
      .col(win::Column::Place)
      .unique()
      .to_owned(),
  ];
  for stmt in &indexes {
    db.execute(backend.build(stmt)).await.unwrap();
  }

  db
}

pub fn base_time() -> DateTime {
  NaiveDate::from_ymd_opt(2026, 9, 1)
    .and_then(|date| date.and_hms_opt(12, 0, 0))
    .unwrap()
}

pub struct ManualClock {
  now: Mutex<DateTime>,
}

impl ManualClock {
  pub fn new(now: DateTime) -> Self {
    Self { now: Mutex::new(now) }
  }

  pub fn advance(&self, by: TimeDelta) {
    *self.now.lock().unwrap() += by;
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime {
    *self.now.lock().unwrap()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
  Met,
  NotMet,
  RateLimited,
  Down,
  Rejected,
}

/// Answers `Met` unless told otherwise per user or per (user, channel).
#[derive(Default)]
pub struct FakeVerifier {
  users: DashMap<i64, Reply>,
  channels: DashMap<(i64, String), Reply>,
  calls: AtomicUsize,
}

impl FakeVerifier {
  pub fn reply(self, user_id: i64, reply: Reply) -> Self {
    self.users.insert(user_id, reply);
    self
  }

  pub fn channel(self, user_id: i64, channel: &str, reply: Reply) -> Self {
    self.channels.insert((user_id, channel.to_string()), reply);
    self
  }

  pub fn set(&self, user_id: i64, reply: Reply) {
    self.users.insert(user_id, reply);
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  fn answer(&self, user_id: i64, channel: &str) -> Result<bool, VerifyError> {
    self.calls.fetch_add(1, Ordering::SeqCst);

    let reply = self
      .channels
      .get(&(user_id, channel.to_string()))
      .map(|reply| *reply)
      .or_else(|| self.users.get(&user_id).map(|reply| *reply))
      .unwrap_or(Reply::Met);

    match reply {
      Reply::Met => Ok(true),
      Reply::NotMet => Ok(false),
      Reply::RateLimited => Err(VerifyError::RateLimited),
      Reply::Down => Err(VerifyError::Unavailable("connection reset".into())),
      Reply::Rejected => Err(VerifyError::Rejected("user not found".into())),
    }
  }
}

#[async_trait]
impl Verifier for FakeVerifier {
  async fn check_subscription(
    &self,
    user_id: i64,
    channel: &str,
  ) -> Result<bool, VerifyError> {
    self.answer(user_id, channel)
  }

  async fn check_boost(
    &self,
    user_id: i64,
    channel: &str,
  ) -> Result<bool, VerifyError> {
    self.answer(user_id, channel)
  }
}

/// Records delivered notices; fails deliveries addressed to `failing`.
#[derive(Default)]
pub struct RecordingNotifier {
  delivered: Mutex<Vec<Notice>>,
  failing: Option<i64>,
}

impl RecordingNotifier {
  pub fn failing_for(recipient: i64) -> Self {
    Self { delivered: Mutex::default(), failing: Some(recipient) }
  }

  pub fn notices(&self) -> Vec<Notice> {
    self.delivered.lock().unwrap().clone()
  }

  fn record(&self, recipient: i64, notice: Notice) -> anyhow::Result<()> {
    if self.failing == Some(recipient) {
      anyhow::bail!("recipient {recipient} blocked the bot");
    }
    self.delivered.lock().unwrap().push(notice);
    Ok(())
  }
}

#[async_trait]
impl Notifier for RecordingNotifier {
  async fn notify_winner(
    &self,
    user_id: i64,
    giveaway: &GiveawayRef,
    place: i32,
    prize: &PrizeInfo,
  ) -> anyhow::Result<()> {
    self.record(
      user_id,
      Notice::Winner {
        user_id,
        giveaway: giveaway.clone(),
        place,
        prize: prize.clone(),
      },
    )
  }

  async fn notify_creator_custom_prizes(
    &self,
    creator_id: i64,
    giveaway: &GiveawayRef,
    winners: &[CustomWin],
  ) -> anyhow::Result<()> {
    self.record(
      creator_id,
      Notice::CustomPrizes {
        creator_id,
        giveaway: giveaway.clone(),
        winners: winners.to_vec(),
      },
    )
  }

  async fn notify_creator_custom_deadline(
    &self,
    creator_id: i64,
    giveaway: &GiveawayRef,
    deadline: DateTime,
  ) -> anyhow::Result<()> {
    self.record(
      creator_id,
      Notice::CustomDeadline {
        creator_id,
        giveaway: giveaway.clone(),
        deadline,
      },
    )
  }
}

pub const CREATOR: i64 = 1;

/// An engine over a fresh database with a manual clock at [`base_time`].
pub struct Fixture {
  pub db: DatabaseConnection,
  pub engine: Arc<Engine>,
  pub clock: Arc<ManualClock>,
  pub verifier: Arc<FakeVerifier>,
  pub shutdown: CancellationToken,
  rx: mpsc::Receiver<Notice>,
}

impl Fixture {
  pub async fn new() -> Self {
    Self::with(EngineConfig::default(), FakeVerifier::default()).await
  }

  pub async fn with(config: EngineConfig, verifier: FakeVerifier) -> Self {
    let db = setup_db().await;
    let clock = Arc::new(ManualClock::new(base_time()));
    let verifier = Arc::new(verifier);
    let shutdown = CancellationToken::new();
    let (outbox, rx) = Outbox::new(64);

    let config = EngineConfig {
      retry_delay: Duration::from_millis(1),
      seed: config.seed.or(Some(7)),
      ..config
    };
    let engine = Engine::new(
      db.clone(),
      verifier.clone(),
      outbox,
      clock.clone(),
      config,
      shutdown.clone(),
    );

    Self { db, engine: Arc::new(engine), clock, verifier, shutdown, rx }
  }

  /// Notices pushed to the outbox so far.
  pub fn notices(&mut self) -> Vec<Notice> {
    let mut notices = Vec::new();
    while let Ok(notice) = self.rx.try_recv() {
      notices.push(notice);
    }
    notices
  }

  /// One hour giveaway starting at [`base_time`].
  pub fn new_giveaway(winners_count: i32) -> sv::NewGiveaway {
    sv::NewGiveaway {
      creator_id: CREATOR,
      title: "Test giveaway".into(),
      description: None,
      started_at: base_time(),
      duration_seconds: 3600,
      max_participants: 0,
      winners_count,
      auto_distribute: false,
      allow_tickets: false,
    }
  }

  /// Creates the giveaway with one internal prize for every place.
  pub async fn giveaway(&self, new: sv::NewGiveaway) -> giveaway::Model {
    let giveaway =
      sv::Giveaway::new(&self.db).create(new, base_time()).await.unwrap();
    self
      .prize(giveaway.id, giveaway_prize::ALL_PLACES, PrizeKind::Internal)
      .await;
    giveaway
  }

  pub async fn prize(
    &self,
    giveaway_id: i64,
    place: i32,
    kind: PrizeKind,
  ) -> i64 {
    let prize = sv::Prize::new(&self.db)
      .create(CREATOR, format!("Prize for place {place}"), base_time())
      .await
      .unwrap();
    sv::Giveaway::new(&self.db)
      .add_prize(giveaway_id, place, prize.id, kind)
      .await
      .unwrap();
    prize.id
  }

  pub async fn requirement(
    &self,
    giveaway_id: i64,
    kind: RequirementKind,
    value: &str,
  ) {
    let (channel, description) = match kind {
      RequirementKind::Custom => (None, Some(value.to_string())),
      _ => (Some(value.to_string()), None),
    };
    sv::Giveaway::new(&self.db)
      .add_requirement(giveaway_id, kind, channel, description)
      .await
      .unwrap();
  }

  /// Joins `users` a minute after start, each with a stored profile.
  pub async fn join(&self, giveaway: &giveaway::Model, users: &[i64]) {
    let joined = base_time() + TimeDelta::minutes(1);
    for &user_id in users {
      sv::User::new(&self.db)
        .upsert(user_id, Some(format!("user{user_id}")), None, joined)
        .await
        .unwrap();
      sv::Entry::new(&self.db).join(giveaway, user_id, joined).await.unwrap();
    }
  }

  pub async fn reload(&self, giveaway_id: i64) -> giveaway::Model {
    sv::Giveaway::new(&self.db).by_id(giveaway_id).await.unwrap().unwrap()
  }

  pub async fn wins(&self, giveaway_id: i64) -> Vec<win::Model> {
    sv::Win::new(&self.db).by_giveaway(giveaway_id).await.unwrap()
  }

  /// Moves the clock past the one hour window.
  pub fn end(&self) {
    self.clock.advance(TimeDelta::hours(1));
  }
}
