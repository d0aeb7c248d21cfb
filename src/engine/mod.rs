//! Giveaway completion engine: discovers elapsed giveaways and drives them
//! through `active -> pending_custom -> completed` exactly once per giveaway.

mod clock;
mod custom;
mod inflight;
mod outbox;
mod require;
mod select;

use std::{
  collections::HashSet,
  str::FromStr,
  sync::{Mutex, MutexGuard, PoisonError},
};

pub use clock::{Clock, SystemClock};
pub use outbox::{
  CustomWin, GiveawayRef, Notice, Notifier, Outbox, Postman, PrizeInfo,
};
use rand::{SeedableRng, rngs::StdRng};
use require::Evaluator;
pub use require::{Requirement, Verifier, VerifyError};
pub use select::Pick;
use serde::{Deserialize, Serialize};
use tokio::{sync::Semaphore, task::JoinHandle};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use uuid::Uuid;

use crate::{
  engine::inflight::InFlight,
  entity::{
    GiveawayStatus, PrizeKind, giveaway, giveaway_prize::ALL_PLACES,
    pre_winner, prize, user,
  },
  prelude::*,
  sv::{self, Acquire},
};

/// What happens to a giveaway that ends without participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyPolicy {
  #[default]
  Cancel,
  Complete,
}

impl FromStr for EmptyPolicy {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "cancel" | "cancelled" => Ok(EmptyPolicy::Cancel),
      "complete" | "completed" => Ok(EmptyPolicy::Complete),
      other => Err(format!("unknown empty policy `{other}`")),
    }
  }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
  pub max_concurrent: usize,
  pub max_attempts: u32,
  /// Delay before attempt `n + 1` is `retry_delay * n`.
  pub retry_delay: Duration,
  pub lock_ttl: Duration,
  pub custom_deadline: Duration,
  pub pre_winners_ttl: Duration,
  pub discovery_batch: u64,
  pub empty_policy: EmptyPolicy,
  pub archive_on_complete: bool,
  pub seed: Option<u64>,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      max_concurrent: 8,
      max_attempts: 3,
      retry_delay: Duration::from_millis(500),
      lock_ttl: Duration::from_secs(60),
      custom_deadline: Duration::from_secs(24 * 3600),
      pre_winners_ttl: Duration::from_secs(24 * 3600),
      discovery_batch: 100,
      empty_policy: EmptyPolicy::Cancel,
      archive_on_complete: false,
      seed: None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Skip {
  /// Another worker of this process holds it.
  InFlight,
  /// Another worker somewhere holds the distributed lock.
  Locked,
  /// Nothing to do any more under the lock, e.g. already completed.
  Stale,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
  Completed { winners: Vec<Pick> },
  /// Moved to `pending_custom`, waiting for the creator.
  Deferred,
  Cancelled,
  Skipped { reason: Skip },
}

/// Totals of one discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
  pub discovered: usize,
  pub completed: usize,
  pub deferred: usize,
  pub cancelled: usize,
  pub skipped: usize,
  pub failed: usize,
}

impl Report {
  fn record(&mut self, result: &Result<Outcome>) {
    match result {
      Ok(Outcome::Completed { .. }) => self.completed += 1,
      Ok(Outcome::Deferred) => self.deferred += 1,
      Ok(Outcome::Cancelled) => self.cancelled += 1,
      Ok(Outcome::Skipped { .. }) => self.skipped += 1,
      Err(_) => self.failed += 1,
    }
  }
}

/// Candidates admitted by one discovery pass.
pub struct Batch {
  pub discovered: usize,
  in_flight: usize,
  handles: Vec<JoinHandle<Result<Outcome>>>,
}

impl Batch {
  pub async fn wait(self) -> Report {
    let mut report = Report {
      discovered: self.discovered,
      skipped: self.in_flight,
      ..Default::default()
    };

    for handle in self.handles {
      match handle.await {
        Ok(result) => report.record(&result),
        Err(err) => {
          error!("Completion worker panicked: {err}");
          report.failed += 1;
        }
      }
    }

    report
  }
}

/// Rows removed by one consistency sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Sweep {
  pub locks: u64,
  pub expired_lists: u64,
  pub settled_lists: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
  /// Whatever the schedule says is due.
  Advance,
  /// Operator-triggered completion from the curated list.
  Curated,
}

pub struct Engine {
  db: DatabaseConnection,
  verifier: Arc<dyn Verifier>,
  outbox: Outbox,
  clock: Arc<dyn Clock>,
  config: EngineConfig,
  inflight: InFlight,
  permits: Arc<Semaphore>,
  rng: Mutex<StdRng>,
  tracker: TaskTracker,
  shutdown: CancellationToken,
}

impl Engine {
  pub fn new(
    db: DatabaseConnection,
    verifier: Arc<dyn Verifier>,
    outbox: Outbox,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    shutdown: CancellationToken,
  ) -> Self {
    let rng = match config.seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_os_rng(),
    };

    Self {
      db,
      verifier,
      outbox,
      clock,
      permits: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
      config,
      inflight: InFlight::default(),
      rng: Mutex::new(rng),
      tracker: TaskTracker::new(),
      shutdown,
    }
  }

  pub fn now(&self) -> DateTime {
    self.clock.now()
  }

  /// One discovery pass. Every admitted candidate runs on the worker pool;
  /// the returned batch can be awaited for a report or simply dropped.
  pub async fn dispatch(self: &Arc<Self>) -> Result<Batch> {
    let now = self.clock.now();
    let limit = self.config.discovery_batch;
    let cutoff = now - utils::delta(self.config.custom_deadline);

    let candidates = tokio::select! {
      biased;
      _ = self.shutdown.cancelled() => Vec::new(),
      ids = self.candidates(now, cutoff, limit) => ids?,
    };

    let mut batch = Batch {
      discovered: candidates.len(),
      in_flight: 0,
      handles: Vec::with_capacity(candidates.len()),
    };

    for id in candidates {
      let Some(claim) = self.inflight.claim(id) else {
        debug!("Giveaway {id} already in flight, skipping");
        batch.in_flight += 1;
        continue;
      };

      let permit = tokio::select! {
        biased;
        _ = self.shutdown.cancelled() => break,
        permit = self.permits.clone().acquire_owned() => match permit {
          Ok(permit) => permit,
          Err(_) => break,
        },
      };

      let engine = self.clone();
      batch.handles.push(self.tracker.spawn(async move {
        let _claim = claim;
        let _permit = permit;
        engine.process(id).await
      }));
    }

    Ok(batch)
  }

  async fn candidates(
    &self,
    now: DateTime,
    cutoff: DateTime,
    limit: u64,
  ) -> Result<Vec<i64>> {
    let giveaways = sv::Giveaway::new(&self.db);
    let mut ids = giveaways.expired(now, limit).await?;
    ids.extend(giveaways.overdue(cutoff, limit).await?);
    Ok(ids)
  }

  /// Discovery pass that waits for every admitted candidate.
  pub async fn force_process_expired(self: &Arc<Self>) -> Result<Report> {
    let report = self.dispatch().await?.wait().await;
    info!(
      "Forced pass: {} discovered, {} completed, {} deferred, {} failed",
      report.discovered, report.completed, report.deferred, report.failed
    );
    Ok(report)
  }

  /// Advances one giveaway if it is due, retrying transient failures.
  pub async fn process(&self, id: i64) -> Result<Outcome> {
    self.run(id, Action::Advance).await
  }

  async fn run(&self, id: i64, action: Action) -> Result<Outcome> {
    let mut attempt = 1;
    loop {
      match self.attempt(id, action).await {
        Ok(outcome) => {
          debug!("Giveaway {id}: attempt {attempt} -> {outcome:?}");
          return Ok(outcome);
        }
        Err(err) if err.is_retryable() && attempt < self.config.max_attempts => {
          warn!("Giveaway {id}: attempt {attempt} failed: {err}, retrying");
          let delay = self.config.retry_delay * attempt;
          tokio::select! {
            _ = self.shutdown.cancelled() => return Err(err),
            _ = time::sleep(delay) => {}
          }
          attempt += 1;
        }
        Err(err) => {
          error!("Giveaway {id}: attempt {attempt} failed: {err}");
          return Err(err);
        }
      }
    }
  }

  async fn attempt(&self, id: i64, action: Action) -> Result<Outcome> {
    let key = format!("giveaway:{id}");
    let owner = Uuid::new_v4().to_string();
    let lock = sv::Lock::new(&self.db);
    let ttl = utils::delta(self.config.lock_ttl);

    if lock.acquire(&key, &owner, ttl, self.clock.now()).await? == Acquire::Held
    {
      debug!("Giveaway {id} locked by another worker");
      return Ok(Outcome::Skipped { reason: Skip::Locked });
    }

    let result = self.run_locked(id, action).await;

    if let Err(err) = lock.release(&key, &owner).await {
      warn!("Failed to release lock `{key}`: {err}");
    }

    let (outcome, notices) = result?;
    for notice in notices {
      self.outbox.push(notice);
    }
    Ok(outcome)
  }

  async fn run_locked(
    &self,
    id: i64,
    action: Action,
  ) -> Result<(Outcome, Vec<Notice>)> {
    let txn = self.db.begin().await?;
    let giveaway = sv::Giveaway::new(&txn)
      .for_update(id)
      .await?
      .ok_or(Error::GiveawayNotFound(id))?;

    let now = self.clock.now();
    let mut notices = Vec::new();
    let outcome = match action {
      Action::Advance => self.advance(&txn, giveaway, now, &mut notices).await?,
      Action::Curated => {
        self.complete_curated(&txn, giveaway, now, &mut notices).await?
      }
    };

    if let Outcome::Skipped { .. } = outcome {
      txn.rollback().await?;
      return Ok((outcome, Vec::new()));
    }

    txn.commit().await?;
    Ok((outcome, notices))
  }

  async fn advance(
    &self,
    txn: &DatabaseTransaction,
    giveaway: giveaway::Model,
    now: DateTime,
    notices: &mut Vec<Notice>,
  ) -> Result<Outcome> {
    let deadline = giveaway.updated_at + utils::delta(self.config.custom_deadline);

    match giveaway.status {
      GiveawayStatus::Active if giveaway.has_ended(now) => {
        self.expire(txn, giveaway, now, notices).await
      }
      GiveawayStatus::PendingCustom if deadline <= now => {
        info!(
          "Giveaway {}: curation deadline passed, drawing without custom \
           requirements",
          giveaway.id
        );
        let requirements = requirements(txn, giveaway.id).await?;
        self.complete(txn, giveaway, &requirements, &[], now, notices).await
      }
      _ => Ok(Outcome::Skipped { reason: Skip::Stale }),
    }
  }

  async fn expire(
    &self,
    txn: &DatabaseTransaction,
    giveaway: giveaway::Model,
    now: DateTime,
    notices: &mut Vec<Notice>,
  ) -> Result<Outcome> {
    let requirements = requirements(txn, giveaway.id).await?;

    if requirements.iter().any(Requirement::is_custom) {
      let giveaway = sv::Giveaway::new(txn)
        .transition(giveaway, GiveawayStatus::PendingCustom, now)
        .await?;

      info!("Giveaway {}: waiting for curated winners", giveaway.id);
      notices.push(Notice::CustomDeadline {
        creator_id: giveaway.creator_id,
        giveaway: GiveawayRef::from(&giveaway),
        deadline: now + utils::delta(self.config.custom_deadline),
      });
      return Ok(Outcome::Deferred);
    }

    self.complete(txn, giveaway, &requirements, &[], now, notices).await
  }

  async fn complete_curated(
    &self,
    txn: &DatabaseTransaction,
    giveaway: giveaway::Model,
    now: DateTime,
    notices: &mut Vec<Notice>,
  ) -> Result<Outcome> {
    let ready = match giveaway.status {
      GiveawayStatus::PendingCustom => true,
      GiveawayStatus::Active => giveaway.has_ended(now),
      _ => false,
    };
    if !ready {
      return Err(Error::Validation(format!(
        "giveaway {} is {:?} and cannot be completed now",
        giveaway.id, giveaway.status
      )));
    }

    let curated = sv::PreWinner::new(txn).get(giveaway.id, now).await?;
    if curated.is_empty() {
      return Err(Error::Validation(format!(
        "giveaway {} has no pre-winner list",
        giveaway.id
      )));
    }

    let requirements = requirements(txn, giveaway.id).await?;
    self.complete(txn, giveaway, &requirements, &curated, now, notices).await
  }

  /// Draws winners, records wins and closes the giveaway. Curated users go
  /// first, the rest is drawn from eligible participants.
  async fn complete(
    &self,
    txn: &DatabaseTransaction,
    giveaway: giveaway::Model,
    requirements: &[Requirement],
    curated: &[pre_winner::Model],
    now: DateTime,
    notices: &mut Vec<Notice>,
  ) -> Result<Outcome> {
    let participants = sv::Entry::new(txn).participants(giveaway.id).await?;
    if participants.is_empty() {
      return self.settle_empty(txn, giveaway, now).await;
    }

    let wanted = (giveaway.winners_count.max(1) as usize).min(participants.len());
    let members: HashSet<i64> = participants.iter().copied().collect();
    let profiles = sv::User::new(txn).by_ids(&participants).await?;
    let evaluator = Evaluator::new(self.verifier.as_ref(), requirements);

    let mut chosen = Vec::with_capacity(wanted);
    for entry in curated {
      if chosen.len() == wanted {
        break;
      }
      if members.contains(&entry.user_id) && !chosen.contains(&entry.user_id) {
        chosen.push(entry.user_id);
      }
    }

    let rest = wanted - chosen.len();
    if rest > 0 {
      let drawn = if curated.is_empty() && giveaway.allow_tickets {
        self.draw_weighted(txn, &giveaway, &members, &profiles, &evaluator, rest)
          .await?
      } else {
        let pool: Vec<i64> = participants
          .iter()
          .filter(|user| !chosen.contains(user))
          .copied()
          .collect();
        self.draw_uniform(&giveaway, &pool, &profiles, &evaluator, rest).await?
      };
      chosen.extend(drawn);
    }

    let picks = select::places(&chosen, 1);
    self.award(txn, &giveaway, &picks, now, notices).await?;

    let status = if self.config.archive_on_complete {
      GiveawayStatus::History
    } else {
      GiveawayStatus::Completed
    };
    let giveaway = sv::Giveaway::new(txn)
      .finish(giveaway, status, wanted as i32, now)
      .await?;
    sv::PreWinner::new(txn).delete(giveaway.id).await?;

    info!(
      "Giveaway {}: completed with {} winner(s) out of {} participant(s)",
      giveaway.id,
      picks.len(),
      participants.len()
    );
    Ok(Outcome::Completed { winners: picks })
  }

  async fn settle_empty(
    &self,
    txn: &DatabaseTransaction,
    giveaway: giveaway::Model,
    now: DateTime,
  ) -> Result<Outcome> {
    let id = giveaway.id;
    let (status, outcome) = match self.config.empty_policy {
      EmptyPolicy::Cancel => (GiveawayStatus::Cancelled, Outcome::Cancelled),
      EmptyPolicy::Complete if self.config.archive_on_complete => (
        GiveawayStatus::History,
        Outcome::Completed { winners: Vec::new() },
      ),
      EmptyPolicy::Complete => (
        GiveawayStatus::Completed,
        Outcome::Completed { winners: Vec::new() },
      ),
    };

    sv::Giveaway::new(txn).transition(giveaway, status, now).await?;
    sv::PreWinner::new(txn).delete(id).await?;

    info!("Giveaway {id}: ended without participants, now {status:?}");
    Ok(outcome)
  }

  /// Walks a fresh shuffle and keeps the first `count` eligible users.
  async fn draw_uniform(
    &self,
    giveaway: &giveaway::Model,
    pool: &[i64],
    profiles: &HashMap<i64, user::Model>,
    evaluator: &Evaluator<'_>,
    count: usize,
  ) -> Result<Vec<i64>> {
    let order = select::shuffled(pool, &mut *self.rng());

    let mut winners = Vec::with_capacity(count);
    for user_id in order {
      if winners.len() == count {
        break;
      }
      if !profiles.contains_key(&user_id) {
        warn!(
          "Giveaway {}: no profile for participant {user_id}, dropping",
          giveaway.id
        );
        continue;
      }
      if evaluator.eligible(user_id).await? {
        winners.push(user_id);
      }
    }

    Ok(winners)
  }

  /// Ticket-weighted draw over eligible participants holding tickets.
  async fn draw_weighted(
    &self,
    txn: &DatabaseTransaction,
    giveaway: &giveaway::Model,
    members: &HashSet<i64>,
    profiles: &HashMap<i64, user::Model>,
    evaluator: &Evaluator<'_>,
    count: usize,
  ) -> Result<Vec<i64>> {
    let tickets = sv::Entry::new(txn).tickets(giveaway.id).await?;

    let mut pool = Vec::with_capacity(tickets.len());
    for ticket in tickets {
      if ticket.count <= 0 || !members.contains(&ticket.user_id) {
        continue;
      }
      if !profiles.contains_key(&ticket.user_id) {
        warn!(
          "Giveaway {}: no profile for ticket holder {}, dropping",
          giveaway.id, ticket.user_id
        );
        continue;
      }
      if evaluator.eligible(ticket.user_id).await? {
        pool.push((ticket.user_id, ticket.count as u64));
      }
    }

    Ok(select::weighted(&pool, count, &mut *self.rng()))
  }

  /// Creates a win per pick and hands out internal prizes when asked to.
  async fn award(
    &self,
    txn: &DatabaseTransaction,
    giveaway: &giveaway::Model,
    picks: &[Pick],
    now: DateTime,
    notices: &mut Vec<Notice>,
  ) -> Result<()> {
    if picks.is_empty() {
      return Ok(());
    }

    let slots = sv::Giveaway::new(txn).prize_slots(giveaway.id).await?;
    let reference = GiveawayRef::from(giveaway);
    let wins = sv::Win::new(txn);
    let mut prizes: HashMap<i64, prize::Model> = HashMap::new();
    let mut custom = Vec::new();

    for pick in picks {
      let slot = slots
        .iter()
        .find(|slot| slot.place == pick.place)
        .or_else(|| slots.iter().find(|slot| slot.place == ALL_PLACES))
        .ok_or_else(|| {
          Error::InvalidData(format!(
            "giveaway {} has no prize for place {}",
            giveaway.id, pick.place
          ))
        })?;

      let prize = match prizes.get(&slot.prize_id) {
        Some(prize) => prize.clone(),
        None => {
          let prize = sv::Prize::new(txn)
            .by_id(slot.prize_id)
            .await?
            .ok_or(Error::PrizeNotFound(slot.prize_id))?;
          prizes.insert(prize.id, prize.clone());
          prize
        }
      };

      let win =
        wins.create(giveaway.id, pick.user_id, prize.id, pick.place, now).await?;

      let mut distributed = false;
      if slot.prize_type == PrizeKind::Internal && giveaway.auto_distribute {
        match wins.distribute(win, giveaway.creator_id, now).await {
          Ok(_) => distributed = true,
          Err(err) => warn!(
            "Giveaway {}: failed to distribute prize {} to {}: {err}",
            giveaway.id, prize.id, pick.user_id
          ),
        }
      }

      let info = PrizeInfo {
        id: prize.id,
        name: prize.name,
        kind: slot.prize_type,
        distributed,
      };
      if slot.prize_type == PrizeKind::Custom {
        custom.push(CustomWin {
          user_id: pick.user_id,
          place: pick.place,
          prize: info.clone(),
        });
      }
      notices.push(Notice::Winner {
        user_id: pick.user_id,
        giveaway: reference.clone(),
        place: pick.place,
        prize: info,
      });
    }

    if !custom.is_empty() {
      notices.push(Notice::CustomPrizes {
        creator_id: giveaway.creator_id,
        giveaway: reference,
        winners: custom,
      });
    }

    Ok(())
  }

  /// Consistency sweep: stale locks and pre-winner lists nobody can use.
  pub async fn sweep(&self) -> Result<Sweep> {
    let now = self.clock.now();
    let pre_winners = sv::PreWinner::new(&self.db);

    let sweep = Sweep {
      locks: sv::Lock::new(&self.db).purge_expired(now).await?,
      expired_lists: pre_winners.purge_expired(now).await?,
      settled_lists: pre_winners.purge_settled().await?,
    };

    if sweep != Sweep::default() {
      info!(
        "Sweep removed {} lock(s), {} expired and {} settled pre-winner row(s)",
        sweep.locks, sweep.expired_lists, sweep.settled_lists
      );
    }
    Ok(sweep)
  }

  pub async fn archive(&self, id: i64) -> Result<giveaway::Model> {
    sv::Giveaway::new(&self.db).archive(id, self.clock.now()).await
  }

  /// Waits for every admitted completion to finish.
  pub async fn drain(&self) {
    self.tracker.close();
    self.tracker.wait().await;
  }

  fn rng(&self) -> MutexGuard<'_, StdRng> {
    self.rng.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl From<&giveaway::Model> for GiveawayRef {
  fn from(giveaway: &giveaway::Model) -> Self {
    Self { id: giveaway.id, title: giveaway.title.clone() }
  }
}

async fn requirements<C: ConnectionTrait>(
  conn: &C,
  giveaway_id: i64,
) -> Result<Vec<Requirement>> {
  sv::Giveaway::new(conn)
    .requirements(giveaway_id)
    .await?
    .into_iter()
    .map(Requirement::try_from)
    .collect()
}
