//! Post-commit notification queue. The engine only enqueues; delivery runs
//! on a separate bounded pool and its failures are logged, never retried.

use serde::Serialize;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{entity::PrizeKind, prelude::*};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GiveawayRef {
  pub id: i64,
  pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrizeInfo {
  pub id: i64,
  pub name: String,
  pub kind: PrizeKind,
  pub distributed: bool,
}

/// A custom prize the creator must hand over personally.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomWin {
  pub user_id: i64,
  pub place: i32,
  pub prize: PrizeInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
  Winner {
    user_id: i64,
    giveaway: GiveawayRef,
    place: i32,
    prize: PrizeInfo,
  },
  CustomPrizes {
    creator_id: i64,
    giveaway: GiveawayRef,
    winners: Vec<CustomWin>,
  },
  CustomDeadline {
    creator_id: i64,
    giveaway: GiveawayRef,
    deadline: DateTime,
  },
}

#[async_trait]
pub trait Notifier: Send + Sync {
  async fn notify_winner(
    &self,
    user_id: i64,
    giveaway: &GiveawayRef,
    place: i32,
    prize: &PrizeInfo,
  ) -> anyhow::Result<()>;

  async fn notify_creator_custom_prizes(
    &self,
    creator_id: i64,
    giveaway: &GiveawayRef,
    winners: &[CustomWin],
  ) -> anyhow::Result<()>;

  async fn notify_creator_custom_deadline(
    &self,
    creator_id: i64,
    giveaway: &GiveawayRef,
    deadline: DateTime,
  ) -> anyhow::Result<()>;
}

impl Notice {
  pub async fn deliver(&self, notifier: &dyn Notifier) -> anyhow::Result<()> {
    match self {
      Notice::Winner { user_id, giveaway, place, prize } => {
        notifier.notify_winner(*user_id, giveaway, *place, prize).await
      }
      Notice::CustomPrizes { creator_id, giveaway, winners } => {
        notifier
          .notify_creator_custom_prizes(*creator_id, giveaway, winners)
          .await
      }
      Notice::CustomDeadline { creator_id, giveaway, deadline } => {
        notifier
          .notify_creator_custom_deadline(*creator_id, giveaway, *deadline)
          .await
      }
    }
  }

  fn giveaway(&self) -> i64 {
    match self {
      Notice::Winner { giveaway, .. }
      | Notice::CustomPrizes { giveaway, .. }
      | Notice::CustomDeadline { giveaway, .. } => giveaway.id,
    }
  }
}

/// Producer side of the queue.
#[derive(Clone)]
pub struct Outbox {
  tx: mpsc::Sender<Notice>,
}

impl Outbox {
  pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Notice>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Self { tx }, rx)
  }

  /// Never waits: a full or closed queue drops the notice with a warning.
  pub fn push(&self, notice: Notice) {
    match self.tx.try_send(notice) {
      Ok(()) => {}
      Err(mpsc::error::TrySendError::Full(notice)) => {
        warn!(
          "Outbox full, dropping notice for giveaway {}",
          notice.giveaway()
        );
      }
      Err(mpsc::error::TrySendError::Closed(notice)) => {
        warn!(
          "Outbox closed, dropping notice for giveaway {}",
          notice.giveaway()
        );
      }
    }
  }
}

/// Consumer side: delivers notices with at most `workers` in flight.
pub struct Postman {
  rx: mpsc::Receiver<Notice>,
  notifier: Arc<dyn Notifier>,
  workers: usize,
}

impl Postman {
  pub fn new(
    rx: mpsc::Receiver<Notice>,
    notifier: Arc<dyn Notifier>,
    workers: usize,
  ) -> Self {
    Self { rx, notifier, workers: workers.max(1) }
  }

  /// Runs until `stop` fires or every sender is gone, then delivers what is
  /// already queued.
  pub async fn run(mut self, stop: CancellationToken) {
    let permits = Arc::new(Semaphore::new(self.workers));
    let tracker = TaskTracker::new();

    loop {
      let notice = tokio::select! {
        notice = self.rx.recv() => notice,
        _ = stop.cancelled() => break,
      };
      let Some(notice) = notice else { break };
      self.dispatch(notice, &permits, &tracker).await;
    }

    self.rx.close();
    while let Some(notice) = self.rx.recv().await {
      self.dispatch(notice, &permits, &tracker).await;
    }

    tracker.close();
    tracker.wait().await;
    debug!("Outbox drained");
  }

  async fn dispatch(
    &self,
    notice: Notice,
    permits: &Arc<Semaphore>,
    tracker: &TaskTracker,
  ) {
    let Ok(permit) = permits.clone().acquire_owned().await else { return };
    let notifier = self.notifier.clone();

    tracker.spawn(async move {
      let _permit = permit;
      if let Err(err) = notice.deliver(notifier.as_ref()).await {
        warn!(
          "Failed to deliver notice for giveaway {}: {err:#}",
          notice.giveaway()
        );
      }
    });
  }
}
