//! Participation requirements and their automatic verification.

use futures::future::BoxFuture;
use thiserror::Error;

use crate::{
  entity::{RequirementKind, requirement},
  prelude::*,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
  Subscription { channel: String },
  Boost { channel: String },
  /// Judged by the creator only, never verified automatically.
  Custom { description: String },
}

impl Requirement {
  /// The automatic check behind this requirement, `None` for custom ones.
  pub fn check(&self) -> Option<Check> {
    let (kind, channel) = match self {
      Requirement::Subscription { channel } => (CheckKind::Subscription, channel),
      Requirement::Boost { channel } => (CheckKind::Boost, channel),
      Requirement::Custom { .. } => return None,
    };
    Some(Check { kind, channel: channel.clone() })
  }

  pub fn is_custom(&self) -> bool {
    matches!(self, Requirement::Custom { .. })
  }
}

impl TryFrom<requirement::Model> for Requirement {
  type Error = Error;

  fn try_from(model: requirement::Model) -> Result<Self> {
    let missing = |what: &str| {
      Error::InvalidData(format!("requirement {} has no {what}", model.id))
    };

    Ok(match model.kind {
      RequirementKind::Subscription => Requirement::Subscription {
        channel: model.channel.clone().ok_or_else(|| missing("channel"))?,
      },
      RequirementKind::Boost => Requirement::Boost {
        channel: model.channel.clone().ok_or_else(|| missing("channel"))?,
      },
      RequirementKind::Custom => Requirement::Custom {
        description: model.description.clone().unwrap_or_default(),
      },
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckKind {
  Subscription,
  Boost,
}

/// An automatically verifiable requirement. Only obtainable through
/// [`Requirement::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
  kind: CheckKind,
  channel: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerifyError {
  /// Upstream throttling; the check is skipped, not failed.
  #[error("rate limited")]
  RateLimited,
  #[error("verification unavailable: {0}")]
  Unavailable(String),
  /// Upstream refused to answer for this user or channel.
  #[error("verification rejected: {0}")]
  Rejected(String),
}

#[async_trait]
pub trait Verifier: Send + Sync {
  async fn check_subscription(
    &self,
    user_id: i64,
    channel: &str,
  ) -> Result<bool, VerifyError>;

  async fn check_boost(
    &self,
    user_id: i64,
    channel: &str,
  ) -> Result<bool, VerifyError>;
}

type Verify = for<'a> fn(
  &'a dyn Verifier,
  i64,
  &'a str,
) -> BoxFuture<'a, Result<bool, VerifyError>>;

fn subscription<'a>(
  verifier: &'a dyn Verifier,
  user_id: i64,
  channel: &'a str,
) -> BoxFuture<'a, Result<bool, VerifyError>> {
  verifier.check_subscription(user_id, channel)
}

fn boost<'a>(
  verifier: &'a dyn Verifier,
  user_id: i64,
  channel: &'a str,
) -> BoxFuture<'a, Result<bool, VerifyError>> {
  verifier.check_boost(user_id, channel)
}

impl CheckKind {
  fn verify(self) -> Verify {
    match self {
      CheckKind::Subscription => subscription,
      CheckKind::Boost => boost,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
  Met,
  NotMet,
  /// Rate limited, treated as met.
  Skipped,
}

/// Evaluates the automatic requirements of one giveaway for any user.
pub struct Evaluator<'a> {
  verifier: &'a dyn Verifier,
  checks: Vec<Check>,
}

impl<'a> Evaluator<'a> {
  pub fn new(verifier: &'a dyn Verifier, requirements: &[Requirement]) -> Self {
    let checks = requirements.iter().filter_map(Requirement::check).collect();
    Self { verifier, checks }
  }

  pub async fn evaluate(&self, check: &Check, user_id: i64) -> Result<Verdict> {
    let verify = check.kind.verify();
    match verify(self.verifier, user_id, &check.channel).await {
      Ok(true) => Ok(Verdict::Met),
      Ok(false) => Ok(Verdict::NotMet),
      Err(VerifyError::RateLimited) => {
        debug!(
          "{:?} check of user {user_id} in {} rate limited, skipping",
          check.kind, check.channel
        );
        Ok(Verdict::Skipped)
      }
      Err(VerifyError::Rejected(reason)) => {
        debug!("{:?} check of user {user_id} rejected: {reason}", check.kind);
        Ok(Verdict::NotMet)
      }
      Err(VerifyError::Unavailable(reason)) => Err(Error::Verification(reason)),
    }
  }

  /// True unless some check is definitely not met. No checks means eligible.
  pub async fn eligible(&self, user_id: i64) -> Result<bool> {
    for check in &self.checks {
      if self.evaluate(check, user_id).await? == Verdict::NotMet {
        return Ok(false);
      }
    }
    Ok(true)
  }
}
