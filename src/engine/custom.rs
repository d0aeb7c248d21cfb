//! Creator curation of giveaways with custom requirements.

use std::collections::HashSet;

use super::{Action, Engine, Evaluator, Outcome, Skip, requirements};
use crate::{
  entity::{GiveawayStatus, pre_winner},
  prelude::*,
  sv::{self, Candidate},
};

impl Engine {
  /// Validates and stores the creator's winner list, replacing any previous
  /// upload. Every user must be a participant meeting all automatic
  /// requirements.
  pub async fn submit_pre_winner_list(
    &self,
    giveaway_id: i64,
    user_ids: &[i64],
  ) -> Result<Vec<pre_winner::Model>> {
    let now = self.clock.now();
    let giveaway = sv::Giveaway::new(&self.db)
      .by_id(giveaway_id)
      .await?
      .ok_or(Error::GiveawayNotFound(giveaway_id))?;

    let open = match giveaway.status {
      GiveawayStatus::PendingCustom => true,
      GiveawayStatus::Active => giveaway.has_ended(now),
      _ => false,
    };
    if !open {
      return Err(Error::Validation(format!(
        "giveaway {giveaway_id} does not accept a pre-winner list now"
      )));
    }

    let requirements = requirements(&self.db, giveaway_id).await?;
    if !requirements.iter().any(|requirement| requirement.is_custom()) {
      return Err(Error::Validation(format!(
        "giveaway {giveaway_id} has no custom requirement"
      )));
    }

    let mut seen = HashSet::new();
    let user_ids: Vec<i64> =
      user_ids.iter().copied().filter(|user| seen.insert(*user)).collect();
    if user_ids.is_empty() {
      return Err(Error::Validation("pre-winner list is empty".into()));
    }
    if user_ids.len() > giveaway.winners_count as usize {
      return Err(Error::Validation(format!(
        "pre-winner list has {} users, giveaway has {} winner(s)",
        user_ids.len(),
        giveaway.winners_count
      )));
    }

    let entries = sv::Entry::new(&self.db);
    let evaluator = Evaluator::new(self.verifier.as_ref(), &requirements);
    for &user_id in &user_ids {
      if !entries.is_participant(giveaway_id, user_id).await? {
        return Err(Error::Validation(format!(
          "user {user_id} is not a participant"
        )));
      }
      if !evaluator.eligible(user_id).await? {
        return Err(Error::Validation(format!(
          "user {user_id} does not meet the giveaway requirements"
        )));
      }
    }

    let mut profiles = sv::User::new(&self.db).by_ids(&user_ids).await?;
    let candidates: Vec<Candidate> = user_ids
      .iter()
      .map(|&user_id| {
        let profile = profiles.remove(&user_id);
        Candidate {
          user_id,
          username: profile.as_ref().and_then(|user| user.username.clone()),
          avatar: profile.and_then(|user| user.avatar),
        }
      })
      .collect();

    let expires_at = now + utils::delta(self.config.pre_winners_ttl);
    let txn = self.db.begin().await?;
    sv::PreWinner::new(&txn)
      .replace(giveaway_id, &candidates, expires_at)
      .await?;
    txn.commit().await?;

    info!(
      "Giveaway {giveaway_id}: stored {} pre-winner(s) until {}",
      candidates.len(),
      utils::format_date(expires_at)
    );
    sv::PreWinner::new(&self.db).get(giveaway_id, now).await
  }

  /// Operator-triggered completion from the stored pre-winner list, topped
  /// up with random eligible participants.
  pub async fn complete_with_custom_requirements(
    &self,
    giveaway_id: i64,
  ) -> Result<Outcome> {
    let Some(_claim) = self.inflight.claim(giveaway_id) else {
      return Err(Error::Busy(giveaway_id));
    };

    match self.run(giveaway_id, Action::Curated).await? {
      Outcome::Skipped { reason: Skip::Locked } => Err(Error::Busy(giveaway_id)),
      outcome => Ok(outcome),
    }
  }
}
