//! Telegram side of the engine: membership and boost checks for
//! requirements, HTML direct messages for notices.

use teloxide::{
  ApiError, Bot, RequestError,
  prelude::*,
  types::{ParseMode, Recipient, UserId},
  utils::html,
};

use crate::{
  engine::{CustomWin, GiveawayRef, Notifier, PrizeInfo, Verifier, VerifyError},
  entity::PrizeKind,
  prelude::*,
};

#[derive(Clone)]
pub struct Telegram {
  bot: Bot,
}

impl Telegram {
  pub fn new(bot: Bot) -> Self {
    Self { bot }
  }

  /// Sends `text` split into as many messages as the API limit requires.
  async fn send_html(&self, user_id: i64, text: String) -> ResponseResult<()> {
    for chunk in utils::chunk_message(&text, 0) {
      self
        .bot
        .send_message(ChatId(user_id), chunk)
        .parse_mode(ParseMode::Html)
        .await?;
    }
    Ok(())
  }
}

/// `@username`, bare username or numeric chat id of a channel.
pub fn recipient(channel: &str) -> Recipient {
  let channel = channel.trim();
  match channel.parse::<i64>() {
    Ok(id) => Recipient::Id(ChatId(id)),
    Err(_) if channel.starts_with('@') => {
      Recipient::ChannelUsername(channel.to_string())
    }
    Err(_) => Recipient::ChannelUsername(format!("@{channel}")),
  }
}

/// Only errors about the checked user say anything about that user. Channel,
/// bot and transport failures defer the draw instead of failing everyone.
pub fn classify(err: RequestError) -> VerifyError {
  match err {
    RequestError::RetryAfter(_) => VerifyError::RateLimited,
    RequestError::Api(
      api @ (ApiError::UserNotFound | ApiError::UserDeactivated),
    ) => VerifyError::Rejected(api.to_string()),
    other => VerifyError::Unavailable(other.to_string()),
  }
}

#[async_trait]
impl Verifier for Telegram {
  async fn check_subscription(
    &self,
    user_id: i64,
    channel: &str,
  ) -> Result<bool, VerifyError> {
    let member = self
      .bot
      .get_chat_member(recipient(channel), UserId(user_id as u64))
      .await
      .map_err(classify)?;
    Ok(member.is_present())
  }

  async fn check_boost(
    &self,
    user_id: i64,
    channel: &str,
  ) -> Result<bool, VerifyError> {
    let boosts = self
      .bot
      .get_user_chat_boosts(recipient(channel), UserId(user_id as u64))
      .await
      .map_err(classify)?;
    Ok(!boosts.boosts.is_empty())
  }
}

fn prize_line(prize: &PrizeInfo) -> String {
  let name = html::escape(&prize.name);
  match prize.kind {
    PrizeKind::Internal if prize.distributed => {
      format!("{name} (already credited to your account)")
    }
    PrizeKind::Custom => format!("{name} (the creator will contact you)"),
    _ => name,
  }
}

fn winner_text(giveaway: &GiveawayRef, place: i32, prize: &PrizeInfo) -> String {
  format!(
    "🎉 <b>You won!</b>\n\nGiveaway: <b>{}</b>\nPlace: {place}\nPrize: {}",
    html::escape(&giveaway.title),
    prize_line(prize)
  )
}

fn custom_prizes_text(giveaway: &GiveawayRef, winners: &[CustomWin]) -> String {
  let mut text = format!(
    "🎁 <b>Prizes to hand over</b>\n\nGiveaway <b>{}</b> finished. These \
     winners are waiting for you:\n",
    html::escape(&giveaway.title)
  );
  for win in winners {
    text.push_str(&format!(
      "\n{}. {} - {}",
      win.place,
      utils::mention(win.user_id, None),
      html::escape(&win.prize.name)
    ));
  }
  text
}

fn deadline_text(giveaway: &GiveawayRef, deadline: DateTime) -> String {
  format!(
    "⏳ <b>Giveaway ended</b>\n\n<b>{}</b> has a custom requirement. Upload \
     the winners who met it before {} UTC, otherwise winners are drawn \
     at random from everyone else who qualifies.",
    html::escape(&giveaway.title),
    utils::format_date(deadline)
  )
}

#[async_trait]
impl Notifier for Telegram {
  async fn notify_winner(
    &self,
    user_id: i64,
    giveaway: &GiveawayRef,
    place: i32,
    prize: &PrizeInfo,
  ) -> anyhow::Result<()> {
    self
      .send_html(user_id, winner_text(giveaway, place, prize))
      .await
      .with_context(|| format!("Failed to notify winner {user_id}"))
  }

  async fn notify_creator_custom_prizes(
    &self,
    creator_id: i64,
    giveaway: &GiveawayRef,
    winners: &[CustomWin],
  ) -> anyhow::Result<()> {
    self
      .send_html(creator_id, custom_prizes_text(giveaway, winners))
      .await
      .with_context(|| format!("Failed to notify creator {creator_id}"))
  }

  async fn notify_creator_custom_deadline(
    &self,
    creator_id: i64,
    giveaway: &GiveawayRef,
    deadline: DateTime,
  ) -> anyhow::Result<()> {
    self
      .send_html(creator_id, deadline_text(giveaway, deadline))
      .await
      .with_context(|| format!("Failed to notify creator {creator_id}"))
  }
}

#[cfg(test)]
mod tests {
  use teloxide::types::Seconds;

  use super::*;
  use crate::testing::base_time;

  fn giveaway() -> GiveawayRef {
    GiveawayRef { id: 3, title: "Cats & <Dogs>".into() }
  }

  fn prize(kind: PrizeKind, distributed: bool) -> PrizeInfo {
    PrizeInfo { id: 1, name: "Gift".into(), kind, distributed }
  }

  #[test]
  fn test_recipient_forms() {
    assert_eq!(recipient("@news"), Recipient::ChannelUsername("@news".into()));
    assert_eq!(recipient("news"), Recipient::ChannelUsername("@news".into()));
    assert_eq!(
      recipient("-1001234567890"),
      Recipient::Id(ChatId(-1001234567890))
    );
  }

  #[test]
  fn test_classify_errors() {
    assert_eq!(
      classify(RequestError::RetryAfter(Seconds::from_seconds(3))),
      VerifyError::RateLimited
    );
    assert!(matches!(
      classify(RequestError::Api(ApiError::UserNotFound)),
      VerifyError::Rejected(_)
    ));
  }

  #[test]
  fn test_channel_errors_defer() {
    for err in [
      ApiError::ChatNotFound,
      ApiError::BotKicked,
      ApiError::Unknown("Bad Request: member list is inaccessible".into()),
    ] {
      assert!(matches!(
        classify(RequestError::Api(err)),
        VerifyError::Unavailable(_)
      ));
    }
  }

  #[test]
  fn test_texts_escape_titles() {
    let text = winner_text(&giveaway(), 2, &prize(PrizeKind::Internal, true));
    assert!(text.contains("Cats &amp; &lt;Dogs&gt;"));
    assert!(text.contains("Place: 2"));
    assert!(text.contains("already credited"));

    let text = deadline_text(&giveaway(), base_time());
    assert!(text.contains("01.09.2026 12:00"));
  }

  #[test]
  fn test_custom_prizes_list_every_winner() {
    let winners = [
      CustomWin { user_id: 10, place: 1, prize: prize(PrizeKind::Custom, false) },
      CustomWin { user_id: 11, place: 3, prize: prize(PrizeKind::Custom, false) },
    ];
    let text = custom_prizes_text(&giveaway(), &winners);

    assert!(text.contains("\n1. <a href=\"tg://user?id=10\">10</a> - Gift"));
    assert!(text.contains("\n3. <a href=\"tg://user?id=11\">11</a> - Gift"));
  }
}
