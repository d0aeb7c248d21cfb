use teloxide::utils::html;

use crate::prelude::*;

pub fn format_date(date: DateTime) -> String {
  date.format("%d.%m.%Y %H:%M").to_string()
}

/// `std` duration as a chrono delta, saturating at a century.
pub fn delta(duration: Duration) -> TimeDelta {
  TimeDelta::from_std(duration).unwrap_or_else(|_| TimeDelta::days(36_500))
}

/// HTML link to a Telegram user, rendered as `@username` when known.
pub fn mention(user_id: i64, username: Option<&str>) -> String {
  match username {
    Some(username) => format!("@{}", html::escape(username)),
    None => format!("<a href=\"tg://user?id={user_id}\">{user_id}</a>"),
  }
}

/// Maximum message length for Telegram Bot API (4096 characters).
/// We use a slightly smaller limit to account for potential HTML entity expansion.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4000;

/// Splits a long message into chunks that fit within Telegram's message limit.
/// Splits at newline boundaries; a single overlong line is cut on char
/// boundaries.
pub fn chunk_message(text: &str, max_len: usize) -> Vec<String> {
  let max_len =
    if max_len == 0 { TELEGRAM_MAX_MESSAGE_LENGTH } else { max_len };

  if text.len() <= max_len {
    return vec![text.to_string()];
  }

  let mut chunks = Vec::new();
  let mut current = String::new();

  for line in text.lines() {
    if !current.is_empty() && current.len() + line.len() + 1 > max_len {
      chunks.push(std::mem::take(&mut current));
    }

    if line.len() <= max_len {
      if !current.is_empty() {
        current.push('\n');
      }
      current.push_str(line);
      continue;
    }

    if !current.is_empty() {
      chunks.push(std::mem::take(&mut current));
    }
    for ch in line.chars() {
      if current.len() + ch.len_utf8() > max_len {
        chunks.push(std::mem::take(&mut current));
      }
      current.push(ch);
    }
  }

  if !current.is_empty() {
    chunks.push(current);
  }

  chunks
}
