//! Telegram update handlers.
//!
//! - `/` commands go to `commands`
//! - messages starting with `!` or `.` are ignored
//! - in groups the bot only answers when @-mentioned
//! - everything else is a chat turn handled by `text`

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use ziji_core::domain::{ChatId, Recipient, UserId};

use crate::router::AppState;

mod commands;
mod text;

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(recipient) = recipient_of(&msg) else {
        return Ok(());
    };

    if text.starts_with('/') {
        return commands::handle_command(bot, &msg, recipient, state).await;
    }
    if text.starts_with(['!', '.']) {
        return Ok(());
    }

    let input = if recipient.is_group {
        match strip_bot_mention(text, &state.bot_username) {
            Some(input) => input,
            None => return Ok(()),
        }
    } else {
        text.trim().to_string()
    };
    if input.is_empty() {
        return Ok(());
    }

    tracing::info!(chat_id = recipient.chat_id.0, user_id = recipient.user_id.0, "chat turn");
    let _guard = state.reply_locks.lock_user(recipient.user_id.0).await;
    text::handle_text(bot, recipient, state.clone(), input).await
}

fn recipient_of(msg: &Message) -> Option<Recipient> {
    let user = msg.from()?;
    let display_name = user
        .username
        .clone()
        .unwrap_or_else(|| user.first_name.clone());
    Some(Recipient {
        chat_id: ChatId(msg.chat.id.0),
        user_id: UserId(user.id.0 as i64),
        display_name,
        is_group: msg.chat.is_group() || msg.chat.is_supergroup(),
    })
}

/// Remove `@bot_username` (case-insensitive) from `text`.
///
/// The mention must end at a character that cannot continue a username, so
/// `@zijibot2` does not count as `@zijibot`. Returns `None` when the bot is
/// not mentioned.
pub fn strip_bot_mention(text: &str, bot_username: &str) -> Option<String> {
    if bot_username.is_empty() {
        return None;
    }
    let needle_len = bot_username.len() + 1;
    let mut from = 0;
    while let Some(rel) = text[from..].find('@') {
        let idx = from + rel;
        let end = idx + needle_len;
        let candidate = text.get(idx + 1..end);
        if candidate.is_some_and(|c| c.eq_ignore_ascii_case(bot_username))
            && !text[end..].starts_with(is_username_char)
        {
            return Some(splice_out(text, idx, needle_len));
        }
        from = idx + 1;
    }
    None
}

fn is_username_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn splice_out(text: &str, idx: usize, len: usize) -> String {
    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..idx]);
    out.push_str(&text[idx + len..]);
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_mention_anywhere() {
        assert_eq!(
            strip_bot_mention("@ZijiBot what is rust?", "zijibot").as_deref(),
            Some("what is rust?")
        );
        assert_eq!(
            strip_bot_mention("hey @zijibot  help", "ZijiBot").as_deref(),
            Some("hey help")
        );
    }

    #[test]
    fn no_mention_means_no_turn() {
        assert_eq!(strip_bot_mention("hello everyone", "zijibot"), None);
        assert_eq!(strip_bot_mention("@other hi", "zijibot"), None);
        assert_eq!(strip_bot_mention("hi", ""), None);
    }

    #[test]
    fn longer_username_is_not_a_mention() {
        assert_eq!(strip_bot_mention("@zijibot2 hi", "zijibot"), None);
        assert_eq!(strip_bot_mention("@zijibot_dev hi", "zijibot"), None);
        assert_eq!(
            strip_bot_mention("@zijibot2 and @zijibot, hi", "zijibot").as_deref(),
            Some("@zijibot2 and , hi")
        );
        assert_eq!(strip_bot_mention("ping @zijibot", "zijibot").as_deref(), Some("ping"));
    }

    #[test]
    fn non_ascii_text_keeps_exact_match() {
        assert_eq!(
            strip_bot_mention("@zijibot 画一只猫", "zijibot").as_deref(),
            Some("画一只猫")
        );
    }
}
