//! Telegram adapter (teloxide).
//!
//! Implements the `ziji-core` MessagingPort over the Telegram Bot API and
//! routes incoming updates to the bot handlers.

use std::path::Path;

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InputFile, ParseMode},
};

pub mod handlers;
pub mod router;

use ziji_core::{
    domain::{ChatId, Mention},
    errors::Error,
    formatting::{escape_html, markdown_to_html, split_text},
    messaging::{port::MessagingPort, types::MessagingCapabilities},
    Result,
};

const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
    safe_limit: usize,
}

impl TelegramMessenger {
    pub fn new(bot: Bot, safe_limit: usize) -> Self {
        Self {
            bot,
            safe_limit: safe_limit.clamp(200, TELEGRAM_MESSAGE_LIMIT),
        }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }
}

/// `<a href="tg://user?id=..">name</a>`, the HTML form of a user mention.
pub fn mention_html(mention: &Mention) -> String {
    format!(
        "<a href=\"tg://user?id={}\">{}</a>",
        mention.user_id.0,
        escape_html(&mention.display_name)
    )
}

/// Render plain text as HTML chunks; the mention goes in front of the first.
pub fn render_chunks(text: &str, mention: Option<&Mention>, limit: usize) -> Vec<String> {
    split_text(text, limit)
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            let body = markdown_to_html(&chunk);
            match mention {
                Some(m) if i == 0 => format!("{} {body}", mention_html(m)),
                _ => body,
            }
        })
        .collect()
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_mentions: true,
            supports_file_upload: true,
            max_message_len: TELEGRAM_MESSAGE_LIMIT,
        }
    }

    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        mention: Option<&Mention>,
    ) -> Result<()> {
        for html in render_chunks(text, mention, self.safe_limit) {
            self.bot
                .send_message(Self::tg_chat(chat_id), html)
                .parse_mode(ParseMode::Html)
                .await
                .map_err(Self::map_err)?;
        }
        Ok(())
    }

    async fn upload_file(&self, chat_id: ChatId, path: &Path) -> Result<()> {
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::InvalidPath {
                path: path.to_path_buf(),
                reason: "no file name".to_string(),
            })?
            .to_string();

        self.bot
            .send_document(
                Self::tg_chat(chat_id),
                InputFile::file(path.to_path_buf()).file_name(name),
            )
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }
}
