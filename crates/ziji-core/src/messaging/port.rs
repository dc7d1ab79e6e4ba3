use std::path::Path;

use async_trait::async_trait;

use crate::{
    domain::{ChatId, Mention},
    messaging::types::MessagingCapabilities,
    Result,
};

/// Outbound side of the chat platform.
///
/// Text is plain; adapters handle their own markup and escaping.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    /// Send `text` to a chat, tagging `mention` first when given.
    async fn send_text(&self, chat_id: ChatId, text: &str, mention: Option<&Mention>)
        -> Result<()>;

    /// Upload a local file to a chat under its own file name.
    async fn upload_file(&self, chat_id: ChatId, path: &Path) -> Result<()>;
}
