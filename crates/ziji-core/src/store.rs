//! Per-user conversation state.
//!
//! Created once at startup, mutated per message, cleared by the daily cleanup.
//! Handlers get it through `Arc`; there is no global instance.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::domain::UserId;

/// Chat model a user talks to. `/model` cycles through them in this order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ChatModel {
    #[default]
    DeepSeekChat,
    DeepSeekCoder,
    Spark,
}

impl ChatModel {
    pub fn id(self) -> &'static str {
        match self {
            ChatModel::DeepSeekChat => "deepseek-chat",
            ChatModel::DeepSeekCoder => "deepseek-coder",
            ChatModel::Spark => "spark",
        }
    }

    pub fn next(self) -> Self {
        match self {
            ChatModel::DeepSeekChat => ChatModel::DeepSeekCoder,
            ChatModel::DeepSeekCoder => ChatModel::Spark,
            ChatModel::Spark => ChatModel::DeepSeekChat,
        }
    }
}

impl std::fmt::Display for ChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Clone, Debug, Default)]
struct Conversation {
    history: Vec<ChatMessage>,
    model: ChatModel,
}

#[derive(Debug, Default)]
pub struct ConversationStore {
    inner: Mutex<HashMap<UserId, Conversation>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn model_of(&self, user: UserId) -> ChatModel {
        let map = self.inner.lock().await;
        map.get(&user).map(|c| c.model).unwrap_or_default()
    }

    pub async fn history(&self, user: UserId) -> Vec<ChatMessage> {
        let map = self.inner.lock().await;
        map.get(&user).map(|c| c.history.clone()).unwrap_or_default()
    }

    /// Record a user turn; returns the model and the history to send.
    pub async fn push_user(&self, user: UserId, text: &str) -> (ChatModel, Vec<ChatMessage>) {
        let mut map = self.inner.lock().await;
        let conv = map.entry(user).or_default();
        conv.history.push(ChatMessage::user(text));
        (conv.model, conv.history.clone())
    }

    pub async fn push_assistant(&self, user: UserId, text: &str) {
        let mut map = self.inner.lock().await;
        map.entry(user)
            .or_default()
            .history
            .push(ChatMessage::assistant(text));
    }

    /// Drop a trailing user turn that never got an answer.
    pub async fn discard_pending(&self, user: UserId) {
        let mut map = self.inner.lock().await;
        if let Some(conv) = map.get_mut(&user) {
            if conv.history.last().map(|m| m.role) == Some(Role::User) {
                conv.history.pop();
            }
        }
    }

    /// Switch to the next model. History does not carry over.
    pub async fn cycle_model(&self, user: UserId) -> ChatModel {
        let mut map = self.inner.lock().await;
        let conv = map.entry(user).or_default();
        conv.model = conv.model.next();
        conv.history.clear();
        conv.model
    }

    pub async fn clear_history(&self, user: UserId) {
        let mut map = self.inner.lock().await;
        if let Some(conv) = map.get_mut(&user) {
            conv.history.clear();
        }
    }

    pub async fn clear_all(&self) {
        self.inner.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_users_start_on_deepseek_chat() {
        let store = ConversationStore::new();
        assert_eq!(store.model_of(UserId(1)).await, ChatModel::DeepSeekChat);
        assert!(store.history(UserId(1)).await.is_empty());
    }

    #[tokio::test]
    async fn records_turns_in_order() {
        let store = ConversationStore::new();
        let (model, history) = store.push_user(UserId(1), "hi").await;
        assert_eq!(model, ChatModel::DeepSeekChat);
        assert_eq!(history, vec![ChatMessage::user("hi")]);

        store.push_assistant(UserId(1), "hello").await;
        let (_, history) = store.push_user(UserId(1), "again").await;
        assert_eq!(
            history,
            vec![
                ChatMessage::user("hi"),
                ChatMessage::assistant("hello"),
                ChatMessage::user("again"),
            ]
        );
        assert!(store.history(UserId(2)).await.is_empty());
    }

    #[tokio::test]
    async fn cycling_models_wraps_and_resets_history() {
        let store = ConversationStore::new();
        store.push_user(UserId(1), "hi").await;

        assert_eq!(store.cycle_model(UserId(1)).await, ChatModel::DeepSeekCoder);
        assert!(store.history(UserId(1)).await.is_empty());
        assert_eq!(store.cycle_model(UserId(1)).await, ChatModel::Spark);
        assert_eq!(store.cycle_model(UserId(1)).await, ChatModel::DeepSeekChat);
    }

    #[tokio::test]
    async fn clear_history_keeps_model() {
        let store = ConversationStore::new();
        store.cycle_model(UserId(1)).await;
        store.push_user(UserId(1), "hi").await;
        store.clear_history(UserId(1)).await;

        assert!(store.history(UserId(1)).await.is_empty());
        assert_eq!(store.model_of(UserId(1)).await, ChatModel::DeepSeekCoder);
    }

    #[tokio::test]
    async fn discard_pending_only_drops_unanswered_user_turn() {
        let store = ConversationStore::new();
        store.push_user(UserId(1), "q1").await;
        store.push_assistant(UserId(1), "a1").await;
        store.discard_pending(UserId(1)).await;
        assert_eq!(store.history(UserId(1)).await.len(), 2);

        store.push_user(UserId(1), "q2").await;
        store.discard_pending(UserId(1)).await;
        assert_eq!(store.history(UserId(1)).await.len(), 2);
    }

    #[test]
    fn roles_serialize_lowercase() {
        let v = serde_json::to_value(ChatMessage::assistant("x")).unwrap();
        assert_eq!(v, serde_json::json!({"role": "assistant", "content": "x"}));
    }
}
