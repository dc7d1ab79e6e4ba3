use std::{collections::HashMap, sync::Arc};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio::sync::{Mutex, OwnedMutexGuard};

use ziji_core::{
    backend::ChatBackend,
    config::Config,
    delivery::Delivery,
    imaging::ImageStore,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    store::ConversationStore,
};
use ziji_deepseek::DeepSeekClient;
use ziji_spark::SparkImageClient;

use crate::handlers;
use crate::TelegramMessenger;

/// Long-lived services the binary builds and hands to the router.
#[derive(Clone)]
pub struct Services {
    pub conversations: Arc<ConversationStore>,
    pub images: Arc<ImageStore>,
    pub backend: Arc<dyn ChatBackend>,
    pub image_client: Option<Arc<SparkImageClient>>,
    pub deepseek: Option<Arc<DeepSeekClient>>,
}

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub bot_username: String,
    pub services: Services,
    pub messenger: Arc<dyn MessagingPort>,
    pub delivery: Arc<Delivery>,
    pub reply_locks: Arc<ReplyLocks>,
}

/// One in-flight reply per user.
///
/// Transient code artifacts are named by user, so two overlapping replies
/// for the same user would share files.
#[derive(Default)]
pub struct ReplyLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ReplyLocks {
    pub async fn lock_user(&self, user_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            // Entries nobody holds or waits on.
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            map.entry(user_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

pub async fn run_polling(cfg: Arc<Config>, services: Services) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    let me = bot.get_me().await?;
    let bot_username = me.username().to_string();
    tracing::info!("ziji started: @{bot_username}");
    tracing::info!("Image directory: {}", cfg.image_dir.display());

    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(
        bot.clone(),
        cfg.telegram_safe_limit,
    ));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));
    let delivery = Arc::new(Delivery::new(messenger.clone(), cfg.artifact_dir.clone()));

    let state = Arc::new(AppState {
        cfg,
        bot_username,
        services,
        messenger,
        delivery,
        reply_locks: Arc::new(ReplyLocks::default()),
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn reply_locks_serialize_per_user() {
        let locks = Arc::new(ReplyLocks::default());
        let guard = locks.lock_user(1).await;

        // Another user is not blocked.
        let other = tokio::time::timeout(Duration::from_millis(50), locks.lock_user(2)).await;
        assert!(other.is_ok());

        // Same user waits until the first guard drops.
        let same = tokio::time::timeout(Duration::from_millis(50), locks.lock_user(1)).await;
        assert!(same.is_err());
        drop(guard);
        let again = tokio::time::timeout(Duration::from_millis(50), locks.lock_user(1)).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn idle_user_locks_are_pruned() {
        let locks = ReplyLocks::default();
        for user in 0..10 {
            drop(locks.lock_user(user).await);
        }
        let held = locks.lock_user(100).await;
        assert_eq!(locks.len().await, 1);

        drop(locks.lock_user(101).await);
        assert_eq!(locks.len().await, 2, "held lock survives pruning");
        drop(held);
    }
}
