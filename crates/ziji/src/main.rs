use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use ziji_core::{
    backend::{BackendRouter, ChatBackend},
    cleanup::DailyCleanup,
    config::Config,
    imaging::ImageStore,
    store::ConversationStore,
};
use ziji_deepseek::DeepSeekClient;
use ziji_spark::{SparkChatClient, SparkImageClient};
use ziji_telegram::router::Services;

#[tokio::main]
async fn main() -> Result<(), ziji_core::Error> {
    ziji_core::logging::init("ziji")?;

    let cfg = Arc::new(Config::load()?);

    let deepseek = match &cfg.deepseek_api_key {
        Some(key) => Some(Arc::new(DeepSeekClient::new(
            key.clone(),
            cfg.deepseek_base_url.clone(),
            cfg.request_timeout,
        )?)),
        None => {
            tracing::warn!("DEEPSEEK_API_KEY not set; deepseek models are unavailable");
            None
        }
    };

    let (spark_chat, image_client) = match &cfg.spark {
        Some(spark) => (
            Some(Arc::new(SparkChatClient::new(spark, cfg.request_timeout)?)),
            Some(Arc::new(SparkImageClient::new(spark, cfg.request_timeout)?)),
        ),
        None => {
            tracing::warn!("Spark credentials not set; spark chat and /img are unavailable");
            (None, None)
        }
    };

    let router = BackendRouter {
        deepseek: deepseek.clone().map(|c| c as Arc<dyn ChatBackend>),
        spark: spark_chat.map(|c| c as Arc<dyn ChatBackend>),
    };

    let conversations = Arc::new(ConversationStore::new());
    let images = Arc::new(ImageStore::new(cfg.image_dir.clone()));

    let cancel = CancellationToken::new();
    let cleanup = DailyCleanup::new(cfg.cleanup_time, images.clone(), conversations.clone())
        .spawn(cancel.clone());

    let services = Services {
        conversations,
        images,
        backend: Arc::new(router),
        image_client,
        deepseek,
    };

    let result = ziji_telegram::router::run_polling(cfg, services).await;

    cancel.cancel();
    let _ = cleanup.await;

    result.map_err(|e| ziji_core::Error::External(format!("telegram bot failed: {e}")))
}
