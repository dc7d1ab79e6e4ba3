//! Chat backend port and model routing.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    errors::Error,
    store::{ChatMessage, ChatModel},
    Result,
};

/// A chat completion provider.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Complete `history` with `model`; returns the assistant reply text.
    async fn complete(&self, model: ChatModel, history: &[ChatMessage]) -> Result<String>;
}

/// Routes each model to the backend that serves it.
///
/// A backend left as `None` was not configured; asking for its models fails
/// with a config error instead of a network call.
#[derive(Clone, Default)]
pub struct BackendRouter {
    pub deepseek: Option<Arc<dyn ChatBackend>>,
    pub spark: Option<Arc<dyn ChatBackend>>,
}

impl BackendRouter {
    fn backend_for(&self, model: ChatModel) -> Result<&Arc<dyn ChatBackend>> {
        let slot = match model {
            ChatModel::DeepSeekChat | ChatModel::DeepSeekCoder => &self.deepseek,
            ChatModel::Spark => &self.spark,
        };
        slot.as_ref()
            .ok_or_else(|| Error::Config(format!("no backend configured for model {model}")))
    }
}

#[async_trait]
impl ChatBackend for BackendRouter {
    fn name(&self) -> &'static str {
        "router"
    }

    async fn complete(&self, model: ChatModel, history: &[ChatMessage]) -> Result<String> {
        let backend = self.backend_for(model)?;
        tracing::debug!(backend = backend.name(), %model, turns = history.len(), "chat completion");
        backend.complete(model, history).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    #[async_trait]
    impl ChatBackend for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn complete(&self, model: ChatModel, history: &[ChatMessage]) -> Result<String> {
            Ok(format!("{}:{model}:{}", self.0, history.len()))
        }
    }

    #[tokio::test]
    async fn routes_by_model() {
        let router = BackendRouter {
            deepseek: Some(Arc::new(Named("ds"))),
            spark: Some(Arc::new(Named("spark"))),
        };
        let h = vec![ChatMessage::user("hi")];
        assert_eq!(
            router.complete(ChatModel::DeepSeekCoder, &h).await.unwrap(),
            "ds:deepseek-coder:1"
        );
        assert_eq!(
            router.complete(ChatModel::Spark, &h).await.unwrap(),
            "spark:spark:1"
        );
    }

    #[tokio::test]
    async fn missing_backend_is_a_config_error() {
        let router = BackendRouter {
            deepseek: Some(Arc::new(Named("ds"))),
            spark: None,
        };
        let err = router.complete(ChatModel::Spark, &[]).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
