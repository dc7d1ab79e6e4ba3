use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use ziji_core::{
    backend::ChatBackend,
    config::SparkConfig,
    endpoint::Endpoint,
    errors::Error,
    imaging::{SparkRequest, TextItem},
    signing::{sign, Credentials, Method},
    store::{ChatMessage, ChatModel},
    Result,
};

/// Final frame marker in `header.status`.
const STATUS_LAST: i64 = 2;

/// Spark chat over websocket.
///
/// One connection per completion: send the whole history in a single frame,
/// then collect streamed text frames until the last one arrives.
#[derive(Clone, Debug)]
pub struct SparkChatClient {
    endpoint: Endpoint,
    app_id: String,
    domain: String,
    credentials: Credentials,
    timeout: Duration,
}

impl SparkChatClient {
    pub fn new(cfg: &SparkConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            endpoint: Endpoint::parse(&cfg.chat_url)?,
            app_id: cfg.app_id.clone(),
            domain: cfg.chat_domain.clone(),
            credentials: cfg.credentials.clone(),
            timeout,
        })
    }

    fn request(&self, history: &[ChatMessage]) -> SparkRequest {
        let text = history
            .iter()
            .map(|m| TextItem {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect();
        SparkRequest::new(&self.app_id, &self.domain, text)
    }

    async fn exchange(&self, url: &str, payload: String) -> Result<String> {
        let (mut ws, _) = connect_async(url)
            .await
            .map_err(|e| Error::External(format!("spark chat connect error: {e}")))?;
        ws.send(Message::Text(payload))
            .await
            .map_err(|e| Error::External(format!("spark chat send error: {e}")))?;

        let mut reply = ReplyAccumulator::default();
        while let Some(msg) = ws.next().await {
            let msg = msg.map_err(|e| Error::External(format!("spark chat read error: {e}")))?;
            match msg {
                Message::Text(frame) => {
                    if reply.absorb(&frame)? {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        let _ = ws.close(None).await;

        reply.finish()
    }
}

#[async_trait]
impl ChatBackend for SparkChatClient {
    fn name(&self) -> &'static str {
        "spark"
    }

    async fn complete(&self, _model: ChatModel, history: &[ChatMessage]) -> Result<String> {
        let signed = sign(&self.endpoint, Method::Get, &self.credentials)?;
        let payload = serde_json::to_string(&self.request(history))?;

        tokio::time::timeout(self.timeout, self.exchange(&signed.url, payload))
            .await
            .map_err(|_| Error::External("spark chat timed out".to_string()))?
    }
}

/// Collects streamed reply frames.
#[derive(Debug, Default)]
struct ReplyAccumulator {
    text: String,
    done: bool,
}

impl ReplyAccumulator {
    /// Add one frame; returns true once the final frame has been seen.
    fn absorb(&mut self, frame: &str) -> Result<bool> {
        let v: Value = serde_json::from_str(frame)
            .map_err(|e| Error::MalformedResponse(format!("invalid spark frame: {e}")))?;
        let header = v
            .get("header")
            .ok_or_else(|| Error::MalformedResponse("spark frame without header".to_string()))?;

        let code = header.get("code").and_then(Value::as_i64).unwrap_or(-1);
        if code != 0 {
            return Err(Error::Provider {
                code,
                body: frame.to_string(),
            });
        }

        if let Some(items) = v
            .pointer("/payload/choices/text")
            .and_then(Value::as_array)
        {
            for item in items {
                if let Some(content) = item.get("content").and_then(Value::as_str) {
                    self.text.push_str(content);
                }
            }
        }

        self.done = header.get("status").and_then(Value::as_i64) == Some(STATUS_LAST);
        Ok(self.done)
    }

    fn finish(self) -> Result<String> {
        if !self.done {
            return Err(Error::MalformedResponse(
                "spark chat stream ended before the final frame".to_string(),
            ));
        }
        Ok(self.text)
    }
}
