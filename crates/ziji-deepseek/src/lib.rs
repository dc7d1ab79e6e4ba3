//! DeepSeek adapter (chat completions + account balance).
//!
//! Uses the OpenAI-compatible `chat/completions` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Serialize;
use serde_json::Value;

use ziji_core::{
    backend::ChatBackend,
    errors::Error,
    store::{ChatMessage, ChatModel},
    Result,
};

#[derive(Clone, Debug)]
pub struct DeepSeekClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

/// Account balance in one currency.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Balance {
    pub total_balance: String,
    pub currency: String,
}

impl DeepSeekClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("http client build error: {e}")))?;
        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            http,
        })
    }

    /// First entry of `balance_infos`, if the account reports any.
    pub async fn balance(&self) -> Result<Option<Balance>> {
        let resp = self
            .http
            .get(format!("{}/user/balance", self.base_url))
            .header(ACCEPT, "application/json")
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| Error::External(format!("deepseek request error: {e}")))?;

        let v = json_or_error(resp, "balance query").await?;
        Ok(parse_balance(&v))
    }
}

#[async_trait]
impl ChatBackend for DeepSeekClient {
    fn name(&self) -> &'static str {
        "deepseek"
    }

    async fn complete(&self, model: ChatModel, history: &[ChatMessage]) -> Result<String> {
        let body = CompletionRequest {
            model: model.id(),
            messages: history,
            stream: false,
        };
        tracing::debug!(%model, turns = history.len(), "deepseek completion");

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::External(format!("deepseek request error: {e}")))?;

        let v = json_or_error(resp, "chat completion").await?;
        parse_completion(&v)
    }
}

async fn json_or_error(resp: reqwest::Response, what: &str) -> Result<Value> {
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::External(format!(
            "deepseek {what} failed: {status} {}",
            body.chars().take(200).collect::<String>()
        )));
    }

    resp.json()
        .await
        .map_err(|e| Error::External(format!("deepseek json error: {e}")))
}

fn parse_completion(v: &Value) -> Result<String> {
    let text = v
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            Error::MalformedResponse("missing choices[0].message.content".to_string())
        })?;

    if text.trim().is_empty() {
        return Err(Error::External(
            "deepseek returned an empty reply".to_string(),
        ));
    }
    Ok(text.to_string())
}

fn parse_balance(v: &Value) -> Option<Balance> {
    let info = v.get("balance_infos")?.as_array()?.first()?;
    let field = |key: &str| match info.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "unknown".to_string(),
        Some(other) => other.to_string(),
    };
    Some(Balance {
        total_balance: field("total_balance"),
        currency: field("currency"),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_body_uses_model_id_and_history() {
        let history = vec![ChatMessage::user("hi"), ChatMessage::assistant("yo")];
        let body = CompletionRequest {
            model: ChatModel::DeepSeekCoder.id(),
            messages: &history,
            stream: false,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "model": "deepseek-coder",
                "messages": [
                    {"role": "user", "content": "hi"},
                    {"role": "assistant", "content": "yo"}
                ],
                "stream": false
            })
        );
    }

    #[test]
    fn parses_completion_text() {
        let v = json!({"choices": [{"index": 0, "message": {"role": "assistant", "content": "hello"}}]});
        assert_eq!(parse_completion(&v).unwrap(), "hello");
    }

    #[test]
    fn missing_or_empty_completion_is_an_error() {
        assert!(matches!(
            parse_completion(&json!({"choices": []})),
            Err(Error::MalformedResponse(_))
        ));
        let v = json!({"choices": [{"message": {"content": "  "}}]});
        assert!(matches!(parse_completion(&v), Err(Error::External(_))));
    }

    #[test]
    fn parses_first_balance_entry() {
        let v = json!({
            "is_available": true,
            "balance_infos": [
                {"currency": "CNY", "total_balance": "110.00", "granted_balance": "10.00"},
                {"currency": "USD", "total_balance": "1.00"}
            ]
        });
        assert_eq!(
            parse_balance(&v),
            Some(Balance {
                total_balance: "110.00".to_string(),
                currency: "CNY".to_string()
            })
        );
    }

    #[test]
    fn balance_without_entries() {
        assert_eq!(parse_balance(&json!({"balance_infos": []})), None);
        assert_eq!(parse_balance(&json!({})), None);
        let v = json!({"balance_infos": [{"total_balance": 3.5}]});
        assert_eq!(
            parse_balance(&v),
            Some(Balance {
                total_balance: "3.5".to_string(),
                currency: "unknown".to_string()
            })
        );
    }
}
