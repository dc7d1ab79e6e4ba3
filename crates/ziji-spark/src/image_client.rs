use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{header::CONTENT_TYPE, StatusCode};

use ziji_core::{
    config::SparkConfig,
    endpoint::Endpoint,
    errors::Error,
    imaging::{build_request, parse_response, SparkRequest},
    signing::{sign_at, Credentials, Method, SignedRequest},
    Result,
};

/// Client for the Spark text-to-image endpoint.
///
/// Returns the raw response body; `ImageStore::save` turns it into a file.
#[derive(Clone, Debug)]
pub struct SparkImageClient {
    endpoint: Endpoint,
    app_id: String,
    credentials: Credentials,
    http: reqwest::Client,
}

impl SparkImageClient {
    pub fn new(cfg: &SparkConfig, timeout: Duration) -> Result<Self> {
        let endpoint = Endpoint::parse(&cfg.image_url)?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("http client build error: {e}")))?;
        Ok(Self {
            endpoint,
            app_id: cfg.app_id.clone(),
            credentials: cfg.credentials.clone(),
            http,
        })
    }

    fn prepare(&self, prompt: &str, now: DateTime<Utc>) -> Result<(SignedRequest, SparkRequest)> {
        let signed = sign_at(&self.endpoint, Method::Post, &self.credentials, now)?;
        Ok((signed, build_request(&self.app_id, prompt)))
    }

    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let (signed, body) = self.prepare(prompt, Utc::now())?;
        tracing::info!(host = self.endpoint.host(), "requesting image");

        let resp = self
            .http
            .post(&signed.url)
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::External(format!("spark image request error: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| Error::External(format!("spark image read error: {e}")))?;

        check_status(status, text)
    }
}

/// Pass a 2xx body through; otherwise prefer the provider's own error envelope.
fn check_status(status: StatusCode, body: String) -> Result<String> {
    if status.is_success() {
        return Ok(body);
    }
    match parse_response(&body) {
        Err(e @ Error::Provider { .. }) => Err(e),
        _ => Err(Error::External(format!(
            "spark image request failed: {status} {body}"
        ))),
    }
}
