//! Text-to-image request bodies and response handling.

use std::{
    io::Cursor,
    path::{Path, PathBuf},
};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{cleanup::purge_directory, errors::Error, Result};

/// Fixed caller id sent with every request.
pub const SYNTHETIC_UID: &str = "123456789";
pub const IMAGE_DOMAIN: &str = "general";
pub const DEFAULT_TEMPERATURE: f32 = 0.5;
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Request envelope shared by the Spark image and chat APIs.
#[derive(Clone, Debug, Serialize)]
pub struct SparkRequest {
    pub header: RequestHeader,
    pub parameter: Parameter,
    pub payload: RequestPayload,
}

#[derive(Clone, Debug, Serialize)]
pub struct RequestHeader {
    pub app_id: String,
    pub uid: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct Parameter {
    pub chat: ChatParameter,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatParameter {
    pub domain: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct RequestPayload {
    pub message: MessageText,
}

#[derive(Clone, Debug, Serialize)]
pub struct MessageText {
    pub text: Vec<TextItem>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TextItem {
    pub role: String,
    pub content: String,
}

impl SparkRequest {
    pub fn new(app_id: &str, domain: &str, text: Vec<TextItem>) -> Self {
        Self {
            header: RequestHeader {
                app_id: app_id.to_string(),
                uid: SYNTHETIC_UID.to_string(),
            },
            parameter: Parameter {
                chat: ChatParameter {
                    domain: domain.to_string(),
                    temperature: DEFAULT_TEMPERATURE,
                    max_tokens: DEFAULT_MAX_TOKENS,
                },
            },
            payload: RequestPayload {
                message: MessageText { text },
            },
        }
    }
}

/// Build the text-to-image request body. The prompt is the only message.
pub fn build_request(app_id: &str, prompt: &str) -> SparkRequest {
    SparkRequest::new(
        app_id,
        IMAGE_DOMAIN,
        vec![TextItem {
            role: "user".to_string(),
            content: prompt.to_string(),
        }],
    )
}

/// Image payload extracted from a successful response.
#[derive(Clone, Debug)]
pub struct GeneratedImage {
    pub sid: String,
    pub bytes: Vec<u8>,
}

/// Parse a raw text-to-image response body.
///
/// A nonzero `header.code` is reported as [`Error::Provider`] with the raw body.
pub fn parse_response(body: &str) -> Result<GeneratedImage> {
    let v: Value = serde_json::from_str(body)
        .map_err(|e| Error::MalformedResponse(format!("invalid json: {e}")))?;

    let header = v
        .get("header")
        .ok_or_else(|| Error::MalformedResponse("missing header".to_string()))?;
    let code = header
        .get("code")
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::MalformedResponse("missing header.code".to_string()))?;
    if code != 0 {
        return Err(Error::Provider {
            code,
            body: body.to_string(),
        });
    }

    let sid = header
        .get("sid")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::MalformedResponse("missing header.sid".to_string()))?;
    if sid.contains(['/', '\\']) || sid.starts_with('.') {
        return Err(Error::MalformedResponse(format!("unusable sid: {sid}")));
    }

    let content = v
        .pointer("/payload/choices/text/0/content")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            Error::MalformedResponse("missing payload.choices.text[0].content".to_string())
        })?;

    let bytes = BASE64
        .decode(content.trim().as_bytes())
        .map_err(|e| Error::Decode(format!("image base64 decode failed: {e}")))?;

    Ok(GeneratedImage {
        sid: sid.to_string(),
        bytes,
    })
}

/// Parse a response, validate the payload as an image and write it as
/// `{save_dir}/{sid}.jpg`. Nothing is written when any step fails.
pub fn save_response(body: &str, save_dir: &Path) -> Result<PathBuf> {
    let generated = parse_response(body)?;
    let img = image::load_from_memory(&generated.bytes)
        .map_err(|e| Error::Decode(format!("image decode failed: {e}")))?;

    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut encoded = Cursor::new(Vec::new());
    rgb.write_to(&mut encoded, ImageFormat::Jpeg)
        .map_err(|e| Error::Decode(format!("jpeg encode failed: {e}")))?;

    std::fs::create_dir_all(save_dir)?;
    let path = save_dir.join(format!("{}.jpg", generated.sid));
    std::fs::write(&path, encoded.into_inner())?;

    tracing::info!(path = %path.display(), "image saved");
    Ok(path)
}

/// Directory of generated images.
///
/// Saves and purges take the same lock so the daily cleanup never races a
/// save in progress.
#[derive(Debug)]
pub struct ImageStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn save(&self, body: String) -> Result<PathBuf> {
        let _guard = self.lock.lock().await;
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || save_response(&body, &dir))
            .await
            .map_err(|e| Error::External(format!("image save task failed: {e}")))?
    }

    pub async fn purge(&self) -> Result<usize> {
        let _guard = self.lock.lock().await;
        purge_directory(&self.dir)
    }
}
