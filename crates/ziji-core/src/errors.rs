use std::path::PathBuf;

/// Core error type for the bot.
///
/// Adapter crates map their transport errors into `External` so handlers can
/// report every failure to the user the same way.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("malformed endpoint: {0}")]
    MalformedEndpoint(String),

    #[error("provider error {code}: {body}")]
    Provider { code: i64, body: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("delivery error: {0}")]
    Delivery(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid path: {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
