use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::NaiveTime;

use crate::{cleanup::parse_time_of_day, errors::Error, signing::Credentials, Result};

pub const DEFAULT_DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_SPARK_CHAT_URL: &str = "wss://spark-api.xf-yun.com/v3.5/chat";
pub const DEFAULT_SPARK_CHAT_DOMAIN: &str = "generalv3.5";
pub const DEFAULT_SPARK_IMAGE_URL: &str = "http://spark-api.cn-huabei-1.xf-yun.com/v2.1/tti";

/// Spark application identity: one app id plus the signing key pair.
#[derive(Clone, Debug)]
pub struct SparkConfig {
    pub app_id: String,
    pub credentials: Credentials,
    pub chat_url: String,
    pub chat_domain: String,
    pub image_url: String,
}

/// Typed configuration, read from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,

    // Providers
    pub deepseek_api_key: Option<String>,
    pub deepseek_base_url: String,
    pub spark: Option<SparkConfig>,
    pub request_timeout: Duration,

    // Files
    pub image_dir: PathBuf,
    pub artifact_dir: PathBuf,

    // Daily cleanup
    pub cleanup_time: NaiveTime,

    // Telegram limits
    pub telegram_safe_limit: usize,
}

impl Config {
    /// Load `.env` (if present; existing variables win) then read the environment.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN").ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;

        let deepseek_api_key = get("DEEPSEEK_API_KEY");
        let deepseek_base_url = get("DEEPSEEK_BASE_URL")
            .unwrap_or_else(|| DEFAULT_DEEPSEEK_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        // Spark needs all three values or none.
        let spark = match (
            get("SPARK_APP_ID"),
            get("SPARK_API_KEY"),
            get("SPARK_API_SECRET"),
        ) {
            (Some(app_id), Some(api_key), Some(api_secret)) => Some(SparkConfig {
                app_id,
                credentials: Credentials {
                    api_key,
                    api_secret,
                },
                chat_url: get("SPARK_CHAT_URL")
                    .unwrap_or_else(|| DEFAULT_SPARK_CHAT_URL.to_string()),
                chat_domain: get("SPARK_CHAT_DOMAIN")
                    .unwrap_or_else(|| DEFAULT_SPARK_CHAT_DOMAIN.to_string()),
                image_url: get("SPARK_IMAGE_URL")
                    .unwrap_or_else(|| DEFAULT_SPARK_IMAGE_URL.to_string()),
            }),
            (None, None, None) => None,
            _ => {
                return Err(Error::Config(
                    "SPARK_APP_ID, SPARK_API_KEY and SPARK_API_SECRET must be set together"
                        .to_string(),
                ))
            }
        };

        let request_timeout = Duration::from_millis(
            parse_num("REQUEST_TIMEOUT_MS", get("REQUEST_TIMEOUT_MS"))?.unwrap_or(120_000),
        );

        let image_dir = get("IMAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./pic"));
        let artifact_dir = get("ARTIFACT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| env::temp_dir().join("ziji-artifacts"));

        let cleanup_time = parse_time_of_day(&get("CLEANUP_TIME").unwrap_or("00:00".to_string()))?;

        let telegram_safe_limit = parse_num("TELEGRAM_SAFE_LIMIT", get("TELEGRAM_SAFE_LIMIT"))?
            .map(|v| v as usize)
            .unwrap_or(4000);

        Ok(Self {
            telegram_bot_token,
            deepseek_api_key,
            deepseek_base_url,
            spark,
            request_timeout,
            image_dir,
            artifact_dir,
            cleanup_time,
            telegram_safe_limit,
        })
    }
}

fn parse_num(key: &str, v: Option<String>) -> Result<Option<u64>> {
    v.map(|s| {
        s.trim()
            .parse::<u64>()
            .map_err(|e| Error::Config(format!("{key} must be a number: {e}")))
    })
    .transpose()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, unquote(v.trim()));
    }
}

fn unquote(v: &str) -> &str {
    if v.len() >= 2
        && ((v.starts_with('"') && v.ends_with('"')) || (v.starts_with('\'') && v.ends_with('\'')))
    {
        &v[1..v.len() - 1]
    } else {
        v
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
