//! HMAC-SHA256 URL signing for the Spark APIs.
//!
//! The provider authenticates a request through three query parameters:
//! `host`, `date` and `authorization`. The authorization value is the
//! base64 of a header-like string which itself carries a base64 HMAC digest.
//! Both encodings are part of the wire protocol.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{endpoint::Endpoint, errors::Error, Result};

const ALGORITHM: &str = "hmac-sha256";
const SIGNED_HEADERS: &str = "host date request-line";
const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// HTTP method as it appears in the signed request line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// API key pair issued by the provider console.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedRequest {
    pub url: String,
    pub method: Method,
    pub date: String,
    pub authorization: String,
}

/// Sign `endpoint` for the current instant.
pub fn sign(endpoint: &Endpoint, method: Method, creds: &Credentials) -> Result<SignedRequest> {
    sign_at(endpoint, method, creds, Utc::now())
}

/// Sign `endpoint` for a fixed instant.
pub fn sign_at(
    endpoint: &Endpoint,
    method: Method,
    creds: &Credentials,
    now: DateTime<Utc>,
) -> Result<SignedRequest> {
    let date = http_date(now);
    let canonical = canonical_string(endpoint, method, &date);

    let mut mac = Hmac::<Sha256>::new_from_slice(creds.api_secret.as_bytes())
        .map_err(|e| Error::Config(format!("invalid api secret: {e}")))?;
    mac.update(canonical.as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());

    let authorization_origin = format!(
        "api_key=\"{}\", algorithm=\"{ALGORITHM}\", headers=\"{SIGNED_HEADERS}\", signature=\"{signature}\"",
        creds.api_key
    );
    let authorization = BASE64.encode(authorization_origin.as_bytes());

    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("host", endpoint.host())
        .append_pair("date", &date)
        .append_pair("authorization", &authorization)
        .finish();

    Ok(SignedRequest {
        url: format!("{}?{query}", endpoint.url()),
        method,
        date,
        authorization,
    })
}

/// RFC 7231 IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn http_date(t: DateTime<Utc>) -> String {
    t.format(IMF_FIXDATE).to_string()
}

fn canonical_string(endpoint: &Endpoint, method: Method, date: &str) -> String {
    format!(
        "host: {}\ndate: {date}\n{} {} HTTP/1.1",
        endpoint.host(),
        method.as_str(),
        endpoint.path()
    )
}
