//! Provider endpoint URLs split into the parts the signer needs.

use crate::{errors::Error, Result};

/// Parsed form of a provider URL.
///
/// `scheme` excludes the `://` separator and `path` keeps its leading `/`.
/// No normalization is applied; callers pass canonical URLs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    url: String,
    scheme: String,
    host: String,
    path: String,
}

impl Endpoint {
    pub fn parse(url: &str) -> Result<Self> {
        let Some((scheme, rest)) = url.split_once("://") else {
            return Err(Error::MalformedEndpoint(format!("missing scheme separator: {url}")));
        };

        let Some(slash) = rest.find('/') else {
            return Err(Error::MalformedEndpoint(format!("missing path: {url}")));
        };
        if slash == 0 {
            return Err(Error::MalformedEndpoint(format!("empty host: {url}")));
        }

        Ok(Self {
            url: url.to_string(),
            scheme: scheme.to_string(),
            host: rest[..slash].to_string(),
            path: rest[slash..].to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl std::str::FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
