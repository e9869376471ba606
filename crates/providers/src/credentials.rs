//! Credentials taken from configuration.

use async_trait::async_trait;
use streamgate_config::UpstreamConfig;
use streamgate_core::{Credentials, UpstreamCredentials, UpstreamError};

/// Serves a fixed token and base URL.
#[derive(Clone)]
pub struct StaticCredentials {
    token: Option<String>,
    base_url: String,
}

impl StaticCredentials {
    pub fn new(token: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            token,
            base_url: base_url.into(),
        }
    }

    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self::new(config.token.clone(), config.base_url.clone())
    }
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl Credentials for StaticCredentials {
    async fn current(&self) -> Result<UpstreamCredentials, UpstreamError> {
        match self.token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Ok(UpstreamCredentials {
                token: token.to_string(),
                base_url: self.base_url.clone(),
            }),
            _ => Err(UpstreamError::Unauthorized(
                "no upstream token configured (set STREAMGATE_TOKEN)".into(),
            )),
        }
    }
}
