//! HTTP key source (`https://github.com/<handle>.keys` by default).

use super::{IdentityReference, KeySource};
use async_trait::async_trait;
use isoforge_shared::constants::identity::{
    CONNECT_TIMEOUT_SECS, DEFAULT_ENDPOINT, KEYS_SUFFIX, REQUEST_TIMEOUT_SECS,
};
use isoforge_shared::{ForgeError, ForgeResult};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Fetches key listings from a forge that serves `<endpoint>/<handle>.keys`.
#[derive(Debug, Clone)]
pub struct HttpKeySource {
    http: Client,
    endpoint: String,
}

impl HttpKeySource {
    /// Create a source for `endpoint` with a bounded request timeout.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> ForgeResult<Self> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(ForgeError::Config(format!(
                "key endpoint must be an http(s) URL, got '{}'",
                endpoint
            )));
        }

        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(timeout))
            .user_agent(concat!("isoforge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ForgeError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http, endpoint })
    }

    /// GitHub with default timeouts.
    pub fn github() -> ForgeResult<Self> {
        Self::new(DEFAULT_ENDPOINT, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    /// Listing URL for an identity.
    pub fn url_for(&self, identity: &IdentityReference) -> String {
        format!("{}/{}{}", self.endpoint, identity, KEYS_SUFFIX)
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch_listing(&self, identity: &IdentityReference) -> ForgeResult<String> {
        let url = self.url_for(identity);

        let response = self
            .http
            .get(&url)
            .header("Accept", "text/plain")
            .send()
            .await
            .map_err(|e| ForgeError::Network {
                url: url.clone(),
                reason: describe_transport_error(&e),
                transient: true,
            })?;

        let status = response.status();
        tracing::debug!(url = %url, status = %status, "Key listing response");

        if status == StatusCode::NOT_FOUND {
            return Err(ForgeError::IdentityNotFound {
                identity: identity.to_string(),
                url,
            });
        }
        if !status.is_success() {
            return Err(ForgeError::Network {
                url,
                reason: format!("unexpected HTTP status {}", status),
                transient: is_transient_status(status),
            });
        }

        response.text().await.map_err(|e| ForgeError::Network {
            url,
            reason: format!("failed to read response body: {}", describe_transport_error(&e)),
            transient: true,
        })
    }

    fn describe(&self) -> String {
        self.endpoint.clone()
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("timed out: {}", err)
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_strips_trailing_slash() {
        let source = HttpKeySource::new("https://github.com/", Duration::from_secs(5)).unwrap();
        let alice = IdentityReference::new("alice").unwrap();
        assert_eq!(source.url_for(&alice), "https://github.com/alice.keys");
    }

    #[test]
    fn test_rejects_non_http_endpoint() {
        let err = HttpKeySource::new("file:///etc", Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, ForgeError::Config(_)));
    }

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_transient_status(StatusCode::FORBIDDEN));
        assert!(!is_transient_status(StatusCode::GONE));
    }
}
