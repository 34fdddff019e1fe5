//! HTTP document fetcher used by the resource aggregator.

use async_trait::async_trait;
use schema_rag_core::error::FetchError;
use schema_rag_core::services::Fetcher;
use std::time::Duration;

/// Plain `GET` of a document locator.
///
/// The client timeout is a backstop; the aggregator applies its own
/// per-fetch timeout around every call.
pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("schema-rag/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, locator: &str) -> Result<String, FetchError> {
        let url = reqwest::Url::parse(locator).map_err(|e| FetchError::InvalidLocator {
            locator: locator.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidLocator {
                locator: locator.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        let transport = |e: reqwest::Error| FetchError::Transport {
            locator: locator.to_string(),
            message: e.to_string(),
        };

        let resp = self.http.get(url).send().await.map_err(transport)?;
        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            return Err(FetchError::Status {
                locator: locator.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(transport)?;
        if body.trim().is_empty() {
            return Err(FetchError::EmptyBody {
                locator: locator.to_string(),
            });
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_unparseable_locator() {
        let fetcher = HttpFetcher::new(Duration::from_secs(1)).unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidLocator { .. }));
    }

    #[tokio::test]
    async fn test_rejects_non_http_scheme() {
        let fetcher = HttpFetcher::new(Duration::from_secs(1)).unwrap();
        let err = fetcher.fetch("file:///etc/passwd").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidLocator { .. }));
    }
}
