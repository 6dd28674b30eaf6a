use crate::core::error::FetchError;
use crate::core::provider::RawPayload;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Bank pages serve a reduced layout to unknown clients.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Shared HTTP client for page scraping.
#[derive(Clone)]
pub struct PageClient {
    client: Client,
}

impl PageClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Downloads `url` as text on behalf of `provider`.
    pub async fn fetch_page(&self, provider: &str, url: &str) -> Result<RawPayload, FetchError> {
        debug!("Requesting rate page from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::unavailable(provider, describe(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::unavailable(provider, format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::unavailable(provider, describe(&e)))?;

        debug!("Received {} bytes from {}", body.len(), url);
        Ok(RawPayload {
            url: url.to_string(),
            body,
        })
    }
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_page_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rates"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let client = PageClient::new(Duration::from_secs(5)).unwrap();
        let url = format!("{}/rates", server.uri());
        let payload = client.fetch_page("korea.hana", &url).await.unwrap();

        assert_eq!(payload.url, url);
        assert_eq!(payload.body, "<html></html>");
    }

    #[tokio::test]
    async fn test_non_success_status_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = PageClient::new(Duration::from_secs(5)).unwrap();
        let err = client
            .fetch_page("korea.hana", &server.uri())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
        assert!(err.to_string().contains("503"), "{err}");
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = PageClient::new(Duration::from_millis(50)).unwrap();
        let err = client
            .fetch_page("korea.woori", &server.uri())
            .await
            .unwrap_err();

        assert!(err.is_retryable());
    }
}
