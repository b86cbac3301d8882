use reqwest::Client;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
}

/// Retrieval of a document as text.
///
/// `fetch_page` is used for encyclopedia pages and fails on non-success
/// statuses. `fetch_body` is used for the results API, whose bodies are scanned
/// for tags whatever the status; an error page simply contains none.
pub trait Fetch {
    fn fetch_page(&self, url: &str) -> impl Future<Output = Result<String, ScraperError>> + Send;

    fn fetch_body(&self, url: &str) -> impl Future<Output = Result<String, ScraperError>> + Send;
}

#[derive(Debug, Clone)]
pub struct WebScraper {
    client: Client,
}

impl WebScraper {
    pub fn new() -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self { client })
    }
}

impl Fetch for WebScraper {
    async fn fetch_page(&self, url: &str) -> Result<String, ScraperError> {
        log::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response
            .text()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?)
    }

    async fn fetch_body(&self, url: &str) -> Result<String, ScraperError> {
        log::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?;

        if !response.status().is_success() {
            log::warn!("{} answered {}", url, response.status());
        }

        Ok(response
            .text()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?)
    }
}


#[cfg(test)]
mod tests {
    use super::stub::StubFetcher;
    use super::*;

    #[tokio::test]
    async fn test_missing_page_is_a_status_error() {
        let fetcher = StubFetcher::new().with_page("https://example.org/a", "body");

        assert_eq!(fetcher.fetch_page("https://example.org/a").await.unwrap(), "body");

        let err = fetcher.fetch_page("https://example.org/b").await.unwrap_err();
        assert!(matches!(
            &err,
            ScraperError::Status { url, status: 404 } if url == "https://example.org/b"
        ));
        assert_eq!(
            err.to_string(),
            "https://example.org/b answered with status 404"
        );

        // API bodies are scanned whatever the status.
        assert_eq!(fetcher.fetch_body("https://example.org/b").await.unwrap(), "");
    }
}
