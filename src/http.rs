use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderName, HeaderValue, REFERER, UPGRADE_INSECURE_REQUESTS,
};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::FetchFailure;

// The upstream serves blocked markup to clients that don't look like a mobile browser.
pub const USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 10; K) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Mobile Safari/537.36";

const LISTING_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";
const DOCUMENT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";
const ACCEPT_LANGUAGE_VALUE: &str = "en-US,en;q=0.9";

/// Which browser-like header set a request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderProfile {
    /// Listing pages: accept headers plus a referer.
    Listing,
    /// Detail pages: full navigation header set with client hints.
    Document,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub url: String,
    pub referer: String,
    pub profile: HeaderProfile,
}

impl PageRequest {
    pub fn listing(url: impl Into<String>, referer: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            referer: referer.into(),
            profile: HeaderProfile::Listing,
        }
    }

    pub fn document(url: impl Into<String>, referer: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            referer: referer.into(),
            profile: HeaderProfile::Document,
        }
    }

    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let static_header = HeaderValue::from_static;

        match self.profile {
            HeaderProfile::Listing => {
                headers.insert(ACCEPT, static_header(LISTING_ACCEPT));
            }
            HeaderProfile::Document => {
                headers.insert(ACCEPT, static_header(DOCUMENT_ACCEPT));
                for (name, value) in [
                    ("sec-ch-ua", "\"Not-A.Brand\";v=\"99\", \"Chromium\";v=\"124\""),
                    ("sec-ch-ua-mobile", "?1"),
                    ("sec-ch-ua-platform", "\"Android\""),
                    ("sec-fetch-site", "same-origin"),
                    ("sec-fetch-mode", "navigate"),
                    ("sec-fetch-user", "?1"),
                    ("sec-fetch-dest", "document"),
                ] {
                    headers.insert(HeaderName::from_static(name), static_header(value));
                }
                headers.insert(UPGRADE_INSECURE_REQUESTS, static_header("1"));
            }
        }

        headers.insert(ACCEPT_LANGUAGE, static_header(ACCEPT_LANGUAGE_VALUE));
        if let Ok(referer) = HeaderValue::from_str(&self.referer) {
            headers.insert(REFERER, referer);
        }

        headers
    }
}

/// One best-effort GET returning the response body.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, request: &PageRequest) -> Result<String, FetchFailure>;
}

/// reqwest-backed fetcher shared by both extractors.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        Self::from_builder(Self::client_builder(timeout), timeout)
    }

    /// Client builder with the upstream user agent and timeout already set.
    pub fn client_builder(timeout: Duration) -> ClientBuilder {
        Client::builder().user_agent(USER_AGENT).timeout(timeout)
    }

    pub fn from_builder(builder: ClientBuilder, timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            client: builder.build()?,
            timeout,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, request: &PageRequest) -> Result<String, FetchFailure> {
        info!(url = %request.url, "fetching upstream page");

        let send = async {
            let resp = self
                .client
                .get(&request.url)
                .headers(request.headers())
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                return Err(FetchFailure::Status(status.as_u16()));
            }

            Ok::<String, FetchFailure>(resp.text().await?)
        };

        // The client timeout covers the connection; this one bounds the whole exchange.
        match tokio::time::timeout(self.timeout, send).await {
            Ok(Ok(body)) => {
                debug!(url = %request.url, bytes = body.len(), "upstream page received");
                Ok(body)
            }
            Ok(Err(failure)) => Err(failure),
            Err(_) => Err(FetchFailure::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_headers_carry_referer_and_accept() {
        let request = PageRequest::listing(
            "https://example.test/page/3/",
            "https://example.test/page/2/",
        );
        let headers = request.headers();

        assert_eq!(headers[REFERER], "https://example.test/page/2/");
        assert_eq!(headers[ACCEPT], LISTING_ACCEPT);
        assert_eq!(headers[ACCEPT_LANGUAGE], ACCEPT_LANGUAGE_VALUE);
        assert!(headers.get("sec-fetch-mode").is_none());
    }

    #[test]
    fn document_headers_carry_client_hints() {
        let request = PageRequest::document("https://example.test/a-b/", "https://example.test/");
        let headers = request.headers();

        assert_eq!(headers[REFERER], "https://example.test/");
        assert_eq!(headers["sec-fetch-mode"], "navigate");
        assert_eq!(headers["sec-ch-ua-mobile"], "?1");
        assert_eq!(headers[UPGRADE_INSECURE_REQUESTS], "1");
    }
}
