// src/services/fetcher.rs

//! Page fetching collaborators.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::RwLock;

use crate::error::{AppError, Result};
use crate::models::ScraperConfig;

/// Raw response for one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body of a successful response, or a fetch error naming the status.
    pub fn into_content(self) -> Result<String> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(AppError::fetch(self.url, format!("HTTP {}", self.status)))
        }
    }
}

/// Fetch collaborator: `url → (status, content) | error`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

/// reqwest-backed fetcher.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::fetch(url, e))?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| AppError::fetch(url, e))?;
        log::debug!("GET {} -> {} ({} bytes)", url, status, body.len());
        Ok(FetchedPage {
            url: final_url,
            status,
            body,
        })
    }
}

/// Memoizes successful responses per URL for the lifetime of the fetcher.
///
/// Failures and non-success statuses are never cached.
pub struct CachingFetcher {
    inner: Arc<dyn Fetcher>,
    cache: RwLock<HashMap<String, FetchedPage>>,
}

impl CachingFetcher {
    pub fn new(inner: Arc<dyn Fetcher>) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }
}

#[async_trait]
impl Fetcher for CachingFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        if let Some(page) = self.cache.read().await.get(url) {
            return Ok(page.clone());
        }
        let page = self.inner.fetch(url).await?;
        if page.is_success() {
            self.cache
                .write()
                .await
                .insert(url.to_string(), page.clone());
        }
        Ok(page)
    }
}

/// In-memory fetcher for tests: unknown URLs answer 404.
#[cfg(test)]
pub(crate) mod memory {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    pub struct MemoryFetcher {
        pages: HashMap<String, (u16, String)>,
        failing: Vec<String>,
        pub calls: AtomicUsize,
    }

    impl MemoryFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn page(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), (200, body.to_string()));
            self
        }

        pub fn status(mut self, url: &str, status: u16) -> Self {
            self.pages.insert(url.to_string(), (status, String::new()));
            self
        }

        /// Transport error for `url`.
        pub fn fail(mut self, url: &str) -> Self {
            self.failing.push(url.to_string());
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for MemoryFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.iter().any(|u| u == url) {
                return Err(AppError::fetch(url, "connection reset"));
            }
            let (status, body) = self
                .pages
                .get(url)
                .cloned()
                .unwrap_or((404, String::new()));
            Ok(FetchedPage {
                url: url.to_string(),
                status,
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::memory::MemoryFetcher;
    use super::*;

    #[tokio::test]
    async fn test_http_fetcher_sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/inventory"))
            .and(header("user-agent", "test-agent/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let config = ScraperConfig {
            user_agent: "test-agent/1.0".to_string(),
            ..ScraperConfig::default()
        };
        let fetcher = HttpFetcher::new(&config).unwrap();
        let page = fetcher
            .fetch(&format!("{}/inventory", server.uri()))
            .await
            .unwrap();

        assert!(page.is_success());
        assert_eq!(page.body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_http_fetcher_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&ScraperConfig::default()).unwrap();
        let page = fetcher.fetch(&server.uri()).await.unwrap();
        assert_eq!(page.status, 503);
        assert!(page.into_content().is_err());
    }

    #[tokio::test]
    async fn test_caching_fetcher_memoizes_success_only() {
        let inner = Arc::new(
            MemoryFetcher::new()
                .page("https://d.test/a", "A")
                .status("https://d.test/b", 500),
        );
        let fetcher = CachingFetcher::new(inner.clone());

        for _ in 0..3 {
            assert_eq!(fetcher.fetch("https://d.test/a").await.unwrap().body, "A");
            assert_eq!(fetcher.fetch("https://d.test/b").await.unwrap().status, 500);
        }

        // One call for the cached page, three for the uncached failure
        assert_eq!(inner.call_count(), 4);
        assert_eq!(fetcher.len().await, 1);
    }
}
