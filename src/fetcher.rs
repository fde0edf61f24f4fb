use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::model::PageResult;
use crate::settings::Settings;

const API_ENDPOINT: &str = "/api/products";

/// Anything that can hand back one page of the product listing.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, page: u32, category: &str, page_size: u32) -> Result<PageResult>;
}

/// Fetches listing pages from `<base_url>/api/products`. One request per
/// call, no retries.
pub struct HttpPageFetcher {
    client: Client,
    endpoint: Url,
}

impl HttpPageFetcher {
    pub fn new(settings: &Settings) -> Result<Self> {
        let raw = format!("{}{}", settings.base_url.trim_end_matches('/'), API_ENDPOINT);
        let endpoint = Url::parse(&raw)
            .map_err(|e| PipelineError::Config(format!("invalid base url {:?}: {}", settings.base_url, e)))?;
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .user_agent(settings.user_agent.as_str())
            .build()
            .map_err(|e| PipelineError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl PageSource for HttpPageFetcher {
    async fn fetch_page(&self, page: u32, category: &str, page_size: u32) -> Result<PageResult> {
        if page == 0 {
            return Err(PipelineError::Config("page numbers start at 1".into()));
        }
        if page_size == 0 {
            return Err(PipelineError::Config("page size must be at least 1".into()));
        }

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("category", category.to_string()),
                ("page", page.to_string()),
                ("pageSize", page_size.to_string()),
            ])
            .send()
            .await
            .map_err(|e| PipelineError::Transport(format!("GET {} page {}: {}", self.endpoint, page, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Transport(format!(
                "GET {} page {} returned {}",
                self.endpoint, page, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::Transport(format!("reading page {} body: {}", page, e)))?;
        let result: PageResult = serde_json::from_str(&body)
            .map_err(|e| PipelineError::Decode(format!("page {}: {}", page, e)))?;

        debug!(
            page,
            category,
            items = result.products.len(),
            has_next = result.has_next_page(),
            "fetched page"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher_for(base_url: &str) -> HttpPageFetcher {
        let settings = Settings {
            base_url: base_url.to_string(),
            request_timeout_secs: 5,
            ..Settings::default()
        };
        HttpPageFetcher::new(&settings).unwrap()
    }

    #[tokio::test]
    async fn sends_listing_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/products"))
            .and(query_param("category", "living"))
            .and(query_param("page", "2"))
            .and(query_param("pageSize", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "products": [
                    { "id": "4", "name": "Rug", "price": 89000, "specialOffer": "Y" },
                    { "id": "5", "name": "Vase", "price": 23000, "specialOffer": "N" }
                ],
                "pagination": { "hasNextPage": true }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = fetcher_for(&server.uri()).fetch_page(2, "living", 3).await.unwrap();
        assert_eq!(page.products.len(), 2);
        assert!(page.has_next_page());
        assert_eq!(page.products[0].name, Some(json!("Rug")));
    }

    #[tokio::test]
    async fn trailing_slash_in_base_url() {
        let server = MockServer::start().await;
        Mock::given(path("/api/products"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "products": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let page = fetcher_for(&format!("{}/", server.uri()))
            .fetch_page(1, "all", 10)
            .await
            .unwrap();
        assert!(page.products.is_empty());
        assert!(!page.has_next_page());
    }

    #[tokio::test]
    async fn non_success_status_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(path("/api/products"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = fetcher_for(&server.uri()).fetch_page(1, "all", 10).await.unwrap_err();
        assert!(matches!(err, PipelineError::Transport(ref m) if m.contains("503")), "{err}");
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(path("/api/products"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let err = fetcher_for(&server.uri()).fetch_page(1, "all", 10).await.unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)), "{err}");
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let err = fetcher_for("http://127.0.0.1:1").fetch_page(1, "all", 10).await.unwrap_err();
        assert!(matches!(err, PipelineError::Transport(_)), "{err}");
    }

    #[tokio::test]
    async fn zero_page_size_is_config_error() {
        let err = fetcher_for("http://127.0.0.1:1").fetch_page(1, "all", 0).await.unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        let settings = Settings {
            base_url: "not a url".into(),
            ..Settings::default()
        };
        assert!(matches!(HttpPageFetcher::new(&settings), Err(PipelineError::Config(_))));
    }
}
