//! HTTP client of the local bloom-filter service.

use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use super::{CheckFilterRequest, CheckFilterResponse, LocalFilter};
use crate::error::Result;

/// Path of the filter check endpoint.
pub const CHECK_FILTER_PATH: &str = "/check_filter";

/// Local filter service reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpLocalFilter {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpLocalFilter {
    /// Creates a client for the service at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("Catwatch/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self::with_client(client, base_url))
    }

    /// Creates a client sharing an existing connection pool.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), CHECK_FILTER_PATH),
        }
    }

    /// Full URL of the check endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl LocalFilter for HttpLocalFilter {
    async fn check_filter(&self, domain: &str, filters: &[String]) -> Result<CheckFilterResponse> {
        let request = CheckFilterRequest {
            domain: domain.to_string(),
            filters: filters.to_vec(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<CheckFilterResponse>()
            .await?;

        trace!(domain, results = response.results.len(), "check_filter");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_url() {
        let client = HttpLocalFilter::new("http://127.0.0.1:9964/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:9964/check_filter");
    }

    #[test]
    fn test_request_body_shape() {
        let request = CheckFilterRequest {
            domain: "www.onlyfans.com".to_string(),
            filters: vec!["category:porn".to_string()],
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"domain": "www.onlyfans.com", "filters": ["category:porn"]})
        );
    }
}
