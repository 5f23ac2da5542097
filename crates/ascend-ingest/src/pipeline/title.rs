//! Title lookup over HTTP

use ascend_common::{AscendError, Result};
use tracing::{debug, instrument, warn};

/// Returned whenever the lookup does not produce a 2xx body
pub const TITLE_NOT_FOUND: &str = "Title not found";

#[derive(Debug, Clone)]
pub struct TitleResolver {
    client: reqwest::Client,
    endpoint: String,
}

impl TitleResolver {
    /// `endpoint` is a prefix; the reference number is appended as-is
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn url_for(&self, reference_number: u32) -> String {
        format!("{}{}", self.endpoint, reference_number)
    }

    /// Title for `reference_number`, or [`TITLE_NOT_FOUND`]
    pub async fn resolve_title(&self, reference_number: u32) -> String {
        match self.lookup(reference_number).await {
            Ok(title) => title,
            Err(e) => {
                warn!(reference_number, error = %e, "Title lookup failed");
                TITLE_NOT_FOUND.to_string()
            },
        }
    }

    /// Single GET, no retries; the body of a 2xx response is the title
    #[instrument(skip(self))]
    pub async fn lookup(&self, reference_number: u32) -> Result<String> {
        let url = self.url_for(reference_number);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AscendError::TitleLookup(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AscendError::TitleLookup(format!("GET {} returned {}", url, status)));
        }

        let title = response
            .text()
            .await
            .map_err(|e| AscendError::TitleLookup(format!("Unreadable body from {}: {}", url, e)))?;
        debug!("Resolved title for reference {}", reference_number);
        Ok(title)
    }
}
