//! HTTP clients for the services the workflow talks to

mod documents;
mod metrics;
mod resource_store;
mod search_index;
pub mod traits;
mod user_directory;
mod verification;

pub use documents::HttpDocumentStore;
pub use metrics::HttpMetricsClient;
pub use resource_store::HttpResourceStore;
pub use search_index::HttpSearchIndex;
pub use traits::{
    DocumentStore, MetricsClient, ResourceStore, SearchIndex, UserDirectory, VerificationService,
};
pub use user_directory::HttpUserDirectory;
pub use verification::HttpVerificationService;

use crate::{Error, Result};
use std::time::Duration;

/// Shared client; timeouts are the only resilience policy, there are no retries
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("crvs-workflow/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(Error::from)
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Turn a non-2xx response into `Error::Upstream`
pub(crate) async fn ensure_success(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(service, status = status.as_u16(), "Upstream request failed");
    Err(Error::Upstream {
        service,
        status: status.as_u16(),
        body,
    })
}
