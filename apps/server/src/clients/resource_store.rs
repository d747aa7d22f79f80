use super::{ensure_success, join_url, ResourceStore};
use crate::{Error, Result};
use async_trait::async_trait;
use crvs_models::{Bundle, Resource};
use reqwest::StatusCode;

const SERVICE: &str = "resource store";

pub struct HttpResourceStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpResourceStore {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ResourceStore for HttpResourceStore {
    async fn read(&self, reference: &str) -> Result<Resource> {
        let url = join_url(&self.base_url, reference);
        tracing::debug!(reference, "Fetching resource");
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/fhir+json")
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::ResourceNotFound(reference.to_string()));
        }
        let response = ensure_success(SERVICE, response).await?;
        Ok(response.json::<Resource>().await?)
    }

    async fn search(&self, resource_type: &str, query: &[(&str, &str)]) -> Result<Vec<Resource>> {
        let url = join_url(&self.base_url, resource_type);
        let response = self
            .client
            .get(&url)
            .query(query)
            .header("Accept", "application/fhir+json")
            .send()
            .await?;
        let response = ensure_success(SERVICE, response).await?;
        let bundle = response.json::<Bundle>().await?;
        Ok(bundle.into_resources())
    }

    async fn transaction(&self, bundle: &Bundle) -> Result<Bundle> {
        tracing::debug!(entries = bundle.entry.len(), "Submitting transaction bundle");
        let response = self
            .client
            .post(self.base_url.trim_end_matches('/'))
            .header("Content-Type", "application/fhir+json")
            .json(bundle)
            .send()
            .await?;
        let response = ensure_success(SERVICE, response).await?;
        Ok(response.json::<Bundle>().await?)
    }
}
