use super::{ensure_success, join_url, MetricsClient};
use crate::Result;
use async_trait::async_trait;
use crvs_models::{Bundle, EventType};

pub struct HttpMetricsClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMetricsClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl MetricsClient for HttpMetricsClient {
    async fn post_event(
        &self,
        event: EventType,
        action: &str,
        bundle: &Bundle,
        bearer: &str,
    ) -> Result<()> {
        let url = join_url(
            &self.base_url,
            &format!("events/{}/{}", event.slug(), action),
        );
        let response = self
            .client
            .post(url)
            .header("Authorization", bearer)
            .json(bundle)
            .send()
            .await?;
        ensure_success("metrics", response).await?;
        Ok(())
    }
}
