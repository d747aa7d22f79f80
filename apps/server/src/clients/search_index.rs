use super::{ensure_success, join_url, SearchIndex};
use crate::models::{CompositionBody, SearchHit};
use crate::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

const SERVICE: &str = "search index";

/// Elasticsearch index client
pub struct HttpSearchIndex {
    client: reqwest::Client,
    base_url: String,
    index: String,
}

#[derive(Deserialize)]
struct GetResponse {
    #[serde(rename = "_source")]
    source: Option<CompositionBody>,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Deserialize)]
struct Hits {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

impl HttpSearchIndex {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            index: index.into(),
        }
    }

    fn doc_url(&self, composition_id: &str) -> String {
        join_url(
            &self.base_url,
            &format!("{}/_doc/{}", self.index, urlencoding::encode(composition_id)),
        )
    }
}

#[async_trait]
impl SearchIndex for HttpSearchIndex {
    async fn get(&self, composition_id: &str) -> Result<Option<CompositionBody>> {
        let response = self.client.get(self.doc_url(composition_id)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(SERVICE, response).await?;
        Ok(response.json::<GetResponse>().await?.source)
    }

    async fn put(&self, composition_id: &str, body: &CompositionBody) -> Result<()> {
        tracing::debug!(composition_id, status = ?body.type_, "Indexing composition");
        let response = self
            .client
            .put(self.doc_url(composition_id))
            .query(&[("refresh", "wait_for")])
            .json(body)
            .send()
            .await?;
        ensure_success(SERVICE, response).await?;
        Ok(())
    }

    async fn search(&self, query: &Value) -> Result<Vec<SearchHit>> {
        let url = join_url(&self.base_url, &format!("{}/_search", self.index));
        let response = self.client.post(url).json(query).send().await?;
        let response = ensure_success(SERVICE, response).await?;
        Ok(response.json::<SearchResponse>().await?.hits.hits)
    }
}
