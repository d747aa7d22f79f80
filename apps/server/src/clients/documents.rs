use super::{ensure_success, join_url, DocumentStore};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

pub struct HttpDocumentStore {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    ref_url: Option<String>,
}

impl HttpDocumentStore {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn upload(&self, file_data: &str, bearer: &str) -> Result<String> {
        let response = self
            .client
            .post(join_url(&self.base_url, "upload"))
            .header("Authorization", bearer)
            .json(&json!({ "fileData": file_data }))
            .send()
            .await?;
        let response = ensure_success("documents", response).await?;
        response
            .json::<UploadResponse>()
            .await?
            .ref_url
            .ok_or_else(|| Error::Internal("documents upload returned no refUrl".to_string()))
    }
}
