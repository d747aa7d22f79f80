use super::{ensure_success, join_url, UserDirectory};
use crate::models::{UserModel, UserQuery};
use crate::Result;
use async_trait::async_trait;

/// User management service
pub struct HttpUserDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUserDirectory {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn get_user(&self, query: &UserQuery, bearer: &str) -> Result<UserModel> {
        let response = self
            .client
            .post(join_url(&self.base_url, "getUser"))
            .header("Authorization", bearer)
            .json(query)
            .send()
            .await?;
        let response = ensure_success("user management", response).await?;
        Ok(response.json::<UserModel>().await?)
    }
}
