use super::{ensure_success, join_url, VerificationService};
use crate::Result;
use async_trait::async_trait;
use crvs_models::Patient;
use serde_json::{json, Value};

pub struct HttpVerificationService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpVerificationService {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl VerificationService for HttpVerificationService {
    async fn verify_deceased(&self, patient: &Patient, bearer: &str) -> Result<Value> {
        let payload = json!({
            "identifier": patient.identifier,
            "name": patient.name,
            "gender": patient.gender,
            "birthDate": patient.birth_date,
            "deceasedDateTime": patient.deceased_date_time,
        });
        let response = self
            .client
            .post(join_url(&self.base_url, "deceased"))
            .header("Authorization", bearer)
            .json(&payload)
            .send()
            .await?;
        let response = ensure_success("verification", response).await?;
        Ok(response.json::<Value>().await?)
    }
}
