//! Contracts of the collaborating services

use crate::models::{CompositionBody, SearchHit, UserModel, UserQuery};
use crate::Result;
use async_trait::async_trait;
use crvs_models::{Bundle, EventType, Patient, Resource};
use serde_json::Value;

/// FHIR resource store
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch a resource by relative reference (`Type/id`)
    async fn read(&self, reference: &str) -> Result<Resource>;

    /// Type level search, returning the matched resources
    async fn search(&self, resource_type: &str, query: &[(&str, &str)]) -> Result<Vec<Resource>>;

    /// Submit a transaction bundle, returning the transaction-response bundle
    async fn transaction(&self, bundle: &Bundle) -> Result<Bundle>;
}

/// Search index holding one `CompositionBody` per composition
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn get(&self, composition_id: &str) -> Result<Option<CompositionBody>>;

    async fn put(&self, composition_id: &str, body: &CompositionBody) -> Result<()>;

    async fn search(&self, query: &Value) -> Result<Vec<SearchHit>>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, query: &UserQuery, bearer: &str) -> Result<UserModel>;
}

/// Metrics service receiving audit events
#[async_trait]
pub trait MetricsClient: Send + Sync {
    async fn post_event(
        &self,
        event: EventType,
        action: &str,
        bundle: &Bundle,
        bearer: &str,
    ) -> Result<()>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Upload a base64 data URI, returning the stored file reference
    async fn upload(&self, file_data: &str, bearer: &str) -> Result<String>;
}

/// Identity verification of deceased persons
#[async_trait]
pub trait VerificationService: Send + Sync {
    /// Returns the verified fields to merge into the patient
    async fn verify_deceased(&self, patient: &Patient, bearer: &str) -> Result<Value>;
}
