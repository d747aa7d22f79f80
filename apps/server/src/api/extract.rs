//! Request body extractors

use crate::Error;
use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use crvs_models::Bundle;

/// JSON bundle body; malformed resources surface as [`Error::InvalidResource`]
pub struct BundleBody(pub Bundle);

#[async_trait]
impl<S: Send + Sync> FromRequest<S> for BundleBody {
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(bundle) = Json::<Bundle>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| Error::InvalidResource(rejection.body_text()))?;
        Ok(Self(bundle))
    }
}
