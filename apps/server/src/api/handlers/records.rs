//! Record workflow handlers

use crate::{api::extract::BundleBody, auth::AuthContext, state::AppState, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

/// Submit a new declaration bundle
pub async fn submit_record(
    State(state): State<AppState>,
    auth: AuthContext,
    BundleBody(bundle): BundleBody,
) -> Result<Response> {
    let outcome = state.registration.submit_declaration(bundle, &auth).await?;
    Ok((StatusCode::CREATED, Json(outcome)).into_response())
}

pub async fn request_correction(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
    BundleBody(bundle): BundleBody,
) -> Result<Response> {
    let outcome = state
        .registration
        .request_correction(&id, bundle, &auth)
        .await?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotDuplicateRequest {
    pub duplicate_id: Option<String>,
}

/// Remove one duplicate link, or all of them when no `duplicateId` is given
pub async fn mark_not_duplicate(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
    body: Option<Json<NotDuplicateRequest>>,
) -> Result<Response> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let outcome = state
        .registration
        .mark_not_duplicate(&id, request.duplicate_id.as_deref(), &auth)
        .await?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}
