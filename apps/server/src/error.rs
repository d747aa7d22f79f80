//! Error types for the workflow service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Bundle is missing the entries the pipeline needs
    #[error("Invalid FHIR bundle found: {0}")]
    InvalidBundle(String),

    /// A `urn:uuid:` reference that no entry in the bundle carries
    #[error("Invalid FHIR bundle found: unresolved reference {0}")]
    UnresolvedReference(String),

    #[error("Invalid practitioner data found: {0}")]
    InvalidPractitioner(String),

    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Collaborating service answered with a non-success status
    #[error("{service} responded with {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Model error: {0}")]
    Model(#[from] crvs_models::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidBundle(_)
            | Error::UnresolvedReference(_)
            | Error::InvalidPractitioner(_)
            | Error::InvalidResource(_)
            | Error::Model(_) => StatusCode::BAD_REQUEST,
            Error::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            Error::InvalidTransition { .. } => StatusCode::CONFLICT,
            Error::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            Error::Upstream { .. } | Error::Http(_) => StatusCode::BAD_GATEWAY,
            Error::Json(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Error::InvalidBundle(_) | Error::UnresolvedReference(_) => "invalid-bundle",
            Error::InvalidPractitioner(_) => "invalid-practitioner",
            Error::InvalidResource(_) | Error::Model(_) => "invalid-resource",
            Error::InvalidToken(_) => "invalid-token",
            Error::InvalidTransition { .. } => "invalid-transition",
            Error::ResourceNotFound(_) => "not-found",
            Error::Upstream { .. } | Error::Http(_) => "upstream",
            Error::Json(_) | Error::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body = json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
