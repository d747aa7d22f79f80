#![allow(dead_code)]
//! Shared helpers for the workflow integration tests
//!
//! Every collaborating service is served by one wiremock server; the
//! router under test is configured with [`Config::for_base_url`].

use axum::{
    body::{to_bytes, Body},
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use crvs_workflow::{api::create_router, config::Config, state::AppState};
use futures::future::BoxFuture;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PRACTITIONER_ID: &str = "pr-1";
pub const USER_ID: &str = "user-1";
pub const OFFICE_ID: &str = "office-1";
pub const DISTRICT_ID: &str = "district-1";
pub const COMPOSITION_ID: &str = "comp-1";

#[derive(Clone)]
pub struct TestApp {
    router: Router,
    pub server: Arc<MockServer>,
    token: String,
}

impl TestApp {
    /// Send a request with the default `declare register` token
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Body>,
    ) -> anyhow::Result<(StatusCode, HeaderMap, Value)> {
        self.request_with_token(method, uri, body, Some(&self.token))
            .await
    }

    pub async fn request_with_token(
        &self,
        method: Method,
        uri: &str,
        body: Option<Body>,
        token: Option<&str>,
    ) -> anyhow::Result<(StatusCode, HeaderMap, Value)> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(body.unwrap_or_else(Body::empty))?;

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, headers, body))
    }

    /// Bodies of every request the mock server received on `path`
    pub async fn received_bodies(&self, method_name: &str, url_path: &str) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method.as_str() == method_name && r.url.path() == url_path)
            .filter_map(|r| serde_json::from_slice(&r.body).ok())
            .collect()
    }
}

pub async fn with_test_app<F>(f: F) -> anyhow::Result<()>
where
    F: FnOnce(TestApp) -> BoxFuture<'static, anyhow::Result<()>>,
{
    let server = MockServer::start().await;
    let config = Config::for_base_url(&server.uri());
    let state = AppState::new(config)?;
    let app = TestApp {
        router: create_router(state),
        server: Arc::new(server),
        token: token(&["declare", "register"]),
    };
    f(app).await
}

/// Unsigned-check token as issued by the auth service
pub fn token(scopes: &[&str]) -> String {
    let claims = json!({
        "sub": USER_ID,
        "scope": scopes,
        "iss": "opencrvs:auth-service",
        "aud": "opencrvs:workflow-user",
        "exp": 4_102_444_800u64
    });
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(b"test"),
    )
    .unwrap_or_default()
}

pub fn to_json_body(value: &Value) -> anyhow::Result<Body> {
    Ok(Body::from(serde_json::to_vec(value)?))
}

pub fn assert_status(actual: StatusCode, expected: StatusCode, context: &str) {
    assert_eq!(actual, expected, "{context}: expected {expected}, got {actual}");
}

pub fn birth_declaration() -> Value {
    json!({
        "resourceType": "Bundle",
        "type": "document",
        "entry": [
            {
                "fullUrl": "urn:uuid:comp",
                "resource": {
                    "resourceType": "Composition",
                    "status": "preliminary",
                    "type": { "coding": [{ "system": "http://opencrvs.org/doc-types", "code": "birth-declaration" }] },
                    "date": "2023-02-01T10:00:00.000Z",
                    "section": [
                        {
                            "code": { "coding": [{ "system": "http://opencrvs.org/doc-sections", "code": "child-details" }] },
                            "entry": [{ "reference": "urn:uuid:child" }]
                        },
                        {
                            "code": { "coding": [{ "system": "http://opencrvs.org/doc-sections", "code": "mother-details" }] },
                            "entry": [{ "reference": "urn:uuid:mother" }]
                        }
                    ]
                }
            },
            {
                "fullUrl": "urn:uuid:task",
                "resource": {
                    "resourceType": "Task",
                    "status": "ready",
                    "intent": "proposal",
                    "focus": { "reference": "urn:uuid:comp" },
                    "note": [{ "text": "Child is healthy", "time": "2023-02-01T09:00:00.000Z" }],
                    "extension": [
                        { "url": "http://opencrvs.org/specs/extension/contact-relationship", "valueString": "MOTHER" },
                        { "url": "http://opencrvs.org/specs/extension/informants-signature", "valueString": "data:image/png;base64,iVBORw0KGgo=" }
                    ]
                }
            },
            {
                "fullUrl": "urn:uuid:child",
                "resource": {
                    "resourceType": "Patient",
                    "gender": "female",
                    "birthDate": "2023-01-15",
                    "name": [{ "use": "en", "given": ["Anne"], "family": "Phiri" }]
                }
            },
            {
                "fullUrl": "urn:uuid:mother",
                "resource": {
                    "resourceType": "Patient",
                    "birthDate": "1990-05-05",
                    "name": [{ "use": "en", "given": ["Grace"], "family": "Phiri" }]
                }
            }
        ]
    })
}

/// Transaction response assigning ids in entry order
pub fn transaction_response(locations: &[&str]) -> Value {
    json!({
        "resourceType": "Bundle",
        "type": "transaction-response",
        "entry": locations
            .iter()
            .map(|l| json!({ "response": { "status": "201", "location": format!("{l}/_history/1") } }))
            .collect::<Vec<_>>()
    })
}

/// Mount the user directory, practitioner, roles and locations
pub async fn mount_practitioner(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/user-mgnt/getUser"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_id": USER_ID,
            "practitionerId": PRACTITIONER_ID,
            "role": { "labels": [{ "lang": "en", "label": "Local Registrar" }] },
            "name": [{ "use": "en", "given": ["Kennedy"], "family": "Mweene" }]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/fhir/Practitioner/{PRACTITIONER_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Practitioner",
            "id": PRACTITIONER_ID,
            "name": [{ "use": "en", "given": ["Kennedy"], "family": "Mweene" }]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/fhir/PractitionerRole"))
        .and(query_param("practitioner", format!("Practitioner/{PRACTITIONER_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "entry": [{
                "resource": {
                    "resourceType": "PractitionerRole",
                    "id": "role-1",
                    "practitioner": { "reference": format!("Practitioner/{PRACTITIONER_ID}") },
                    "location": [{ "reference": format!("Location/{OFFICE_ID}") }]
                }
            }]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/fhir/Location/{OFFICE_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Location",
            "id": OFFICE_ID,
            "name": "Ibombo District Office",
            "alias": ["আইবোম্বো জেলা অফিস"],
            "type": { "coding": [{ "system": "http://opencrvs.org/specs/location-type", "code": "CRVS_OFFICE" }] },
            "partOf": { "reference": format!("Location/{DISTRICT_ID}") }
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/fhir/Location/{DISTRICT_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Location",
            "id": DISTRICT_ID,
            "name": "Ibombo",
            "partOf": { "reference": "Location/0" }
        })))
        .mount(server)
        .await;
}

/// Mount the transaction endpoint, document upload and an empty index
pub async fn mount_persistence(server: &MockServer, duplicate_hits: Value) {
    Mock::given(method("POST"))
        .and(path("/fhir"))
        .respond_with(ResponseTemplate::new(200).set_body_json(transaction_response(&[
            &format!("Composition/{COMPOSITION_ID}"),
            "Task/task-1",
            "Patient/child-1",
            "Patient/mother-1",
        ])))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/documents/upload"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "refUrl": "/ocrvs/signature.png" })),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/search/ocrvs/_doc/{COMPOSITION_ID}")))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;

    Mock::given(method("PUT"))
        .and(path(format!("/search/ocrvs/_doc/{COMPOSITION_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "updated" })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/search/ocrvs/_search"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "hits": { "hits": duplicate_hits } })),
        )
        .mount(server)
        .await;
}
