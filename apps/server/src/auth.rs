//! Bearer token decoding
//!
//! The service trusts the gateway for authentication. It only needs the
//! token payload to pick the registration status from the caller's scope
//! and to forward the raw token to collaborating services.

use crate::{config::AuthConfig, state::AppState, Error, Result};
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Deserializer};

/// Claims the workflow reads from a token
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenPayload {
    #[serde(default)]
    pub sub: String,
    #[serde(default, deserialize_with = "scope_list")]
    pub scope: Vec<String>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
}

impl TokenPayload {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.iter().any(|s| s == scope)
    }
}

/// Accepts both `["declare", "register"]` and `"declare register"`
fn scope_list<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scope {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Scope::deserialize(deserializer)? {
        Scope::List(list) => list,
        Scope::Joined(joined) => joined.split_whitespace().map(str::to_string).collect(),
    })
}

pub struct TokenDecoder {
    key: DecodingKey,
    validation: Validation,
}

impl TokenDecoder {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        match &config.public_key_path {
            Some(path) => {
                let pem = std::fs::read(path).map_err(|e| {
                    Error::Internal(format!("failed to read public key {path}: {e}"))
                })?;
                let key = DecodingKey::from_rsa_pem(&pem)
                    .map_err(|e| Error::Internal(format!("invalid public key {path}: {e}")))?;
                let mut validation = Validation::new(Algorithm::RS256);
                if let Some(issuer) = &config.issuer {
                    validation.set_issuer(&[issuer]);
                }
                match &config.audience {
                    Some(audience) => validation.set_audience(&[audience]),
                    None => validation.validate_aud = false,
                }
                Ok(Self { key, validation })
            }
            None => Ok(Self::unverified()),
        }
    }

    /// Decoder that reads the payload without checking the signature
    pub fn unverified() -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.insecure_disable_signature_validation();
        validation.validate_aud = false;
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        Self {
            key: DecodingKey::from_secret(&[]),
            validation,
        }
    }

    pub fn decode(&self, token: &str) -> Result<TokenPayload> {
        decode::<TokenPayload>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| Error::InvalidToken(e.to_string()))
    }
}

/// Authenticated caller: raw token plus decoded payload
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub token: String,
    pub payload: TokenPayload,
}

impl AuthContext {
    /// Value for an outgoing `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthContext {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::InvalidToken("missing Authorization header".to_string()))?;
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::InvalidToken("expected a Bearer token".to_string()))?;
        let payload = state.tokens.decode(token)?;
        Ok(Self {
            token: token.to_string(),
            payload,
        })
    }
}
