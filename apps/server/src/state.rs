//! Shared application state

use crate::{
    auth::TokenDecoder,
    clients::{
        build_http_client, HttpDocumentStore, HttpMetricsClient, HttpResourceStore,
        HttpSearchIndex, HttpUserDirectory, HttpVerificationService,
    },
    config::Config,
    services::{Collaborators, RegistrationService},
    Result,
};
use std::sync::Arc;

/// Shared application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tokens: Arc<TokenDecoder>,
    pub registration: Arc<RegistrationService>,
}

impl AppState {
    /// Wire the HTTP clients for every collaborating service
    pub fn new(config: Config) -> Result<Self> {
        let tokens = TokenDecoder::new(&config.auth)?;
        let client = build_http_client(config.http_timeout())?;
        let services = &config.services;

        let deps = Collaborators {
            store: Arc::new(HttpResourceStore::new(
                client.clone(),
                &services.resource_store_url,
            )),
            index: Arc::new(HttpSearchIndex::new(
                client.clone(),
                &services.search_url,
                &config.search.index,
            )),
            users: Arc::new(HttpUserDirectory::new(
                client.clone(),
                &services.user_management_url,
            )),
            metrics: Arc::new(HttpMetricsClient::new(client.clone(), &services.metrics_url)),
            documents: Arc::new(HttpDocumentStore::new(client.clone(), &services.documents_url)),
            verifier: Arc::new(HttpVerificationService::new(
                client,
                &services.verification_url,
            )),
        };

        tracing::info!(
            resource_store = %services.resource_store_url,
            search = %services.search_url,
            index = %config.search.index,
            verified_tokens = config.auth.public_key_path.is_some(),
            "Workflow collaborators configured"
        );

        Ok(Self::with_collaborators(config, tokens, deps))
    }

    /// State over caller supplied collaborators
    pub fn with_collaborators(config: Config, tokens: TokenDecoder, deps: Collaborators) -> Self {
        let registration = RegistrationService::new(deps, config.search.match_score_threshold);
        Self {
            config: Arc::new(config),
            tokens: Arc::new(tokens),
            registration: Arc::new(registration),
        }
    }
}
