//! Configuration management for the workflow service

use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub services: ServicesConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// Base URLs of the collaborating services
#[derive(Debug, Clone, Deserialize)]
pub struct ServicesConfig {
    /// FHIR resource store (Hearth)
    #[serde(default = "default_resource_store_url")]
    pub resource_store_url: String,
    #[serde(default = "default_user_management_url")]
    pub user_management_url: String,
    #[serde(default = "default_metrics_url")]
    pub metrics_url: String,
    #[serde(default = "default_documents_url")]
    pub documents_url: String,
    /// Elasticsearch
    #[serde(default = "default_search_url")]
    pub search_url: String,
    /// Identity verification service used for deceased details
    #[serde(default = "default_verification_url")]
    pub verification_url: String,
    /// Applied to every outbound request. Default: 30
    #[serde(default = "default_http_timeout")]
    pub http_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_index")]
    pub index: String,
    /// Hits must score strictly above this to count as duplicates
    #[serde(default = "default_match_score_threshold")]
    pub match_score_threshold: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON formatting for logs (recommended for production)
    #[serde(default)]
    pub json: bool,
}

/// Token decoding settings
///
/// Without a public key the payload is decoded but the signature is not checked;
/// the gateway in front of this service is expected to have verified it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    pub public_key_path: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5050
}

fn default_resource_store_url() -> String {
    "http://localhost:3447/fhir".to_string()
}

fn default_user_management_url() -> String {
    "http://localhost:3030".to_string()
}

fn default_metrics_url() -> String {
    "http://localhost:1050".to_string()
}

fn default_documents_url() -> String {
    "http://localhost:9050".to_string()
}

fn default_search_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_verification_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_http_timeout() -> u64 {
    30
}

fn default_search_index() -> String {
    "ocrvs".to_string()
}

fn default_match_score_threshold() -> f64 {
    1.0
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("services.resource_store_url", default_resource_store_url())?
            .set_default("services.user_management_url", default_user_management_url())?
            .set_default("services.metrics_url", default_metrics_url())?
            .set_default("services.documents_url", default_documents_url())?
            .set_default("services.search_url", default_search_url())?
            .set_default("services.verification_url", default_verification_url())?
            .set_default("services.http_timeout_seconds", default_http_timeout())?
            .set_default("search.index", default_search_index())?
            .set_default(
                "search.match_score_threshold",
                default_match_score_threshold(),
            )?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.json", false)?
            .add_source(config::File::with_name("config").required(false))
            // Nested keys use a double underscore:
            // CRVS__SERVICES__SEARCH_URL -> services.search_url
            .add_source(
                config::Environment::with_prefix("CRVS")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        Ok(addr.parse()?)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.services.http_timeout_seconds)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        let urls = [
            ("services.resource_store_url", &self.services.resource_store_url),
            ("services.user_management_url", &self.services.user_management_url),
            ("services.metrics_url", &self.services.metrics_url),
            ("services.documents_url", &self.services.documents_url),
            ("services.search_url", &self.services.search_url),
            ("services.verification_url", &self.services.verification_url),
        ];
        for (key, url) in urls {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("{key} must be an http(s) URL, got '{url}'"));
            }
        }

        if self.services.http_timeout_seconds == 0 {
            return Err("services.http_timeout_seconds must be > 0".to_string());
        }
        if self.search.index.trim().is_empty() {
            return Err("search.index must not be empty".to_string());
        }
        if !self.search.match_score_threshold.is_finite()
            || self.search.match_score_threshold < 0.0
        {
            return Err("search.match_score_threshold must be a non-negative number".to_string());
        }
        if let Some(path) = &self.auth.public_key_path {
            if path.trim().is_empty() {
                return Err("auth.public_key_path must not be empty when set".to_string());
            }
        }

        Ok(())
    }

    /// Configuration pointing every collaborator at `base_url`, used by tests
    pub fn for_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: Vec::new(),
            },
            services: ServicesConfig {
                resource_store_url: format!("{base}/fhir"),
                user_management_url: format!("{base}/user-mgnt"),
                metrics_url: format!("{base}/metrics"),
                documents_url: format!("{base}/documents"),
                search_url: format!("{base}/search"),
                verification_url: format!("{base}/verification"),
                http_timeout_seconds: 5,
            },
            search: SearchConfig {
                index: default_search_index(),
                match_score_threshold: default_match_score_threshold(),
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                json: false,
            },
            auth: AuthConfig::default(),
        }
    }
}
