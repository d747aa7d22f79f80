use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("extension {url} expects {expected} but carries {found}")]
    ExtensionShape {
        url: String,
        expected: &'static str,
        found: String,
    },

    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    #[error("unknown registration status: {0}")]
    UnknownStatus(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
