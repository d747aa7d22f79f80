//! CRVS registration workflow service
//!
//! Takes registration bundles through declaration, validation, registration
//! and correction: tracking ids, status transitions, provenance extensions,
//! duplicate detection and the search index history.

pub mod api;
pub mod auth;
pub mod clients;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod state;

pub use error::{Error, Result};
