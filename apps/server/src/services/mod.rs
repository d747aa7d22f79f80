//! Workflow logic
//!
//! Leaf modules operate on bundles and index documents directly;
//! [`registration`] strings them together per request.

pub mod audit;
pub mod bundle_modifier;
pub mod documents;
pub mod duplicates;
pub mod indexing;
pub mod locations;
pub mod locator;
pub(crate) mod referential_integrity;
pub mod registration;
pub mod transitions;

pub use registration::{Collaborators, NotDuplicateOutcome, RecordOutcome, RegistrationService};
