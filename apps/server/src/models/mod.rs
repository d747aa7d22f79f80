//! Service-side data shapes that are not FHIR resources

pub mod index;
pub mod user;

pub use index::{Assignment, CompositionBody, Correction, DuplicateRef, OperationHistory, SearchHit};
pub use user::{RoleLabel, UserModel, UserQuery, UserRole};
