//! CRVS registration resource model
//!
//! Typed FHIR resources for the registration workflow, the extension
//! catalog and the registration status and event enums.

pub mod codes;
pub mod common;
pub mod error;
pub mod extension;
pub mod resources;

pub use codes::{EventType, RegStatus};
pub use common::complex::*;
pub use error::{Error, Result};
pub use extension::{find_extension, Extension, ExtensionList, ExtensionUrl, ExtensionValue, ValueShape};
pub use resources::*;
