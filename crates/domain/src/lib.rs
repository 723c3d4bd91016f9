//! Domain layer for Faultline
//!
//! Contains the user record returned by the upstream dependency, the outcome of a
//! fetch, and the request classification used by telemetry.
//! This layer has no runtime dependencies and defines the ubiquitous language.

pub mod entities;
pub mod errors;
pub mod value_objects;

pub use entities::*;
pub use errors::DomainError;
pub use value_objects::*;
