//! Application layer - Use cases and orchestration
//!
//! Contains the port definitions for the upstream user dependency and the
//! fault-injecting lookup in front of it, plus the user service that shapes a
//! lookup into a response.

pub mod error;
pub mod ports;
pub mod services;

pub use error::ApplicationError;
pub use ports::*;
pub use services::*;
